//! Thumbnail cache keyed by resource id.
//!
//! `<cache_root>/images/<resourceId>` holds the raw image bytes, with no
//! extension and no sidecar. The key is the id alone: once an image is cached
//! it is never refreshed, even if the remote image changes. A cache hit never
//! touches the network.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::error::ErrorKind;
use crate::http::{ApiClient, FetchError};
use crate::locks::KeyedLocks;
use crate::store::{CacheDir, StoreError};
use crate::transfer::{TransferError, stream_to_entry};

/// Errors from [`ThumbnailCache::get_or_fetch`].
#[derive(Debug, Error)]
pub enum ThumbnailError {
    /// The image could not be downloaded.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The image could not be stored, or the id is not a valid cache key.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl From<TransferError> for ThumbnailError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Fetch(e) => Self::Fetch(e),
            TransferError::Storage(e) => Self::Storage(e),
        }
    }
}

impl ThumbnailError {
    /// Maps this error onto the crate-wide taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch(e) => e.kind(),
            Self::Storage(e) => e.kind(),
        }
    }
}

/// Download-on-miss image cache.
#[derive(Debug, Clone)]
pub struct ThumbnailCache {
    client: ApiClient,
    dir: CacheDir,
    locks: KeyedLocks,
}

impl ThumbnailCache {
    /// Creates a cache over `dir`.
    #[must_use]
    pub fn new(client: ApiClient, dir: CacheDir) -> Self {
        Self {
            client,
            dir,
            locks: KeyedLocks::new(),
        }
    }

    /// Directory holding the images.
    #[must_use]
    pub fn dir(&self) -> &CacheDir {
        &self.dir
    }

    /// Returns the cached image path for `resource_id`, downloading it from
    /// `remote_url` first on a miss.
    ///
    /// Concurrent calls for the same id download at most once. A failed
    /// download leaves nothing at the returned path.
    ///
    /// # Errors
    ///
    /// [`ThumbnailError::Storage`] for an invalid id or a filesystem failure,
    /// [`ThumbnailError::Fetch`] when the download fails.
    #[instrument(skip(self))]
    pub async fn get_or_fetch(
        &self,
        resource_id: &str,
        remote_url: &str,
    ) -> Result<PathBuf, ThumbnailError> {
        let path = self.dir.resolve(resource_id)?;
        if self.dir.exists(resource_id).await? {
            debug!(path = %path.display(), "thumbnail cache hit");
            return Ok(path);
        }

        let _guard = self.locks.lock(resource_id).await;
        if self.dir.exists(resource_id).await? {
            debug!(path = %path.display(), "thumbnail cached while waiting");
            return Ok(path);
        }

        debug!("thumbnail cache miss");
        self.dir.ensure().await?;
        let response = self.client.get(remote_url, None).await?;

        let (path, bytes) =
            stream_to_entry(&self.dir, resource_id, response, remote_url).await?;
        info!(path = %path.display(), bytes, "thumbnail cached");
        Ok(path)
    }

    /// Whether `resource_id` is already cached.
    ///
    /// # Errors
    ///
    /// [`ThumbnailError::Storage`] for an invalid id or an unreadable directory.
    pub async fn is_cached(&self, resource_id: &str) -> Result<bool, ThumbnailError> {
        Ok(self.dir.exists(resource_id).await?)
    }
}
