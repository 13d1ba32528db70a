//! The service object tying the core together.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::catalog::{FetchSession, ResourceDetail, ResourceFetcher, ResourceQuery, ResourceSummary};
use crate::config::{CachePaths, ConfigError, LibraryConfig};
use crate::downloads::{DownloadManager, FileOpener};
use crate::error::ErrorKind;
use crate::http::{ApiClient, FetchError};
use crate::store::{CacheKind, CacheStore};
use crate::thumbnail::ThumbnailCache;

/// Errors from [`OfflineLibrary::new`].
#[derive(Debug, Error)]
pub enum LibraryError {
    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// The HTTP client could not be built.
    #[error(transparent)]
    Client(#[from] FetchError),
}

impl LibraryError {
    /// Maps this error onto the crate-wide taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Invalid,
            Self::Client(e) => e.kind(),
        }
    }
}

/// Catalog access plus the two local caches, built from one [`LibraryConfig`].
///
/// Cheap to clone; clones share the HTTP connection pool and the
/// per-identifier lock tables.
///
/// # Example
///
/// ```no_run
/// use offline_library_core::{LibraryConfig, OfflineLibrary, ResourceQuery};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let library = OfflineLibrary::new(LibraryConfig::with_cache_root("/tmp/library"))?;
/// let page = library.fetch_page(&ResourceQuery::search("math"), 0).await?;
/// for item in &page {
///     if let Some(img) = &item.img {
///         let thumb = library.thumbnails().get_or_fetch(&item.id, img).await?;
///         println!("{} -> {}", item.title, thumb.display());
///     }
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OfflineLibrary {
    config: Arc<LibraryConfig>,
    fetcher: ResourceFetcher,
    thumbnails: ThumbnailCache,
    downloads: DownloadManager,
}

impl OfflineLibrary {
    /// Validates `config` and builds every component.
    ///
    /// Nothing touches the disk or network until an operation runs.
    ///
    /// # Errors
    ///
    /// [`LibraryError::Config`] for invalid settings, [`LibraryError::Client`]
    /// if the HTTP client cannot be created.
    #[instrument(skip(config), fields(api = %config.api_base_url, cache_root = %config.cache_root.display()))]
    pub fn new(config: LibraryConfig) -> Result<Self, LibraryError> {
        config.validate()?;
        let endpoints = config.endpoints()?;
        let client = ApiClient::new(config.retry_policy(), config.timeouts())?;
        let store = config.store();

        let fetcher = ResourceFetcher::new(client.clone(), endpoints.clone(), config.page_size);
        let thumbnails = ThumbnailCache::new(client.clone(), store.dir(CacheKind::Images));
        let downloads = DownloadManager::new(client, endpoints, store.dir(CacheKind::Downloads));
        debug!("library ready");

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            thumbnails,
            downloads,
        })
    }

    /// Replaces the file opener used by [`DownloadManager::open`].
    #[must_use]
    pub fn with_opener(mut self, opener: Arc<dyn FileOpener>) -> Self {
        self.downloads = self.downloads.with_opener(opener);
        self
    }

    /// The configuration this library was built from.
    #[must_use]
    pub fn config(&self) -> &LibraryConfig {
        &self.config
    }

    /// Cache root handle.
    #[must_use]
    pub fn store(&self) -> CacheStore {
        self.config.store()
    }

    /// Resolved cache directories.
    #[must_use]
    pub fn paths(&self) -> CachePaths {
        CachePaths::under(&self.config.cache_root)
    }

    /// Page fetcher.
    #[must_use]
    pub fn fetcher(&self) -> &ResourceFetcher {
        &self.fetcher
    }

    /// Starts a new browsing session with its own result set.
    #[must_use]
    pub fn session(&self) -> FetchSession {
        FetchSession::new(self.fetcher.clone())
    }

    /// Thumbnail cache.
    #[must_use]
    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    /// Download manager.
    #[must_use]
    pub fn downloads(&self) -> &DownloadManager {
        &self.downloads
    }

    /// Fetches one page of `query` at `offset`.
    ///
    /// # Errors
    ///
    /// Any [`FetchError`] of the request.
    pub async fn fetch_page(
        &self,
        query: &ResourceQuery,
        offset: u32,
    ) -> Result<Vec<ResourceSummary>, FetchError> {
        self.fetcher.fetch_page(query, offset, None).await
    }

    /// Fetches the detail object of `resource_id`.
    ///
    /// # Errors
    ///
    /// Any [`FetchError`] of the request.
    pub async fn fetch_detail(&self, resource_id: &str) -> Result<ResourceDetail, FetchError> {
        self.fetcher.fetch_detail(resource_id, None).await
    }
}
