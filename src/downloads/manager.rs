//! The download manager: fetch, list, delete, and open downloaded attachments.

use std::sync::Arc;

use chrono::Utc;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE, HeaderName};
use tracing::{debug, info, instrument, warn};

use super::error::DownloadError;
use super::filename::{
    base_id, belongs_to, choose_extension, extension_from_name, file_name_from_url,
    is_sidecar, is_valid_attachment_id, parse_content_disposition, payload_name, sidecar_name,
};
use super::opener::{FileOpener, SystemOpener};
use super::record::{DownloadedFile, sort_newest_first};
use super::sidecar::{DownloadSidecar, read_sidecar, write_sidecar};
use crate::config::ApiEndpoints;
use crate::http::{ApiClient, WaitCountdown};
use crate::locks::KeyedLocks;
use crate::store::{CacheDir, StoreEntry};
use crate::transfer::{TransferError, stream_to_entry};

impl From<TransferError> for DownloadError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Fetch(e) => Self::Fetch(e),
            TransferError::Storage(e) => Self::Storage(e),
        }
    }
}

/// Result of [`DownloadManager::download`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    /// The payload now on disk.
    pub file: DownloadedFile,
    /// True when the payload was already present and nothing was fetched.
    pub reused: bool,
}

/// Owns the download directory.
///
/// Per attachment id the lifecycle is absent, downloading, then present; a
/// failed download returns to absent. Operations on the same id are
/// serialised, different ids run in parallel.
#[derive(Debug, Clone)]
pub struct DownloadManager {
    client: ApiClient,
    endpoints: ApiEndpoints,
    dir: CacheDir,
    locks: KeyedLocks,
    opener: Arc<dyn FileOpener>,
}

impl DownloadManager {
    /// Creates a manager over `dir` that opens files with the system handler.
    #[must_use]
    pub fn new(client: ApiClient, endpoints: ApiEndpoints, dir: CacheDir) -> Self {
        Self {
            client,
            endpoints,
            dir,
            locks: KeyedLocks::new(),
            opener: Arc::new(SystemOpener::default()),
        }
    }

    /// Replaces the file opener.
    #[must_use]
    pub fn with_opener(mut self, opener: Arc<dyn FileOpener>) -> Self {
        self.opener = opener;
        self
    }

    /// The download directory.
    #[must_use]
    pub fn dir(&self) -> &CacheDir {
        &self.dir
    }

    /// Downloads attachment `attachment_id` unless it is already present.
    ///
    /// See [`download_with_countdown`](Self::download_with_countdown).
    ///
    /// # Errors
    ///
    /// Same as [`download_with_countdown`](Self::download_with_countdown).
    pub async fn download(
        &self,
        attachment_id: &str,
        title: &str,
    ) -> Result<DownloadOutcome, DownloadError> {
        self.download_with_countdown(attachment_id, title, None)
            .await
    }

    /// Downloads attachment `attachment_id`, publishing rate-limit waits to
    /// `countdown`.
    ///
    /// Idempotent: if a payload named `<id>` or `<id>.<ext>` exists it is
    /// returned without a request. Otherwise the payload is streamed to a
    /// temp file, renamed to `<id><.ext>`, and only then is the sidecar
    /// written. A leftover sidecar without payload is removed first.
    ///
    /// # Errors
    ///
    /// - [`DownloadError::InvalidId`] for ids that are not a plain segment
    ///   without dots
    /// - [`DownloadError::Fetch`] when the request fails; nothing is left on disk
    /// - [`DownloadError::Storage`] / [`DownloadError::Sidecar`] when writing
    ///   fails; the payload is removed again so no half pair remains
    #[instrument(skip(self, title, countdown))]
    pub async fn download_with_countdown(
        &self,
        attachment_id: &str,
        title: &str,
        countdown: Option<&WaitCountdown>,
    ) -> Result<DownloadOutcome, DownloadError> {
        if !is_valid_attachment_id(attachment_id) {
            return Err(DownloadError::invalid_id(attachment_id));
        }
        let _guard = self.locks.lock(attachment_id).await;

        self.dir.ensure().await?;
        let entries = self.dir.list().await?;
        if let Some(existing) = entries
            .iter()
            .find(|e| !is_sidecar(&e.name) && belongs_to(&e.name, attachment_id))
        {
            debug!(file = %existing.name, "already downloaded");
            let file = self.describe(existing).await;
            return Ok(DownloadOutcome { file, reused: true });
        }

        let sidecar = sidecar_name(attachment_id);
        if entries.iter().any(|e| e.name == sidecar) {
            warn!(sidecar = %sidecar, "removing sidecar without payload");
            self.dir.delete(&sidecar).await?;
        }

        let url = self.endpoints.file_url(attachment_id);
        let response = self.client.get(&url, countdown).await?;
        let header = |name: HeaderName| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let server_name = header(CONTENT_DISPOSITION)
            .as_deref()
            .and_then(parse_content_disposition);
        let content_type = header(CONTENT_TYPE);
        let final_url = response.url().to_string();

        let extension = choose_extension(server_name.as_deref(), &final_url, content_type.as_deref());
        let payload = payload_name(attachment_id, &extension);
        let original_name = server_name
            .or_else(|| file_name_from_url(&final_url).filter(|n| extension_from_name(n).is_some()))
            .unwrap_or_else(|| payload.clone());

        let (path, bytes) = stream_to_entry(&self.dir, &payload, response, &url).await?;

        let record = DownloadSidecar::new(title, original_name, Utc::now());
        if let Err(e) = write_sidecar(&self.dir, attachment_id, &record).await {
            warn!(error = %e, "sidecar write failed, removing payload");
            if let Err(cleanup) = self.dir.delete(&payload).await {
                warn!(error = %cleanup, "failed to remove payload after sidecar failure");
            }
            return Err(e);
        }

        info!(path = %path.display(), bytes, "download complete");
        let entry = self.dir.entry(&payload).await?.unwrap_or(StoreEntry {
            name: payload,
            path,
            size: bytes,
            modified: None,
        });
        let file = DownloadedFile::from_entry(&entry, Some(&record), Utc::now());
        Ok(DownloadOutcome {
            file,
            reused: false,
        })
    }

    /// Lists downloaded payloads, newest first.
    ///
    /// Sidecars are not listed themselves; a sidecar without payload is
    /// ignored. A payload without (readable) sidecar is listed with
    /// `metadata_missing` set.
    ///
    /// # Errors
    ///
    /// [`DownloadError::Storage`] if the directory cannot be read.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<DownloadedFile>, DownloadError> {
        let entries = self.dir.list().await?;
        let mut files = Vec::new();
        for entry in entries.iter().filter(|e| !is_sidecar(&e.name)) {
            files.push(self.describe(entry).await);
        }
        sort_newest_first(&mut files);
        debug!(count = files.len(), "downloads listed");
        Ok(files)
    }

    /// Finds the payload of `attachment_id`, if downloaded.
    ///
    /// # Errors
    ///
    /// [`DownloadError::InvalidId`] for malformed ids, or
    /// [`DownloadError::Storage`] if the directory cannot be read.
    pub async fn find(&self, attachment_id: &str) -> Result<Option<DownloadedFile>, DownloadError> {
        if !is_valid_attachment_id(attachment_id) {
            return Err(DownloadError::invalid_id(attachment_id));
        }
        let entries = self.dir.list().await?;
        match entries
            .iter()
            .find(|e| !is_sidecar(&e.name) && belongs_to(&e.name, attachment_id))
        {
            Some(entry) => Ok(Some(self.describe(entry).await)),
            None => Ok(None),
        }
    }

    /// Deletes payload `file_name` and its sidecar.
    ///
    /// The payload goes first: if removing the sidecar then fails, the entry
    /// is already gone from listings. The sidecar stays while another payload
    /// of the same id remains. Each half is idempotent, so deleting twice
    /// succeeds. Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// [`DownloadError::InvalidId`] for sidecar or unsafe names,
    /// [`DownloadError::Storage`] if a removal fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, file_name: &str) -> Result<bool, DownloadError> {
        let attachment_id = base_id(file_name);
        if is_sidecar(file_name) || !is_valid_attachment_id(attachment_id) {
            return Err(DownloadError::invalid_id(file_name));
        }
        self.dir.resolve(file_name)?;
        let _guard = self.locks.lock(attachment_id).await;

        let payload_removed = self.dir.delete(file_name).await?;
        let sidecar = sidecar_name(attachment_id);
        let remaining = self.dir.list().await?;
        if let Some(other) = remaining
            .iter()
            .find(|e| !is_sidecar(&e.name) && belongs_to(&e.name, attachment_id))
        {
            debug!(file = file_name, payload = %other.name, "sidecar kept for remaining payload");
            return Ok(payload_removed);
        }
        let sidecar_removed = match self.dir.delete(&sidecar).await {
            Ok(removed) => removed,
            Err(e) => {
                warn!(sidecar = %sidecar, error = %e, "payload removed but sidecar remains");
                return Err(e.into());
            }
        };

        if payload_removed || sidecar_removed {
            info!(file = file_name, "download deleted");
        } else {
            debug!(file = file_name, "nothing to delete");
        }
        Ok(payload_removed || sidecar_removed)
    }

    /// Opens payload `file_name` with the configured [`FileOpener`].
    ///
    /// # Errors
    ///
    /// [`DownloadError::Storage`] if the file does not exist,
    /// [`DownloadError::ViewerUnavailable`] if no handler accepts it.
    #[instrument(skip(self))]
    pub async fn open(&self, file_name: &str) -> Result<DownloadedFile, DownloadError> {
        if is_sidecar(file_name) {
            return Err(DownloadError::invalid_id(file_name));
        }
        let Some(entry) = self.dir.entry(file_name).await? else {
            let path = self.dir.resolve(file_name)?;
            return Err(crate::store::StoreError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::NotFound, "downloaded file not found"),
            )
            .into());
        };
        self.opener.open(&entry.path).await?;
        Ok(self.describe(&entry).await)
    }

    async fn describe(&self, entry: &StoreEntry) -> DownloadedFile {
        let attachment_id = base_id(&entry.name);
        let sidecar = read_sidecar(&self.dir, attachment_id).await;
        let file = DownloadedFile::from_entry(entry, sidecar.as_ref(), Utc::now());
        if file.metadata_missing {
            warn!(file = %entry.name, "download has no usable metadata");
        }
        file
    }
}
