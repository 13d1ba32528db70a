//! JSON sidecar written next to each downloaded payload.
//!
//! `<cache_root>/downloads/<attachmentId>.json`:
//!
//! ```json
//! {
//!   "title": "Geometry for Beginners",
//!   "filename": "geometry.pdf",
//!   "downloadedAt": "2024-05-01T10:00:00Z"
//! }
//! ```
//!
//! The sidecar is written only after the payload is durably on disk, so a
//! crash in between leaves a payload without metadata, never the reverse.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::DownloadError;
use super::filename::sidecar_name;
use crate::store::CacheDir;

/// Metadata persisted for one download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadSidecar {
    /// Display title chosen by the caller; may be empty.
    #[serde(default)]
    pub title: String,
    /// File name the server supplied.
    #[serde(rename = "filename", default)]
    pub file_name: String,
    /// When the download completed. Set once, never rewritten.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded_at: Option<DateTime<Utc>>,
}

impl DownloadSidecar {
    /// Sidecar for a download completed at `downloaded_at`.
    pub fn new(
        title: impl Into<String>,
        file_name: impl Into<String>,
        downloaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            file_name: file_name.into(),
            downloaded_at: Some(downloaded_at),
        }
    }
}

/// Atomically writes the sidecar of `attachment_id`.
pub(crate) async fn write_sidecar(
    dir: &CacheDir,
    attachment_id: &str,
    sidecar: &DownloadSidecar,
) -> Result<PathBuf, DownloadError> {
    let name = sidecar_name(attachment_id);
    let bytes = serde_json::to_vec_pretty(sidecar)
        .map_err(|source| DownloadError::sidecar(dir.path().join(&name), source))?;
    let path = dir.write(&name, &bytes).await?;
    debug!(path = %path.display(), "sidecar written");
    Ok(path)
}

/// Reads the sidecar of `attachment_id`.
///
/// Missing and unreadable sidecars both yield `None`; the latter is logged.
pub(crate) async fn read_sidecar(dir: &CacheDir, attachment_id: &str) -> Option<DownloadSidecar> {
    let name = sidecar_name(attachment_id);
    let bytes = match dir.read(&name).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(sidecar = %name, error = %e, "sidecar not readable");
            return None;
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(sidecar) => Some(sidecar),
        Err(e) => {
            warn!(sidecar = %name, error = %e, "ignoring corrupt sidecar");
            None
        }
    }
}
