//! Listing view of a downloaded file.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::filename::base_id;
use super::sidecar::DownloadSidecar;
use crate::store::StoreEntry;

/// MIME type reported when neither name maps to a known type.
const UNKNOWN_MIME: &str = "application/octet-stream";

/// A payload in the download directory, paired with its sidecar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadedFile {
    /// Attachment id the payload is named after.
    pub attachment_id: String,
    /// Sidecar title, or the file name when there is none.
    pub title: String,
    /// On-disk name (`<attachmentId><.ext>`); the key for delete and open.
    pub file_name: String,
    /// Server-supplied file name from the sidecar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    /// MIME type guessed from the original name, then the on-disk name.
    pub mime: String,
    /// Byte length of the payload as found on disk.
    pub size: u64,
    /// Absolute path of the payload.
    pub path: PathBuf,
    /// Download time from the sidecar; listing time when `metadata_missing`.
    pub downloaded_at: DateTime<Utc>,
    /// The sidecar is absent, unreadable, or lacks a timestamp.
    pub metadata_missing: bool,
}

impl DownloadedFile {
    /// Builds the listing view of `entry`.
    ///
    /// `now` stands in for the download time when the sidecar cannot supply it.
    pub(crate) fn from_entry(
        entry: &StoreEntry,
        sidecar: Option<&DownloadSidecar>,
        now: DateTime<Utc>,
    ) -> Self {
        let title = sidecar
            .map(|s| s.title.trim())
            .filter(|title| !title.is_empty())
            .map_or_else(|| entry.name.clone(), str::to_string);
        let original_name = sidecar
            .map(|s| s.file_name.clone())
            .filter(|name| !name.is_empty());
        let mime = original_name
            .as_deref()
            .and_then(guess_mime)
            .or_else(|| guess_mime(&entry.name))
            .unwrap_or_else(|| UNKNOWN_MIME.to_string());
        let recorded_at = sidecar.and_then(|s| s.downloaded_at);

        Self {
            attachment_id: base_id(&entry.name).to_string(),
            title,
            file_name: entry.name.clone(),
            original_name,
            mime,
            size: entry.size,
            path: entry.path.clone(),
            downloaded_at: recorded_at.unwrap_or(now),
            metadata_missing: recorded_at.is_none(),
        }
    }
}

fn guess_mime(name: &str) -> Option<String> {
    mime_guess::from_path(Path::new(name))
        .first()
        .map(|mime| mime.essence_str().to_string())
}

/// Newest first; equal timestamps by file name.
pub(crate) fn sort_newest_first(files: &mut [DownloadedFile]) {
    files.sort_by(|a, b| {
        b.downloaded_at
            .cmp(&a.downloaded_at)
            .then_with(|| a.file_name.cmp(&b.file_name))
    });
}
