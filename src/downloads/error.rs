//! Error types for the download manager.

use std::path::PathBuf;

use thiserror::Error;

use crate::error::ErrorKind;
use crate::http::FetchError;
use crate::store::StoreError;

/// Errors from [`DownloadManager`](super::DownloadManager) operations.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The attachment could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// A filesystem operation on the download directory failed.
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// The sidecar could not be encoded.
    #[error("failed to encode sidecar {path}: {source}")]
    Sidecar {
        /// Sidecar path.
        path: PathBuf,
        /// The underlying serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// The attachment id or file name cannot name a download.
    #[error("invalid download identifier {id:?}")]
    InvalidId {
        /// The rejected identifier.
        id: String,
    },

    /// No system handler could open the file.
    #[error("no viewer available for {path}: {reason}")]
    ViewerUnavailable {
        /// The file that was to be opened.
        path: PathBuf,
        /// What the platform reported.
        reason: String,
    },
}

impl DownloadError {
    /// Creates an invalid-id error.
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId { id: id.into() }
    }

    /// Creates a viewer-unavailable error.
    pub fn viewer_unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ViewerUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a sidecar encoding error.
    pub fn sidecar(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Sidecar {
            path: path.into(),
            source,
        }
    }

    /// Maps this error onto the crate-wide taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Fetch(e) => e.kind(),
            Self::Storage(e) => e.kind(),
            Self::Sidecar { .. } => ErrorKind::Storage,
            Self::InvalidId { .. } => ErrorKind::Invalid,
            Self::ViewerUnavailable { .. } => ErrorKind::ViewerUnavailable,
        }
    }
}
