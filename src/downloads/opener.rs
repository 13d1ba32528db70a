//! Handing a downloaded file to the platform.
//!
//! Phones split here: one platform opens files through a viewer intent on a
//! content URI, the other presents a share sheet. [`SystemOpener`] keeps that
//! split as [`OpenStrategy`] and maps both onto the desktop equivalents
//! offered by the `opener` crate.

use std::fmt::Debug;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, instrument};
use url::Url;

use super::error::DownloadError;

/// How a file is handed to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenStrategy {
    /// Build a `file://` URI and launch the default viewer for it.
    ViewIntent,
    /// Show the file's folder so the user can pick what to do with it.
    ShareSheet,
}

impl OpenStrategy {
    /// Strategy native to the build target.
    #[must_use]
    pub fn for_current_platform() -> Self {
        if cfg!(any(target_os = "ios", target_os = "macos")) {
            Self::ShareSheet
        } else {
            Self::ViewIntent
        }
    }
}

/// Opens a downloaded file. Failures are reported, never swallowed.
#[async_trait]
pub trait FileOpener: Debug + Send + Sync {
    /// Opens `path`.
    ///
    /// # Errors
    ///
    /// [`DownloadError::ViewerUnavailable`] when no handler accepts the file.
    async fn open(&self, path: &Path) -> Result<(), DownloadError>;
}

/// [`FileOpener`] backed by the operating system's default handlers.
#[derive(Debug, Clone, Copy)]
pub struct SystemOpener {
    strategy: OpenStrategy,
}

impl Default for SystemOpener {
    fn default() -> Self {
        Self::new(OpenStrategy::for_current_platform())
    }
}

impl SystemOpener {
    /// Opener using `strategy`.
    #[must_use]
    pub fn new(strategy: OpenStrategy) -> Self {
        Self { strategy }
    }

    /// Strategy in use.
    #[must_use]
    pub fn strategy(&self) -> OpenStrategy {
        self.strategy
    }
}

#[async_trait]
impl FileOpener for SystemOpener {
    #[instrument(skip(self), fields(strategy = ?self.strategy))]
    async fn open(&self, path: &Path) -> Result<(), DownloadError> {
        let target = match self.strategy {
            OpenStrategy::ViewIntent => Url::from_file_path(path)
                .map_err(|()| DownloadError::viewer_unavailable(path, "path is not absolute"))?
                .to_string(),
            OpenStrategy::ShareSheet => path
                .parent()
                .ok_or_else(|| DownloadError::viewer_unavailable(path, "file has no folder"))?
                .to_string_lossy()
                .into_owned(),
        };
        debug!(target = %target, "launching system handler");

        // Launching may block on process spawn.
        let launched = tokio::task::spawn_blocking(move || opener::open(&target))
            .await
            .map_err(|e| DownloadError::viewer_unavailable(path, e.to_string()))?;
        launched.map_err(|e| DownloadError::viewer_unavailable(path, e.to_string()))
    }
}
