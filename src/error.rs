//! Cross-module error taxonomy.
//!
//! Each module owns a `thiserror` enum with context-rich variants. Callers that
//! only need to pick a user-facing reaction (retry affordance, "storage full",
//! "no viewer installed") branch on [`ErrorKind`] instead of matching every
//! module's variants.

use std::fmt;

/// Coarse classification shared by every error type in the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The server kept answering 429 until the retry budget ran out.
    RateLimited,
    /// A non-2xx, non-429 HTTP status.
    Http,
    /// Connection failure, timeout, or a body that could not be read/decoded.
    Network,
    /// Local filesystem failure (directory creation, write, rename, delete).
    Storage,
    /// No platform handler could open a downloaded file.
    ViewerUnavailable,
    /// Caller supplied an unusable identifier, name, or URL.
    Invalid,
}

impl ErrorKind {
    /// Returns a stable lowercase label for logs and CLI output.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Http => "http",
            Self::Network => "network",
            Self::Storage => "storage",
            Self::ViewerUnavailable => "viewer_unavailable",
            Self::Invalid => "invalid",
        }
    }

    /// Whether showing a "try again" affordance makes sense for this kind.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::RateLimited | Self::Http | Self::Network)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
