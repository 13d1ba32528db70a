//! Error types for the local cache store.

use std::path::PathBuf;

use thiserror::Error;

use crate::error::ErrorKind;

/// Errors produced by cache-directory operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File system error (create directory, write, rename, delete, list).
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The entry name is not a single plain path segment inside the cache root.
    #[error("invalid cache entry name {name:?}")]
    InvalidName {
        /// The rejected name.
        name: String,
    },
}

impl StoreError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid-name error.
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName { name: name.into() }
    }

    /// Maps this error onto the crate-wide taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Storage,
            Self::InvalidName { .. } => ErrorKind::Invalid,
        }
    }
}
