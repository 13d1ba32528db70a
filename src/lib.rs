//! Offline Library Core
//!
//! The offline cache and resilient-fetch core of a digital-library reader:
//! paginated browsing of a rate-limited catalog API, a thumbnail cache, and a
//! download directory of attachments with JSON sidecars.
//!
//! # Architecture
//!
//! Leaves first:
//! - [`http`] - GET with bounded retry on 429 and an observable wait countdown
//! - [`catalog`] - query URLs, page fetching, and fenced result accumulation
//! - [`store`] - cache directories with scoped names and atomic writes
//! - [`thumbnail`] - download-on-miss image cache keyed by resource id
//! - [`downloads`] - attachment payloads plus sidecars: download, list, delete, open
//!
//! [`OfflineLibrary`] builds all of them from one [`LibraryConfig`]; there is
//! no global state.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod catalog;
pub mod config;
pub mod downloads;
pub mod error;
pub mod http;
pub mod library;
pub mod locks;
pub mod store;
pub mod thumbnail;

mod transfer;
mod user_agent;

// Re-export commonly used types
pub use catalog::{
    ApplyOutcome, Attachment, Category, CategoryKind, FetchSession, FetchState, FetchTicket,
    QueryMode, ResourceDetail, ResourceFetcher, ResourceQuery, ResourceSummary,
};
pub use config::{
    ApiEndpoints, CachePaths, ConfigError, DEFAULT_API_BASE_URL, DEFAULT_LANGUAGE,
    DEFAULT_PAGE_SIZE, LibraryConfig, default_cache_root,
};
pub use downloads::{
    DownloadError, DownloadManager, DownloadOutcome, DownloadSidecar, DownloadedFile, FileOpener,
    OpenStrategy, SystemOpener,
};
pub use error::ErrorKind;
pub use http::{ApiClient, FetchError, HttpTimeouts, RetryPolicy, WaitCountdown};
pub use library::{LibraryError, OfflineLibrary};
pub use locks::{KeyGuard, KeyedLocks};
pub use store::{CacheDir, CacheKind, CacheStore, StoreEntry, StoreError};
pub use thumbnail::{ThumbnailCache, ThumbnailError};
