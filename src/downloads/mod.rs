//! Downloaded attachments kept for offline use.
//!
//! Layout of `<cache_root>/downloads`:
//!
//! - `<attachmentId>.<ext>`: the payload
//! - `<attachmentId>.json`: its [`DownloadSidecar`]
//!
//! Payload and sidecar appear together or not at all, as far as
//! [`DownloadManager::list`] is concerned: the payload is committed before
//! the sidecar, a failed sidecar write removes the payload again, a payload
//! whose sidecar is missing is still listed (flagged `metadata_missing`), and
//! a sidecar whose payload is missing is never listed.
//!
//! # Example
//!
//! ```no_run
//! use offline_library_core::{LibraryConfig, OfflineLibrary};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let library = OfflineLibrary::new(LibraryConfig::default())?;
//! let outcome = library.downloads().download("991", "Geometry").await?;
//! println!("{} ({} bytes)", outcome.file.path.display(), outcome.file.size);
//!
//! for file in library.downloads().list().await? {
//!     println!("{} {}", file.downloaded_at, file.title);
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod filename;
mod manager;
mod opener;
mod record;
mod sidecar;

pub use error::DownloadError;
pub use manager::{DownloadManager, DownloadOutcome};
pub use opener::{FileOpener, OpenStrategy, SystemOpener};
pub use record::DownloadedFile;
pub use sidecar::DownloadSidecar;
