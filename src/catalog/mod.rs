//! Paginated browsing of the catalog.
//!
//! [`ResourceFetcher`] turns a [`ResourceQuery`] and offset into one page of
//! [`ResourceSummary`] items. [`FetchSession`] accumulates pages for one
//! screen, replacing the result set on a new query and appending on
//! load-more, and drops responses that were superseded by a newer request.
//!
//! Pages are not deduplicated: offset pagination is trusted, and overlaps are
//! only counted ([`FetchState::overlap_count`]).
//!
//! # Example
//!
//! ```no_run
//! use offline_library_core::{LibraryConfig, OfflineLibrary};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let library = OfflineLibrary::new(LibraryConfig::default())?;
//! let mut session = library.session();
//! session.search("geometry").await;
//! while session.load_more().await.is_some() {}
//! println!("{} results", session.state().items().len());
//! # Ok(())
//! # }
//! ```

mod fetcher;
mod model;
mod query;
mod state;

pub use fetcher::ResourceFetcher;
pub use model::{Attachment, ResourceDetail, ResourceSummary};
pub use query::{Category, CategoryKind, QueryMode, ResourceQuery};
pub use state::{ApplyOutcome, FetchSession, FetchState, FetchTicket};
