//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use offline_library_core::{Category, CategoryKind, ResourceQuery};

/// Browse a digital-library catalog and keep resources for offline use.
#[derive(Parser, Debug)]
#[command(name = "offline-library")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Cache root holding `images/` and `downloads/`
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Catalog API root URL
    #[arg(long, value_name = "URL", global = true)]
    pub api_url: Option<String>,

    /// Catalog language
    #[arg(long, value_name = "LANG", global = true)]
    pub language: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Operations exposed by the core.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List or search catalog resources
    Browse(BrowseArgs),

    /// Show one resource's metadata and attachments as JSON
    Detail {
        /// Resource identifier
        id: String,
    },

    /// Cache a resource thumbnail and print its local path
    Thumbnail {
        /// Resource identifier
        id: String,
        /// Remote image URL
        url: String,
    },

    /// Download an attachment for offline use
    Download {
        /// Attachment identifier
        id: String,
        /// Display title stored with the download
        #[arg(long, default_value = "")]
        title: String,
    },

    /// List downloaded files, newest first
    List {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Delete a downloaded file and its metadata
    Delete {
        /// File name as shown by `list`
        file_name: String,
    },

    /// Open a downloaded file with the system viewer
    Open {
        /// File name as shown by `list`
        file_name: String,
    },
}

/// Filters for `browse`. Search text wins over a category.
#[derive(clap::Args, Debug)]
#[command(group(
    clap::ArgGroup::new("category")
        .args(["subject", "type_id", "level"])
        .multiple(false)
))]
pub struct BrowseArgs {
    /// Free-text search
    #[arg(short, long)]
    pub search: Option<String>,

    /// Filter by subject id
    #[arg(long, value_name = "ID")]
    pub subject: Option<String>,

    /// Filter by resource type id
    #[arg(long = "type", value_name = "ID")]
    pub type_id: Option<String>,

    /// Filter by education level id
    #[arg(long, value_name = "ID")]
    pub level: Option<String>,

    /// Offset of the first page
    #[arg(long, default_value_t = 0)]
    pub offset: u32,

    /// Number of pages to load (1-100)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub pages: u32,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

impl BrowseArgs {
    /// The query these flags describe.
    pub fn query(&self) -> ResourceQuery {
        let category = [
            (CategoryKind::Subject, &self.subject),
            (CategoryKind::Type, &self.type_id),
            (CategoryKind::Level, &self.level),
        ]
        .into_iter()
        .find_map(|(kind, id)| id.as_ref().map(|id| Category::new(kind, id.clone())));

        let query = match category {
            Some(category) => ResourceQuery::category_only(category),
            None => ResourceQuery::all(),
        };
        match &self.search {
            Some(text) => query.with_search(text.clone()),
            None => query,
        }
    }
}
