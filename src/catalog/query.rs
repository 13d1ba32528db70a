//! Listing filters: free-text search, category, or everything.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category dimension a listing can be filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    /// Subject area.
    Subject,
    /// Resource type (book, audio, ...).
    Type,
    /// Education level.
    Level,
}

impl CategoryKind {
    /// Query parameter name sent to the API.
    #[must_use]
    pub fn param(self) -> &'static str {
        match self {
            Self::Subject => "subject",
            Self::Type => "type",
            Self::Level => "level",
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.param())
    }
}

/// A category filter, e.g. `type = 1456`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Category {
    /// Which dimension.
    pub kind: CategoryKind,
    /// Category identifier as the API knows it.
    pub id: String,
}

impl Category {
    /// Creates a category filter.
    pub fn new(kind: CategoryKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

/// What a listing request asks for.
///
/// Search text wins over a category filter when both are set; whitespace-only
/// search text counts as no search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceQuery {
    search: Option<String>,
    category: Option<Category>,
}

impl ResourceQuery {
    /// Unfiltered listing.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Free-text search.
    pub fn search(text: impl Into<String>) -> Self {
        Self {
            search: Some(text.into()),
            category: None,
        }
    }

    /// Category listing.
    #[must_use]
    pub fn category_only(category: Category) -> Self {
        Self {
            search: None,
            category: Some(category),
        }
    }

    /// Replaces the category filter.
    #[must_use]
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Replaces the search text.
    #[must_use]
    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    /// Effective search text, trimmed; `None` when blank.
    #[must_use]
    pub fn search_text(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// The category filter, whether or not search overrides it.
    #[must_use]
    pub fn category(&self) -> Option<&Category> {
        self.category.as_ref()
    }

    /// The filter actually sent.
    #[must_use]
    pub fn mode(&self) -> QueryMode<'_> {
        match (self.search_text(), &self.category) {
            (Some(text), _) => QueryMode::Search(text),
            (None, Some(category)) => QueryMode::Category(category),
            (None, None) => QueryMode::All,
        }
    }
}

/// The single effective filter of a [`ResourceQuery`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode<'a> {
    /// Free-text search.
    Search(&'a str),
    /// Category listing.
    Category(&'a Category),
    /// Everything.
    All,
}
