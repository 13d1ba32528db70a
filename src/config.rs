//! Library configuration and the remote endpoint layout.
//!
//! [`LibraryConfig`] is the one place where the API location, language,
//! cache root, and retry knobs live. It is passed explicitly to
//! [`OfflineLibrary`](crate::OfflineLibrary); nothing in the crate reads
//! ambient globals.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::catalog::ResourceQuery;
use crate::http::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_ATTEMPTS, DEFAULT_RATE_LIMIT_WAIT,
    DEFAULT_REQUEST_TIMEOUT, HttpTimeouts, RetryPolicy,
};
use crate::store::CacheStore;

/// Default catalog API root.
pub const DEFAULT_API_BASE_URL: &str = "https://library.darakhtdanesh.org/";

/// Default catalog language segment.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Items per listing page.
pub const DEFAULT_PAGE_SIZE: u32 = 32;

/// Directory name under the platform cache dir.
const CACHE_DIR_NAME: &str = "offline-library";

/// Errors from [`LibraryConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The API base URL does not parse or cannot carry path segments.
    #[error("invalid API base URL {url:?}")]
    InvalidBaseUrl {
        /// The rejected URL.
        url: String,
    },

    /// A numeric or duration field is zero.
    #[error("`{field}` must be greater than zero")]
    Zero {
        /// Name of the offending field.
        field: &'static str,
    },

    /// The language segment is empty or not a single path segment.
    #[error("invalid language {language:?}")]
    InvalidLanguage {
        /// The rejected language.
        language: String,
    },
}

/// Settings for an [`OfflineLibrary`](crate::OfflineLibrary).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryConfig {
    /// Root of the catalog API, e.g. `https://library.example.org/`.
    pub api_base_url: String,
    /// Language segment of listing URLs.
    pub language: String,
    /// Parent of the `images` and `downloads` cache directories.
    pub cache_root: PathBuf,
    /// Items per listing page; the offset advances by this much on load-more.
    pub page_size: u32,
    /// Total attempts per request when the server keeps answering 429.
    pub max_attempts: u32,
    /// Wait between 429 retries.
    pub rate_limit_wait: Duration,
    /// Use the server's `Retry-After` instead of `rate_limit_wait` when present.
    pub honor_retry_after: bool,
    /// Retries granted to connection failures and timeouts (0 = fail fast).
    pub network_retries: u32,
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Wall-clock bound for a single request attempt.
    pub request_timeout: Duration,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            cache_root: default_cache_root(),
            page_size: DEFAULT_PAGE_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            rate_limit_wait: DEFAULT_RATE_LIMIT_WAIT,
            honor_retry_after: false,
            network_retries: 0,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl LibraryConfig {
    /// Default configuration rooted at `cache_root`.
    pub fn with_cache_root(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            ..Self::default()
        }
    }

    /// Checks that every field is usable.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ApiEndpoints::new(&self.api_base_url, &self.language)?;
        if self.page_size == 0 {
            return Err(ConfigError::Zero { field: "page_size" });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Zero {
                field: "max_attempts",
            });
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Zero {
                field: "connect_timeout",
            });
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::Zero {
                field: "request_timeout",
            });
        }
        Ok(())
    }

    /// Retry policy described by this configuration.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.rate_limit_wait)
            .with_retry_after(self.honor_retry_after)
            .with_network_retries(self.network_retries)
    }

    /// Request timeouts described by this configuration.
    #[must_use]
    pub fn timeouts(&self) -> HttpTimeouts {
        HttpTimeouts {
            connect: self.connect_timeout,
            request: self.request_timeout,
        }
    }

    /// Endpoint builder for this configuration.
    ///
    /// # Errors
    ///
    /// Same as [`ApiEndpoints::new`].
    pub fn endpoints(&self) -> Result<ApiEndpoints, ConfigError> {
        ApiEndpoints::new(&self.api_base_url, &self.language)
    }

    /// Cache store rooted at `cache_root`.
    #[must_use]
    pub fn store(&self) -> CacheStore {
        CacheStore::new(&self.cache_root)
    }
}

/// Platform cache directory joined with the crate's directory name.
///
/// Falls back to the system temp directory on platforms without a cache dir.
#[must_use]
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME)
}

/// Builds request URLs for the catalog API.
///
/// ```
/// use offline_library_core::{ApiEndpoints, ResourceQuery};
///
/// let api = ApiEndpoints::new("https://library.example.org/", "en").unwrap();
/// assert_eq!(
///     api.resources_url(&ResourceQuery::search("cat"), 32),
///     "https://library.example.org/api/resources/en/32?search=cat"
/// );
/// assert_eq!(
///     api.file_url("991"),
///     "https://library.example.org/api/resource/getFile/991"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    base: Url,
    language: String,
}

impl ApiEndpoints {
    /// Creates an endpoint builder. A missing trailing slash on `base_url` is added.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidBaseUrl`] if `base_url` is not an absolute
    /// http(s) URL; [`ConfigError::InvalidLanguage`] if `language` is empty
    /// or contains a path separator.
    pub fn new(base_url: &str, language: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidBaseUrl {
            url: base_url.to_string(),
        };
        let mut base = Url::parse(base_url).map_err(|_| invalid())?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(invalid());
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.set_query(None);
        base.set_fragment(None);

        let language = language.trim();
        if language.is_empty() || language.contains(['/', '\\', '?', '#']) {
            return Err(ConfigError::InvalidLanguage {
                language: language.to_string(),
            });
        }

        Ok(Self {
            base,
            language: language.to_string(),
        })
    }

    /// Listing/search URL for `query` at `offset`.
    ///
    /// Search text takes precedence over a category filter; the two never
    /// appear together.
    #[must_use]
    pub fn resources_url(&self, query: &ResourceQuery, offset: u32) -> String {
        let mut url = self.join(&format!(
            "api/resources/{}/{offset}",
            urlencoding::encode(&self.language)
        ));
        if let Some(search) = query.search_text() {
            url.query_pairs_mut().append_pair("search", search);
        } else if let Some(category) = query.category() {
            url.query_pairs_mut()
                .append_pair(category.kind.param(), &category.id);
        }
        url.into()
    }

    /// Single-resource detail URL.
    #[must_use]
    pub fn detail_url(&self, resource_id: &str) -> String {
        self.join(&format!(
            "api/resource_attributes/{}",
            urlencoding::encode(resource_id)
        ))
        .into()
    }

    /// Attachment download URL.
    #[must_use]
    pub fn file_url(&self, attachment_id: &str) -> String {
        self.join(&format!(
            "api/resource/getFile/{}",
            urlencoding::encode(attachment_id)
        ))
        .into()
    }

    fn join(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let joined = format!("{}{path}", self.base.path());
        url.set_path(&joined);
        url
    }
}

/// Resolved cache directory paths, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePaths {
    /// Thumbnail directory.
    pub images: PathBuf,
    /// Download directory.
    pub downloads: PathBuf,
}

impl CachePaths {
    /// Paths under `root`.
    #[must_use]
    pub fn under(root: &Path) -> Self {
        let store = CacheStore::new(root);
        Self {
            images: store
                .dir(crate::store::CacheKind::Images)
                .path()
                .to_path_buf(),
            downloads: store
                .dir(crate::store::CacheKind::Downloads)
                .path()
                .to_path_buf(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::catalog::{Category, CategoryKind};
    use proptest::prelude::*;

    fn api() -> ApiEndpoints {
        ApiEndpoints::new("https://library.example.org/", "en").unwrap()
    }

    #[test]
    fn test_defaults_match_catalog_behaviour() {
        let config = LibraryConfig::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert_eq!(config.language, "en");
        assert_eq!(config.page_size, 32);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.rate_limit_wait, Duration::from_secs(5));
        assert!(!config.honor_retry_after);
        assert_eq!(config.network_retries, 0);
        assert!(config.cache_root.ends_with("offline-library"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_fields() {
        let mut config = LibraryConfig::with_cache_root("/tmp/x");
        config.page_size = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero { field: "page_size" })
        );

        let mut config = LibraryConfig::with_cache_root("/tmp/x");
        config.max_attempts = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "max_attempts"
            })
        );

        let mut config = LibraryConfig::with_cache_root("/tmp/x");
        config.request_timeout = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::Zero { .. })));
    }

    #[test]
    fn test_validate_rejects_bad_url_and_language() {
        let mut config = LibraryConfig::with_cache_root("/tmp/x");
        config.api_base_url = "not a url".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));

        let mut config = LibraryConfig::with_cache_root("/tmp/x");
        config.api_base_url = "ftp://library.example.org/".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBaseUrl { .. })
        ));

        let mut config = LibraryConfig::with_cache_root("/tmp/x");
        config.language = "  ".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLanguage { .. })
        ));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let mut config = LibraryConfig::with_cache_root("/tmp/x");
        config.max_attempts = 3;
        config.rate_limit_wait = Duration::from_millis(250);
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.rate_limit_wait(), Duration::from_millis(250));
    }

    #[test]
    fn test_unfiltered_listing_url() {
        assert_eq!(
            api().resources_url(&ResourceQuery::all(), 0),
            "https://library.example.org/api/resources/en/0"
        );
    }

    #[test]
    fn test_search_url_is_encoded() {
        assert_eq!(
            api().resources_url(&ResourceQuery::search("math & art"), 64),
            "https://library.example.org/api/resources/en/64?search=math+%26+art"
        );
    }

    #[test]
    fn test_category_url_omits_search() {
        let query = ResourceQuery::search("").with_category(Category::new(CategoryKind::Type, "1456"));
        assert_eq!(
            api().resources_url(&query, 0),
            "https://library.example.org/api/resources/en/0?type=1456"
        );
    }

    #[test]
    fn test_search_takes_precedence_over_category() {
        let query = ResourceQuery::search("cat").with_category(Category::new(CategoryKind::Subject, "7"));
        let url = api().resources_url(&query, 0);
        assert!(url.ends_with("?search=cat"), "got {url}");
    }

    #[test]
    fn test_base_url_without_trailing_slash_and_subpath() {
        let api = ApiEndpoints::new("https://example.org/library", "fa").unwrap();
        assert_eq!(
            api.detail_url("12"),
            "https://example.org/library/api/resource_attributes/12"
        );
    }

    #[test]
    fn test_ids_are_percent_encoded_into_one_segment() {
        assert_eq!(
            api().file_url("a/b"),
            "https://library.example.org/api/resource/getFile/a%2Fb"
        );
    }

    #[test]
    fn test_cache_paths_under_root() {
        let paths = CachePaths::under(Path::new("/cache"));
        assert_eq!(paths.images, PathBuf::from("/cache/images"));
        assert_eq!(paths.downloads, PathBuf::from("/cache/downloads"));
    }

    proptest! {
        #[test]
        fn prop_listing_url_stays_under_base(offset in 0u32..1_000_000, text in "\\PC{0,24}") {
            let url = api().resources_url(&ResourceQuery::search(text), offset);
            let prefix = format!("https://library.example.org/api/resources/en/{offset}");
            prop_assert!(url.starts_with(&prefix));
            let parsed = Url::parse(&url).unwrap();
            prop_assert!(parsed.query_pairs().count() <= 1);
        }

        #[test]
        fn prop_search_text_round_trips_through_query(text in "[a-zA-Z0-9 &=?#/]{1,24}") {
            prop_assume!(!text.trim().is_empty());
            let url = api().resources_url(&ResourceQuery::search(text.clone()), 0);
            let parsed = Url::parse(&url).unwrap();
            let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
            prop_assert_eq!(pairs, vec![("search".to_string(), text.trim().to_string())]);
        }
    }
}
