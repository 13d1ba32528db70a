//! Error types for the resilient HTTP client.

use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur while fetching from the catalog API.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The server answered 429 on every attempt.
    #[error("rate limited fetching {url}: gave up after {attempts} attempts")]
    RateLimited {
        /// The URL that kept being rate limited.
        url: String,
        /// How many requests were sent before giving up.
        attempts: u32,
    },

    /// Any non-2xx status other than 429.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Network-level error (DNS resolution, connection refused, reset mid-body, TLS).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// A 2xx body could not be decoded into the requested shape.
    #[error("failed to decode response from {url}: {source}")]
    Decode {
        /// The URL whose body was malformed.
        url: String,
        /// The JSON decoding error.
        #[source]
        source: serde_json::Error,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The underlying reqwest client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The builder error.
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Creates a rate-limit exhaustion error.
    pub fn rate_limited(url: impl Into<String>, attempts: u32) -> Self {
        Self::RateLimited {
            url: url.into(),
            attempts,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            url: url.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Maps this error onto the crate-wide taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::HttpStatus { .. } => ErrorKind::Http,
            Self::Network { .. } | Self::Timeout { .. } | Self::Decode { .. } => {
                ErrorKind::Network
            }
            Self::InvalidUrl { .. } | Self::ClientBuild { .. } => ErrorKind::Invalid,
        }
    }

    /// Returns the HTTP status carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_http_status_display() {
        let error = FetchError::http_status("https://example.com/api/resources/en/0", 503);
        let msg = error.to_string();
        assert!(msg.contains("503"), "Expected '503' in: {msg}");
        assert!(msg.contains("/api/resources/en/0"), "Expected URL in: {msg}");
        assert_eq!(error.kind(), ErrorKind::Http);
        assert_eq!(error.status(), Some(503));
    }

    #[test]
    fn test_fetch_error_rate_limited_display() {
        let error = FetchError::rate_limited("https://example.com/x", 5);
        let msg = error.to_string();
        assert!(msg.contains("rate limited"), "Expected 'rate limited' in: {msg}");
        assert!(msg.contains("5 attempts"), "Expected attempt count in: {msg}");
        assert_eq!(error.kind(), ErrorKind::RateLimited);
        assert_eq!(error.status(), Some(429));
    }

    #[test]
    fn test_fetch_error_timeout_is_network_kind() {
        let error = FetchError::timeout("https://example.com/slow");
        assert!(error.to_string().contains("timeout"));
        assert_eq!(error.kind(), ErrorKind::Network);
        assert_eq!(error.status(), None);
    }

    #[test]
    fn test_fetch_error_decode_is_network_kind() {
        let source = serde_json::from_str::<Vec<u32>>("{not json").unwrap_err();
        let error = FetchError::decode("https://example.com/api", source);
        assert!(error.to_string().contains("decode"));
        assert_eq!(error.kind(), ErrorKind::Network);
    }

    #[test]
    fn test_fetch_error_invalid_url_display() {
        let error = FetchError::invalid_url("not-a-url");
        let msg = error.to_string();
        assert!(msg.contains("invalid URL"), "Expected 'invalid URL' in: {msg}");
        assert!(msg.contains("not-a-url"));
        assert_eq!(error.kind(), ErrorKind::Invalid);
    }
}
