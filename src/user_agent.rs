//! User-Agent string sent with every catalog request.

/// Project URL for User-Agent identification (RFC 9308).
const PROJECT_UA_URL: &str = "https://github.com/darakhtdanesh/offline-library";

/// Default User-Agent for catalog, thumbnail, and attachment requests.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("offline-library/{version} (library-reader; +{PROJECT_UA_URL})")
}
