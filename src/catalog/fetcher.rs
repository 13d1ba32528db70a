//! Page and detail requests against the catalog API.

use tracing::{debug, instrument};

use super::model::{ResourceDetail, ResourceSummary};
use super::query::ResourceQuery;
use crate::config::ApiEndpoints;
use crate::http::{ApiClient, FetchError, WaitCountdown};

/// Fetches listing pages and resource details.
///
/// Stateless apart from its configuration; accumulation of pages lives in
/// [`FetchSession`](super::FetchSession).
#[derive(Debug, Clone)]
pub struct ResourceFetcher {
    client: ApiClient,
    endpoints: ApiEndpoints,
    page_size: u32,
}

impl ResourceFetcher {
    /// Creates a fetcher. `page_size` is how far the offset advances per page.
    #[must_use]
    pub fn new(client: ApiClient, endpoints: ApiEndpoints, page_size: u32) -> Self {
        Self {
            client,
            endpoints,
            page_size,
        }
    }

    /// Items per page.
    #[must_use]
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Endpoint builder in use.
    #[must_use]
    pub fn endpoints(&self) -> &ApiEndpoints {
        &self.endpoints
    }

    /// Fetches one page of `query` starting at `offset`.
    ///
    /// An empty page is a successful, empty result.
    ///
    /// # Errors
    ///
    /// Any [`FetchError`] from the client, including a decode error when the
    /// body is not a JSON array of resources.
    #[instrument(skip(self, countdown), fields(offset))]
    pub async fn fetch_page(
        &self,
        query: &ResourceQuery,
        offset: u32,
        countdown: Option<&WaitCountdown>,
    ) -> Result<Vec<ResourceSummary>, FetchError> {
        let url = self.endpoints.resources_url(query, offset);
        let items: Vec<ResourceSummary> = self.client.fetch_json(&url, countdown).await?;
        debug!(count = items.len(), "page fetched");
        Ok(items)
    }

    /// Fetches the detail object of one resource.
    ///
    /// # Errors
    ///
    /// Any [`FetchError`] from the client.
    #[instrument(skip(self, countdown))]
    pub async fn fetch_detail(
        &self,
        resource_id: &str,
        countdown: Option<&WaitCountdown>,
    ) -> Result<ResourceDetail, FetchError> {
        let url = self.endpoints.detail_url(resource_id);
        self.client.fetch_json(&url, countdown).await
    }
}
