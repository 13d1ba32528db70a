//! Per-screen accumulation of result pages with stale-response fencing.
//!
//! Every request is tagged with a sequence number when it starts
//! ([`FetchSession::begin`]). A response is applied only if no newer request
//! has started since, so a slow response to an old query can never overwrite
//! the results of a newer one.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use super::fetcher::ResourceFetcher;
use super::model::ResourceSummary;
use super::query::{Category, ResourceQuery};
use crate::http::{FetchError, WaitCountdown};

/// Transient state of one browsing session.
#[derive(Debug, Default)]
pub struct FetchState {
    query: ResourceQuery,
    items: Vec<ResourceSummary>,
    offset: u32,
    last_page_len: Option<usize>,
    in_flight: bool,
    last_error: Option<FetchError>,
    failed: Option<FetchTicket>,
    overlap_count: usize,
    countdown: WaitCountdown,
}

impl FetchState {
    /// Accumulated results in arrival order.
    #[must_use]
    pub fn items(&self) -> &[ResourceSummary] {
        &self.items
    }

    /// Query the current results belong to.
    #[must_use]
    pub fn query(&self) -> &ResourceQuery {
        &self.query
    }

    /// Offset of the last applied page.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Whether a request is outstanding.
    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    /// Error of the most recent applied request, if it failed.
    #[must_use]
    pub fn last_error(&self) -> Option<&FetchError> {
        self.last_error.as_ref()
    }

    /// The request behind [`last_error`](Self::last_error), kept for
    /// [`FetchSession::retry`].
    #[must_use]
    pub fn failed_request(&self) -> Option<&FetchTicket> {
        self.failed.as_ref()
    }

    /// Query the user asked for last: a failed replace request's query,
    /// otherwise the query of the current results.
    #[must_use]
    pub fn requested_query(&self) -> &ResourceQuery {
        match &self.failed {
            Some(ticket) if !ticket.append => &ticket.query,
            _ => &self.query,
        }
    }

    /// Items that arrived on a later page with an id already present.
    ///
    /// Overlaps are kept in the result set; this only counts them.
    #[must_use]
    pub fn overlap_count(&self) -> usize {
        self.overlap_count
    }

    /// Remaining rate-limit wait of the outstanding request.
    #[must_use]
    pub fn remaining_wait(&self) -> Duration {
        self.countdown.remaining()
    }

    /// Countdown shared with the client while a request waits out a 429.
    #[must_use]
    pub fn countdown(&self) -> &WaitCountdown {
        &self.countdown
    }

    /// True when the last applied page was non-empty and nothing is in flight.
    #[must_use]
    pub fn can_load_more(&self) -> bool {
        !self.in_flight && self.last_error.is_none() && self.last_page_len.is_some_and(|n| n > 0)
    }
}

/// Handle for one started request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    sequence: u64,
    query: ResourceQuery,
    offset: u32,
    append: bool,
}

impl FetchTicket {
    /// Monotonic sequence number within the session.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Query to request.
    #[must_use]
    pub fn query(&self) -> &ResourceQuery {
        &self.query
    }

    /// Offset to request.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Whether the page extends (true) or replaces (false) the result set.
    #[must_use]
    pub fn append(&self) -> bool {
        self.append
    }

    /// Performs the request this ticket describes.
    ///
    /// # Errors
    ///
    /// Any [`FetchError`] of [`ResourceFetcher::fetch_page`].
    pub async fn run(
        &self,
        fetcher: &ResourceFetcher,
        countdown: Option<&WaitCountdown>,
    ) -> Result<Vec<ResourceSummary>, FetchError> {
        fetcher.fetch_page(&self.query, self.offset, countdown).await
    }
}

/// Result of [`FetchSession::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The response updated the state.
    Applied,
    /// A newer request had started; the response was dropped.
    Stale,
}

/// One browsing session: a fetcher plus the state it fills.
///
/// The `async` helpers run a request to completion while holding `&mut self`.
/// Callers that issue overlapping requests from separate tasks use
/// [`begin`](Self::begin), [`FetchTicket::run`] and [`apply`](Self::apply)
/// directly.
#[derive(Debug)]
pub struct FetchSession {
    fetcher: ResourceFetcher,
    state: FetchState,
    latest: u64,
}

impl FetchSession {
    /// Creates an empty session.
    #[must_use]
    pub fn new(fetcher: ResourceFetcher) -> Self {
        Self {
            fetcher,
            state: FetchState::default(),
            latest: 0,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> &FetchState {
        &self.state
    }

    /// The fetcher requests run against.
    #[must_use]
    pub fn fetcher(&self) -> &ResourceFetcher {
        &self.fetcher
    }

    /// Starts a request, superseding every request started before it.
    pub fn begin(&mut self, query: ResourceQuery, offset: u32, append: bool) -> FetchTicket {
        self.latest += 1;
        self.state.in_flight = true;
        debug!(sequence = self.latest, offset, append, "fetch started");
        FetchTicket {
            sequence: self.latest,
            query,
            offset,
            append,
        }
    }

    /// Applies the outcome of `ticket` if it is still the latest request.
    pub fn apply(
        &mut self,
        ticket: &FetchTicket,
        result: Result<Vec<ResourceSummary>, FetchError>,
    ) -> ApplyOutcome {
        if ticket.sequence != self.latest {
            warn!(
                sequence = ticket.sequence,
                latest = self.latest,
                "dropping stale response"
            );
            return ApplyOutcome::Stale;
        }

        let state = &mut self.state;
        state.in_flight = false;
        match result {
            Ok(page) => {
                state.last_page_len = Some(page.len());
                state.offset = ticket.offset;
                state.last_error = None;
                state.failed = None;
                if ticket.append && state.query == ticket.query {
                    let overlaps = count_overlaps(&state.items, &page);
                    if overlaps > 0 {
                        warn!(
                            overlaps,
                            offset = ticket.offset,
                            "page repeats items already loaded"
                        );
                        state.overlap_count += overlaps;
                    }
                    state.items.extend(page);
                } else {
                    state.query = ticket.query.clone();
                    state.items = page;
                    state.overlap_count = 0;
                }
            }
            Err(error) => {
                warn!(error = %error, offset = ticket.offset, "fetch failed");
                state.last_error = Some(error);
                state.failed = Some(ticket.clone());
            }
        }
        ApplyOutcome::Applied
    }

    /// Fetches a page and applies it: `append = false` replaces the result
    /// set, `append = true` extends it.
    #[instrument(skip(self, query))]
    pub async fn fetch_page(
        &mut self,
        query: ResourceQuery,
        offset: u32,
        append: bool,
    ) -> ApplyOutcome {
        let ticket = self.begin(query, offset, append);
        let countdown = self.state.countdown.clone();
        let result = ticket.run(&self.fetcher, Some(&countdown)).await;
        self.apply(&ticket, result)
    }

    /// Reloads the requested query from offset zero.
    ///
    /// After a failed search or filter this is the failed query, not the one
    /// the stale results belong to.
    pub async fn refresh(&mut self) -> ApplyOutcome {
        let query = self.state.requested_query().clone();
        self.fetch_page(query, 0, false).await
    }

    /// Re-issues the last failed request with its query, offset and mode.
    ///
    /// Returns `None` without a request when the last request succeeded.
    pub async fn retry(&mut self) -> Option<ApplyOutcome> {
        let failed = self.state.failed.clone()?;
        debug!(offset = failed.offset, append = failed.append, "retrying failed fetch");
        Some(self.fetch_page(failed.query, failed.offset, failed.append).await)
    }

    /// Starts a new free-text search, clearing any category filter.
    pub async fn search(&mut self, text: impl Into<String>) -> ApplyOutcome {
        self.fetch_page(ResourceQuery::search(text), 0, false).await
    }

    /// Starts a new category listing (or the unfiltered listing for `None`).
    pub async fn filter(&mut self, category: Option<Category>) -> ApplyOutcome {
        let query = category.map_or_else(ResourceQuery::all, ResourceQuery::category_only);
        self.fetch_page(query, 0, false).await
    }

    /// Fetches the next page of the current query.
    ///
    /// Returns `None` without a request unless the last page was non-empty.
    pub async fn load_more(&mut self) -> Option<ApplyOutcome> {
        if !self.state.can_load_more() {
            debug!("nothing more to load");
            return None;
        }
        let query = self.state.query.clone();
        let offset = self.state.offset + self.fetcher.page_size();
        Some(self.fetch_page(query, offset, true).await)
    }
}

fn count_overlaps(existing: &[ResourceSummary], page: &[ResourceSummary]) -> usize {
    let seen: HashSet<&str> = existing.iter().map(|item| item.id.as_str()).collect();
    page.iter().filter(|item| seen.contains(item.id.as_str())).count()
}
