//! Resilient HTTP client for the catalog API.
//!
//! [`ApiClient`] sends one GET at a time and owns the retry loop: 429 responses
//! are retried after the policy's wait (published through an optional
//! [`WaitCountdown`]), any other non-2xx status fails immediately, and network
//! failures fail immediately unless the policy grants network retries.

use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument, warn};
use url::Url;

use super::countdown::{WaitCountdown, backoff};
use super::error::FetchError;
use super::retry::{FailureType, RetryDecision, RetryPolicy, RetryState, classify_status};
use crate::user_agent;

/// Default connect timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default per-request timeout (60 seconds).
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeouts applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpTimeouts {
    /// TCP/TLS connect timeout.
    pub connect: Duration,
    /// Wall-clock bound for a single attempt, body included.
    pub request: Duration,
}

impl Default for HttpTimeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            request: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// HTTP client with bounded retry on rate limiting.
///
/// Designed to be created once and cloned into every component; clones share
/// the underlying connection pool.
///
/// # Example
///
/// ```no_run
/// use offline_library_core::http::{ApiClient, HttpTimeouts, RetryPolicy};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ApiClient::new(RetryPolicy::default(), HttpTimeouts::default())?;
/// let items: Vec<serde_json::Value> = client
///     .fetch_json("https://library.example.org/api/resources/en/0", None)
///     .await?;
/// println!("{} items", items.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    policy: RetryPolicy,
}

impl ApiClient {
    /// Creates a client with the given retry policy and timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the TLS backend cannot be initialized.
    pub fn new(policy: RetryPolicy, timeouts: HttpTimeouts) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.request)
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|source| FetchError::ClientBuild { source })?;
        Ok(Self { client, policy })
    }

    /// Returns a clone of this client that retries under `policy` instead.
    ///
    /// The connection pool is shared with the original.
    #[must_use]
    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            client: self.client.clone(),
            policy,
        }
    }

    /// Returns the retry policy this client applies.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends a GET and returns the first successful response.
    ///
    /// The body is left unread so callers can stream it.
    ///
    /// # Errors
    ///
    /// - [`FetchError::InvalidUrl`] if `url` does not parse
    /// - [`FetchError::RateLimited`] after `max_attempts` consecutive 429s
    /// - [`FetchError::HttpStatus`] on any other non-2xx status
    /// - [`FetchError::Network`] / [`FetchError::Timeout`] on transport failure
    #[instrument(skip(self, countdown), fields(url = %url))]
    pub async fn get(
        &self,
        url: &str,
        countdown: Option<&WaitCountdown>,
    ) -> Result<Response, FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::invalid_url(url))?;
        let mut state = RetryState::default();

        loop {
            state.attempt += 1;
            debug!(attempt = state.attempt, "sending request");

            let (failure_type, retry_after, error) =
                match self.client.get(parsed.clone()).send().await {
                    Ok(response) if response.status().is_success() => {
                        debug!(attempt = state.attempt, status = %response.status(), "request succeeded");
                        return Ok(response);
                    }
                    Ok(response) => {
                        let status = response.status();
                        if status != StatusCode::TOO_MANY_REQUESTS {
                            debug!(status = status.as_u16(), "terminal status");
                            return Err(FetchError::http_status(url, status.as_u16()));
                        }
                        let retry_after = response
                            .headers()
                            .get(RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        (
                            classify_status(status.as_u16()),
                            retry_after,
                            FetchError::rate_limited(url, state.attempt),
                        )
                    }
                    Err(source) => {
                        state.network_failures += 1;
                        (FailureType::Network, None, FetchError::network(url, source))
                    }
                };

            match self
                .policy
                .should_retry(failure_type, state, retry_after.as_deref())
            {
                RetryDecision::Retry { delay, attempt } => {
                    warn!(
                        next_attempt = attempt,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "request failed, retrying"
                    );
                    backoff(delay, countdown).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    if failure_type == FailureType::RateLimited {
                        // An exhausted 429 still waits out its interval before failing.
                        backoff(self.policy.rate_limit_delay(retry_after.as_deref()), countdown)
                            .await;
                    }
                    debug!(reason, "giving up");
                    return Err(error);
                }
            }
        }
    }

    /// Fetches JSON under an explicit attempt budget instead of the policy's.
    ///
    /// # Errors
    ///
    /// Same as [`fetch_json`](Self::fetch_json).
    pub async fn fetch_with_retry<T: DeserializeOwned>(
        &self,
        url: &str,
        max_attempts: u32,
        countdown: Option<&WaitCountdown>,
    ) -> Result<T, FetchError> {
        self.with_policy(self.policy.clone().limited_to(max_attempts))
            .fetch_json(url, countdown)
            .await
    }

    /// Fetches and decodes a JSON body (array or object) into `T`.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`get`](Self::get), plus [`FetchError::Decode`]
    /// when the body is not valid JSON for `T`.
    #[instrument(skip(self, countdown), fields(url = %url))]
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        countdown: Option<&WaitCountdown>,
    ) -> Result<T, FetchError> {
        let bytes = self.fetch_bytes(url, countdown).await?;
        serde_json::from_slice(&bytes).map_err(|source| FetchError::decode(url, source))
    }

    /// Fetches a raw binary body.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`get`](Self::get); a body that fails mid-read is
    /// a network error.
    #[instrument(skip(self, countdown), fields(url = %url))]
    pub async fn fetch_bytes(
        &self,
        url: &str,
        countdown: Option<&WaitCountdown>,
    ) -> Result<Vec<u8>, FetchError> {
        let response = self.get(url, countdown).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|source| FetchError::network(url, source))?;
        Ok(bytes.to_vec())
    }
}

/// Streams a successful response body into `writer`, returning bytes written.
///
/// Network errors while reading the body are reported as [`StreamError::Fetch`];
/// write failures as [`StreamError::Write`] so the caller can attach its path.
pub(crate) async fn stream_body<W>(
    response: Response,
    url: &str,
    writer: &mut W,
) -> Result<u64, StreamError>
where
    W: AsyncWrite + Unpin,
{
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| StreamError::Fetch(FetchError::network(url, e)))?;
        writer.write_all(&chunk).await.map_err(StreamError::Write)?;
        bytes_written += chunk.len() as u64;
    }
    writer.flush().await.map_err(StreamError::Write)?;

    debug!(url, bytes = bytes_written, "body streamed");
    Ok(bytes_written)
}

/// Failure while streaming a body to disk.
#[derive(Debug)]
pub(crate) enum StreamError {
    Fetch(FetchError),
    Write(std::io::Error),
}
