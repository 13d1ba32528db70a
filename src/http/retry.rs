//! Retry policy for catalog requests.
//!
//! The catalog API throttles aggressively and answers 429 with a `Retry-After`
//! value far larger than the real cool-down, so the default policy waits a
//! fixed interval instead. Both the interval and whether to honor the header
//! are configurable.
//!
//! # Overview
//!
//! Every failed attempt is classified into a [`FailureType`]:
//! - [`FailureType::RateLimited`] - HTTP 429, retried after the rate-limit wait
//! - [`FailureType::Network`] - connection error or timeout, retried only when
//!   `network_retries > 0`, with exponential backoff and jitter
//! - [`FailureType::Terminal`] - any other status, never retried
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use offline_library_core::http::{FailureType, RetryDecision, RetryPolicy, RetryState};
//!
//! let policy = RetryPolicy::default().with_rate_limit_wait(Duration::from_secs(2));
//! let state = RetryState { attempt: 1, network_failures: 0 };
//!
//! match policy.should_retry(FailureType::RateLimited, state, None) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         assert_eq!(delay, Duration::from_secs(2));
//!         assert_eq!(attempt, 2);
//!     }
//!     RetryDecision::DoNotRetry { reason } => panic!("unexpected: {reason}"),
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument, warn};

/// Default maximum attempts, including the first request.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default wait after a 429 response.
pub const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(5);

/// Base delay for network-failure backoff.
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Cap for network-failure backoff.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Maximum jitter added to network-failure delays.
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Maximum Retry-After value honored (1 hour).
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// HTTP 429.
    RateLimited,
    /// Connection error or timeout.
    Network,
    /// Any other non-2xx status.
    Terminal,
}

/// Decision on whether to send another attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then send attempt number `attempt`.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// 1-indexed number of the next attempt.
        attempt: u32,
    },

    /// Stop and surface the error.
    DoNotRetry {
        /// Human-readable reason, logged at debug level.
        reason: String,
    },
}

/// Progress of one request through its retry loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    /// The attempt that just failed (1-indexed).
    pub attempt: u32,
    /// How many of the attempts so far failed at the network level.
    pub network_failures: u32,
}

/// Configuration for the retry loop.
///
/// # Default Values
///
/// - `max_attempts`: 5
/// - `rate_limit_wait`: 5 seconds
/// - `honor_retry_after`: false
/// - `network_retries`: 0
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    rate_limit_wait: Duration,
    honor_retry_after: bool,
    network_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            rate_limit_wait: DEFAULT_RATE_LIMIT_WAIT,
            honor_retry_after: false,
            network_retries: 0,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and 429 wait.
    ///
    /// `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, rate_limit_wait: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            rate_limit_wait,
            ..Self::default()
        }
    }

    /// Creates a policy with a custom `max_attempts`, using defaults for other settings.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Replaces the attempt budget, keeping every other setting.
    #[must_use]
    pub fn limited_to(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Replaces the fixed wait applied after a 429.
    #[must_use]
    pub fn with_rate_limit_wait(mut self, wait: Duration) -> Self {
        self.rate_limit_wait = wait;
        self
    }

    /// Honors the server's `Retry-After` header instead of the fixed wait.
    #[must_use]
    pub fn with_retry_after(mut self, honor: bool) -> Self {
        self.honor_retry_after = honor;
        self
    }

    /// Allows up to `retries` extra attempts after connection failures.
    #[must_use]
    pub fn with_network_retries(mut self, retries: u32) -> Self {
        self.network_retries = retries;
        self
    }

    /// Overrides the exponential backoff bounds used for network failures.
    #[must_use]
    pub fn with_network_backoff(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    /// Returns the maximum number of attempts configured.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the fixed wait applied after a 429.
    #[must_use]
    pub fn rate_limit_wait(&self) -> Duration {
        self.rate_limit_wait
    }

    /// Returns how many network failures may be retried.
    #[must_use]
    pub fn network_retries(&self) -> u32 {
        self.network_retries
    }

    /// Decides whether another attempt should be sent.
    ///
    /// `retry_after` is the raw header from a 429 response, consulted only
    /// when the policy honors it.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(
        &self,
        failure_type: FailureType,
        state: RetryState,
        retry_after: Option<&str>,
    ) -> RetryDecision {
        let delay = match failure_type {
            FailureType::Terminal => {
                return RetryDecision::DoNotRetry {
                    reason: "terminal status - retry would not help".to_string(),
                };
            }
            FailureType::Network if state.network_failures > self.network_retries => {
                return RetryDecision::DoNotRetry {
                    reason: format!(
                        "network failure ({} of {} allowed retries used)",
                        state.network_failures.saturating_sub(1),
                        self.network_retries
                    ),
                };
            }
            FailureType::Network => self.network_delay(state.network_failures),
            FailureType::RateLimited => self.rate_limit_delay(retry_after),
        };

        if state.attempt >= self.max_attempts {
            debug!(attempt = state.attempt, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        debug!(
            attempt = state.attempt,
            next_attempt = state.attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: state.attempt + 1,
        }
    }

    /// Wait applied after a 429, honoring `Retry-After` when configured.
    #[must_use]
    pub fn rate_limit_delay(&self, retry_after: Option<&str>) -> Duration {
        if self.honor_retry_after
            && let Some(delay) = retry_after.and_then(parse_retry_after)
        {
            return delay;
        }
        self.rate_limit_wait
    }

    /// Exponential backoff for the n-th network failure (1-indexed), plus jitter.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn network_delay(&self, failures: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let exponent = f64::from(failures.saturating_sub(1));
        let delay_ms = (base_ms * 2f64.powf(exponent)).min(self.max_delay.as_millis() as f64);
        Duration::from_millis(delay_ms as u64) + jitter()
    }
}

#[allow(clippy::cast_possible_truncation)]
fn jitter() -> Duration {
    let mut rng = rand::thread_rng();
    Duration::from_millis(rng.gen_range(0..=MAX_JITTER.as_millis() as u64))
}

/// Classifies an HTTP status code for the retry loop.
#[must_use]
pub fn classify_status(status: u16) -> FailureType {
    if status == 429 {
        FailureType::RateLimited
    } else {
        FailureType::Terminal
    }
}

/// Parses a Retry-After header value into a Duration.
///
/// Supports integer seconds and HTTP-dates (RFC 7231). Returns `None` for
/// unparseable or negative values and caps results at 1 hour.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use offline_library_core::http::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
/// assert_eq!(parse_retry_after("soon"), None);
/// ```
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        let Ok(seconds) = u64::try_from(seconds) else {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        };
        return Some(cap_retry_after(Duration::from_secs(seconds)));
    }

    let Ok(datetime) = httpdate::parse_http_date(header_value) else {
        debug!(header_value, "unparseable Retry-After value");
        return None;
    };
    match datetime.duration_since(std::time::SystemTime::now()) {
        Ok(duration) => Some(cap_retry_after(duration)),
        Err(_) => Some(Duration::ZERO),
    }
}

fn cap_retry_after(duration: Duration) -> Duration {
    if duration > MAX_RETRY_AFTER {
        warn!(
            delay_secs = duration.as_secs(),
            "Retry-After exceeds maximum, capping at 1 hour"
        );
        MAX_RETRY_AFTER
    } else {
        duration
    }
}
