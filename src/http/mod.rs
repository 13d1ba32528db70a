//! Resilient HTTP access to the catalog API.
//!
//! # Features
//!
//! - Bounded retry on HTTP 429 with a configurable fixed wait
//! - Optional `Retry-After` support and optional network-failure retries
//! - Observable backoff countdown ([`WaitCountdown`])
//! - JSON, raw-bytes, and streaming response shapes
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use offline_library_core::http::{ApiClient, HttpTimeouts, RetryPolicy, WaitCountdown};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let policy = RetryPolicy::new(5, Duration::from_secs(5));
//! let client = ApiClient::new(policy, HttpTimeouts::default())?;
//! let countdown = WaitCountdown::new();
//! let mut waits = countdown.subscribe();
//! tokio::spawn(async move {
//!     while waits.changed().await.is_ok() {
//!         println!("retrying in {}s", waits.borrow().as_secs());
//!     }
//! });
//! let detail: serde_json::Value = client
//!     .fetch_json("https://library.example.org/api/resource_attributes/42", Some(&countdown))
//!     .await?;
//! println!("{detail}");
//! # Ok(())
//! # }
//! ```

mod client;
mod countdown;
mod error;
mod retry;

pub use client::{ApiClient, DEFAULT_CONNECT_TIMEOUT, DEFAULT_REQUEST_TIMEOUT, HttpTimeouts};
pub(crate) use client::{StreamError, stream_body};
pub use countdown::WaitCountdown;
pub use error::FetchError;
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RATE_LIMIT_WAIT, FailureType, RetryDecision, RetryPolicy,
    RetryState, classify_status, parse_retry_after,
};
