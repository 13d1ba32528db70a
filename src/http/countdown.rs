//! Observable backoff countdown.
//!
//! While the client sleeps after a 429 it publishes the remaining wait once per
//! second, so a screen can render "server busy, retrying in N seconds" instead
//! of looking frozen.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Granularity of countdown updates.
const TICK: Duration = Duration::from_secs(1);

/// Publishes the remaining backoff wait of an in-flight request.
///
/// Cloning is cheap; all clones publish to the same channel. The value is
/// [`Duration::ZERO`] whenever no wait is in progress.
#[derive(Debug, Clone)]
pub struct WaitCountdown {
    tx: Arc<watch::Sender<Duration>>,
}

impl Default for WaitCountdown {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitCountdown {
    /// Creates an idle countdown.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Duration::ZERO);
        Self { tx: Arc::new(tx) }
    }

    /// Subscribes to remaining-wait updates.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Duration> {
        self.tx.subscribe()
    }

    /// Current remaining wait.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        *self.tx.borrow()
    }

    /// Sleeps for `wait`, publishing the remaining time at each tick.
    pub(crate) async fn sleep(&self, wait: Duration) {
        let mut remaining = wait;
        while !remaining.is_zero() {
            self.tx.send_replace(remaining);
            let step = remaining.min(TICK);
            tokio::time::sleep(step).await;
            remaining = remaining.saturating_sub(step);
        }
        self.tx.send_replace(Duration::ZERO);
    }
}

/// Sleeps for `wait`, through `countdown` when one is attached.
pub(crate) async fn backoff(wait: Duration, countdown: Option<&WaitCountdown>) {
    match countdown {
        Some(countdown) => countdown.sleep(wait).await,
        None => tokio::time::sleep(wait).await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_countdown_publishes_each_second_then_zero() {
        let countdown = WaitCountdown::new();
        let mut rx = countdown.subscribe();

        let sleeper = countdown.clone();
        let task = tokio::spawn(async move { sleeper.sleep(Duration::from_secs(3)).await });

        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let value = *rx.borrow_and_update();
            seen.push(value);
            if value.is_zero() {
                break;
            }
        }
        task.await.unwrap();

        assert_eq!(
            seen,
            vec![
                Duration::from_secs(3),
                Duration::from_secs(2),
                Duration::from_secs(1),
                Duration::ZERO
            ]
        );
        assert_eq!(countdown.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_handles_sub_second_remainder() {
        let countdown = WaitCountdown::new();
        let started = tokio::time::Instant::now();
        countdown.sleep(Duration::from_millis(1500)).await;
        assert!(started.elapsed() >= Duration::from_millis(1500));
        assert!(countdown.remaining().is_zero());
    }

    #[tokio::test]
    async fn test_zero_wait_returns_immediately() {
        let countdown = WaitCountdown::new();
        countdown.sleep(Duration::ZERO).await;
        assert!(countdown.remaining().is_zero());
    }
}
