//! Spinner shown while the server asks us to back off.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use offline_library_core::WaitCountdown;
use tokio::sync::watch;

const POLL_INTERVAL: Duration = Duration::from_millis(120);

/// Spawns the wait spinner when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `use_spinner` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_wait_ui(
    use_spinner: bool,
    countdown: &WaitCountdown,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>) {
    if !use_spinner {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_spinner_inner(countdown.subscribe(), Arc::clone(&stop));
    (Some(handle), stop)
}

/// Stops the spinner and waits for it to clear the line.
pub(crate) async fn stop_wait_ui(handle: Option<tokio::task::JoinHandle<()>>, stop: &AtomicBool) {
    stop.store(true, Ordering::SeqCst);
    if let Some(handle) = handle {
        let _ = handle.await;
    }
}

fn spawn_spinner_inner(
    mut rx: watch::Receiver<Duration>,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_message("Working...");

        while !stop.load(Ordering::SeqCst) {
            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let remaining = *rx.borrow_and_update();
                    spinner.set_message(wait_message(remaining));
                }
                () = tokio::time::sleep(POLL_INTERVAL) => {}
            }
        }

        spinner.finish_and_clear();
    })
}

/// Message for a remaining backoff wait.
pub(crate) fn wait_message(remaining: Duration) -> String {
    if remaining.is_zero() {
        return "Working...".to_string();
    }
    let secs = remaining.as_secs().max(1);
    let unit = if secs == 1 { "second" } else { "seconds" };
    format!("Server busy, retrying in {secs} {unit}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_message_idle() {
        assert_eq!(wait_message(Duration::ZERO), "Working...");
    }

    #[test]
    fn test_wait_message_counts_seconds() {
        assert_eq!(
            wait_message(Duration::from_secs(5)),
            "Server busy, retrying in 5 seconds..."
        );
        assert_eq!(
            wait_message(Duration::from_millis(300)),
            "Server busy, retrying in 1 second..."
        );
    }

    #[tokio::test]
    async fn spawn_wait_ui_when_disabled_returns_none_handle_and_stop_already_true() {
        let countdown = WaitCountdown::new();
        let (handle, stop) = spawn_wait_ui(false, &countdown);

        assert!(handle.is_none());
        assert!(
            stop.load(Ordering::SeqCst),
            "stop signal should be true when spinner disabled"
        );
    }

    #[tokio::test]
    async fn spawn_wait_ui_when_enabled_stops_on_signal() {
        let countdown = WaitCountdown::new();
        let (handle, stop) = spawn_wait_ui(true, &countdown);

        assert!(handle.is_some(), "handle should be Some when spinner enabled");
        assert!(!stop.load(Ordering::SeqCst), "stop should be false initially");

        stop_wait_ui(handle, &stop).await;
        assert!(stop.load(Ordering::SeqCst));
    }
}
