//! Per-key async mutual exclusion.
//!
//! [`KeyedLocks`] serialises work on the same key (an attachment or resource
//! id) while letting different keys proceed in parallel. Entries exist only
//! while someone holds or waits for the key.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::trace;

/// Table of per-key locks. Clones share the table.
///
/// ```
/// use offline_library_core::KeyedLocks;
///
/// # async fn example() {
/// let locks = KeyedLocks::new();
/// let guard = locks.lock("991").await;
/// assert!(locks.is_locked("991"));
/// drop(guard);
/// assert!(!locks.is_locked("991"));
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyedLocks {
    /// `Arc` per entry so the shard lock is released before awaiting the mutex.
    entries: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until `key` is free and returns a guard holding it.
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let mutex = Arc::clone(
            self.entries
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        let guard = mutex.lock_owned().await;
        trace!(key, "key locked");
        KeyGuard {
            entries: Arc::clone(&self.entries),
            key: key.to_string(),
            guard: Some(guard),
        }
    }

    /// Whether `key` is currently held or awaited.
    #[must_use]
    pub fn is_locked(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of keys with a holder or waiter.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no key is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Holds one key of a [`KeyedLocks`] table until dropped.
#[derive(Debug)]
pub struct KeyGuard {
    entries: Arc<DashMap<String, Arc<Mutex<()>>>>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyGuard {
    /// The locked key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Table reference is the last one: nobody holds or waits for the key.
        self.entries
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
        trace!(key = %self.key, "key released");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_idle_entries_are_dropped() {
        let locks = KeyedLocks::new();
        {
            let guard = locks.lock("a").await;
            assert_eq!(guard.key(), "a");
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_same_key_is_serialised() {
        let locks = KeyedLocks::new();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    let _guard = locks.lock("same").await;
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty());
    }

    #[test]
    fn test_second_holder_waits_until_release() {
        use tokio_test::{assert_pending, assert_ready, task};

        let locks = KeyedLocks::new();
        let mut first = task::spawn(locks.lock("k"));
        let first = assert_ready!(first.poll());

        let mut second = task::spawn(locks.lock("k"));
        assert_pending!(second.poll());

        drop(first);
        assert!(second.is_woken());
        let second = assert_ready!(second.poll());
        assert_eq!(second.key(), "k");
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.lock("a").await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock("b")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_waiter_keeps_entry_alive() {
        let locks = KeyedLocks::new();
        let first = locks.lock("k").await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock("k").await;
            })
        };
        tokio::task::yield_now().await;
        drop(first);
        assert!(locks.is_locked("k") || waiter.is_finished());
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }
}
