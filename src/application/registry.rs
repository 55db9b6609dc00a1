//! Dedup table owned by one sink instance.
//!
//! Maps each [`DedupKey`] to its [`RateLimitEntry`] and applies the window
//! policy under the storage's per-key lock.

use crate::application::ports::{Clock, Storage};
use crate::domain::dedup::{DedupKey, RateLimitEntry};
use crate::domain::policy::{PolicyDecision, WindowPolicy};
use std::sync::Arc;

/// Rate-limit state for every key the sink has seen.
///
/// Generic over the storage implementation. In production, use
/// `Arc<ShardedStorage>`.
#[derive(Clone)]
pub struct DedupRegistry<S>
where
    S: Storage<DedupKey, RateLimitEntry> + Clone,
{
    storage: S,
    clock: Arc<dyn Clock>,
    policy: WindowPolicy,
}

impl<S> DedupRegistry<S>
where
    S: Storage<DedupKey, RateLimitEntry> + Clone,
{
    /// Create a registry over storage, a clock and a window policy.
    pub fn new(storage: S, clock: Arc<dyn Clock>, policy: WindowPolicy) -> Self {
        Self {
            storage,
            clock,
            policy,
        }
    }

    /// Register one occurrence of `key` now.
    pub fn register(&self, key: DedupKey) -> PolicyDecision {
        let now = self.clock.now();
        let policy = self.policy;
        self.storage.with_entry_mut(
            key,
            || RateLimitEntry::new(now),
            |entry| policy.register(entry, now),
        )
    }

    /// Current state of `key`, if it has been seen.
    pub fn entry(&self, key: &DedupKey) -> Option<RateLimitEntry> {
        self.storage.get(key)
    }

    /// The window policy.
    pub fn policy(&self) -> WindowPolicy {
        self.policy
    }

    /// Get the number of tracked keys.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::MockClock;
    use crate::infrastructure::storage::ShardedStorage;
    use std::time::{Duration, Instant};

    fn registry(clock: &MockClock) -> DedupRegistry<Arc<ShardedStorage<DedupKey, RateLimitEntry>>> {
        DedupRegistry::new(
            Arc::new(ShardedStorage::new()),
            Arc::new(clock.clone()),
            WindowPolicy::new(2, Duration::from_secs(60)),
        )
    }

    #[test]
    fn test_register_creates_entry() {
        let clock = MockClock::new(Instant::now());
        let registry = registry(&clock);
        let key = DedupKey::new(500, "boom");

        assert!(registry.is_empty());
        assert!(registry.register(key.clone()).is_allow());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entry(&key).unwrap().count, 1);
    }

    #[test]
    fn test_keys_are_independent() {
        let clock = MockClock::new(Instant::now());
        let registry = registry(&clock);
        let a = DedupKey::new(500, "a");
        let b = DedupKey::new(500, "b");

        assert!(registry.register(a.clone()).is_allow());
        assert!(registry.register(a.clone()).is_allow());
        assert!(registry.register(a).is_suppress());
        assert!(registry.register(b).is_allow());
    }

    #[test]
    fn test_window_reset_with_mock_clock() {
        let clock = MockClock::new(Instant::now());
        let registry = registry(&clock);
        let key = DedupKey::new(404, "missing");

        for _ in 0..3 {
            registry.register(key.clone());
        }
        assert!(registry.register(key.clone()).is_suppress());

        clock.advance(Duration::from_secs(60));
        assert!(registry.register(key.clone()).is_allow());
        assert_eq!(registry.entry(&key).unwrap().count, 1);
    }

    #[test]
    fn test_concurrent_access() {
        use std::thread;

        let clock = MockClock::new(Instant::now());
        let registry = Arc::new(registry(&clock));
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    for j in 0..100 {
                        registry.register(DedupKey::new(500, &format!("msg_{}_{}", i, j)));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 1000);
    }
}
