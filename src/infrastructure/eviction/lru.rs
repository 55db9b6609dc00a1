//! LRU (Least Recently Used) eviction adapter.

use crate::application::ports::{EvictionCandidate, EvictionPolicy};

/// Default cap on distinct dedup keys.
pub const DEFAULT_MAX_KEYS: usize = 10_000;

/// LRU eviction policy with entry count limit.
///
/// Evicts the least recently accessed of the sampled entries once the limit
/// is reached.
#[derive(Debug, Clone)]
pub struct LruEviction {
    max_entries: usize,
}

impl LruEviction {
    /// Create a new LRU eviction policy with the given entry limit.
    pub fn new(max_entries: usize) -> Self {
        Self { max_entries }
    }

    /// The entry limit.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

impl Default for LruEviction {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_KEYS)
    }
}

impl<K, V> EvictionPolicy<K, V> for LruEviction
where
    K: Clone,
    V: Clone,
{
    fn select_victim(&self, candidates: &[EvictionCandidate<K, V>]) -> Option<K> {
        candidates
            .iter()
            .min_by_key(|candidate| candidate.last_access)
            .map(|candidate| candidate.key.clone())
    }

    fn should_evict(&self, current_entries: usize) -> bool {
        current_entries >= self.max_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(key: &str, last_access: u64) -> EvictionCandidate<String, u32> {
        EvictionCandidate {
            key: key.to_string(),
            value: 0,
            last_access,
        }
    }

    #[test]
    fn test_lru_select_oldest() {
        let policy = LruEviction::new(10);
        let candidates = vec![candidate("key1", 30), candidate("key2", 10), candidate("key3", 20)];
        assert_eq!(policy.select_victim(&candidates), Some("key2".to_string()));
    }

    #[test]
    fn test_lru_should_evict() {
        let policy = LruEviction::new(100);
        assert!(!<LruEviction as EvictionPolicy<String, u32>>::should_evict(&policy, 99));
        assert!(<LruEviction as EvictionPolicy<String, u32>>::should_evict(&policy, 100));
        assert!(<LruEviction as EvictionPolicy<String, u32>>::should_evict(&policy, 101));
    }

    #[test]
    fn test_lru_empty_candidates() {
        let policy = LruEviction::new(10);
        let candidates: Vec<EvictionCandidate<String, u32>> = vec![];
        assert_eq!(policy.select_victim(&candidates), None);
    }

    #[test]
    fn test_default_limit() {
        assert_eq!(LruEviction::default().max_entries(), DEFAULT_MAX_KEYS);
    }
}
