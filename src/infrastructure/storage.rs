//! Storage implementation for the dedup table.
//!
//! Provides concurrent, sharded storage with an optional entry cap enforced
//! through an [`EvictionPolicy`].

use crate::application::metrics::Metrics;
use crate::application::ports::{EvictionCandidate, EvictionPolicy, Storage};
use ahash::RandomState;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Number of entries sampled when choosing an eviction victim.
pub const EVICTION_SAMPLE_SIZE: usize = 16;

#[derive(Debug)]
struct Slot<V> {
    value: V,
    last_access: u64,
}

/// Thread-safe sharded storage backed by DashMap.
///
/// Every mutable access stamps the entry with a monotonically increasing
/// tick. When an eviction policy is set, inserted keys also join a candidate
/// queue. Before a new key is inserted the policy may ask for room: the
/// oldest queued keys are handed to it as a sample, its victim is removed and
/// the survivors go to the back of the queue.
pub struct ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    map: DashMap<K, Slot<V>, RandomState>,
    tick: AtomicU64,
    eviction: Option<Arc<dyn EvictionPolicy<K, V>>>,
    candidates: Mutex<VecDeque<K>>,
    metrics: Option<Metrics>,
}

impl<K, V> ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an unbounded storage instance.
    pub fn new() -> Self {
        Self {
            map: DashMap::with_hasher(RandomState::new()),
            tick: AtomicU64::new(0),
            eviction: None,
            candidates: Mutex::new(VecDeque::new()),
            metrics: None,
        }
    }

    /// Cap the storage with an eviction policy.
    pub fn with_eviction_policy(mut self, policy: Arc<dyn EvictionPolicy<K, V>>) -> Self {
        self.eviction = Some(policy);
        self
    }

    /// Count evictions in `metrics`.
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Get the number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if the storage is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Check if a key exists.
    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed)
    }

    // Never held while a map guard is taken.
    fn candidates(&self) -> MutexGuard<'_, VecDeque<K>> {
        self.candidates.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<K, V> ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn evict_if_needed(&self) {
        let Some(policy) = self.eviction.as_ref() else {
            return;
        };
        let len = self.map.len();
        if len == 0 || !policy.should_evict(len) {
            return;
        }

        let mut queue = self.candidates();
        let n = EVICTION_SAMPLE_SIZE.min(queue.len());
        let sampled: Vec<K> = queue.drain(..n).collect();
        drop(queue);

        // Keys that are already gone drop out of the queue here.
        let candidates: Vec<EvictionCandidate<K, V>> = sampled
            .iter()
            .filter_map(|key| self.map.get(key).map(|slot| candidate(key, &*slot)))
            .collect();

        let victim = policy.select_victim(&candidates);
        if let Some(victim) = &victim {
            if self.map.remove(victim).is_some() {
                if let Some(metrics) = &self.metrics {
                    metrics.record_eviction();
                }
            }
        }

        self.candidates().extend(
            candidates
                .into_iter()
                .map(|c| c.key)
                .filter(|key| victim.as_ref() != Some(key)),
        );
    }
}

fn candidate<K: Clone, V: Clone>(key: &K, slot: &Slot<V>) -> EvictionCandidate<K, V> {
    EvictionCandidate {
        key: key.clone(),
        value: slot.value.clone(),
        last_access: slot.last_access,
    }
}

impl<K, V> Default for ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Debug for ShardedStorage<K, V>
where
    K: Eq + Hash + Clone + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedStorage")
            .field("len", &self.map.len())
            .field("eviction", &self.eviction)
            .finish()
    }
}

impl<K, V> Storage<K, V> for ShardedStorage<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + Debug,
    V: Clone + Send + Sync + Debug,
{
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R,
    {
        let tick = self.next_tick();
        if !self.map.contains_key(&key) {
            self.evict_if_needed();
        }

        let mut slot = match self.map.entry(key) {
            Entry::Occupied(entry) => entry.into_ref(),
            Entry::Vacant(entry) => {
                if self.eviction.is_some() {
                    self.candidates().push_back(entry.key().clone());
                }
                entry.insert(Slot {
                    value: factory(),
                    last_access: tick,
                })
            }
        };
        slot.last_access = tick;
        accessor(&mut slot.value)
    }

    fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.map.get(key).map(|slot| slot.value.clone())
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// Implement Storage for Arc<ShardedStorage> to allow it to be shared directly
impl<K, V> Storage<K, V> for Arc<ShardedStorage<K, V>>
where
    K: Hash + Eq + Clone + Send + Sync + Debug,
    V: Clone + Send + Sync + Debug,
{
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R,
    {
        (**self).with_entry_mut(key, factory, accessor)
    }

    fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        Storage::get(&**self, key)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }
}
