//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::application::entry::LogEntry;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::time::Instant;

/// Candidate entry for eviction consideration.
///
/// Values are cloned to avoid holding map guards while the policy decides.
pub struct EvictionCandidate<K, V> {
    /// The key of the entry
    pub key: K,
    /// The value of the entry (cloned)
    pub value: V,
    /// Storage access tick of the last read or write; larger is more recent
    pub last_access: u64,
}

/// Port for eviction policy decisions.
///
/// The storage layer delegates the choice of victim to this policy when it is
/// about to insert a new key.
pub trait EvictionPolicy<K, V>: Send + Sync + Debug
where
    K: Clone,
    V: Clone,
{
    /// Select a victim from the given candidates.
    ///
    /// Returns `None` if nothing should be evicted.
    fn select_victim(&self, candidates: &[EvictionCandidate<K, V>]) -> Option<K>;

    /// Check if eviction should happen before inserting a new key.
    fn should_evict(&self, current_entries: usize) -> bool;
}

/// Port for obtaining current time.
///
/// Infrastructure provides `SystemClock`; tests use `MockClock`.
pub trait Clock: Send + Sync + Debug {
    /// Monotonic instant used for rate-limit windows.
    fn now(&self) -> Instant;

    /// Wall-clock time used for log timestamps.
    fn wall_clock(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Port for concurrent key-value storage.
///
/// Infrastructure provides `ShardedStorage`.
pub trait Storage<K, V>: Send + Sync + Debug
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Send + Sync,
{
    /// Access an entry with mutable access, creating it if necessary.
    ///
    /// Returns the result of `accessor`.
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R;

    /// Copy of the value stored under `key`.
    fn get(&self, key: &K) -> Option<V>
    where
        V: Clone;

    /// Get the number of entries in the storage.
    fn len(&self) -> usize;

    /// Check if the storage is empty.
    fn is_empty(&self) -> bool;
}

/// Error returned when a log transport cannot accept an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport has been shut down
    Closed,
    /// The backend rejected the entry
    Rejected(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Closed => write!(f, "log transport is closed"),
            TransportError::Rejected(reason) => write!(f, "log transport rejected entry: {}", reason),
        }
    }
}

impl std::error::Error for TransportError {}

/// Port for the external log transport.
///
/// Writes are best effort. Implementations must not block on remote I/O;
/// the sink never waits for delivery.
pub trait LogTransport: Send + Sync + Debug {
    /// Hand one entry to the transport.
    fn write_entry(&self, entry: &LogEntry) -> Result<(), TransportError>;
}

/// Error returned when a response cannot be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteError {
    /// Response bytes were already sent
    AlreadySent,
    /// The connection failed while writing
    Io(String),
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::AlreadySent => write!(f, "response already sent"),
            WriteError::Io(reason) => write!(f, "failed to write response: {}", reason),
        }
    }
}

impl std::error::Error for WriteError {}

/// Port for the host framework's response object.
pub trait ResponseWriter {
    /// Whether any response bytes have been sent.
    fn headers_sent(&self) -> bool;

    /// Send a JSON body with the given status.
    fn write_json(&mut self, status: u16, body: &Value) -> Result<(), WriteError>;
}
