//! Eviction policy adapters for the dedup table.
//!
//! In hexagonal architecture, these are adapters (infrastructure layer)
//! that implement the EvictionPolicy port (application layer).

pub mod lru;

pub use lru::{LruEviction, DEFAULT_MAX_KEYS};
