//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Error mapper (source error classification)
//! - Dedup registry and rate-limited log sink
//! - Global error handler (per-request orchestration)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod entry;
pub mod handler;
pub mod mapper;
pub mod metrics;
pub mod ports;
pub mod registry;
pub mod response;
pub mod sink;
