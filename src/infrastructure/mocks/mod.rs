//! Mock implementations for testing.
//!
//! This module provides test doubles for infrastructure adapters,
//! enabling controlled testing of application logic.

pub mod clock;
pub mod transport;
pub mod writer;

pub use clock::MockClock;
pub use transport::MockTransport;
pub use writer::MockResponseWriter;
