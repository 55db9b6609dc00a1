//! Domain layer - pure data and functions with no I/O.
//!
//! This layer holds the error taxonomy and everything derived from it:
//! - Status codes, categories and error-code tokens
//! - The canonical error shape and the factory that builds it
//! - Source errors tagged at their boundary
//! - Payload sanitizing
//! - Dedup keys and the fixed-window policy
//!
//! All types in this layer are pure and easily testable.

pub mod canonical;
pub mod dedup;
pub mod factory;
pub mod policy;
pub mod sanitize;
pub mod severity;
pub mod source;
pub mod taxonomy;
