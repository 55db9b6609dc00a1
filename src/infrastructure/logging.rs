//! Global `tracing` subscriber setup.
//!
//! Production gets one JSON object per line so the platform log collector can
//! index the fields; other environments get the human-readable format.

use crate::application::entry::Environment;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Build the filter from `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber for `environment`.
///
/// # Errors
/// Returns `TryInitError` if a global subscriber is already installed.
pub fn init_tracing(environment: &Environment) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter());
    if environment.is_production() {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    }
}
