//! # error-pipeline
//!
//! Error classification, rate-limited error logging and stable client error
//! envelopes for REST services.
//!
//! Every failure a request can produce (validation errors, outbound HTTP
//! failures, auth-token errors, document-store errors, RPC status codes or
//! anything else) is normalized into one [`CanonicalError`]. The error is then
//! logged through a [`RateLimitedLogSink`] and rendered as a JSON envelope by
//! the [`GlobalErrorHandler`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use error_pipeline::{
//!     init_tracing, GlobalErrorHandler, ObservabilityConfig, RateLimitedLogSink,
//!     RequestContext, SourceError,
//! };
//! # use error_pipeline::application::ports::{ResponseWriter, WriteError};
//! # struct Response;
//! # impl ResponseWriter for Response {
//! #     fn headers_sent(&self) -> bool { false }
//! #     fn write_json(&mut self, _: u16, _: &serde_json::Value) -> Result<(), WriteError> { Ok(()) }
//! # }
//!
//! let config = ObservabilityConfig::from_env().expect("valid configuration");
//! init_tracing(&config.environment).ok();
//!
//! let sink = config
//!     .apply(RateLimitedLogSink::builder())
//!     .build()
//!     .expect("valid sink configuration");
//! let handler = GlobalErrorHandler::new(sink);
//!
//! // In the framework's error hook:
//! let context = RequestContext::new("GET", "/books/42").with_id("req-1");
//! let mut response = Response;
//! handler.handle(
//!     SourceError::store("not-found", "No document to update"),
//!     &context,
//!     &mut response,
//! );
//! ```
//!
//! ## Classification
//!
//! Source errors are tagged once, where they originate, as a [`SourceError`].
//! When only raw JSON is available, [`SourceError::from_json`] recognizes the
//! shape in a fixed priority order: validation, outbound HTTP, auth token,
//! document store, numeric RPC code, unclassified. An object carrying both a
//! validation marker and a numeric `code` is a validation error.
//!
//! ```rust
//! use error_pipeline::{Category, ErrorCode, ErrorMapper, SourceError};
//! use serde_json::json;
//!
//! let mapper = ErrorMapper::default();
//! let error = SourceError::from_json(&json!({
//!     "request": {},
//!     "config": {"method": "get", "url": "https://api.example.com/v1/books"},
//!     "message": "timeout of 5000ms exceeded"
//! }));
//!
//! let canonical = mapper.map(&error);
//! assert_eq!(canonical.status_code(), 503);
//! assert_eq!(canonical.error_code(), ErrorCode::ApiTimeout);
//! assert_eq!(canonical.category(), Category::ExternalApi);
//! ```
//!
//! ## Rate-Limited Logging
//!
//! Occurrences are deduplicated by `statusCode:message`. Up to 10 occurrences
//! of a key are forwarded per 60 second window; the rest are dropped until the
//! window has elapsed. Severity follows the category:
//!
//! | Category                                   | Severity   |
//! |--------------------------------------------|------------|
//! | Database, Internal                         | `CRITICAL` |
//! | ExternalAPI, Unavailable, Unknown          | `ERROR`    |
//! | Authentication, Authorization              | `WARNING`  |
//! | Validation, NotFound, Conflict, RateLimit  | `NOTICE`   |
//! | anything else                              | `INFO`     |
//!
//! ```rust,no_run
//! use error_pipeline::{RateLimitedLogSink, DEFAULT_ERROR_ONLY};
//! use std::time::Duration;
//!
//! let sink = RateLimitedLogSink::builder()
//!     .with_window(Duration::from_secs(30))
//!     .with_max_per_window(5)
//!     .with_max_keys(50_000)
//!     .with_error_only(DEFAULT_ERROR_ONLY)
//!     .build()
//!     .unwrap();
//!
//! let snapshot = sink.metrics().snapshot();
//! println!("Suppression rate: {:.2}%", snapshot.suppression_rate() * 100.0);
//! ```
//!
//! The dedup table belongs to the sink instance. Deployments running several
//! processes rate-limit per process.
//!
//! ## Memory Management
//!
//! By default the dedup table tracks up to 10,000 keys. When a new key would
//! exceed the cap, a sample of keys is inspected and the least recently seen
//! one is evicted. Use `.with_unbounded_keys()` to keep every key for the life
//! of the sink; only do this when the set of error messages is known to be
//! bounded.
//!
//! ## Transports
//!
//! - [`TracingTransport`] (default) emits each entry as a `tracing` event.
//! - [`ChannelTransport`] (feature `async`) hands entries to a background
//!   tokio task. Call [`TransportHandle::shutdown`] to drain it.
//!
//! Transport failures never reach the caller. They are counted in the
//! metrics and reported with `tracing::warn!`.

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    canonical::{CanonicalError, OriginalError, Violation},
    dedup::{DedupKey, RateLimitEntry},
    factory::{CreateOptions, ErrorFactory, StackFilter},
    policy::{PolicyDecision, WindowPolicy},
    severity::{severity_for_category, Severity},
    source::{
        AuthFailure, RemoteCallFailure, RpcFailure, SourceError, StoreFailure, Unclassified,
        ValidationFailure,
    },
    taxonomy::{category_for_status, Category, ErrorCode},
};

pub use application::{
    entry::{Environment, LogEntry, RequestContext},
    handler::{GlobalErrorHandler, HandlerError, HandlerOutcome},
    mapper::{classify, Classification, ErrorMapper},
    metrics::{Metrics, MetricsSnapshot},
    ports::{
        Clock, EvictionCandidate, EvictionPolicy, LogTransport, ResponseWriter, Storage,
        TransportError, WriteError,
    },
    registry::DedupRegistry,
    response::ErrorResponse,
    sink::{BuildError, RateLimitedLogSink, SinkBuilder, SinkError, SinkOutcome, DEFAULT_ERROR_ONLY},
};

pub use infrastructure::{
    clock::SystemClock,
    config::{ConfigError, ObservabilityConfig},
    eviction::LruEviction,
    logging::init_tracing,
    storage::ShardedStorage,
    transport::TracingTransport,
};

#[cfg(feature = "async")]
pub use infrastructure::transport::{ChannelTransport, ShutdownError, TransportHandle};
