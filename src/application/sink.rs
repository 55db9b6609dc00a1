//! Rate-limited log sink.
//!
//! Decides whether an error occurrence reaches the log transport. Occurrences
//! are first checked against the optional severity allow-list, then counted
//! per dedup key in a fixed window. Forwarded entries are handed to the
//! transport without waiting for delivery.

use crate::application::entry::{Environment, LogEntry, RequestContext};
use crate::application::metrics::Metrics;
use crate::application::ports::{Clock, LogTransport, TransportError};
use crate::application::registry::DedupRegistry;
use crate::domain::canonical::{CanonicalError, OriginalError};
use crate::domain::dedup::{DedupKey, RateLimitEntry};
use crate::domain::policy::{PolicyDecision, WindowPolicy, DEFAULT_MAX_PER_WINDOW, DEFAULT_WINDOW};
use crate::domain::severity::{severity_for_category, Severity};
use crate::domain::taxonomy::{status, Category, ErrorCode};
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::eviction::{LruEviction, DEFAULT_MAX_KEYS};
use crate::infrastructure::storage::ShardedStorage;
use crate::infrastructure::transport::TracingTransport;

use std::collections::BTreeSet;
use std::fmt;
use std::panic;
use std::sync::Arc;
use std::time::Duration;

/// Storage type backing the dedup table.
pub type DedupStorage = Arc<ShardedStorage<DedupKey, RateLimitEntry>>;

/// Severities kept by error-only mode unless configured otherwise.
pub const DEFAULT_ERROR_ONLY: [Severity; 3] = [Severity::Critical, Severity::Error, Severity::Warning];

/// Error returned when building a sink fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// At least one occurrence per window must be allowed
    ZeroMaxPerWindow,
    /// The window must be longer than zero
    ZeroWindow,
    /// The key cap must be greater than zero
    ZeroMaxKeys,
    /// Error-only mode needs at least one severity
    EmptySeverityAllowList,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::ZeroMaxPerWindow => write!(f, "max_per_window must be greater than 0"),
            BuildError::ZeroWindow => write!(f, "window must be greater than 0"),
            BuildError::ZeroMaxKeys => write!(f, "max_keys must be greater than 0"),
            BuildError::EmptySeverityAllowList => {
                write!(f, "error-only mode requires at least one severity")
            }
        }
    }
}

impl std::error::Error for BuildError {}

/// Error returned by [`RateLimitedLogSink::submit`].
///
/// Transport failures are not errors; they are counted and reported locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// The dedup table panicked while registering the occurrence
    DedupTable,
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::DedupTable => write!(f, "dedup table failed while registering an error"),
        }
    }
}

impl std::error::Error for SinkError {}

/// What happened to a submitted occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOutcome {
    /// Handed to the transport
    Forwarded,
    /// Dropped by the window policy
    Suppressed,
    /// Skipped by error-only mode
    Filtered,
    /// Allowed, but the transport refused it
    TransportFailed,
}

/// Builder for constructing a [`RateLimitedLogSink`].
pub struct SinkBuilder {
    window: Duration,
    max_per_window: usize,
    max_keys: Option<usize>,
    allow_list: Option<BTreeSet<Severity>>,
    clock: Option<Arc<dyn Clock>>,
    transport: Option<Arc<dyn LogTransport>>,
    environment: Environment,
}

impl SinkBuilder {
    /// Set the window length.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set how many occurrences of one key are forwarded per window.
    pub fn with_max_per_window(mut self, max: usize) -> Self {
        self.max_per_window = max;
        self
    }

    /// Cap the number of tracked keys. Least recently seen keys are evicted.
    pub fn with_max_keys(mut self, max: usize) -> Self {
        self.max_keys = Some(max);
        self
    }

    /// Track every key for the life of the sink.
    pub fn with_unbounded_keys(mut self) -> Self {
        self.max_keys = None;
        self
    }

    /// Only forward entries whose severity is in `severities`.
    pub fn with_error_only(mut self, severities: impl IntoIterator<Item = Severity>) -> Self {
        self.allow_list = Some(severities.into_iter().collect());
        self
    }

    /// Forward every severity.
    pub fn without_error_only(mut self) -> Self {
        self.allow_list = None;
        self
    }

    /// Use a custom clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use a custom log transport.
    pub fn with_transport(mut self, transport: Arc<dyn LogTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Set the deployment environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Build the sink.
    ///
    /// # Errors
    /// Returns `BuildError` if the configuration is invalid.
    pub fn build(self) -> Result<RateLimitedLogSink, BuildError> {
        if self.max_per_window == 0 {
            return Err(BuildError::ZeroMaxPerWindow);
        }
        if self.window.is_zero() {
            return Err(BuildError::ZeroWindow);
        }
        if self.max_keys == Some(0) {
            return Err(BuildError::ZeroMaxKeys);
        }
        if matches!(&self.allow_list, Some(list) if list.is_empty()) {
            return Err(BuildError::EmptySeverityAllowList);
        }

        let metrics = Metrics::new();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(TracingTransport::new()));

        let mut storage = ShardedStorage::new().with_metrics(metrics.clone());
        if let Some(max) = self.max_keys {
            storage = storage.with_eviction_policy(Arc::new(LruEviction::new(max)));
        }
        let policy = WindowPolicy::new(self.max_per_window, self.window);
        let registry = DedupRegistry::new(Arc::new(storage), Arc::clone(&clock), policy);

        Ok(RateLimitedLogSink {
            registry,
            transport,
            clock,
            environment: self.environment,
            allow_list: self.allow_list,
            metrics,
        })
    }
}

/// Forwards error occurrences to a log transport, at most `max_per_window`
/// per dedup key per window.
///
/// Each sink owns its dedup table. Rate limiting is therefore per sink
/// instance and per process, never coordinated across processes.
#[derive(Clone)]
pub struct RateLimitedLogSink {
    registry: DedupRegistry<DedupStorage>,
    transport: Arc<dyn LogTransport>,
    clock: Arc<dyn Clock>,
    environment: Environment,
    allow_list: Option<BTreeSet<Severity>>,
    metrics: Metrics,
}

impl RateLimitedLogSink {
    /// Create a builder.
    ///
    /// Defaults:
    /// - Window: 60 seconds
    /// - Max per window: 10
    /// - Max keys: 10,000 (with LRU eviction)
    /// - Error-only mode: disabled
    /// - Transport: [`TracingTransport`]
    /// - Environment: development
    pub fn builder() -> SinkBuilder {
        SinkBuilder {
            window: DEFAULT_WINDOW,
            max_per_window: DEFAULT_MAX_PER_WINDOW,
            max_keys: Some(DEFAULT_MAX_KEYS),
            allow_list: None,
            clock: None,
            transport: None,
            environment: Environment::default(),
        }
    }

    /// Submit one occurrence of `error`.
    ///
    /// # Errors
    /// Returns `SinkError::DedupTable` if the dedup table panics. Transport
    /// failures are reported through `tracing` and the metrics instead.
    pub fn submit(
        &self,
        error: &CanonicalError,
        context: &RequestContext,
    ) -> Result<SinkOutcome, SinkError> {
        let severity = severity_for_category(error.category());
        if let Some(allow_list) = &self.allow_list {
            if !allow_list.contains(&severity) {
                self.metrics.record_filtered();
                return Ok(SinkOutcome::Filtered);
            }
        }

        let key = DedupKey::for_error(error);
        let registry = &self.registry;
        let decision = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            registry.register(key.clone())
        }))
        .map_err(|_| SinkError::DedupTable)?;

        if decision == PolicyDecision::Suppress {
            self.metrics.record_suppressed();
            tracing::debug!(key = %key, "error log suppressed");
            return Ok(SinkOutcome::Suppressed);
        }

        let entry = LogEntry::for_error(error, context, self.environment, self.clock.wall_clock());
        Ok(self.forward(&entry))
    }

    /// Report a failure of the error handler itself.
    ///
    /// Bypasses both rate limiting and error-only mode. The entry carries
    /// severity `ERROR` and the snapshot of the error being handled.
    pub fn report_failure(
        &self,
        failure: &dyn std::error::Error,
        original: OriginalError,
        context: &RequestContext,
    ) {
        tracing::error!(
            error = %failure,
            original = %original.message,
            request_id = context.id.as_deref().unwrap_or("-"),
            "error handler failed"
        );

        let entry = LogEntry {
            severity: Severity::Error,
            message: format!("Error handler failed: {}", failure),
            status_code: status::INTERNAL_SERVER_ERROR,
            category: Category::Unknown,
            error_code: ErrorCode::UnknownError,
            request_id: context.id.clone(),
            url: context.original_url.clone(),
            method: context.method.clone(),
            ip: context.ip.clone(),
            user_id: context.user_id.clone(),
            timestamp: self
                .clock
                .wall_clock()
                .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            environment: self.environment,
            request_body: None,
            original_error: Some(original),
        };
        self.forward(&entry);
    }

    fn forward(&self, entry: &LogEntry) -> SinkOutcome {
        let written = panic::catch_unwind(panic::AssertUnwindSafe(|| {
            self.transport.write_entry(entry)
        }))
        .unwrap_or_else(|_| Err(TransportError::Rejected("transport panicked".to_string())));

        match written {
            Ok(()) => {
                self.metrics.record_forwarded();
                SinkOutcome::Forwarded
            }
            Err(e) => {
                self.metrics.record_transport_failure();
                tracing::warn!(
                    error = %e,
                    severity = %entry.severity,
                    entry_message = %entry.message,
                    "log transport write failed"
                );
                SinkOutcome::TransportFailed
            }
        }
    }

    /// Get the sink metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Get the dedup table.
    pub fn registry(&self) -> &DedupRegistry<DedupStorage> {
        &self.registry
    }

    /// The configured environment.
    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// The severity allow-list, if error-only mode is enabled.
    pub fn allow_list(&self) -> Option<&BTreeSet<Severity>> {
        self.allow_list.as_ref()
    }
}

impl fmt::Debug for RateLimitedLogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitedLogSink")
            .field("policy", &self.registry.policy())
            .field("keys", &self.registry.len())
            .field("transport", &self.transport)
            .field("environment", &self.environment)
            .field("allow_list", &self.allow_list)
            .finish()
    }
}
