//! Terminal error handler.
//!
//! Runs once per failed request:
//!
//! 1. sanitize the source error
//! 2. classify it into a [`CanonicalError`]
//! 3. fill the request id if the error does not carry one
//! 4. submit it to the [`RateLimitedLogSink`]
//! 5. render the client envelope
//! 6. write the response, unless response bytes were already sent
//!
//! Failures in steps 2 to 6, including panics, are caught. They are logged at
//! `ERROR` together with the sanitized source error, and a generic 500 body is
//! written if the response has not started.

use crate::application::entry::{Environment, RequestContext};
use crate::application::mapper::ErrorMapper;
use crate::application::ports::{ResponseWriter, WriteError};
use crate::application::response::ErrorResponse;
use crate::application::sink::{RateLimitedLogSink, SinkOutcome};
use crate::domain::canonical::{CanonicalError, OriginalError};
use crate::domain::source::SourceError;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Failure inside the handler itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// The response body could not be serialized
    Render(String),
    /// The response could not be written
    Write(WriteError),
    /// A step panicked
    Panicked(String),
}

impl fmt::Display for HandlerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerError::Render(reason) => write!(f, "failed to render error response: {}", reason),
            HandlerError::Write(e) => write!(f, "{}", e),
            HandlerError::Panicked(reason) => write!(f, "error handler panicked: {}", reason),
        }
    }
}

impl std::error::Error for HandlerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HandlerError::Write(e) => Some(e),
            _ => None,
        }
    }
}

/// How a request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// The error envelope was written
    Responded {
        /// Status of the written response
        status: u16,
    },
    /// The response had already started; the host should pass the error on
    Deferred,
    /// The handler failed and the generic 500 body was written
    FallbackResponded,
    /// The handler failed after the response had started
    FallbackDeferred,
}

impl HandlerOutcome {
    /// Whether the handler itself failed.
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            HandlerOutcome::FallbackResponded | HandlerOutcome::FallbackDeferred
        )
    }
}

/// Converts any failure of a request into a logged error and a JSON response.
///
/// Holds no per-request state; one instance serves every request.
#[derive(Debug, Clone)]
pub struct GlobalErrorHandler {
    mapper: ErrorMapper,
    sink: RateLimitedLogSink,
}

impl GlobalErrorHandler {
    /// Handler logging through `sink` with the default mapper.
    ///
    /// The response envelope follows the sink's environment.
    pub fn new(sink: RateLimitedLogSink) -> Self {
        Self {
            mapper: ErrorMapper::default(),
            sink,
        }
    }

    /// Use a custom mapper.
    pub fn with_mapper(mut self, mapper: ErrorMapper) -> Self {
        self.mapper = mapper;
        self
    }

    /// The sink in use.
    pub fn sink(&self) -> &RateLimitedLogSink {
        &self.sink
    }

    /// The mapper in use.
    pub fn mapper(&self) -> &ErrorMapper {
        &self.mapper
    }

    /// The deployment environment.
    pub fn environment(&self) -> Environment {
        self.sink.environment()
    }

    /// Handle one failed request.
    ///
    /// Never fails and never panics on behalf of the caller: either a
    /// response is written or the outcome tells the host to defer.
    pub fn handle(
        &self,
        error: SourceError,
        context: &RequestContext,
        writer: &mut dyn ResponseWriter,
    ) -> HandlerOutcome {
        let filter = self.mapper.factory().stack_filter();
        let error = error.sanitized(filter);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            self.respond(&error, context, &mut *writer)
        }))
        .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(&*payload))));

        match result {
            Ok(outcome) => outcome,
            Err(failure) => self.fail(&failure, &error, context, writer),
        }
    }

    fn respond(
        &self,
        error: &SourceError,
        context: &RequestContext,
        writer: &mut dyn ResponseWriter,
    ) -> Result<HandlerOutcome, HandlerError> {
        let canonical = self.wrap(error, context);
        self.log(&canonical, context);

        if writer.headers_sent() {
            return Ok(HandlerOutcome::Deferred);
        }

        let body = ErrorResponse::from_error(
            &canonical,
            self.environment(),
            self.mapper.factory().stack_filter(),
        )
        .to_value()
        .map_err(|e| HandlerError::Render(e.to_string()))?;
        let status = canonical.status_code();
        writer
            .write_json(status, &body)
            .map_err(HandlerError::Write)?;
        Ok(HandlerOutcome::Responded { status })
    }

    fn wrap(&self, error: &SourceError, context: &RequestContext) -> CanonicalError {
        let mut canonical = self.mapper.map(error);
        canonical.fill_absent(context.id.as_deref(), None);
        canonical
    }

    fn log(&self, error: &CanonicalError, context: &RequestContext) {
        match self.sink.submit(error, context) {
            Ok(SinkOutcome::Suppressed) | Ok(SinkOutcome::Filtered) => {}
            Ok(outcome) => {
                tracing::debug!(outcome = ?outcome, status = error.status_code(), "error logged")
            }
            Err(e) => tracing::warn!(
                error = %e,
                request_id = context.id.as_deref().unwrap_or("-"),
                "failed to submit error log"
            ),
        }
    }

    fn fail(
        &self,
        failure: &HandlerError,
        error: &SourceError,
        context: &RequestContext,
        writer: &mut dyn ResponseWriter,
    ) -> HandlerOutcome {
        let original = OriginalError::new(error.message(), error.stack().map(str::to_string));
        self.sink.report_failure(failure, original, context);

        if writer.headers_sent() {
            return HandlerOutcome::FallbackDeferred;
        }
        let body = ErrorResponse::fallback(context.id.as_deref());
        let written = body
            .to_value()
            .map_err(|e| WriteError::Io(e.to_string()))
            .and_then(|value| writer.write_json(body.status_code, &value));
        match written {
            Ok(()) => HandlerOutcome::FallbackResponded,
            Err(e) => {
                tracing::warn!(error = %e, "failed to write fallback error response");
                HandlerOutcome::FallbackDeferred
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::Clock;
    use crate::domain::canonical::Violation;
    use crate::domain::severity::Severity;
    use crate::infrastructure::mocks::{MockClock, MockResponseWriter, MockTransport};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use std::time::Instant;
    use tracing_subscriber::layer::{Context, SubscriberExt};
    use tracing_subscriber::Layer;

    fn handler(environment: Environment) -> (GlobalErrorHandler, MockTransport) {
        let transport = MockTransport::new();
        let clock: Arc<dyn Clock> = Arc::new(MockClock::new(Instant::now()));
        let sink = RateLimitedLogSink::builder()
            .with_clock(clock)
            .with_transport(Arc::new(transport.clone()))
            .with_environment(environment)
            .build()
            .unwrap();
        (GlobalErrorHandler::new(sink), transport)
    }

    fn context() -> RequestContext {
        RequestContext::new("POST", "/books").with_id("req-42")
    }

    #[test]
    fn test_validation_error_response() {
        let (handler, transport) = handler(Environment::Development);
        let mut writer = MockResponseWriter::new();
        let error = SourceError::validation(
            "invalid book",
            vec![
                Violation::new("title", json!(""), "title is required", "any.required"),
                Violation::new("year", json!(3000), "year must be <= 2100", "number.max"),
            ],
        );

        let outcome = handler.handle(error, &context(), &mut writer);

        assert_eq!(outcome, HandlerOutcome::Responded { status: 400 });
        let body = writer.body().unwrap();
        assert_eq!(body["errorCode"], "INVALID_INPUT");
        assert_eq!(body["requestId"], "req-42");
        assert_eq!(body["details"].as_array().map(Vec::len), Some(2));
        assert_eq!(transport.entries()[0].severity, Severity::Notice);
    }

    #[test]
    fn test_headers_sent_defers_but_logs() {
        let (handler, transport) = handler(Environment::Development);
        let mut writer = MockResponseWriter::with_headers_sent();

        let outcome = handler.handle(
            SourceError::store("unavailable", "backend down"),
            &context(),
            &mut writer,
        );

        assert_eq!(outcome, HandlerOutcome::Deferred);
        assert_eq!(writer.writes(), 0);
        assert_eq!(transport.len(), 1);
    }

    #[test]
    fn test_existing_request_id_is_kept() {
        let (handler, _transport) = handler(Environment::Production);
        let mut writer = MockResponseWriter::new();
        let canonical = handler
            .mapper()
            .factory()
            .create("gone", Some(410), None, None, Default::default())
            .with_request_id(Some("origin-id"));

        handler.handle(canonical.into(), &context(), &mut writer);

        let body = writer.body().unwrap();
        assert_eq!(body["requestId"], "origin-id");
        assert_eq!(body["category"], "ClientError.NotFound");
        assert!(body.get("stack").is_none());
    }

    #[test]
    fn test_write_failure_falls_back() {
        let (handler, transport) = handler(Environment::Development);
        let mut writer = MockResponseWriter::failing();

        let outcome = handler.handle(SourceError::unclassified("boom"), &context(), &mut writer);

        assert_eq!(outcome, HandlerOutcome::FallbackResponded);
        assert_eq!(writer.status(), Some(500));
        assert_eq!(writer.body().unwrap()["message"], "Internal Server Error");

        // One entry for the error itself, one for the handler failure
        let entries = transport.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].severity, Severity::Error);
        assert_eq!(entries[1].original_error.as_ref().unwrap().message, "boom");
    }

    #[derive(Default)]
    struct PanickingWriter {
        fallback: Option<Value>,
        panicked: bool,
    }

    impl ResponseWriter for PanickingWriter {
        fn headers_sent(&self) -> bool {
            false
        }

        fn write_json(&mut self, _status: u16, body: &Value) -> Result<(), WriteError> {
            if !self.panicked {
                self.panicked = true;
                panic!("writer exploded");
            }
            self.fallback = Some(body.clone());
            Ok(())
        }
    }

    #[test]
    fn test_panic_is_contained() {
        let (handler, transport) = handler(Environment::Development);
        let mut writer = PanickingWriter::default();

        let outcome = handler.handle(SourceError::rpc(14, "unavailable"), &context(), &mut writer);

        assert_eq!(outcome, HandlerOutcome::FallbackResponded);
        assert_eq!(writer.fallback.unwrap()["statusCode"], 500);
        let failure = transport.entries().pop().unwrap();
        assert!(failure.message.contains("writer exploded"));
    }

    #[test]
    fn test_panicking_transport_still_responds() {
        let (handler, transport) = handler(Environment::Production);
        transport.panic_writes(true);
        let mut writer = MockResponseWriter::new();

        let outcome = handler.handle(
            SourceError::store("not-found", "gone"),
            &context(),
            &mut writer,
        );

        assert_eq!(outcome, HandlerOutcome::Responded { status: 404 });
        assert_eq!(writer.body().unwrap()["errorCode"], "RESOURCE_NOT_FOUND");
        assert_eq!(handler.sink().metrics().transport_failures(), 1);
    }

    /// Clock whose monotonic reading panics, breaking every dedup lookup.
    #[derive(Debug)]
    struct BrokenClock;

    impl Clock for BrokenClock {
        fn now(&self) -> Instant {
            panic!("monotonic clock unavailable");
        }
    }

    /// Records the target of every WARN event.
    #[derive(Clone, Default)]
    struct Warnings(Arc<Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> Layer<S> for Warnings {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.0.lock().unwrap().push(event.metadata().target().to_string());
            }
        }
    }

    #[test]
    fn test_dedup_failure_still_responds() {
        let transport = MockTransport::new();
        let sink = RateLimitedLogSink::builder()
            .with_clock(Arc::new(BrokenClock))
            .with_transport(Arc::new(transport.clone()))
            .build()
            .unwrap();
        let handler = GlobalErrorHandler::new(sink);
        let mut writer = MockResponseWriter::new();
        let warnings = Warnings::default();
        let subscriber = tracing_subscriber::registry().with(warnings.clone());

        let outcome = tracing::subscriber::with_default(subscriber, || {
            handler.handle(SourceError::store("not-found", "gone"), &context(), &mut writer)
        });

        assert_eq!(outcome, HandlerOutcome::Responded { status: 404 });
        assert_eq!(writer.status(), Some(404));
        assert_eq!(writer.body().unwrap()["requestId"], "req-42");
        assert!(transport.is_empty());
        assert!(warnings
            .0
            .lock()
            .unwrap()
            .iter()
            .any(|target| target == "error_pipeline::application::handler"));
    }
}
