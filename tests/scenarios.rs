use error_pipeline::infrastructure::mocks::{MockClock, MockResponseWriter, MockTransport};
use error_pipeline::{
    Category, DedupKey, Environment, ErrorCode, ErrorMapper, GlobalErrorHandler, HandlerOutcome,
    RateLimitedLogSink, RequestContext, Severity, SinkBuilder, SourceError, StackFilter, Violation,
};
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn builder(clock: &MockClock, transport: &MockTransport) -> SinkBuilder {
    RateLimitedLogSink::builder()
        .with_clock(Arc::new(clock.clone()))
        .with_transport(Arc::new(transport.clone()))
}

fn handler(environment: Environment) -> (GlobalErrorHandler, MockTransport) {
    let transport = MockTransport::new();
    let clock = MockClock::new(Instant::now());
    let sink = builder(&clock, &transport)
        .with_environment(environment)
        .build()
        .unwrap();
    (GlobalErrorHandler::new(sink), transport)
}

fn context() -> RequestContext {
    RequestContext::new("POST", "/api/books")
        .with_id("req-7")
        .with_ip("10.0.0.1")
        .with_user("user-1")
        .with_body(json!({"title": ""}))
}

#[test]
fn test_validation_error_with_two_violations() {
    let (handler, _transport) = handler(Environment::Development);
    let mut writer = MockResponseWriter::new();
    let error = SourceError::from_json(&json!({
        "isJoi": true,
        "name": "ValidationError",
        "message": "\"title\" is not allowed to be empty",
        "details": [
            {"path": ["title"], "message": "\"title\" is not allowed to be empty",
             "type": "string.empty", "context": {"value": ""}},
            {"path": ["year"], "message": "\"year\" must be less than or equal to 2100",
             "type": "number.max", "context": {"value": 3000}}
        ]
    }));

    let outcome = handler.handle(error, &context(), &mut writer);

    assert_eq!(outcome, HandlerOutcome::Responded { status: 400 });
    let body = writer.body().unwrap();
    assert_eq!(body["statusCode"], 400);
    assert_eq!(body["errorCode"], "INVALID_INPUT");
    assert_eq!(body["category"], "ClientError.Validation");
    assert_eq!(body["details"].as_array().unwrap().len(), 2);
    assert_eq!(body["details"][1]["field"], "year");
}

#[test]
fn test_request_without_response_is_timeout() {
    let (handler, transport) = handler(Environment::Development);
    let mut writer = MockResponseWriter::new();
    let error = SourceError::from_json(&json!({
        "message": "timeout of 5000ms exceeded",
        "request": {"_header": "GET /v1/quotes HTTP/1.1"},
        "config": {"method": "get", "url": "https://quotes.example.com/v1/quotes"}
    }));

    handler.handle(error, &context(), &mut writer);

    let body = writer.body().unwrap();
    assert_eq!(body["statusCode"], 503);
    assert_eq!(body["errorCode"], "API_TIMEOUT");
    assert_eq!(body["category"], "ServerError.ExternalAPI");
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("GET https://quotes.example.com/v1/quotes"));
    assert_eq!(transport.entries()[0].severity, Severity::Error);
}

#[test]
fn test_store_permission_denied() {
    let (handler, transport) = handler(Environment::Development);
    let mut writer = MockResponseWriter::new();
    let error = SourceError::from_json(&json!({
        "code": "permission-denied",
        "message": "Missing or insufficient permissions."
    }));

    handler.handle(error, &context(), &mut writer);

    let body = writer.body().unwrap();
    assert_eq!(body["statusCode"], 403);
    assert_eq!(body["category"], "ClientError.Authorization");
    assert_eq!(body["errorCode"], "PERMISSION_DENIED");
    assert_eq!(transport.entries()[0].severity, Severity::Warning);
}

#[test]
fn test_identical_errors_within_window_log_once() {
    let transport = MockTransport::new();
    let clock = MockClock::new(Instant::now());
    let sink = builder(&clock, &transport)
        .with_max_per_window(1)
        .build()
        .unwrap();
    let handler = GlobalErrorHandler::new(sink);

    for _ in 0..2 {
        let mut writer = MockResponseWriter::new();
        let outcome = handler.handle(
            SourceError::store("not-found", "No document to update"),
            &context(),
            &mut writer,
        );
        assert_eq!(outcome, HandlerOutcome::Responded { status: 404 });
        clock.advance(Duration::from_secs(5));
    }

    assert_eq!(transport.len(), 1);
    let key = DedupKey::new(404, "No document to update");
    assert_eq!(handler.sink().registry().entry(&key).unwrap().count, 2);
}

#[test]
fn test_validation_marker_wins_over_numeric_code() {
    let mapper = ErrorMapper::default();
    let error = SourceError::from_json(&json!({
        "isJoi": true,
        "code": 3,
        "message": "bad input",
        "details": []
    }));

    assert!(matches!(error, SourceError::Validation(_)));
    assert_eq!(mapper.error_code_of(&error), ErrorCode::InvalidInput);
    assert_eq!(mapper.status_of(&error), 400);
}

#[test]
fn test_mapping_is_deterministic() {
    let mapper = ErrorMapper::default();
    let inputs = [
        json!({"code": "auth/id-token-expired", "message": "expired"}),
        json!({"code": "aborted", "message": "contention"}),
        json!({"code": 14, "message": "unavailable"}),
        json!({"response": {"status": 404, "data": {"message": "no such user"}},
               "config": {"method": "get", "url": "/users/1"}}),
        json!({"message": "something odd"}),
    ];

    for input in &inputs {
        let first = SourceError::from_json(input);
        let second = SourceError::from_json(input);
        assert_eq!(first, second);
        assert_eq!(
            (mapper.category_of(&first), mapper.error_code_of(&first), mapper.status_of(&first)),
            (mapper.category_of(&second), mapper.error_code_of(&second), mapper.status_of(&second)),
        );
        let canonical = mapper.map(&first);
        assert_eq!(canonical.category(), mapper.category_of(&first));
        assert_eq!(canonical.error_code(), mapper.error_code_of(&first));
        assert_eq!(canonical.status_code(), mapper.status_of(&first));
    }

    assert_eq!(
        mapper.category_of(&SourceError::from_json(&inputs[4])),
        Category::Unknown
    );
}

#[test]
fn test_production_body_has_no_debug_fields() {
    let (handler, transport) = handler(Environment::Production);
    let mut writer = MockResponseWriter::new();
    let error = SourceError::from_json(&json!({
        "message": "boom",
        "stack": "  0: app::books::update\n             at ./src/books.rs:42:9",
        "details": {"table": "books"}
    }));

    handler.handle(error, &context(), &mut writer);

    let body = writer.body().unwrap().as_object().unwrap();
    assert!(!body.contains_key("stack"));
    assert!(!body.contains_key("details"));
    assert_eq!(body["requestId"], "req-7");

    let entry = &transport.entries()[0];
    assert!(entry.request_body.is_none());
    assert_eq!(entry.environment, Environment::Production);
}

#[test]
fn test_development_body_has_debug_fields() {
    let (handler, transport) = handler(Environment::Development);
    let mut writer = MockResponseWriter::new();
    let error = SourceError::from_json(&json!({
        "message": "boom",
        "stack": "  0: app::books::update\n             at ./src/books.rs:42:9",
        "details": {"table": "books"}
    }));

    handler.handle(error, &context(), &mut writer);

    let body = writer.body().unwrap();
    assert!(body["stack"].as_str().unwrap().contains("app::books::update"));
    assert_eq!(body["details"], json!({"table": "books"}));
    assert_eq!(transport.entries()[0].request_body, Some(json!({"title": ""})));
}

#[test]
fn test_sanitizing_twice_changes_nothing() {
    let filter = StackFilter::new();
    let mut deep = json!("leaf");
    for _ in 0..40 {
        deep = json!({ "next": deep });
    }
    let error = SourceError::from_json(&json!({
        "message": "odd",
        "details": {
            "chain": deep,
            "originalError": {
                "message": "inner",
                "stack": "  0: std::rt::lang_start\n  1: app::main",
                "extra": {"secret": "x"}
            }
        }
    }));

    let once = error.sanitized(&filter);
    let twice = once.clone().sanitized(&filter);
    assert_eq!(once, twice);
}

#[test]
fn test_violation_values_are_kept() {
    let mapper = ErrorMapper::default();
    let error = SourceError::validation(
        "invalid",
        vec![Violation::new("isbn", json!("12"), "isbn must be 13 digits", "string.length")],
    );

    let canonical = mapper.map(&error);
    assert_eq!(canonical.details().unwrap()[0]["rejectedValue"], "12");
    assert_eq!(canonical.details().unwrap()[0]["violationType"], "string.length");
}
