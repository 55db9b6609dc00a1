//! Source errors, classified once at the boundary where they originate.
//!
//! Each layer that can fail (validation, outbound HTTP, auth tokens, the
//! document store, RPC calls) produces its own variant of [`SourceError`].
//! The mapper then dispatches on the variant instead of probing fields.
//!
//! [`SourceError::from_json`] is the one adapter that still has to look at
//! an untyped shape, for errors that arrive as JSON from a foreign layer. It
//! applies the fixed priority order: validation, outbound HTTP, auth, store,
//! RPC, unclassified.

use crate::domain::canonical::{CanonicalError, Violation};
use serde_json::Value;
use std::error::Error as StdError;
use std::fmt;

/// Prefix shared by all auth-token service error codes.
pub const AUTH_CODE_PREFIX: &str = "auth/";

/// Document-store error tokens recognized by [`SourceError::from_json`].
pub const STORE_CODES: &[&str] = &[
    "cancelled",
    "unknown",
    "invalid-argument",
    "deadline-exceeded",
    "not-found",
    "already-exists",
    "permission-denied",
    "resource-exhausted",
    "failed-precondition",
    "aborted",
    "out-of-range",
    "unimplemented",
    "internal",
    "unavailable",
    "data-loss",
    "unauthenticated",
];

/// Input rejected by a validation library.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailure {
    /// Summary message from the validator
    pub message: String,
    /// One entry per violated rule
    pub violations: Vec<Violation>,
}

impl ValidationFailure {
    /// Create a validation failure from its violations.
    pub fn new(message: impl Into<String>, violations: Vec<Violation>) -> Self {
        Self {
            message: message.into(),
            violations,
        }
    }
}

/// Failure of an outbound HTTP call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCallFailure {
    /// The remote service answered with an error status.
    Response {
        /// Status returned by the remote service
        status: u16,
        /// Message extracted from the remote response
        message: String,
        /// Method of the outbound request
        method: String,
        /// URL of the outbound request
        url: String,
        /// Remote response body, if captured
        body: Option<Value>,
    },
    /// The request was sent but no response arrived.
    NoResponse {
        /// Method of the outbound request
        method: String,
        /// URL of the outbound request
        url: String,
        /// Client-side description (e.g. timeout)
        message: String,
    },
    /// The request could not be built or sent.
    Setup {
        /// Client-side description
        message: String,
    },
}

/// Failure reported by the auth-token service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailure {
    /// Service error token, e.g. `auth/id-token-expired`
    pub code: String,
    /// Message from the service
    pub message: String,
}

/// Failure reported by the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreFailure {
    /// Store error token, e.g. `permission-denied`
    pub code: String,
    /// Message from the store
    pub message: String,
}

/// Failure carrying a numeric RPC status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcFailure {
    /// Numeric status code
    pub code: i64,
    /// Message from the remote end
    pub message: String,
}

/// A failure nobody classified.
#[derive(Debug, Clone, PartialEq)]
pub struct Unclassified {
    /// Message of the failure
    pub message: String,
    /// Stack or cause chain, if available
    pub stack: Option<String>,
    /// Any structured payload that travelled with it
    pub details: Option<Value>,
}

/// A raw failure, tagged by the layer it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    /// Validation library rejected the input
    Validation(ValidationFailure),
    /// Outbound HTTP call failed
    RemoteCall(RemoteCallFailure),
    /// Auth-token service rejected the caller
    Auth(AuthFailure),
    /// Document store reported a failure
    Store(StoreFailure),
    /// RPC-style failure with a numeric code
    Rpc(RpcFailure),
    /// Already normalized by the code that raised it
    Canonical(Box<CanonicalError>),
    /// Anything else
    Unclassified(Unclassified),
}

impl SourceError {
    /// Validation failure from a list of violations.
    pub fn validation(message: impl Into<String>, violations: Vec<Violation>) -> Self {
        SourceError::Validation(ValidationFailure::new(message, violations))
    }

    /// Remote service answered with an error status.
    pub fn remote_response(
        status: u16,
        message: impl Into<String>,
        method: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        SourceError::RemoteCall(RemoteCallFailure::Response {
            status,
            message: message.into(),
            method: method.into(),
            url: url.into(),
            body: None,
        })
    }

    /// Request sent, no response received.
    pub fn remote_no_response(
        method: impl Into<String>,
        url: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        SourceError::RemoteCall(RemoteCallFailure::NoResponse {
            method: method.into(),
            url: url.into(),
            message: message.into(),
        })
    }

    /// Request could not be sent.
    pub fn remote_setup(message: impl Into<String>) -> Self {
        SourceError::RemoteCall(RemoteCallFailure::Setup {
            message: message.into(),
        })
    }

    /// Auth-token service failure.
    pub fn auth(code: impl Into<String>, message: impl Into<String>) -> Self {
        SourceError::Auth(AuthFailure {
            code: code.into(),
            message: message.into(),
        })
    }

    /// Document-store failure.
    pub fn store(code: impl Into<String>, message: impl Into<String>) -> Self {
        SourceError::Store(StoreFailure {
            code: code.into(),
            message: message.into(),
        })
    }

    /// RPC failure.
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        SourceError::Rpc(RpcFailure {
            code,
            message: message.into(),
        })
    }

    /// Unclassified failure with just a message.
    pub fn unclassified(message: impl Into<String>) -> Self {
        SourceError::Unclassified(Unclassified {
            message: message.into(),
            stack: None,
            details: None,
        })
    }

    /// Wrap any `std::error::Error`, keeping its cause chain as the stack.
    pub fn from_std_error(error: &(dyn StdError + 'static)) -> Self {
        let mut chain = Vec::new();
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {}", cause));
            source = cause.source();
        }

        SourceError::Unclassified(Unclassified {
            message: error.to_string(),
            stack: if chain.is_empty() {
                None
            } else {
                Some(chain.join("\n"))
            },
            details: None,
        })
    }

    /// Classify an error that arrives as a JSON object.
    ///
    /// Signatures are checked in priority order, so an object carrying both a
    /// validation marker and a numeric `code` is a validation failure.
    ///
    /// A bare string or number is an unclassified error whose message is the
    /// value itself.
    pub fn from_json(value: &Value) -> Self {
        let message = match value {
            Value::Object(_) => str_field(value, "message").unwrap_or_default(),
            Value::String(text) => text.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };

        if let Some(failure) = validation_from_json(value, &message) {
            return SourceError::Validation(failure);
        }
        if let Some(failure) = remote_call_from_json(value, &message) {
            return SourceError::RemoteCall(failure);
        }
        if let Some(code) = str_field(value, "code") {
            if code.starts_with(AUTH_CODE_PREFIX) {
                return SourceError::auth(code, message);
            }
            if STORE_CODES.contains(&code.as_str()) {
                return SourceError::store(code, message);
            }
        }
        if let Some(code) = value.get("code").and_then(Value::as_i64) {
            return SourceError::rpc(code, message);
        }

        SourceError::Unclassified(Unclassified {
            message,
            stack: str_field(value, "stack"),
            details: value.get("details").cloned(),
        })
    }

    /// Short label of the variant, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Validation(_) => "validation",
            SourceError::RemoteCall(_) => "remote_call",
            SourceError::Auth(_) => "auth",
            SourceError::Store(_) => "store",
            SourceError::Rpc(_) => "rpc",
            SourceError::Canonical(_) => "canonical",
            SourceError::Unclassified(_) => "unclassified",
        }
    }

    /// Message carried by the source error.
    pub fn message(&self) -> String {
        match self {
            SourceError::Validation(v) => v.message.clone(),
            SourceError::RemoteCall(RemoteCallFailure::Response { message, .. })
            | SourceError::RemoteCall(RemoteCallFailure::NoResponse { message, .. })
            | SourceError::RemoteCall(RemoteCallFailure::Setup { message }) => message.clone(),
            SourceError::Auth(a) => a.message.clone(),
            SourceError::Store(s) => s.message.clone(),
            SourceError::Rpc(r) => r.message.clone(),
            SourceError::Canonical(c) => c.message().to_string(),
            SourceError::Unclassified(u) => u.message.clone(),
        }
    }

    /// Stack carried by the source error, if any.
    pub fn stack(&self) -> Option<&str> {
        match self {
            SourceError::Canonical(c) => c.stack(),
            SourceError::Unclassified(u) => u.stack.as_deref(),
            _ => None,
        }
    }
}

impl From<CanonicalError> for SourceError {
    fn from(error: CanonicalError) -> Self {
        SourceError::Canonical(Box::new(error))
    }
}

impl From<ValidationFailure> for SourceError {
    fn from(failure: ValidationFailure) -> Self {
        SourceError::Validation(failure)
    }
}

impl From<RemoteCallFailure> for SourceError {
    fn from(failure: RemoteCallFailure) -> Self {
        SourceError::RemoteCall(failure)
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(error: serde_json::Error) -> Self {
        SourceError::validation(
            "Malformed JSON body",
            vec![Violation::new(
                "body",
                Value::Null,
                error.to_string(),
                "json.parse",
            )],
        )
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind(), self.message())
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn validation_from_json(value: &Value, message: &str) -> Option<ValidationFailure> {
    let marked = value.get("isJoi").and_then(Value::as_bool) == Some(true)
        || value.get("name").and_then(Value::as_str) == Some("ValidationError");
    let entries = value
        .get("violations")
        .or_else(|| value.get("details"))
        .and_then(Value::as_array);

    if !marked && entries.is_none() {
        return None;
    }

    let violations = entries
        .map(|entries| entries.iter().map(violation_from_json).collect())
        .unwrap_or_default();

    let message = if message.is_empty() {
        "Validation failed".to_string()
    } else {
        message.to_string()
    };
    Some(ValidationFailure::new(message, violations))
}

fn violation_from_json(entry: &Value) -> Violation {
    let field = match entry.get("path").or_else(|| entry.get("field")) {
        Some(Value::Array(segments)) => segments
            .iter()
            .map(|s| match s {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("."),
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    let rejected_value = entry
        .get("context")
        .and_then(|c| c.get("value"))
        .or_else(|| entry.get("rejectedValue"))
        .or_else(|| entry.get("value"))
        .cloned()
        .unwrap_or(Value::Null);
    let violation_type = str_field(entry, "type")
        .or_else(|| str_field(entry, "violationType"))
        .unwrap_or_else(|| "unknown".to_string());

    Violation::new(
        field,
        rejected_value,
        str_field(entry, "message").unwrap_or_default(),
        violation_type,
    )
}

fn remote_call_from_json(value: &Value, message: &str) -> Option<RemoteCallFailure> {
    let response = value.get("response").filter(|r| r.is_object());
    let request = value.get("request").filter(|r| !r.is_null());
    let config = value.get("config").filter(|c| c.is_object());

    if response.is_none() && request.is_none() && config.is_none() {
        return None;
    }

    let method = config
        .and_then(|c| str_field(c, "method"))
        .map(|m| m.to_ascii_uppercase())
        .unwrap_or_else(|| "GET".to_string());
    let url = config
        .and_then(|c| str_field(c, "url"))
        .unwrap_or_default();

    if let Some(response) = response {
        let status = response
            .get("status")
            .and_then(Value::as_u64)
            .and_then(|s| u16::try_from(s).ok())
            .unwrap_or(500);
        let body = response.get("data").cloned();
        let remote_message = body
            .as_ref()
            .and_then(|d| str_field(d, "message"))
            .or_else(|| str_field(response, "statusText"))
            .unwrap_or_else(|| message.to_string());
        return Some(RemoteCallFailure::Response {
            status,
            message: remote_message,
            method,
            url,
            body,
        });
    }

    if request.is_some() {
        return Some(RemoteCallFailure::NoResponse {
            method,
            url,
            message: message.to_string(),
        });
    }

    Some(RemoteCallFailure::Setup {
        message: message.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validation_marker_beats_numeric_code() {
        let source = SourceError::from_json(&json!({
            "isJoi": true,
            "code": 3,
            "message": "bad",
            "details": [{"path": ["title"], "message": "required", "type": "any.required"}]
        }));
        match source {
            SourceError::Validation(v) => {
                assert_eq!(v.violations.len(), 1);
                assert_eq!(v.violations[0].field, "title");
                assert_eq!(v.violations[0].violation_type, "any.required");
            }
            other => panic!("expected validation, got {:?}", other),
        }
    }

    #[test]
    fn test_remote_call_sub_cases() {
        let response = SourceError::from_json(&json!({
            "message": "Request failed",
            "config": {"method": "get", "url": "https://api.example.com/books"},
            "request": {},
            "response": {"status": 404, "data": {"message": "No such book"}}
        }));
        assert_eq!(
            response,
            SourceError::RemoteCall(RemoteCallFailure::Response {
                status: 404,
                message: "No such book".into(),
                method: "GET".into(),
                url: "https://api.example.com/books".into(),
                body: Some(json!({"message": "No such book"})),
            })
        );

        let no_response = SourceError::from_json(&json!({
            "message": "timeout of 5000ms exceeded",
            "config": {"method": "post", "url": "https://api.example.com"},
            "request": {}
        }));
        assert!(matches!(
            no_response,
            SourceError::RemoteCall(RemoteCallFailure::NoResponse { .. })
        ));

        let setup = SourceError::from_json(&json!({
            "message": "Invalid URL",
            "config": {"url": "::"}
        }));
        assert!(matches!(
            setup,
            SourceError::RemoteCall(RemoteCallFailure::Setup { .. })
        ));
    }

    #[test]
    fn test_auth_store_rpc_and_unclassified() {
        assert!(matches!(
            SourceError::from_json(&json!({"code": "auth/id-token-expired", "message": "x"})),
            SourceError::Auth(_)
        ));
        assert!(matches!(
            SourceError::from_json(&json!({"code": "permission-denied", "message": "x"})),
            SourceError::Store(_)
        ));
        assert!(matches!(
            SourceError::from_json(&json!({"code": 14, "message": "x"})),
            SourceError::Rpc(RpcFailure { code: 14, .. })
        ));
        assert!(matches!(
            SourceError::from_json(&json!({"code": "weird", "message": "x"})),
            SourceError::Unclassified(_)
        ));
        assert!(matches!(
            SourceError::from_json(&json!("just a string")),
            SourceError::Unclassified(_)
        ));
    }

    #[test]
    fn test_bare_values_keep_their_text() {
        let source = SourceError::from_json(&json!("socket hang up"));
        assert_eq!(source.kind(), "unclassified");
        assert_eq!(source.message(), "socket hang up");

        assert_eq!(SourceError::from_json(&json!(42)).message(), "42");
        assert_eq!(SourceError::from_json(&Value::Null).message(), "");
    }

    #[test]
    fn test_from_std_error_keeps_chain() {
        #[derive(Debug)]
        struct Outer(std::io::Error);
        impl fmt::Display for Outer {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "loading failed")
            }
        }
        impl StdError for Outer {
            fn source(&self) -> Option<&(dyn StdError + 'static)> {
                Some(&self.0)
            }
        }

        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"));
        match SourceError::from_std_error(&err) {
            SourceError::Unclassified(u) => {
                assert_eq!(u.message, "loading failed");
                assert_eq!(u.stack.as_deref(), Some("caused by: disk gone"));
            }
            other => panic!("expected unclassified, got {:?}", other),
        }
    }

    #[test]
    fn test_json_parse_error_is_validation() {
        let err = serde_json::from_str::<Value>("{").unwrap_err();
        assert!(matches!(SourceError::from(err), SourceError::Validation(_)));
    }
}
