//! Sanitizing of error payloads before they are serialized.
//!
//! Payloads are owned `serde_json::Value` trees, so reference cycles cannot
//! exist. What can exist is arbitrarily deep nesting and embedded
//! `originalError` objects carrying unfiltered stacks. Both are bounded here:
//!
//! - containers nested deeper than [`MAX_DEPTH`] become [`TRUNCATED`]
//! - every `originalError` key is replaced by `{message, stack}` with the
//!   stack filtered
//!
//! Sanitizing is idempotent.

use crate::domain::canonical::Violation;
use crate::domain::factory::StackFilter;
use crate::domain::source::{RemoteCallFailure, SourceError};
use serde_json::{Map, Value};

/// Maximum container depth kept by [`sanitize_value`].
pub const MAX_DEPTH: usize = 16;

/// Placeholder for containers beyond [`MAX_DEPTH`].
pub const TRUNCATED: &str = "[Truncated]";

const ORIGINAL_ERROR_KEY: &str = "originalError";

/// Sanitize a JSON value.
pub fn sanitize_value(value: &Value, filter: &StackFilter) -> Value {
    sanitize_at(value, filter, 0)
}

/// Sanitize optional details.
pub fn sanitize_details(details: Option<&Value>, filter: &StackFilter) -> Option<Value> {
    details.map(|d| sanitize_value(d, filter))
}

fn sanitize_at(value: &Value, filter: &StackFilter, depth: usize) -> Value {
    match value {
        Value::Array(_) | Value::Object(_) if depth >= MAX_DEPTH => {
            Value::String(TRUNCATED.to_string())
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| sanitize_at(item, filter, depth + 1))
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, item) in map {
                let sanitized = if key == ORIGINAL_ERROR_KEY {
                    sanitize_original(item, filter)
                } else {
                    sanitize_at(item, filter, depth + 1)
                };
                out.insert(key.clone(), sanitized);
            }
            Value::Object(out)
        }
        scalar => scalar.clone(),
    }
}

fn sanitize_original(value: &Value, filter: &StackFilter) -> Value {
    let (message, stack) = match value {
        Value::Null => return Value::Null,
        Value::String(s) => (s.clone(), None),
        Value::Object(map) => {
            let message = match map.get("message") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            };
            let stack = map
                .get("stack")
                .and_then(Value::as_str)
                .and_then(|s| filter.filter(s));
            (message, stack)
        }
        other => (other.to_string(), None),
    };

    let mut out = Map::new();
    out.insert("message".to_string(), Value::String(message));
    if let Some(stack) = stack {
        out.insert("stack".to_string(), Value::String(stack));
    }
    Value::Object(out)
}

impl SourceError {
    /// Sanitize every payload the source error carries.
    ///
    /// Stacks are filtered and JSON payloads pass through [`sanitize_value`].
    pub fn sanitized(self, filter: &StackFilter) -> SourceError {
        match self {
            SourceError::Validation(mut failure) => {
                failure.violations = failure
                    .violations
                    .into_iter()
                    .map(|v| {
                        Violation::new(
                            v.field,
                            sanitize_value(&v.rejected_value, filter),
                            v.message,
                            v.violation_type,
                        )
                    })
                    .collect();
                SourceError::Validation(failure)
            }
            SourceError::RemoteCall(RemoteCallFailure::Response {
                status,
                message,
                method,
                url,
                body,
            }) => SourceError::RemoteCall(RemoteCallFailure::Response {
                status,
                message,
                method,
                url,
                body: sanitize_details(body.as_ref(), filter),
            }),
            SourceError::Canonical(mut canonical) => {
                canonical.details = sanitize_details(canonical.details.as_ref(), filter);
                canonical.stack = canonical.stack.as_deref().and_then(|s| filter.filter(s));
                if let Some(original) = canonical.original_error.as_mut() {
                    original.stack = original.stack.as_deref().and_then(|s| filter.filter(s));
                }
                SourceError::Canonical(canonical)
            }
            SourceError::Unclassified(mut unclassified) => {
                unclassified.details = sanitize_details(unclassified.details.as_ref(), filter);
                unclassified.stack = unclassified
                    .stack
                    .as_deref()
                    .and_then(|s| filter.filter(s));
                SourceError::Unclassified(unclassified)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nested(depth: usize) -> Value {
        let mut value = json!("leaf");
        for _ in 0..depth {
            value = json!({ "next": value });
        }
        value
    }

    #[test]
    fn test_original_error_replaced() {
        let filter = StackFilter::new();
        let details = json!({
            "book": "b-1",
            "originalError": {
                "message": "inner",
                "stack": "   0: app::run\n   1: std::rt::lang_start\n             at /rustc/x/rt.rs:1:1",
                "config": {"headers": {"authorization": "secret"}}
            }
        });
        let out = sanitize_value(&details, &filter);
        assert_eq!(out["book"], "b-1");
        assert_eq!(out["originalError"]["message"], "inner");
        assert_eq!(out["originalError"]["stack"], "   0: app::run");
        assert!(out["originalError"].get("config").is_none());
    }

    #[test]
    fn test_nested_original_errors() {
        let filter = StackFilter::new();
        let details = json!([{"originalError": "plain"}, {"x": {"originalError": null}}]);
        let out = sanitize_value(&details, &filter);
        assert_eq!(out[0]["originalError"], json!({"message": "plain"}));
        assert_eq!(out[1]["x"]["originalError"], Value::Null);
    }

    #[test]
    fn test_depth_bound() {
        let filter = StackFilter::new();
        let out = sanitize_value(&nested(40), &filter);
        let mut cursor = &out;
        let mut levels = 0;
        while let Some(next) = cursor.get("next") {
            cursor = next;
            levels += 1;
        }
        assert_eq!(levels, MAX_DEPTH);
        assert_eq!(cursor, &json!(TRUNCATED));
    }

    #[test]
    fn test_idempotent() {
        let filter = StackFilter::new();
        let details = json!({
            "deep": nested(30),
            "originalError": {"message": "m", "stack": "Error: m\n   0: app::f", "extra": 1}
        });
        let once = sanitize_value(&details, &filter);
        let twice = sanitize_value(&once, &filter);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_sanitized_source_filters_stack() {
        let filter = StackFilter::new();
        let source = SourceError::Unclassified(crate::domain::source::Unclassified {
            message: "m".into(),
            stack: Some("   0: std::rt::lang_start".into()),
            details: Some(json!({"originalError": {"message": "x"}})),
        });
        match source.sanitized(&filter) {
            SourceError::Unclassified(u) => {
                assert_eq!(u.stack, None);
                assert_eq!(u.details.unwrap()["originalError"], json!({"message": "x"}));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
