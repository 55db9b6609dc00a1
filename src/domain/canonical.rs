//! The canonical error shape every source error is normalized into.

use crate::domain::taxonomy::{Category, ErrorCode};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Copy of a source error: its message and filtered stack, nothing else.
///
/// Never holds a reference to the live error it was taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OriginalError {
    /// Message of the source error
    pub message: String,
    /// Stack of the source error with dependency frames removed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl OriginalError {
    /// Create a snapshot.
    pub fn new(message: impl Into<String>, stack: Option<String>) -> Self {
        Self {
            message: message.into(),
            stack,
        }
    }
}

/// One field-level validation violation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Dotted path of the offending field
    pub field: String,
    /// The value that was rejected
    pub rejected_value: Value,
    /// Human-readable description
    pub message: String,
    /// Machine-readable rule name (e.g. `string.min`)
    pub violation_type: String,
}

impl Violation {
    /// Create a violation.
    pub fn new(
        field: impl Into<String>,
        rejected_value: Value,
        message: impl Into<String>,
        violation_type: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            rejected_value,
            message: message.into(),
            violation_type: violation_type.into(),
        }
    }
}

/// Normalized representation of a failure.
///
/// Built by [`ErrorFactory`](crate::domain::factory::ErrorFactory). After
/// construction the only permitted change is [`fill_absent`](Self::fill_absent),
/// which never overwrites a field that is already set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalError {
    pub(crate) message: String,
    pub(crate) status_code: u16,
    pub(crate) error_code: ErrorCode,
    pub(crate) category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) details: Option<Value>,
    pub(crate) request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) original_error: Option<OriginalError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) stack: Option<String>,
}

impl CanonicalError {
    /// Human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status, always within 100..=599.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Stable error-code token.
    pub fn error_code(&self) -> ErrorCode {
        self.error_code
    }

    /// Two-level category.
    pub fn category(&self) -> Category {
        self.category
    }

    /// Structured details, if any.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }

    /// Correlation id of the request that failed.
    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    /// Snapshot of the error this one was synthesized from.
    pub fn original_error(&self) -> Option<&OriginalError> {
        self.original_error.as_ref()
    }

    /// Filtered stack.
    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    /// Fill the request id and details if they are not yet set.
    ///
    /// Fields that already carry a value are left untouched.
    pub fn fill_absent(&mut self, request_id: Option<&str>, details: Option<Value>) {
        if self.request_id.is_none() {
            self.request_id = request_id.map(str::to_string);
        }
        if self.details.is_none() {
            self.details = details;
        }
    }

    /// Builder-style variant of [`fill_absent`](Self::fill_absent).
    pub fn with_request_id(mut self, request_id: Option<&str>) -> Self {
        self.fill_absent(request_id, None);
        self
    }
}

impl fmt::Display for CanonicalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {}] {}",
            self.status_code, self.error_code, self.message
        )
    }
}

impl std::error::Error for CanonicalError {}
