//! Client-facing error envelope.

use crate::application::entry::Environment;
use crate::domain::canonical::CanonicalError;
use crate::domain::factory::StackFilter;
use crate::domain::sanitize::sanitize_details;
use crate::domain::taxonomy::{status, Category, ErrorCode};
use serde::Serialize;
use serde_json::Value;

/// Message of the generic fallback body.
pub const FALLBACK_MESSAGE: &str = "Internal Server Error";

/// JSON body sent to the client for a failed request.
///
/// `stack` and `details` are only present outside production. `requestId` is
/// always present and serialized as `null` when unknown.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub message: String,
    pub status_code: u16,
    pub error_code: ErrorCode,
    pub category: Category,
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ErrorResponse {
    /// Envelope for `error`. Details pass through the sanitizer.
    pub fn from_error(error: &CanonicalError, environment: Environment, filter: &StackFilter) -> Self {
        let debug = !environment.is_production();
        Self {
            message: error.message().to_string(),
            status_code: error.status_code(),
            error_code: error.error_code(),
            category: error.category(),
            request_id: error.request_id().map(str::to_string),
            stack: error.stack().filter(|_| debug).map(str::to_string),
            details: if debug {
                sanitize_details(error.details(), filter)
            } else {
                None
            },
        }
    }

    /// Minimal 500 body used when the error handler itself fails.
    pub fn fallback(request_id: Option<&str>) -> Self {
        Self {
            message: FALLBACK_MESSAGE.to_string(),
            status_code: status::INTERNAL_SERVER_ERROR,
            error_code: ErrorCode::UnknownError,
            category: Category::Unknown,
            request_id: request_id.map(str::to_string),
            stack: None,
            details: None,
        }
    }

    /// Serialize to a JSON value.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
