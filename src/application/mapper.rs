//! Classification of source errors into canonical errors.
//!
//! [`classify`] is a pure function of the source error. [`ErrorMapper`]
//! builds the full [`CanonicalError`] on top of it, and the three projections
//! return a single field of the same classification.

use crate::domain::canonical::CanonicalError;
use crate::domain::factory::{CreateOptions, ErrorFactory};
use crate::domain::source::{
    AuthFailure, RemoteCallFailure, RpcFailure, SourceError, StoreFailure, ValidationFailure,
};
use crate::domain::taxonomy::{category_for_status, status, Category, ErrorCode};
use serde_json::{json, Map, Value};

/// Status, code and category assigned to a source error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// HTTP status
    pub status_code: u16,
    /// Stable error-code token
    pub error_code: ErrorCode,
    /// Two-level category
    pub category: Category,
}

impl Classification {
    fn from_status(status_code: u16, error_code: ErrorCode) -> Self {
        Self {
            status_code,
            error_code,
            category: category_for_status(status_code),
        }
    }

    fn unknown() -> Self {
        Self {
            status_code: status::INTERNAL_SERVER_ERROR,
            error_code: ErrorCode::UnknownError,
            category: Category::Unknown,
        }
    }
}

/// Classify a source error.
pub fn classify(source: &SourceError) -> Classification {
    match source {
        SourceError::Validation(_) => Classification {
            status_code: status::BAD_REQUEST,
            error_code: ErrorCode::InvalidInput,
            category: Category::Validation,
        },
        SourceError::RemoteCall(failure) => classify_remote(failure),
        SourceError::Auth(failure) => classify_auth(failure),
        SourceError::Store(failure) => classify_store(failure),
        SourceError::Rpc(failure) => classify_rpc(failure),
        SourceError::Canonical(error) => Classification {
            status_code: error.status_code(),
            error_code: error.error_code(),
            category: error.category(),
        },
        SourceError::Unclassified(_) => Classification::unknown(),
    }
}

fn classify_remote(failure: &RemoteCallFailure) -> Classification {
    match failure {
        RemoteCallFailure::Response { status: code, .. } => {
            // A remote answer that is not an error status still failed this call.
            let code = if (400..=status::MAX).contains(code) {
                *code
            } else {
                status::BAD_GATEWAY
            };
            Classification::from_status(code, ErrorCode::ApiResponseError)
        }
        RemoteCallFailure::NoResponse { .. } => Classification {
            status_code: status::SERVICE_UNAVAILABLE,
            error_code: ErrorCode::ApiTimeout,
            category: Category::ExternalApi,
        },
        RemoteCallFailure::Setup { .. } => {
            Classification::from_status(status::INTERNAL_SERVER_ERROR, ErrorCode::ApiRequestFailed)
        }
    }
}

fn classify_auth(failure: &AuthFailure) -> Classification {
    let (error_code, status_code) = match failure.code.as_str() {
        "auth/id-token-expired" => (ErrorCode::TokenExpired, status::UNAUTHORIZED),
        "auth/id-token-revoked" => (ErrorCode::TokenRevoked, status::UNAUTHORIZED),
        "auth/invalid-id-token" | "auth/argument-error" => {
            (ErrorCode::InvalidToken, status::UNAUTHORIZED)
        }
        "auth/user-disabled" => (ErrorCode::UserDisabled, status::FORBIDDEN),
        "auth/user-not-found" => (ErrorCode::UserNotFound, status::NOT_FOUND),
        "auth/insufficient-permission" => (ErrorCode::InsufficientPermission, status::FORBIDDEN),
        "auth/email-already-exists" => (ErrorCode::EmailAlreadyExists, status::CONFLICT),
        "auth/too-many-requests" => (ErrorCode::TooManyRequests, status::TOO_MANY_REQUESTS),
        _ => (ErrorCode::AuthFailed, status::UNAUTHORIZED),
    };
    Classification {
        status_code,
        error_code,
        category: Category::Authentication,
    }
}

fn classify_store(failure: &StoreFailure) -> Classification {
    match failure.code.as_str() {
        "permission-denied" => Classification {
            status_code: status::FORBIDDEN,
            error_code: ErrorCode::PermissionDenied,
            category: Category::Authorization,
        },
        "invalid-argument" => Classification {
            status_code: status::BAD_REQUEST,
            error_code: ErrorCode::InvalidArgument,
            category: Category::Validation,
        },
        "failed-precondition" => Classification {
            status_code: status::BAD_REQUEST,
            error_code: ErrorCode::FailedPrecondition,
            category: Category::Validation,
        },
        "not-found" => Classification::from_status(status::NOT_FOUND, ErrorCode::ResourceNotFound),
        "already-exists" => {
            Classification::from_status(status::CONFLICT, ErrorCode::ResourceAlreadyExists)
        }
        "aborted" => Classification::from_status(status::CONFLICT, ErrorCode::TransactionAborted),
        "resource-exhausted" => {
            Classification::from_status(status::TOO_MANY_REQUESTS, ErrorCode::RateLimitExceeded)
        }
        "unauthenticated" => {
            Classification::from_status(status::UNAUTHORIZED, ErrorCode::Unauthenticated)
        }
        "unavailable" => {
            Classification::from_status(status::SERVICE_UNAVAILABLE, ErrorCode::ServiceUnavailable)
        }
        "deadline-exceeded" => {
            Classification::from_status(status::GATEWAY_TIMEOUT, ErrorCode::Timeout)
        }
        _ => Classification::from_status(status::INTERNAL_SERVER_ERROR, ErrorCode::DatabaseError),
    }
}

fn classify_rpc(failure: &RpcFailure) -> Classification {
    let (status_code, error_code) = match failure.code {
        1 => (status::CLIENT_CLOSED_REQUEST, ErrorCode::RequestCancelled),
        2 => (status::INTERNAL_SERVER_ERROR, ErrorCode::UnknownError),
        3 => (status::BAD_REQUEST, ErrorCode::InvalidArgument),
        4 => (status::GATEWAY_TIMEOUT, ErrorCode::Timeout),
        5 => (status::NOT_FOUND, ErrorCode::ResourceNotFound),
        6 => (status::CONFLICT, ErrorCode::ResourceAlreadyExists),
        7 => (status::FORBIDDEN, ErrorCode::PermissionDenied),
        8 => (status::TOO_MANY_REQUESTS, ErrorCode::RateLimitExceeded),
        9 => (status::BAD_REQUEST, ErrorCode::FailedPrecondition),
        10 => (status::CONFLICT, ErrorCode::TransactionAborted),
        11 => (status::BAD_REQUEST, ErrorCode::OutOfRange),
        12 => (status::NOT_IMPLEMENTED, ErrorCode::NotImplemented),
        13 => (status::INTERNAL_SERVER_ERROR, ErrorCode::InternalError),
        14 => (status::SERVICE_UNAVAILABLE, ErrorCode::ServiceUnavailable),
        15 => (status::INTERNAL_SERVER_ERROR, ErrorCode::DataLoss),
        16 => (status::UNAUTHORIZED, ErrorCode::Unauthenticated),
        _ => (status::INTERNAL_SERVER_ERROR, ErrorCode::UnknownError),
    };
    Classification::from_status(status_code, error_code)
}

/// Turns source errors into canonical errors.
///
/// The default mapper does not capture backtraces: a backtrace taken here
/// would show the error pipeline, not the code that failed. Pass a factory
/// with capture enabled to [`ErrorMapper::new`] to opt back in.
#[derive(Debug, Clone)]
pub struct ErrorMapper {
    factory: ErrorFactory,
}

impl Default for ErrorMapper {
    fn default() -> Self {
        Self::new(ErrorFactory::new().with_backtrace_capture(false))
    }
}

impl ErrorMapper {
    /// Mapper using `factory` to build canonical errors.
    pub fn new(factory: ErrorFactory) -> Self {
        Self { factory }
    }

    /// The factory in use.
    pub fn factory(&self) -> &ErrorFactory {
        &self.factory
    }

    /// Map a source error to a canonical error.
    ///
    /// Already-canonical errors are returned unchanged. Unclassified errors
    /// go through [`ErrorFactory::create_unknown`].
    pub fn map(&self, source: &SourceError) -> CanonicalError {
        let classification = classify(source);
        let (message, details) = match source {
            SourceError::Canonical(error) => return error.as_ref().clone(),
            SourceError::Unclassified(unclassified) => {
                let mut error = self.factory.create_unknown(
                    &unclassified.message,
                    unclassified.stack.as_deref(),
                    None,
                );
                error.fill_absent(None, unclassified.details.clone());
                return error;
            }
            SourceError::Validation(failure) => validation_message(failure),
            SourceError::RemoteCall(failure) => remote_message(failure),
            SourceError::Auth(failure) => (
                non_empty(&failure.message, "Authentication failed"),
                Some(json!({ "code": failure.code })),
            ),
            SourceError::Store(failure) => (
                non_empty(&failure.message, "Database operation failed"),
                Some(json!({ "code": failure.code })),
            ),
            SourceError::Rpc(failure) => (
                non_empty(&failure.message, "Remote procedure call failed"),
                Some(json!({ "code": failure.code })),
            ),
        };

        let mut options = CreateOptions::default()
            .category(classification.category)
            .original(source.message(), source.stack().map(str::to_string));
        options.stack = source.stack().map(str::to_string);

        self.factory.create(
            message,
            Some(classification.status_code),
            Some(classification.error_code),
            details,
            options,
        )
    }

    /// Category only.
    pub fn category_of(&self, source: &SourceError) -> Category {
        classify(source).category
    }

    /// Error code only.
    pub fn error_code_of(&self, source: &SourceError) -> ErrorCode {
        classify(source).error_code
    }

    /// Status only.
    pub fn status_of(&self, source: &SourceError) -> u16 {
        classify(source).status_code
    }
}

fn non_empty(message: &str, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message.to_string()
    }
}

fn validation_message(failure: &ValidationFailure) -> (String, Option<Value>) {
    let summary = if failure.violations.is_empty() {
        non_empty(&failure.message, "invalid input")
    } else {
        failure
            .violations
            .iter()
            .map(|v| v.message.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let details = failure
        .violations
        .iter()
        .map(|v| serde_json::to_value(v).unwrap_or(Value::Null))
        .collect();
    (
        format!("Validation failed: {}", summary),
        Some(Value::Array(details)),
    )
}

fn remote_message(failure: &RemoteCallFailure) -> (String, Option<Value>) {
    match failure {
        RemoteCallFailure::Response {
            status,
            message,
            method,
            url,
            body,
        } => {
            let mut details = Map::new();
            details.insert("remoteStatus".into(), json!(status));
            details.insert("method".into(), json!(method));
            details.insert("url".into(), json!(url));
            if let Some(body) = body {
                details.insert("response".into(), body.clone());
            }
            (
                format!(
                    "External API error: {} ({} {})",
                    non_empty(message, "request failed"),
                    method,
                    url
                ),
                Some(Value::Object(details)),
            )
        }
        RemoteCallFailure::NoResponse {
            method,
            url,
            message,
        } => (
            format!("No response from external API ({} {})", method, url),
            Some(json!({ "method": method, "url": url, "reason": message })),
        ),
        RemoteCallFailure::Setup { message } => (
            format!(
                "External API request failed: {}",
                non_empty(message, "request could not be sent")
            ),
            None,
        ),
    }
}
