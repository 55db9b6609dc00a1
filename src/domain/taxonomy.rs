//! Static error taxonomy: status codes, two-level categories and stable
//! error-code tokens.
//!
//! Everything here is pure data plus one lookup function,
//! [`category_for_status`]. A category is rendered as `Domain.Kind`
//! (for example `ClientError.Validation`) and is always resolvable.

use serde::{Serialize, Serializer};
use std::fmt;

/// HTTP status codes used by the classification tables.
pub mod status {
    /// 400 Bad Request
    pub const BAD_REQUEST: u16 = 400;
    /// 401 Unauthorized
    pub const UNAUTHORIZED: u16 = 401;
    /// 403 Forbidden
    pub const FORBIDDEN: u16 = 403;
    /// 404 Not Found
    pub const NOT_FOUND: u16 = 404;
    /// 409 Conflict
    pub const CONFLICT: u16 = 409;
    /// 422 Unprocessable Entity
    pub const UNPROCESSABLE_ENTITY: u16 = 422;
    /// 429 Too Many Requests
    pub const TOO_MANY_REQUESTS: u16 = 429;
    /// 499 Client Closed Request
    pub const CLIENT_CLOSED_REQUEST: u16 = 499;
    /// 500 Internal Server Error
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    /// 501 Not Implemented
    pub const NOT_IMPLEMENTED: u16 = 501;
    /// 502 Bad Gateway
    pub const BAD_GATEWAY: u16 = 502;
    /// 503 Service Unavailable
    pub const SERVICE_UNAVAILABLE: u16 = 503;
    /// 504 Gateway Timeout
    pub const GATEWAY_TIMEOUT: u16 = 504;

    /// Lowest status code a canonical error may carry.
    pub const MIN: u16 = 100;
    /// Highest status code a canonical error may carry.
    pub const MAX: u16 = 599;

    /// Check whether a status code lies in the representable 100..=599 range.
    pub fn is_valid(code: u16) -> bool {
        (MIN..=MAX).contains(&code)
    }
}

/// First level of a category: which side of the exchange failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Domain {
    /// The request was at fault
    ClientError,
    /// The server or one of its dependencies was at fault
    ServerError,
}

impl Domain {
    /// Stable label of the domain.
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::ClientError => "ClientError",
            Domain::ServerError => "ServerError",
        }
    }
}

/// Two-level failure category, rendered as `Domain.Kind`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Malformed request that is not a field-level validation failure
    BadRequest,
    /// Input failed validation
    Validation,
    /// Caller could not be authenticated
    Authentication,
    /// Caller is authenticated but not allowed
    Authorization,
    /// Requested resource does not exist
    NotFound,
    /// Request conflicts with current resource state
    Conflict,
    /// Caller exceeded a quota
    RateLimit,
    /// Unexpected failure inside the service
    Internal,
    /// Document store failure
    Database,
    /// Outbound HTTP dependency failure
    ExternalApi,
    /// Service or dependency temporarily unavailable
    Unavailable,
    /// Failure that could not be classified
    #[default]
    Unknown,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Category; 12] = [
        Category::BadRequest,
        Category::Validation,
        Category::Authentication,
        Category::Authorization,
        Category::NotFound,
        Category::Conflict,
        Category::RateLimit,
        Category::Internal,
        Category::Database,
        Category::ExternalApi,
        Category::Unavailable,
        Category::Unknown,
    ];

    /// The first level of this category.
    pub fn domain(&self) -> Domain {
        match self {
            Category::BadRequest
            | Category::Validation
            | Category::Authentication
            | Category::Authorization
            | Category::NotFound
            | Category::Conflict
            | Category::RateLimit => Domain::ClientError,
            Category::Internal
            | Category::Database
            | Category::ExternalApi
            | Category::Unavailable
            | Category::Unknown => Domain::ServerError,
        }
    }

    /// The second level of this category.
    pub fn kind(&self) -> &'static str {
        match self {
            Category::BadRequest => "BadRequest",
            Category::Validation => "Validation",
            Category::Authentication => "Authentication",
            Category::Authorization => "Authorization",
            Category::NotFound => "NotFound",
            Category::Conflict => "Conflict",
            Category::RateLimit => "RateLimit",
            Category::Internal => "Internal",
            Category::Database => "Database",
            Category::ExternalApi => "ExternalAPI",
            Category::Unavailable => "Unavailable",
            Category::Unknown => "Unknown",
        }
    }

    /// Full `Domain.Kind` label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::BadRequest => "ClientError.BadRequest",
            Category::Validation => "ClientError.Validation",
            Category::Authentication => "ClientError.Authentication",
            Category::Authorization => "ClientError.Authorization",
            Category::NotFound => "ClientError.NotFound",
            Category::Conflict => "ClientError.Conflict",
            Category::RateLimit => "ClientError.RateLimit",
            Category::Internal => "ServerError.Internal",
            Category::Database => "ServerError.Database",
            Category::ExternalApi => "ServerError.ExternalAPI",
            Category::Unavailable => "ServerError.Unavailable",
            Category::Unknown => "ServerError.Unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Category {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Look up the category for an HTTP status code.
///
/// Unmapped codes, including codes outside 100..=599, resolve to
/// [`Category::Unknown`].
pub fn category_for_status(code: u16) -> Category {
    match code {
        400 | 405 | 406 | 413 | 414 | 415 => Category::BadRequest,
        401 => Category::Authentication,
        403 => Category::Authorization,
        404 | 410 => Category::NotFound,
        408 => Category::ExternalApi,
        409 => Category::Conflict,
        422 => Category::Validation,
        429 => Category::RateLimit,
        500 | 501 => Category::Internal,
        502 | 504 => Category::ExternalApi,
        503 => Category::Unavailable,
        _ => Category::Unknown,
    }
}

/// Machine-readable, stable error code.
///
/// Each variant renders as a `SCREAMING_SNAKE_CASE` token that does not
/// change across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ErrorCode {
    /// Nothing more specific is known.
    #[default]
    UnknownError,
    /// Input failed validation.
    InvalidInput,

    // -- Outbound HTTP --
    /// Remote service answered with an error status.
    ApiResponseError,
    /// Request was sent but no response arrived.
    ApiTimeout,
    /// Request could not be sent at all.
    ApiRequestFailed,

    // -- Auth tokens --
    /// Token has expired.
    TokenExpired,
    /// Token has been revoked.
    TokenRevoked,
    /// Token is malformed or has a bad signature.
    InvalidToken,
    /// Account is disabled.
    UserDisabled,
    /// Account does not exist.
    UserNotFound,
    /// Caller lacks the required permission.
    InsufficientPermission,
    /// Email address is already registered.
    EmailAlreadyExists,
    /// Too many auth attempts.
    TooManyRequests,
    /// Auth failure without a more specific code.
    AuthFailed,

    // -- Store / RPC --
    /// Access denied by the store.
    PermissionDenied,
    /// Argument rejected by the store.
    InvalidArgument,
    /// Precondition of the operation not met.
    FailedPrecondition,
    /// Value out of accepted range.
    OutOfRange,
    /// Document or resource missing.
    ResourceNotFound,
    /// Document or resource already exists.
    ResourceAlreadyExists,
    /// Transaction aborted due to contention.
    TransactionAborted,
    /// Quota exhausted.
    RateLimitExceeded,
    /// Caller not authenticated.
    Unauthenticated,
    /// Dependency unavailable.
    ServiceUnavailable,
    /// Deadline exceeded.
    Timeout,
    /// Operation cancelled by the caller.
    RequestCancelled,
    /// Operation not implemented.
    NotImplemented,
    /// Internal failure reported by a dependency.
    InternalError,
    /// Unrecoverable data loss.
    DataLoss,
    /// Store failure without a more specific code.
    DatabaseError,
}

impl ErrorCode {
    /// Stable token of the code (e.g. `"INVALID_INPUT"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::ApiResponseError => "API_RESPONSE_ERROR",
            ErrorCode::ApiTimeout => "API_TIMEOUT",
            ErrorCode::ApiRequestFailed => "API_REQUEST_FAILED",
            ErrorCode::TokenExpired => "TOKEN_EXPIRED",
            ErrorCode::TokenRevoked => "TOKEN_REVOKED",
            ErrorCode::InvalidToken => "INVALID_TOKEN",
            ErrorCode::UserDisabled => "USER_DISABLED",
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::InsufficientPermission => "INSUFFICIENT_PERMISSION",
            ErrorCode::EmailAlreadyExists => "EMAIL_ALREADY_EXISTS",
            ErrorCode::TooManyRequests => "TOO_MANY_REQUESTS",
            ErrorCode::AuthFailed => "AUTH_FAILED",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::FailedPrecondition => "FAILED_PRECONDITION",
            ErrorCode::OutOfRange => "OUT_OF_RANGE",
            ErrorCode::ResourceNotFound => "RESOURCE_NOT_FOUND",
            ErrorCode::ResourceAlreadyExists => "RESOURCE_ALREADY_EXISTS",
            ErrorCode::TransactionAborted => "TRANSACTION_ABORTED",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::Unauthenticated => "UNAUTHENTICATED",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::RequestCancelled => "REQUEST_CANCELLED",
            ErrorCode::NotImplemented => "NOT_IMPLEMENTED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::DataLoss => "DATA_LOSS",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
