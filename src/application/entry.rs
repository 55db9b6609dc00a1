//! Structured log entries and the request context they are built from.

use crate::domain::canonical::{CanonicalError, OriginalError};
use crate::domain::severity::{severity_for_category, Severity};
use crate::domain::taxonomy::{Category, ErrorCode};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Deployment environment.
///
/// Production hides stacks, details and request bodies from clients and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Environment {
    /// Live deployment
    Production,
    /// Local development
    #[default]
    Development,
    /// Test runs
    Test,
}

impl Environment {
    /// Parse an environment name.
    ///
    /// `production` and `prod` select production, `test` selects test and
    /// anything else is development.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }

    /// Whether this is production.
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    /// Lower-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "production",
            Environment::Development => "development",
            Environment::Test => "test",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only view of the failing request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    /// Correlation id assigned upstream
    pub id: Option<String>,
    /// URL as originally requested
    pub original_url: String,
    /// HTTP method
    pub method: String,
    /// Client address
    pub ip: Option<String>,
    /// Authenticated user id
    pub user_id: Option<String>,
    /// Parsed request body
    pub body: Option<Value>,
}

impl RequestContext {
    /// Context for a method and URL.
    pub fn new(method: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            original_url: original_url.into(),
            ..Self::default()
        }
    }

    /// Set the correlation id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the client address.
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Set the authenticated user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Set the request body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// One entry written to the log transport.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// Derived from the category
    pub severity: Severity,
    pub message: String,
    pub status_code: u16,
    pub category: Category,
    pub error_code: ErrorCode,
    pub request_id: Option<String>,
    pub url: String,
    pub method: String,
    pub ip: Option<String>,
    pub user_id: Option<String>,
    /// RFC 3339 with millisecond precision
    pub timestamp: String,
    pub environment: Environment,
    /// Only set outside production
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_error: Option<OriginalError>,
}

impl LogEntry {
    /// Build the entry for an error occurring in a request.
    ///
    /// The request body is only attached outside production.
    pub fn for_error(
        error: &CanonicalError,
        context: &RequestContext,
        environment: Environment,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            severity: severity_for_category(error.category()),
            message: error.message().to_string(),
            status_code: error.status_code(),
            category: error.category(),
            error_code: error.error_code(),
            request_id: error
                .request_id()
                .map(str::to_string)
                .or_else(|| context.id.clone()),
            url: context.original_url.clone(),
            method: context.method.clone(),
            ip: context.ip.clone(),
            user_id: context.user_id.clone(),
            timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            environment,
            request_body: if environment.is_production() {
                None
            } else {
                context.body.clone()
            },
            original_error: error.original_error().cloned(),
        }
    }
}

impl Serialize for Environment {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
