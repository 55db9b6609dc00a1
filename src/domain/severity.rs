//! Log severity derived from a failure's category.

use crate::domain::taxonomy::Category;
use serde::{Serialize, Serializer};
use std::fmt;

/// Severity attached to a log entry.
///
/// Ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// Data store or internal failure
    Critical,
    /// Dependency failure or unclassified server error
    Error,
    /// Authentication or authorization failure
    Warning,
    /// Expected client-side failure
    Notice,
    /// Anything else
    Info,
}

impl Severity {
    /// Stable upper-case label (e.g. `"CRITICAL"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Notice => "NOTICE",
            Severity::Info => "INFO",
        }
    }

    /// Parse an upper- or lower-case label.
    pub fn parse(label: &str) -> Option<Severity> {
        match label.trim().to_ascii_uppercase().as_str() {
            "CRITICAL" => Some(Severity::Critical),
            "ERROR" => Some(Severity::Error),
            "WARNING" | "WARN" => Some(Severity::Warning),
            "NOTICE" => Some(Severity::Notice),
            "INFO" => Some(Severity::Info),
            _ => None,
        }
    }

    /// Matching `tracing` level for local output.
    pub fn tracing_level(&self) -> tracing::Level {
        match self {
            Severity::Critical | Severity::Error => tracing::Level::ERROR,
            Severity::Warning => tracing::Level::WARN,
            Severity::Notice | Severity::Info => tracing::Level::INFO,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Derive the severity of a category.
pub fn severity_for_category(category: Category) -> Severity {
    match category {
        Category::Database | Category::Internal => Severity::Critical,
        Category::ExternalApi | Category::Unavailable | Category::Unknown => Severity::Error,
        Category::Authentication | Category::Authorization => Severity::Warning,
        Category::Validation | Category::NotFound | Category::Conflict | Category::RateLimit => {
            Severity::Notice
        }
        Category::BadRequest => Severity::Info,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        assert_eq!(severity_for_category(Category::Database), Severity::Critical);
        assert_eq!(severity_for_category(Category::Internal), Severity::Critical);
        assert_eq!(severity_for_category(Category::ExternalApi), Severity::Error);
        assert_eq!(severity_for_category(Category::Unknown), Severity::Error);
        assert_eq!(
            severity_for_category(Category::Authentication),
            Severity::Warning
        );
        assert_eq!(
            severity_for_category(Category::Authorization),
            Severity::Warning
        );
        assert_eq!(severity_for_category(Category::Validation), Severity::Notice);
        assert_eq!(severity_for_category(Category::NotFound), Severity::Notice);
        assert_eq!(severity_for_category(Category::Conflict), Severity::Notice);
        assert_eq!(severity_for_category(Category::RateLimit), Severity::Notice);
        assert_eq!(severity_for_category(Category::BadRequest), Severity::Info);
    }

    #[test]
    fn test_parse_labels() {
        assert_eq!(Severity::parse("critical"), Some(Severity::Critical));
        assert_eq!(Severity::parse(" WARN "), Some(Severity::Warning));
        assert_eq!(Severity::parse("debug"), None);
    }

    #[test]
    fn test_ordering_most_severe_first() {
        assert!(Severity::Critical < Severity::Error);
        assert!(Severity::Notice < Severity::Info);
    }
}
