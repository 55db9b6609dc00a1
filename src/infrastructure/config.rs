//! Environment-variable configuration.
//!
//! | Variable                   | Meaning                                     |
//! |----------------------------|---------------------------------------------|
//! | `APP_ENV`                  | `production`/`prod`, `test`, anything else is development |
//! | `LOG_ERROR_ONLY`           | `true`/`1` keeps only CRITICAL, ERROR and WARNING entries |
//! | `LOG_RATE_LIMIT_MAX`       | occurrences per key per window              |
//! | `LOG_RATE_LIMIT_WINDOW_MS` | window length in milliseconds               |
//! | `LOG_MAX_KEYS`             | dedup table cap                             |

use crate::application::entry::Environment;
use crate::application::sink::{SinkBuilder, DEFAULT_ERROR_ONLY};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Error returned when a configuration variable cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The variable is set to a value of the wrong shape
    InvalidValue {
        /// Variable name
        key: String,
        /// Raw value
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidValue { key, value } => {
                write!(f, "invalid value for {}: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Observability settings read from the process environment.
///
/// Unset variables leave the sink builder defaults untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Deployment environment (`APP_ENV`)
    pub environment: Environment,
    /// Keep only CRITICAL, ERROR and WARNING entries (`LOG_ERROR_ONLY`)
    pub error_only: bool,
    /// Occurrences per key per window (`LOG_RATE_LIMIT_MAX`)
    pub max_per_window: Option<usize>,
    /// Window length (`LOG_RATE_LIMIT_WINDOW_MS`)
    pub window: Option<Duration>,
    /// Dedup table cap (`LOG_MAX_KEYS`)
    pub max_keys: Option<usize>,
}

impl ObservabilityConfig {
    /// Read the configuration from `std::env`.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` for a malformed variable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`.
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidValue` for a malformed variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("APP_ENV")
            .map(|name| Environment::parse(&name))
            .unwrap_or_default();
        let error_only = match lookup("LOG_ERROR_ONLY") {
            Some(raw) => parse_bool("LOG_ERROR_ONLY", &raw)?,
            None => false,
        };

        Ok(Self {
            environment,
            error_only,
            max_per_window: parse_opt(&lookup, "LOG_RATE_LIMIT_MAX")?,
            window: parse_opt::<u64, _>(&lookup, "LOG_RATE_LIMIT_WINDOW_MS")?
                .map(Duration::from_millis),
            max_keys: parse_opt(&lookup, "LOG_MAX_KEYS")?,
        })
    }

    /// Feed these settings into a sink builder.
    ///
    /// Zero values are passed through so that `build()` rejects them.
    pub fn apply(&self, mut builder: SinkBuilder) -> SinkBuilder {
        builder = builder.with_environment(self.environment);
        if self.error_only {
            builder = builder.with_error_only(DEFAULT_ERROR_ONLY);
        }
        if let Some(max) = self.max_per_window {
            builder = builder.with_max_per_window(max);
        }
        if let Some(window) = self.window {
            builder = builder.with_window(window);
        }
        if let Some(max) = self.max_keys {
            builder = builder.with_max_keys(max);
        }
        builder
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(invalid(key, raw)),
    }
}

fn parse_opt<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| invalid(key, &raw)),
        None => Ok(None),
    }
}
