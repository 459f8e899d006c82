//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `user_agent` is empty
    /// - `app_name` or `version` is empty or contains whitespace
    /// - `origin` is not an absolute http(s) URL
    /// - a critical resource is not an origin-relative path starting with `/`
    /// - any route pattern is not a valid regular expression
    /// - `sync.max_attempts` is 0
    ///
    /// Returns `ConfigError::Missing` if `critical_resources` contains an empty path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must not exceed 50MB".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        for (field, value) in [("app_name", &self.app_name), ("version", &self.version)] {
            if value.is_empty() || value.chars().any(char::is_whitespace) {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: "must be non-empty and contain no whitespace".into(),
                });
            }
        }

        match url::Url::parse(&self.origin) {
            Ok(origin) if matches!(origin.scheme(), "http" | "https") && origin.has_host() => {}
            Ok(origin) => {
                return Err(ConfigError::Invalid {
                    field: "origin".into(),
                    reason: format!("unsupported origin: {origin}"),
                });
            }
            Err(e) => return Err(ConfigError::Invalid { field: "origin".into(), reason: e.to_string() }),
        }

        if self.critical_resources.iter().any(|path| path.trim().is_empty()) {
            return Err(ConfigError::Missing {
                field: "critical_resources".into(),
                hint: "every critical resource needs a path such as \"/\"".into(),
            });
        }
        if let Some(path) = self
            .critical_resources
            .iter()
            .find(|path| !path.starts_with('/') || path.starts_with("//"))
        {
            return Err(ConfigError::Invalid {
                field: "critical_resources".into(),
                reason: format!("{path:?} must be a path on the origin starting with '/'"),
            });
        }

        for (list, pattern) in self.routes.all_patterns() {
            if let Err(e) = regex::Regex::new(pattern) {
                return Err(ConfigError::Invalid { field: format!("routes.{list}"), reason: e.to_string() });
            }
        }

        for (class, limits) in self.expiration.all() {
            if limits.max_entries == Some(0) {
                tracing::warn!(
                    class,
                    "expiration max_entries is 0; every cached entry is evicted right after it is stored"
                );
            }
        }

        if self.sync.max_attempts == Some(0) {
            return Err(ConfigError::Invalid {
                field: "sync.max_attempts".into(),
                reason: "must allow at least one replay".into(),
            });
        }

        Ok(())
    }
}
