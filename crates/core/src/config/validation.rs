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
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `ttl_ms` is 0
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `api_prefix` does not start with `/`
    /// - `cache_version`, `user_agent`, or `static_manifest` is empty
    /// - `preload_concurrency` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_ms == 0 {
            return Err(ConfigError::Invalid { field: "ttl_ms".into(), reason: "must be greater than 0".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if !self.api_prefix.starts_with('/') {
            return Err(ConfigError::Invalid { field: "api_prefix".into(), reason: "must start with /".into() });
        }

        if self.cache_version.is_empty() {
            return Err(ConfigError::Invalid { field: "cache_version".into(), reason: "must not be empty".into() });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.static_manifest.is_empty() {
            return Err(ConfigError::Invalid { field: "static_manifest".into(), reason: "must not be empty".into() });
        }

        if self.preload_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "preload_concurrency".into(),
                reason: "must be at least 1".into(),
            });
        }

        if let Some(bad) = self.static_manifest.iter().find(|p| !p.starts_with('/')) {
            tracing::warn!(path = %bad, "static manifest entry is not an absolute path; it will never match a request");
        }

        Ok(())
    }
}
