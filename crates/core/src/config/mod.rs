//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (COURTSIDE_*)
//! 2. TOML config file (if COURTSIDE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (COURTSIDE_*)
/// 2. TOML config file (if COURTSIDE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite cache database.
    ///
    /// Set via COURTSIDE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Origin the backend API is served from. Responses from any other
    /// origin are never written into the static generation.
    ///
    /// Set via COURTSIDE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path prefix of backend API requests, routed network-first.
    ///
    /// Set via COURTSIDE_API_PREFIX environment variable.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Cache version tag. Bumping it creates a new static generation and
    /// evicts the old one at activation.
    ///
    /// Set via COURTSIDE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Static asset paths fetched and cached at worker install.
    ///
    /// Set via COURTSIDE_STATIC_MANIFEST environment variable.
    #[serde(default = "default_static_manifest")]
    pub static_manifest: Vec<String>,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via COURTSIDE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Freshness window of the in-page request cache in milliseconds.
    ///
    /// Set via COURTSIDE_TTL_MS environment variable.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via COURTSIDE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Interval between periodic metrics log lines in milliseconds.
    ///
    /// Set via COURTSIDE_METRICS_INTERVAL_MS environment variable.
    #[serde(default = "default_metrics_interval_ms")]
    pub metrics_interval_ms: u64,

    /// Maximum number of concurrent preload requests.
    ///
    /// Set via COURTSIDE_PRELOAD_CONCURRENCY environment variable.
    #[serde(default = "default_preload_concurrency")]
    pub preload_concurrency: usize,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./courtside-cache.sqlite")
}

fn default_origin() -> String {
    "http://127.0.0.1:3000".into()
}

fn default_api_prefix() -> String {
    "/api/".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_static_manifest() -> Vec<String> {
    ["/", "/index.html", "/styles.css", "/app.js", "/performance.js"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_user_agent() -> String {
    "courtside/0.1".into()
}

fn default_ttl_ms() -> u64 {
    300_000 // 5 minutes
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_metrics_interval_ms() -> u64 {
    30_000
}

fn default_preload_concurrency() -> usize {
    4
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            api_prefix: default_api_prefix(),
            cache_version: default_cache_version(),
            static_manifest: default_static_manifest(),
            user_agent: default_user_agent(),
            ttl_ms: default_ttl_ms(),
            timeout_ms: default_timeout_ms(),
            metrics_interval_ms: default_metrics_interval_ms(),
            preload_concurrency: default_preload_concurrency(),
        }
    }
}

impl AppConfig {
    /// Name of the static-asset cache generation for the current version.
    pub fn static_generation(&self) -> String {
        format!("courtside-{}", self.cache_version)
    }

    /// Name of the runtime (API response) cache generation.
    pub fn runtime_generation(&self) -> String {
        "courtside-runtime".to_string()
    }

    /// Request timeout as Duration for use with tokio timers.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Freshness window as Duration.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    /// Metrics reporting interval as Duration.
    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_interval_ms)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `COURTSIDE_`
    /// 2. TOML file from `COURTSIDE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("COURTSIDE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("COURTSIDE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
