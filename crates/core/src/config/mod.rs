//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (OFFCACHE_*)
//! 2. TOML config file (if OFFCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::routes::{
    CacheName, DEFAULT_CACHE_PREFIX, DEFAULT_CACHE_VERSION, DEFAULT_EXCLUSIONS, DEFAULT_ROUTES, ExclusionPredicate,
    MatchMode, TrackedRoutes,
};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (OFFCACHE_*)
/// 2. TOML config file (if OFFCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Origin of the application being proxied. Relative routes resolve
    /// against it and only same-origin responses are cached.
    ///
    /// Set via OFFCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path to SQLite cache database.
    ///
    /// Set via OFFCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Prefix of the versioned cache store name.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Cache version ordinal. Bump on deploy to invalidate older stores.
    ///
    /// Set via OFFCACHE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: u32,

    /// Application paths pre-cached on install.
    ///
    /// Set via OFFCACHE_ROUTES, e.g. `OFFCACHE_ROUTES='["/", "/login"]'`.
    #[serde(default = "default_routes")]
    pub routes: Vec<String>,

    /// URL markers for requests that bypass the cache.
    ///
    /// Set via OFFCACHE_EXCLUSIONS (array syntax as for routes).
    #[serde(default = "default_exclusions")]
    pub exclusions: Vec<String>,

    /// How exclusion markers are matched: `substring` or `structured`.
    ///
    /// Set via OFFCACHE_MATCH_MODE environment variable.
    #[serde(default)]
    pub match_mode: MatchMode,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via OFFCACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via OFFCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum number of redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_origin() -> String {
    "http://localhost:3000".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./offcache.sqlite")
}

fn default_cache_prefix() -> String {
    DEFAULT_CACHE_PREFIX.into()
}

fn default_cache_version() -> u32 {
    DEFAULT_CACHE_VERSION
}

fn default_routes() -> Vec<String> {
    DEFAULT_ROUTES.iter().map(|r| r.to_string()).collect()
}

fn default_exclusions() -> Vec<String> {
    DEFAULT_EXCLUSIONS.iter().map(|m| m.to_string()).collect()
}

fn default_user_agent() -> String {
    "offcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_redirects() -> usize {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            db_path: default_db_path(),
            cache_prefix: default_cache_prefix(),
            cache_version: default_cache_version(),
            routes: default_routes(),
            exclusions: default_exclusions(),
            match_mode: MatchMode::default(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_redirects: default_max_redirects(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Name of the cache store for the configured version.
    pub fn cache_name(&self) -> CacheName {
        CacheName::new(self.cache_prefix.clone(), self.cache_version)
    }

    pub fn tracked_routes(&self) -> TrackedRoutes {
        TrackedRoutes::new(self.routes.iter().cloned())
    }

    pub fn exclusion_predicate(&self) -> ExclusionPredicate {
        ExclusionPredicate::new(self.exclusions.iter().cloned(), self.match_mode)
    }

    /// Parsed application origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if the origin is not an absolute URL.
    pub fn origin_url(&self) -> Result<url::Url, ConfigError> {
        url::Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `OFFCACHE_`
    /// 2. TOML file from `OFFCACHE_CONFIG_FILE` (if set)
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

        if let Ok(config_path) = std::env::var("OFFCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("OFFCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::extract(figment)
    }

    /// Extract and validate a config from a prepared figment.
    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
