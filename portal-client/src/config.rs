//! Configuration for the portal client.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

/// Main configuration structure for the portal client.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Hosted backend the portal talks to.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Project URL, e.g. https://xyz.supabase.co
    pub url: String,
    /// Public (anon) API key sent with every request
    pub anon_key: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Where the session and the profile cache are persisted.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Age after which a cached profile is ignored (default: 24h)
    #[serde(default = "default_cache_max_age")]
    pub max_age_secs: u64,
}

impl CacheConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_secs: default_cache_max_age(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Sessions expiring within this window are refreshed before use
    #[serde(default = "default_refresh_margin")]
    pub refresh_margin_secs: u64,
    /// Page the password reset email links to
    #[serde(default)]
    pub reset_redirect_url: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_margin_secs: default_refresh_margin(),
            reset_redirect_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default values
fn default_request_timeout() -> u64 {
    30
}
fn default_storage_dir() -> PathBuf {
    PathBuf::from(".portal")
}
fn default_cache_max_age() -> u64 {
    24 * 60 * 60
}
fn default_refresh_margin() -> u64 {
    60
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (PORTAL__SECTION__KEY format)
    /// 2. The given file, or portal.toml (if present)
    /// 3. Built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name("portal").required(false),
        };

        let config = ConfigLoader::builder()
            .set_default("backend.request_timeout_secs", default_request_timeout() as i64)?
            .set_default("cache.max_age_secs", default_cache_max_age() as i64)?
            .set_default("auth.refresh_margin_secs", default_refresh_margin() as i64)?
            .set_default("logging.level", default_log_level())?
            .add_source(file)
            .add_source(
                Environment::with_prefix("PORTAL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Configuration pointing at the given backend with defaults elsewhere.
    pub fn for_backend(url: &str, anon_key: &str) -> Self {
        Self {
            backend: BackendConfig {
                url: url.to_string(),
                anon_key: anon_key.to_string(),
                request_timeout_secs: default_request_timeout(),
            },
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            auth: AuthConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
