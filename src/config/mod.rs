//! Configuration loading and validation.
//!
//! Settings come from an optional TOML file, overridden by `KPI_`-prefixed
//! environment variables with `__` between sections (`KPI_SERVER__PORT=9000`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::DEFAULT_TARGET_RATE;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Failed to render config: {0}")]
    RenderError(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Which record store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON Lines files under `data_dir`
    #[default]
    Jsonl,
    /// PostgREST-style hosted tables under `base_url`
    Rest,
}

/// Record store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Data directory for the jsonl backend
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Project URL for the rest backend
    #[serde(default)]
    pub base_url: Option<String>,

    /// Environment variable holding the rest API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_submissions_table")]
    pub submissions_table: String,

    #[serde(default = "default_stores_table")]
    pub stores_table: String,

    #[serde(default = "default_managers_table")]
    pub managers_table: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_api_key_env() -> String {
    "SUPABASE_ANON_KEY".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_submissions_table() -> String {
    "kpi_submissions".to_string()
}

fn default_stores_table() -> String {
    "stores".to_string()
}

fn default_managers_table() -> String {
    "managers".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            data_dir: default_data_dir(),
            base_url: None,
            api_key_env: default_api_key_env(),
            timeout_seconds: default_timeout(),
            submissions_table: default_submissions_table(),
            stores_table: default_stores_table(),
            managers_table: default_managers_table(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,

    /// Log every HTTP request
    #[serde(default)]
    pub access_log: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            access_log: false,
        }
    }
}

/// Tracker defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Target strike rate a new tracker session starts with
    #[serde(default = "default_target_rate")]
    pub default_target_rate: f64,
}

fn default_target_rate() -> f64 {
    DEFAULT_TARGET_RATE
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            default_target_rate: default_target_rate(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub tracker: TrackerConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            tracker: TrackerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from an optional TOML file plus `KPI_*` environment overrides.
    /// A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            );
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("KPI")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML, e.g. to bootstrap a config file.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        if self.store.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "Store timeout must be greater than 0".to_string(),
            ));
        }

        if self.store.backend == StoreBackend::Rest && self.store.base_url.is_none() {
            return Err(ConfigError::ValidationError(
                "store.base_url is required for the rest backend".to_string(),
            ));
        }

        let target = self.tracker.default_target_rate;
        if !(0.0..=100.0).contains(&target) {
            return Err(ConfigError::ValidationError(format!(
                "Default target rate must be between 0 and 100, got {target}"
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.store.backend, StoreBackend::Jsonl);
        assert_eq!(config.store.data_dir, PathBuf::from("./data"));
        assert_eq!(config.store.submissions_table, "kpi_submissions");
        assert_eq!(config.tracker.default_target_rate, 20.0);
    }

    #[test]
    fn test_config_validation_ok() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_timeout() {
        let mut config = AppConfig::default();
        config.store.timeout_seconds = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rest_needs_url() {
        let mut config = AppConfig::default();
        config.store.backend = StoreBackend::Rest;
        assert!(config.validate().is_err());

        config.store.base_url = Some("https://example.supabase.co".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_target() {
        let mut config = AppConfig::default();
        config.tracker.default_target_rate = 120.0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("kpi.toml");
        std::fs::write(
            &path,
            r#"
log_level = "debug"

[server]
port = 9090

[store]
backend = "rest"
base_url = "https://example.supabase.co"

[tracker]
default_target_rate = 35.0
"#,
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.store.backend, StoreBackend::Rest);
        assert_eq!(config.tracker.default_target_rate, 35.0);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig::load(Some(&tmp.path().join("absent.toml"))).unwrap();
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_config_toml_round_trip() {
        let config = AppConfig::default();
        let toml_str = config.to_toml().unwrap();

        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.store.data_dir, parsed.store.data_dir);
        assert_eq!(config.server.cors_origin, parsed.server.cors_origin);
    }
}
