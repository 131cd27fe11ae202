//! Application configuration.
//!
//! Loaded from `configs/config.yaml` relative to the working directory;
//! the `TRADEWIRE_CONFIG` environment variable overrides the path. See
//! `configs/config.example.yaml` for the full shape.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "configs/config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default = "default_mode")]
    pub mode: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// sqlx connection URL for the configured database file.
    pub fn url(&self) -> String {
        if self.path.starts_with("sqlite:") {
            self.path.clone()
        } else {
            format!("sqlite://{}", self.path)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    pub api_key: String,
    pub api_secret: String,
    #[serde(default)]
    pub passphrase: Option<String>,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub account_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub exchanges: HashMap<String, ExchangeConfig>,
}

fn default_mode() -> String {
    "release".to_string()
}

fn default_db_path() -> String {
    "data/tradewire.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl AppConfig {
    /// Load from the default location, honoring `TRADEWIRE_CONFIG`.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("TRADEWIRE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_file(Path::new(&path))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    pub fn exchange(&self, name: &str) -> Option<&ExchangeConfig> {
        self.exchanges.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
server:
  port: 8080
  mode: debug
  secret_key: "hunter2"

database:
  path: "data/test.db"
  max_connections: 3

exchanges:
  gateio:
    api_key: "key"
    api_secret: "secret"
    base_url: "https://api.gateio.ws"
    account_type: "spot"
"#;

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = serde_yaml::from_str(SAMPLE).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.mode, "debug");
        assert_eq!(config.server.secret_key, "hunter2");
        assert_eq!(config.database.max_connections, 3);
        assert_eq!(config.database.url(), "sqlite://data/test.db");

        let gateio = config.exchange("gateio").unwrap();
        assert_eq!(gateio.api_key, "key");
        assert_eq!(gateio.account_type.as_deref(), Some("spot"));
        assert!(gateio.passphrase.is_none());
    }

    #[test]
    fn test_defaults_applied() {
        let config: AppConfig = serde_yaml::from_str(
            r#"
server:
  port: 9000
  secret_key: "s"
"#,
        )
        .unwrap();
        assert_eq!(config.server.mode, "release");
        assert_eq!(config.database.path, "data/tradewire.db");
        assert_eq!(config.database.max_connections, 5);
        assert!(config.exchanges.is_empty());
    }

    #[test]
    fn test_explicit_sqlite_url_is_kept() {
        let database = DatabaseConfig {
            path: "sqlite::memory:".to_string(),
            max_connections: 1,
        };
        assert_eq!(database.url(), "sqlite::memory:");
    }

    #[test]
    fn test_missing_required_field_fails() {
        let result: Result<AppConfig, _> = serde_yaml::from_str("server:\n  port: 8080\n");
        assert!(result.is_err());
    }
}
