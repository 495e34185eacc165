//! Core configuration types and loading.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;

use super::limits::LimitsConfig;
use super::security::SecurityConfig;
use super::storage::StorageConfig;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server identity.
    pub server: ServerConfig,
    /// REST API listen configuration.
    pub listen: ListenConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Upload and file storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Security configuration (sessions, passwords, rate limiting).
    #[serde(default)]
    pub security: SecurityConfig,
    /// Pagination limits for list endpoints.
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Config {
    /// Load configuration from a TOML file and validate it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would misbehave at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.max_chunk_bytes == 0 {
            return Err(ConfigError::Invalid(
                "storage.max_chunk_bytes must be greater than zero".into(),
            ));
        }
        if self.storage.max_upload_bytes < self.storage.max_chunk_bytes {
            return Err(ConfigError::Invalid(
                "storage.max_upload_bytes must be at least storage.max_chunk_bytes".into(),
            ));
        }
        if self.limits.max_page_size < self.limits.default_page_size {
            return Err(ConfigError::Invalid(
                "limits.max_page_size must be at least limits.default_page_size".into(),
            ));
        }
        if self.security.min_password_len < 4 {
            return Err(ConfigError::Invalid(
                "security.min_password_len must be at least 4".into(),
            ));
        }
        Ok(())
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Instance name (e.g., "studyd.example.org").
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Prometheus metrics HTTP port (default: 9090, 0 disables).
    pub metrics_port: Option<u16>,
}

/// REST API listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to (e.g., "0.0.0.0:8370").
    pub address: SocketAddr,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file (":memory:" for an ephemeral database).
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
[server]
name = "studyd.test"
description = "Test instance"

[listen]
address = "127.0.0.1:8370"

[database]
path = ":memory:"
"#
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: Config = toml::from_str(minimal_toml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.server.name, "studyd.test");
        assert_eq!(config.storage.max_chunk_bytes, 1024 * 1024);
        assert_eq!(config.security.session_ttl_hours, 720);
        assert_eq!(config.limits.default_page_size, 50);
    }

    #[test]
    fn zero_chunk_size_rejected() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.storage.max_chunk_bytes = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn upload_smaller_than_chunk_rejected() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.storage.max_upload_bytes = config.storage.max_chunk_bytes - 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn page_size_cap_below_default_rejected() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.limits.max_page_size = config.limits.default_page_size - 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
