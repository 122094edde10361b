//! Configuration for the faircore server.
//!
//! TOML file, `FAIRCORE_*` environment overrides, then validation. The
//! loader mirrors the file/env/validate split so a bad deployment fails at
//! startup instead of on the first bet.

use crate::errors::{ConfigurationError, CoreResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CoreConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub listen_address: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "./faircore_data".to_string(),
            sync_writes: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Maximum optimistic-commit attempts before surfacing LedgerConflict.
    pub max_commit_attempts: u32,
    /// Base backoff between attempts; doubles each retry.
    pub backoff_base_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: 5,
            backoff_base_ms: 1,
        }
    }
}

/// Configuration loader with environment variable support.
pub struct ConfigLoader {
    config_path: Option<String>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self { config_path: None }
    }

    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Load configuration from file and environment variables.
    pub fn load(&self) -> CoreResult<CoreConfig> {
        let mut config = if let Some(ref path) = self.config_path {
            self.load_from_file(path)?
        } else {
            CoreConfig::default()
        };

        self.apply_env_overrides(&mut config)?;
        self.validate(&config)?;

        Ok(config)
    }

    fn load_from_file(&self, path: &str) -> CoreResult<CoreConfig> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigurationError::LoadFailed(format!("Failed to read {}: {}", path, e))
        })?;

        toml::from_str(&content)
            .map_err(|e| ConfigurationError::LoadFailed(format!("Failed to parse TOML: {}", e)).into())
    }

    fn apply_env_overrides(&self, config: &mut CoreConfig) -> CoreResult<()> {
        if let Ok(addr) = env::var("FAIRCORE_API_ADDRESS") {
            config.api.listen_address = addr;
        }
        if let Ok(port) = env::var("FAIRCORE_API_PORT") {
            config.api.port = port.parse().map_err(|_| ConfigurationError::InvalidValue {
                field: "FAIRCORE_API_PORT".to_string(),
                value: port,
                reason: "Invalid port number".to_string(),
            })?;
        }
        if let Ok(data_dir) = env::var("FAIRCORE_DATA_DIR") {
            config.storage.data_dir = data_dir;
        }
        if let Ok(attempts) = env::var("FAIRCORE_LEDGER_MAX_ATTEMPTS") {
            config.ledger.max_commit_attempts =
                attempts.parse().map_err(|_| ConfigurationError::InvalidValue {
                    field: "FAIRCORE_LEDGER_MAX_ATTEMPTS".to_string(),
                    value: attempts,
                    reason: "Invalid attempt count".to_string(),
                })?;
        }

        Ok(())
    }

    fn validate(&self, config: &CoreConfig) -> CoreResult<()> {
        if config.api.port == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "api.port".to_string(),
                value: "0".to_string(),
                reason: "Port cannot be zero".to_string(),
            }
            .into());
        }

        if config.storage.data_dir.is_empty() {
            return Err(ConfigurationError::MissingRequired("storage.data_dir".to_string()).into());
        }

        if config.ledger.max_commit_attempts == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "ledger.max_commit_attempts".to_string(),
                value: "0".to_string(),
                reason: "At least one commit attempt is required".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CoreConfig::default();
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.ledger.max_commit_attempts, 5);
        assert!(config.storage.sync_writes);
    }

    #[test]
    fn test_config_validation() {
        let loader = ConfigLoader::new();
        let mut config = CoreConfig::default();

        assert!(loader.validate(&config).is_ok());

        config.api.port = 0;
        assert!(loader.validate(&config).is_err());

        config.api.port = 8080;
        config.ledger.max_commit_attempts = 0;
        assert!(loader.validate(&config).is_err());
    }

    #[test]
    fn test_load_from_toml() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(
            file.path(),
            r#"
[api]
listen_address = "127.0.0.1"
port = 9100
cors_origins = ["https://example.com"]
request_timeout_secs = 10

[storage]
data_dir = "/tmp/faircore-test"
sync_writes = false
"#,
        )
        .unwrap();

        let config = ConfigLoader::new().with_path(file.path()).load().unwrap();
        assert_eq!(config.api.port, 9100);
        assert_eq!(config.storage.data_dir, "/tmp/faircore-test");
        // Section missing from the file falls back to defaults.
        assert_eq!(config.ledger.max_commit_attempts, 5);
    }
}
