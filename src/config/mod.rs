//! Configuration management for mpc-keystore
//!
//! Supports loading configuration from:
//! - Environment variables (MPC_KEYSTORE_*)
//! - Config file (config.toml)

use crate::encryptor::{Encryptor, KdfParams, KeystoreEncryptor};
use crate::errors::{KeystoreError, Result};
use crate::keyservice::protocol::parse_url;
use crate::store::{FilesystemStore, MemoryStore, Store};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Key service configuration
    pub key_service: KeyServiceConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Export encryption configuration
    pub encryption: EncryptionConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Key service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyServiceConfig {
    /// Endpoint for new wallets; empty when wallets are only opened
    pub url: String,

    /// Request deadline in milliseconds
    pub timeout_ms: u64,
}

impl Default for KeyServiceConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_ms: 30_000,
        }
    }
}

impl KeyServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Filesystem,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Base directory for the filesystem backend
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Filesystem,
            path: PathBuf::from("./data/wallets"),
        }
    }
}

/// Argon2id costs for exports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        let params = KdfParams::default();
        Self {
            memory_kib: params.memory_kib,
            iterations: params.iterations,
            parallelism: params.parallelism,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = config::Config::try_from(&Config::default())
            .map_err(|e| KeystoreError::ConfigError(e.to_string()))?;
        let mut builder = config::Config::builder().add_source(defaults);

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        } else {
            // Try default locations
            builder = builder
                .add_source(config::File::with_name("config").required(false))
                .add_source(config::File::with_name("/etc/mpc-keystore/config").required(false));
        }

        // Load from environment (MPC_KEYSTORE_KEY_SERVICE__URL, etc.)
        builder = builder.add_source(
            config::Environment::with_prefix("MPC_KEYSTORE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| KeystoreError::ConfigError(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| KeystoreError::ConfigError(e.to_string()))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.key_service.url.is_empty() {
            parse_url(&self.key_service.url)?;
        }

        if self.key_service.timeout_ms == 0 {
            return Err(KeystoreError::ConfigError(
                "key_service.timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self.storage.backend == StorageBackend::Filesystem {
            if self.storage.path.as_os_str().is_empty() {
                return Err(KeystoreError::ConfigError(
                    "storage.path is required for the filesystem backend".to_string(),
                ));
            }
            if !self.storage.path.exists() {
                info!(
                    "Wallet directory does not exist, will create: {:?}",
                    self.storage.path
                );
            }
        }

        KeystoreEncryptor::with_params(self.kdf_params())?;
        Ok(())
    }

    pub fn kdf_params(&self) -> KdfParams {
        KdfParams {
            memory_kib: self.encryption.memory_kib,
            iterations: self.encryption.iterations,
            parallelism: self.encryption.parallelism,
        }
    }

    /// Open the configured store
    pub fn build_store(&self) -> Result<Arc<dyn Store>> {
        Ok(match self.storage.backend {
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
            StorageBackend::Filesystem => Arc::new(FilesystemStore::new(&self.storage.path)?),
        })
    }

    /// Build the export encryptor with the configured costs
    pub fn build_encryptor(&self) -> Result<Arc<dyn Encryptor>> {
        Ok(Arc::new(KeystoreEncryptor::with_params(self.kdf_params())?))
    }
}
