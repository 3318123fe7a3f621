//! Error types for mpc-keystore

use thiserror::Error;

/// Main error type for keystore operations
#[derive(Error, Debug)]
pub enum KeystoreError {
    // Input errors
    #[error("{0}")]
    ConfigError(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("{0}")]
    UnsupportedVersion(String),

    // State errors
    #[error("{0}")]
    Locked(String),

    #[error("{0} already exists")]
    Duplicate(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("multi-party accounts have no local private key")]
    NoPrivateKey,

    // Key service errors
    #[error("Key service transport error: {0}")]
    TransportError(String),

    #[error("Key service protocol error: {0}")]
    ProtocolError(String),

    // Cryptographic errors
    #[error("{0}")]
    CryptoError(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    // Storage errors
    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<std::io::Error> for KeystoreError {
    fn from(err: std::io::Error) -> Self {
        KeystoreError::StorageError(err.to_string())
    }
}

impl From<serde_json::Error> for KeystoreError {
    fn from(err: serde_json::Error) -> Self {
        KeystoreError::ValidationError(err.to_string())
    }
}

impl From<reqwest::Error> for KeystoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            KeystoreError::TransportError(format!("request timed out: {}", err))
        } else {
            KeystoreError::TransportError(err.to_string())
        }
    }
}

impl KeystoreError {
    /// True for failures reaching the key service, as opposed to bad answers from it
    pub fn is_transport(&self) -> bool {
        matches!(self, KeystoreError::TransportError(_))
    }
}

pub type Result<T> = std::result::Result<T, KeystoreError>;
