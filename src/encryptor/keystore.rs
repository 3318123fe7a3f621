//! Keystore envelope, scheme 4
//!
//! Argon2id stretches the passphrase into an AES-256-GCM key. Salt and nonce
//! are fresh for every envelope. Envelope layout:
//!
//! ```json
//! {
//!   "version": 4,
//!   "kdf": {"function": "argon2id", "params": {"m": 65536, "t": 3, "p": 4, "salt": "..."}},
//!   "cipher": {"function": "aes-256-gcm", "params": {"nonce": "..."}, "message": "..."}
//! }
//! ```

use crate::encryptor::Encryptor;
use crate::errors::{KeystoreError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

const SCHEME_VERSION: u32 = 4;
const KDF_FUNCTION: &str = "argon2id";
const CIPHER_FUNCTION: &str = "aes-256-gcm";

/// Salt size for Argon2
const SALT_SIZE: usize = 16;

/// Nonce size for AES-GCM
const NONCE_SIZE: usize = 12;

const KEY_SIZE: usize = 32;

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory in KiB
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 65536, // 64 MB
            iterations: 3,
            parallelism: 4,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    kdf: KdfSection,
    cipher: CipherSection,
}

#[derive(Debug, Serialize, Deserialize)]
struct KdfSection {
    function: String,
    params: KdfSectionParams,
}

#[derive(Debug, Serialize, Deserialize)]
struct KdfSectionParams {
    m: u32,
    t: u32,
    p: u32,
    salt: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CipherSection {
    function: String,
    params: CipherParams,
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CipherParams {
    nonce: String,
}

/// Encryptor producing scheme 4 keystore envelopes
#[derive(Debug, Clone, Default)]
pub struct KeystoreEncryptor {
    params: KdfParams,
}

impl KeystoreEncryptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use non-default Argon2id costs for new envelopes
    pub fn with_params(params: KdfParams) -> Result<Self> {
        // Reject bad costs now rather than on first encrypt
        Params::new(params.memory_kib, params.iterations, params.parallelism, Some(KEY_SIZE))
            .map_err(|e| KeystoreError::ConfigError(format!("invalid argon2 parameters: {}", e)))?;
        Ok(Self { params })
    }

    pub fn params(&self) -> KdfParams {
        self.params
    }
}

/// Derive an encryption key from a passphrase using Argon2id
fn derive_key(passphrase: &[u8], salt: &[u8], params: &KdfParams) -> Result<Zeroizing<[u8; KEY_SIZE]>> {
    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| KeystoreError::EncryptionFailed(e.to_string()))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut output = Zeroizing::new([0u8; KEY_SIZE]);
    argon2
        .hash_password_into(passphrase, salt, &mut output[..])
        .map_err(|e| KeystoreError::EncryptionFailed(e.to_string()))?;

    Ok(output)
}

fn decode_field(value: &str, field: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(value)
        .map_err(|e| KeystoreError::DecryptionFailed(format!("Invalid {}: {}", field, e)))
}

impl Encryptor for KeystoreEncryptor {
    fn name(&self) -> &str {
        "keystore"
    }

    fn version(&self) -> u32 {
        SCHEME_VERSION
    }

    fn encrypt(&self, data: &[u8], passphrase: &[u8]) -> Result<Vec<u8>> {
        let mut salt = [0u8; SALT_SIZE];
        rand::thread_rng().fill_bytes(&mut salt);

        let key = derive_key(passphrase, &salt, &self.params)?;

        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);

        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| KeystoreError::EncryptionFailed(e.to_string()))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), data)
            .map_err(|e| KeystoreError::EncryptionFailed(e.to_string()))?;

        let envelope = Envelope {
            version: SCHEME_VERSION,
            kdf: KdfSection {
                function: KDF_FUNCTION.to_string(),
                params: KdfSectionParams {
                    m: self.params.memory_kib,
                    t: self.params.iterations,
                    p: self.params.parallelism,
                    salt: STANDARD.encode(salt),
                },
            },
            cipher: CipherSection {
                function: CIPHER_FUNCTION.to_string(),
                params: CipherParams {
                    nonce: STANDARD.encode(nonce),
                },
                message: STANDARD.encode(&ciphertext),
            },
        };

        serde_json::to_vec(&envelope).map_err(|e| KeystoreError::EncryptionFailed(e.to_string()))
    }

    fn decrypt(&self, data: &[u8], passphrase: &[u8]) -> Result<Vec<u8>> {
        let envelope: Envelope = serde_json::from_slice(data)
            .map_err(|e| KeystoreError::DecryptionFailed(format!("Invalid envelope: {}", e)))?;

        if envelope.version != SCHEME_VERSION {
            return Err(KeystoreError::UnsupportedVersion(
                "unsupported keystore version".to_string(),
            ));
        }
        if envelope.kdf.function != KDF_FUNCTION {
            return Err(KeystoreError::DecryptionFailed(format!(
                "unsupported kdf {}",
                envelope.kdf.function
            )));
        }
        if envelope.cipher.function != CIPHER_FUNCTION {
            return Err(KeystoreError::DecryptionFailed(format!(
                "unsupported cipher {}",
                envelope.cipher.function
            )));
        }

        let salt = decode_field(&envelope.kdf.params.salt, "salt")?;
        let nonce = decode_field(&envelope.cipher.params.nonce, "nonce")?;
        let ciphertext = decode_field(&envelope.cipher.message, "message")?;
        if nonce.len() != NONCE_SIZE {
            return Err(KeystoreError::DecryptionFailed(
                "Invalid nonce: wrong length".to_string(),
            ));
        }

        // Costs come from the envelope, not from this encryptor
        let params = KdfParams {
            memory_kib: envelope.kdf.params.m,
            iterations: envelope.kdf.params.t,
            parallelism: envelope.kdf.params.p,
        };
        let key = derive_key(passphrase, &salt, &params)
            .map_err(|e| KeystoreError::DecryptionFailed(e.to_string()))?;

        let cipher = Aes256Gcm::new_from_slice(&key[..])
            .map_err(|e| KeystoreError::DecryptionFailed(e.to_string()))?;

        cipher
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| {
                KeystoreError::DecryptionFailed("wrong passphrase or corrupted data".to_string())
            })
    }
}
