//! Passphrase encryption of exported wallets

pub mod keystore;

pub use keystore::{KdfParams, KeystoreEncryptor};

use crate::errors::Result;

/// Seals and opens byte blobs under a passphrase
pub trait Encryptor: Send + Sync {
    fn name(&self) -> &str;

    /// Keystore scheme version of the produced envelopes
    fn version(&self) -> u32;

    fn encrypt(&self, data: &[u8], passphrase: &[u8]) -> Result<Vec<u8>>;

    fn decrypt(&self, data: &[u8], passphrase: &[u8]) -> Result<Vec<u8>>;
}
