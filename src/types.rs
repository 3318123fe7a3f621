//! Capability traits consumed by wallet-management hosts

use crate::crypto::{PublicKey, Signature};
use crate::errors::Result;
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// An account able to produce signatures
#[async_trait]
pub trait WalletAccount: Send + Sync {
    fn id(&self) -> Uuid;

    fn name(&self) -> &str;

    fn public_key(&self) -> PublicKey;

    /// Derivation path, empty for accounts that are not derived
    fn path(&self) -> &str;

    async fn lock(&self);

    async fn unlock(&self, passphrase: &[u8]) -> Result<()>;

    async fn is_unlocked(&self) -> bool;

    async fn sign(&self, data: &[u8], domain: u64) -> Result<Signature>;
}

/// A wallet owning a set of accounts
#[async_trait]
pub trait KeyWallet: Send + Sync {
    fn id(&self) -> Uuid;

    fn name(&self) -> &str;

    fn wallet_type(&self) -> &str;

    fn version(&self) -> u32;

    async fn lock(&self);

    async fn unlock(&self, passphrase: &[u8]) -> Result<()>;

    async fn is_unlocked(&self) -> bool;

    async fn accounts(&self) -> Result<Vec<Arc<dyn WalletAccount>>>;

    async fn create_account(&self, name: &str, passphrase: &[u8])
        -> Result<Arc<dyn WalletAccount>>;
}
