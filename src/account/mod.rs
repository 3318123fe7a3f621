//! Multi-party accounts
//!
//! An account pairs a public key with the key service holding its shares.
//! It has no secret of its own: unlocking only opens the local gate in front
//! of the remote signer. The gate is an async reader/writer lock; signing
//! holds the read side for the whole round trip so that any number of signs
//! run together, while lock/unlock wait for them on the write side.

pub mod record;

pub use record::{AccountRecord, KeystoreScheme};

use crate::crypto::{PublicKey, Signature};
use crate::errors::{KeystoreError, Result};
use crate::keyservice::KeyServiceClient;
use crate::types::WalletAccount;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// An account whose signing key lives in a remote key service
#[derive(Debug)]
pub struct Account {
    id: Uuid,
    name: String,
    public_key: PublicKey,
    scheme: KeystoreScheme,
    wallet_id: Uuid,
    key_service: KeyServiceClient,
    unlocked: RwLock<bool>,
}

impl Account {
    /// Create a locked account bound to `key_service`
    ///
    /// Fails if the client already serves a different public key.
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        public_key: PublicKey,
        scheme: KeystoreScheme,
        wallet_id: Uuid,
        key_service: KeyServiceClient,
    ) -> Result<Self> {
        let key_service = match key_service.cached_public_key() {
            Some(bound) if bound != public_key => {
                return Err(KeystoreError::ValidationError(
                    "account keyService pubkey mismatch".to_string(),
                ))
            }
            Some(_) => key_service,
            None => key_service.with_public_key(public_key),
        };

        Ok(Self {
            id,
            name: name.into(),
            public_key,
            scheme,
            wallet_id,
            key_service,
            unlocked: RwLock::new(false),
        })
    }

    /// Rebuild an account from a validated record
    pub fn from_record(
        record: AccountRecord,
        wallet_id: Uuid,
        http: reqwest::Client,
    ) -> Result<Self> {
        let key_service = KeyServiceClient::from_binding(&record.key_service, http)?;
        Self::new(
            record.id,
            record.name,
            record.public_key,
            record.scheme,
            wallet_id,
            key_service,
        )
    }

    /// Decode a persisted record into a locked account
    pub fn deserialize(data: &[u8], wallet_id: Uuid, http: reqwest::Client) -> Result<Self> {
        Self::from_record(AccountRecord::decode(data)?, wallet_id, http)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A copy of the account's public key
    pub fn public_key(&self) -> PublicKey {
        self.public_key
    }

    pub fn version(&self) -> u32 {
        self.scheme.as_u32()
    }

    pub fn scheme(&self) -> KeystoreScheme {
        self.scheme
    }

    pub fn wallet_id(&self) -> Uuid {
        self.wallet_id
    }

    /// Multi-party accounts are not derived
    pub fn path(&self) -> &str {
        ""
    }

    pub fn key_service(&self) -> &KeyServiceClient {
        &self.key_service
    }

    /// Always fails: the key only exists as shares inside the key service
    pub fn private_key(&self) -> Result<Vec<u8>> {
        Err(KeystoreError::NoPrivateKey)
    }

    pub async fn lock(&self) {
        let mut unlocked = self.unlocked.write().await;
        *unlocked = false;
        debug!("Locked account {}", self.id);
    }

    /// Open the signing gate. The passphrase is accepted but unused.
    pub async fn unlock(&self, _passphrase: &[u8]) -> Result<()> {
        let mut unlocked = self.unlocked.write().await;
        *unlocked = true;
        debug!("Unlocked account {}", self.id);
        Ok(())
    }

    pub async fn is_unlocked(&self) -> bool {
        *self.unlocked.read().await
    }

    /// Sign `data` under `domain` through the key service
    pub async fn sign(&self, data: &[u8], domain: u64) -> Result<Signature> {
        let unlocked = self.unlocked.read().await;
        if !*unlocked {
            return Err(KeystoreError::Locked(
                "cannot sign when account is locked".to_string(),
            ));
        }

        let signature = self.key_service.sign(data, domain).await?;
        drop(unlocked);

        info!("Signed with account {} (domain {})", self.id, domain);
        Ok(signature)
    }

    /// Like [`sign`](Self::sign), but stops waiting once `token` is cancelled
    pub async fn sign_cancellable(
        &self,
        data: &[u8],
        domain: u64,
        token: &CancellationToken,
    ) -> Result<Signature> {
        let unlocked = self.unlocked.read().await;
        if !*unlocked {
            return Err(KeystoreError::Locked(
                "cannot sign when account is locked".to_string(),
            ));
        }

        let signature = self
            .key_service
            .sign_cancellable(data, domain, token)
            .await?;
        drop(unlocked);

        info!("Signed with account {} (domain {})", self.id, domain);
        Ok(signature)
    }

    /// The persisted record for this account
    pub fn to_record(&self) -> AccountRecord {
        AccountRecord {
            id: self.id,
            name: self.name.clone(),
            public_key: self.public_key,
            scheme: self.scheme,
            key_service: self.key_service.binding(),
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        self.to_record().encode()
    }
}

#[async_trait]
impl WalletAccount for Account {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn public_key(&self) -> PublicKey {
        self.public_key
    }

    fn path(&self) -> &str {
        Account::path(self)
    }

    async fn lock(&self) {
        Account::lock(self).await
    }

    async fn unlock(&self, passphrase: &[u8]) -> Result<()> {
        Account::unlock(self, passphrase).await
    }

    async fn is_unlocked(&self) -> bool {
        Account::is_unlocked(self).await
    }

    async fn sign(&self, data: &[u8], domain: u64) -> Result<Signature> {
        Account::sign(self, data, domain).await
    }
}
