//! Multi-party wallets
//!
//! A wallet is a named group of accounts sharing one key service. It keeps no
//! secrets: its header records the key service binding and the next account
//! index, and each account record carries its own binding.

pub mod export;
pub mod header;
pub mod index;

pub use header::{WalletHeader, WALLET_TYPE, WALLET_VERSION};
pub use index::AccountIndex;

use crate::account::{Account, KeystoreScheme};
use crate::encryptor::Encryptor;
use crate::errors::{KeystoreError, Result};
use crate::keyservice::{http_client, KeyServiceClient, DEFAULT_REQUEST_TIMEOUT};
use crate::store::Store;
use crate::types::{KeyWallet, WalletAccount};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A wallet whose accounts sign through a remote MPC key service
pub struct Wallet {
    id: Uuid,
    name: String,
    version: u32,
    crypto: Map<String, Value>,
    key_service: KeyServiceClient,
    next_account: AtomicU64,
    store: Arc<dyn Store>,
    encryptor: Arc<dyn Encryptor>,
    http: reqwest::Client,
    unlocked: RwLock<bool>,
    index: RwLock<AccountIndex>,
    /// Loaded on first use
    accounts: RwLock<Option<BTreeMap<Uuid, Arc<Account>>>>,
    creation: Mutex<()>,
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("key_service", &self.key_service.url())
            .field("store", &self.store.name())
            .finish()
    }
}

/// Fail with Duplicate if `lookup` finds an entry
fn ensure_absent(lookup: Result<Vec<u8>>, what: String) -> Result<()> {
    match lookup {
        Ok(_) => Err(KeystoreError::Duplicate(what)),
        Err(KeystoreError::NotFound(_)) => Ok(()),
        Err(e) => Err(e),
    }
}

impl Wallet {
    /// Create and persist a new wallet bound to the key service at `url`
    pub fn create(
        name: &str,
        store: Arc<dyn Store>,
        encryptor: Arc<dyn Encryptor>,
        url: &str,
    ) -> Result<Self> {
        Self::create_with_timeout(name, store, encryptor, url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Like [`create`](Self::create), with an explicit key service deadline
    pub fn create_with_timeout(
        name: &str,
        store: Arc<dyn Store>,
        encryptor: Arc<dyn Encryptor>,
        url: &str,
        timeout: Duration,
    ) -> Result<Self> {
        if name.is_empty() {
            return Err(KeystoreError::ValidationError(
                "wallet name missing".to_string(),
            ));
        }
        ensure_absent(store.retrieve_wallet(name), format!("wallet {}", name))?;

        let http = http_client(timeout)?;
        let key_service = KeyServiceClient::with_http(url, http.clone())?;

        let wallet = Self::assemble(
            WalletHeader {
                id: Uuid::new_v4(),
                name: name.to_string(),
                next_account: 0,
                version: WALLET_VERSION,
                crypto: Map::new(),
                key_service: key_service.binding(),
            },
            key_service,
            AccountIndex::new(),
            store,
            encryptor,
            http,
        );
        wallet.store_header()?;

        info!("Created wallet {} ({}) using {}", wallet.name, wallet.id, url);
        Ok(wallet)
    }

    /// Open the wallet called `name`
    pub fn open(name: &str, store: Arc<dyn Store>, encryptor: Arc<dyn Encryptor>) -> Result<Self> {
        Self::open_with_timeout(name, store, encryptor, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn open_with_timeout(
        name: &str,
        store: Arc<dyn Store>,
        encryptor: Arc<dyn Encryptor>,
        timeout: Duration,
    ) -> Result<Self> {
        let data = store.retrieve_wallet(name)?;
        let wallet = Self::deserialize(&data, store, encryptor, http_client(timeout)?)?;
        debug!("Opened wallet {} ({})", wallet.name, wallet.id);
        Ok(wallet)
    }

    /// Rebuild a wallet from its stored header
    pub fn deserialize(
        data: &[u8],
        store: Arc<dyn Store>,
        encryptor: Arc<dyn Encryptor>,
        http: reqwest::Client,
    ) -> Result<Self> {
        let header = WalletHeader::decode(data)?;
        let index = match store.retrieve_accounts_index(header.id) {
            Ok(data) => AccountIndex::decode(&data)?,
            Err(KeystoreError::NotFound(_)) => AccountIndex::new(),
            Err(e) => return Err(e),
        };
        Self::from_header(header, index, store, encryptor, http)
    }

    fn from_header(
        header: WalletHeader,
        index: AccountIndex,
        store: Arc<dyn Store>,
        encryptor: Arc<dyn Encryptor>,
        http: reqwest::Client,
    ) -> Result<Self> {
        let key_service = KeyServiceClient::from_binding(&header.key_service, http.clone())?;
        Ok(Self::assemble(header, key_service, index, store, encryptor, http))
    }

    fn assemble(
        header: WalletHeader,
        key_service: KeyServiceClient,
        index: AccountIndex,
        store: Arc<dyn Store>,
        encryptor: Arc<dyn Encryptor>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            id: header.id,
            name: header.name,
            version: header.version,
            crypto: header.crypto,
            key_service,
            next_account: AtomicU64::new(header.next_account),
            store,
            encryptor,
            http,
            unlocked: RwLock::new(false),
            index: RwLock::new(index),
            accounts: RwLock::new(None),
            creation: Mutex::new(()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Always "multi-party"
    pub fn wallet_type(&self) -> &str {
        WALLET_TYPE
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Index the next created account will receive
    pub fn next_account(&self) -> u64 {
        self.next_account.load(Ordering::SeqCst)
    }

    pub fn key_service(&self) -> &KeyServiceClient {
        &self.key_service
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn header(&self) -> WalletHeader {
        WalletHeader {
            id: self.id,
            name: self.name.clone(),
            next_account: self.next_account(),
            version: self.version,
            crypto: self.crypto.clone(),
            key_service: self.key_service.binding(),
        }
    }

    fn store_header(&self) -> Result<()> {
        self.store
            .store_wallet(self.id, &self.name, &self.header().encode()?)
    }

    pub async fn lock(&self) {
        *self.unlocked.write().await = false;
    }

    /// Always succeeds; multi-party wallets hold nothing to decrypt
    pub async fn unlock(&self, _passphrase: &[u8]) -> Result<()> {
        *self.unlocked.write().await = true;
        Ok(())
    }

    pub async fn is_unlocked(&self) -> bool {
        *self.unlocked.read().await
    }

    /// Create a new account whose key is generated by the key service
    ///
    /// The new account starts locked. Creations on one wallet run one at a
    /// time so that account indices stay unique.
    pub async fn create_account(&self, name: &str, _passphrase: &[u8]) -> Result<Arc<Account>> {
        if !self.is_unlocked().await {
            return Err(KeystoreError::Locked(
                "wallet must be unlocked to create accounts".to_string(),
            ));
        }
        if name.is_empty() {
            return Err(KeystoreError::ValidationError(
                "account name missing".to_string(),
            ));
        }

        let _creating = self.creation.lock().await;

        if self.index.read().await.contains_name(name) {
            return Err(KeystoreError::Duplicate(format!("account {}", name)));
        }

        let account_index = self.next_account();

        // A fresh client asks the service for a brand new key
        let client = KeyServiceClient::with_http(self.key_service.url(), self.http.clone())?;
        let public_key = client.public_key().await?;

        let account = Arc::new(Account::new(
            Uuid::new_v4(),
            name,
            public_key,
            KeystoreScheme::V4,
            self.id,
            client,
        )?);
        self.store_account(&account).await?;

        self.next_account.store(account_index + 1, Ordering::SeqCst);
        self.store_header()?;

        if let Some(accounts) = self.accounts.write().await.as_mut() {
            accounts.insert(account.id(), account.clone());
        }

        info!(
            "Created account {} ({}) at index {} in wallet {}",
            name,
            account.id(),
            account_index,
            self.name
        );
        Ok(account)
    }

    /// Persist an account: index first, then the record itself
    ///
    /// If either write fails the index entry is taken back out, so the name
    /// stays free for a later attempt.
    pub(crate) async fn store_account(&self, account: &Account) -> Result<()> {
        let data = account.serialize()?;
        let mut index = self.index.write().await;
        index.add(account.id(), account.name());

        let stored = index
            .encode()
            .and_then(|encoded| self.store.store_accounts_index(self.id, &encoded))
            .and_then(|_| self.store.store_account(self.id, account.id(), &data));

        if let Err(e) = stored {
            index.remove(&account.id());
            let restored = index
                .encode()
                .and_then(|encoded| self.store.store_accounts_index(self.id, &encoded));
            if let Err(restore_err) = restored {
                warn!(
                    "Failed to restore account index for wallet {}: {}",
                    self.name, restore_err
                );
            }
            return Err(e);
        }
        Ok(())
    }

    /// Every account in the wallet
    pub async fn accounts(&self) -> Result<Vec<Arc<Account>>> {
        let mut cache = self.accounts.write().await;
        if cache.is_none() {
            *cache = Some(self.load_accounts()?);
        }
        Ok(cache.iter().flat_map(|a| a.values().cloned()).collect())
    }

    fn load_accounts(&self) -> Result<BTreeMap<Uuid, Arc<Account>>> {
        let mut accounts = BTreeMap::new();
        for data in self.store.retrieve_accounts(self.id)? {
            let account = Account::deserialize(&data, self.id, self.http.clone())?;
            accounts.insert(account.id(), Arc::new(account));
        }
        debug!("Loaded {} accounts for wallet {}", accounts.len(), self.name);
        Ok(accounts)
    }

    pub async fn account_by_id(&self, id: Uuid) -> Result<Arc<Account>> {
        if self.index.read().await.name(&id).is_none() {
            return Err(KeystoreError::NotFound(format!("account {}", id)));
        }
        self.accounts()
            .await?
            .into_iter()
            .find(|a| a.id() == id)
            .ok_or_else(|| KeystoreError::NotFound(format!("account {}", id)))
    }

    pub async fn account_by_name(&self, name: &str) -> Result<Arc<Account>> {
        let id = self
            .index
            .read()
            .await
            .id(name)
            .ok_or_else(|| KeystoreError::NotFound(format!("account {}", name)))?;
        self.account_by_id(id).await
    }
}

#[async_trait]
impl KeyWallet for Wallet {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn wallet_type(&self) -> &str {
        WALLET_TYPE
    }

    fn version(&self) -> u32 {
        self.version
    }

    async fn lock(&self) {
        Wallet::lock(self).await
    }

    async fn unlock(&self, passphrase: &[u8]) -> Result<()> {
        Wallet::unlock(self, passphrase).await
    }

    async fn is_unlocked(&self) -> bool {
        Wallet::is_unlocked(self).await
    }

    async fn accounts(&self) -> Result<Vec<Arc<dyn WalletAccount>>> {
        Ok(Wallet::accounts(self)
            .await?
            .into_iter()
            .map(|a| a as Arc<dyn WalletAccount>)
            .collect())
    }

    async fn create_account(
        &self,
        name: &str,
        passphrase: &[u8],
    ) -> Result<Arc<dyn WalletAccount>> {
        let account = Wallet::create_account(self, name, passphrase).await?;
        Ok(account as Arc<dyn WalletAccount>)
    }
}
