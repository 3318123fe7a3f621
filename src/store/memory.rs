//! In-memory store
//!
//! Nothing survives the process. Useful for tests and for hosts that persist
//! exports themselves.

use crate::errors::{KeystoreError, Result};
use crate::store::Store;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;
use uuid::Uuid;

struct StoredWallet {
    name: String,
    data: Vec<u8>,
}

/// Store backed by in-process maps
pub struct MemoryStore {
    wallets: RwLock<HashMap<Uuid, StoredWallet>>,
    /// wallet id -> account id -> record
    accounts: RwLock<HashMap<Uuid, BTreeMap<Uuid, Vec<u8>>>>,
    indices: RwLock<HashMap<Uuid, Vec<u8>>>,
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| KeystoreError::StorageError("memory store lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| KeystoreError::StorageError("memory store lock poisoned".to_string()))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            wallets: RwLock::new(HashMap::new()),
            accounts: RwLock::new(HashMap::new()),
            indices: RwLock::new(HashMap::new()),
        }
    }

    /// Number of wallets held
    pub fn wallet_count(&self) -> usize {
        self.wallets.read().map(|w| w.len()).unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn store_wallet(&self, wallet_id: Uuid, wallet_name: &str, data: &[u8]) -> Result<()> {
        let mut wallets = write(&self.wallets)?;
        wallets.insert(
            wallet_id,
            StoredWallet {
                name: wallet_name.to_string(),
                data: data.to_vec(),
            },
        );
        debug!("Stored wallet {} ({})", wallet_name, wallet_id);
        Ok(())
    }

    fn retrieve_wallet(&self, wallet_name: &str) -> Result<Vec<u8>> {
        let wallets = read(&self.wallets)?;
        wallets
            .values()
            .find(|w| w.name == wallet_name)
            .map(|w| w.data.clone())
            .ok_or_else(|| KeystoreError::NotFound(format!("wallet {}", wallet_name)))
    }

    fn retrieve_wallet_by_id(&self, wallet_id: Uuid) -> Result<Vec<u8>> {
        let wallets = read(&self.wallets)?;
        wallets
            .get(&wallet_id)
            .map(|w| w.data.clone())
            .ok_or_else(|| KeystoreError::NotFound(format!("wallet {}", wallet_id)))
    }

    fn retrieve_wallets(&self) -> Result<Vec<Vec<u8>>> {
        let wallets = read(&self.wallets)?;
        Ok(wallets.values().map(|w| w.data.clone()).collect())
    }

    fn store_account(&self, wallet_id: Uuid, account_id: Uuid, data: &[u8]) -> Result<()> {
        let mut accounts = write(&self.accounts)?;
        accounts
            .entry(wallet_id)
            .or_default()
            .insert(account_id, data.to_vec());
        debug!("Stored account {} in wallet {}", account_id, wallet_id);
        Ok(())
    }

    fn retrieve_account(&self, wallet_id: Uuid, account_id: Uuid) -> Result<Vec<u8>> {
        let accounts = read(&self.accounts)?;
        accounts
            .get(&wallet_id)
            .and_then(|a| a.get(&account_id))
            .cloned()
            .ok_or_else(|| KeystoreError::NotFound(format!("account {}", account_id)))
    }

    fn retrieve_accounts(&self, wallet_id: Uuid) -> Result<Vec<Vec<u8>>> {
        let accounts = read(&self.accounts)?;
        Ok(accounts
            .get(&wallet_id)
            .map(|a| a.values().cloned().collect())
            .unwrap_or_default())
    }

    fn store_accounts_index(&self, wallet_id: Uuid, data: &[u8]) -> Result<()> {
        let mut indices = write(&self.indices)?;
        indices.insert(wallet_id, data.to_vec());
        Ok(())
    }

    fn retrieve_accounts_index(&self, wallet_id: Uuid) -> Result<Vec<u8>> {
        let indices = read(&self.indices)?;
        indices
            .get(&wallet_id)
            .cloned()
            .ok_or_else(|| KeystoreError::NotFound(format!("account index for wallet {}", wallet_id)))
    }
}
