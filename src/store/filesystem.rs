//! Filesystem store
//!
//! Layout, one directory per wallet:
//!
//! ```text
//! <base>/<wallet-id>/wallet.json
//! <base>/<wallet-id>/index.json
//! <base>/<wallet-id>/accounts/<account-id>.json
//! ```

use crate::errors::{KeystoreError, Result};
use crate::store::Store;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

const WALLET_FILE: &str = "wallet.json";
const INDEX_FILE: &str = "index.json";
const ACCOUNTS_DIR: &str = "accounts";

/// Store writing one JSON file per record
pub struct FilesystemStore {
    base_path: PathBuf,
}

impl FilesystemStore {
    /// Open a store rooted at `base_path`, creating the directory if needed
    pub fn new(base_path: impl AsRef<Path>) -> Result<Self> {
        let base_path = base_path.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path)?;
        }

        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn wallet_dir(&self, wallet_id: Uuid) -> PathBuf {
        self.base_path.join(wallet_id.to_string())
    }

    fn accounts_dir(&self, wallet_id: Uuid) -> PathBuf {
        self.wallet_dir(wallet_id).join(ACCOUNTS_DIR)
    }

    fn account_path(&self, wallet_id: Uuid, account_id: Uuid) -> PathBuf {
        self.accounts_dir(wallet_id).join(format!("{}.json", account_id))
    }

    /// Wallet directories present under the base path
    fn wallet_dirs(&self) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if path.join(WALLET_FILE).is_file() {
                dirs.push(path);
            }
        }
        Ok(dirs)
    }
}

fn read_file(path: &Path, what: impl FnOnce() -> String) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(KeystoreError::NotFound(what()));
    }
    Ok(fs::read(path)?)
}

/// Write to a sibling temp file, then rename over the target
fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

impl Store for FilesystemStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn store_wallet(&self, wallet_id: Uuid, wallet_name: &str, data: &[u8]) -> Result<()> {
        write_file(&self.wallet_dir(wallet_id).join(WALLET_FILE), data)?;
        debug!("Stored wallet {} ({}) in {:?}", wallet_name, wallet_id, self.base_path);
        Ok(())
    }

    fn retrieve_wallet(&self, wallet_name: &str) -> Result<Vec<u8>> {
        for dir in self.wallet_dirs()? {
            let data = fs::read(dir.join(WALLET_FILE))?;
            match serde_json::from_slice::<Value>(&data) {
                Ok(value) if value.get("name").and_then(Value::as_str) == Some(wallet_name) => {
                    return Ok(data);
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable wallet in {:?}: {}", dir, e),
            }
        }
        Err(KeystoreError::NotFound(format!("wallet {}", wallet_name)))
    }

    fn retrieve_wallet_by_id(&self, wallet_id: Uuid) -> Result<Vec<u8>> {
        read_file(&self.wallet_dir(wallet_id).join(WALLET_FILE), || {
            format!("wallet {}", wallet_id)
        })
    }

    fn retrieve_wallets(&self) -> Result<Vec<Vec<u8>>> {
        self.wallet_dirs()?
            .into_iter()
            .map(|dir| Ok(fs::read(dir.join(WALLET_FILE))?))
            .collect()
    }

    fn store_account(&self, wallet_id: Uuid, account_id: Uuid, data: &[u8]) -> Result<()> {
        write_file(&self.account_path(wallet_id, account_id), data)?;
        debug!("Stored account {} in wallet {}", account_id, wallet_id);
        Ok(())
    }

    fn retrieve_account(&self, wallet_id: Uuid, account_id: Uuid) -> Result<Vec<u8>> {
        read_file(&self.account_path(wallet_id, account_id), || {
            format!("account {}", account_id)
        })
    }

    fn retrieve_accounts(&self, wallet_id: Uuid) -> Result<Vec<Vec<u8>>> {
        let dir = self.accounts_dir(wallet_id);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut accounts = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |ext| ext == "json") {
                accounts.push(fs::read(&path)?);
            }
        }
        Ok(accounts)
    }

    fn store_accounts_index(&self, wallet_id: Uuid, data: &[u8]) -> Result<()> {
        write_file(&self.wallet_dir(wallet_id).join(INDEX_FILE), data)
    }

    fn retrieve_accounts_index(&self, wallet_id: Uuid) -> Result<Vec<u8>> {
        read_file(&self.wallet_dir(wallet_id).join(INDEX_FILE), || {
            format!("account index for wallet {}", wallet_id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_creates_base_dir() {
        let dir = tempdir().unwrap();
        let base = dir.path().join("nested").join("keystore");
        let store = FilesystemStore::new(&base).unwrap();
        assert!(store.base_path().is_dir());
    }

    #[test]
    fn test_wallets() {
        let dir = tempdir().unwrap();
        let store = FilesystemStore::new(dir.path()).unwrap();
        let id = Uuid::new_v4();
        let header = br#"{"name":"primary","uuid":"x"}"#;

        store.store_wallet(id, "primary", header).unwrap();

        assert!(dir.path().join(id.to_string()).join("wallet.json").is_file());
        assert_eq!(store.retrieve_wallet("primary").unwrap(), header);
        assert_eq!(store.retrieve_wallet_by_id(id).unwrap(), header);
        assert_eq!(store.retrieve_wallets().unwrap().len(), 1);

        assert!(matches!(
            store.retrieve_wallet("missing"),
            Err(KeystoreError::NotFound(_))
        ));
        assert!(matches!(
            store.retrieve_wallet_by_id(Uuid::new_v4()),
            Err(KeystoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_accounts_and_index() {
        let dir = tempdir().unwrap();
        let store = FilesystemStore::new(dir.path()).unwrap();
        let wallet_id = Uuid::new_v4();
        let account_id = Uuid::new_v4();

        assert!(store.retrieve_accounts(wallet_id).unwrap().is_empty());

        store.store_account(wallet_id, account_id, b"{\"a\":1}").unwrap();
        store.store_account(wallet_id, Uuid::new_v4(), b"{\"a\":2}").unwrap();
        store.store_accounts_index(wallet_id, b"{}").unwrap();

        assert_eq!(
            store.retrieve_account(wallet_id, account_id).unwrap(),
            b"{\"a\":1}"
        );
        assert_eq!(store.retrieve_accounts(wallet_id).unwrap().len(), 2);
        assert_eq!(store.retrieve_accounts_index(wallet_id).unwrap(), b"{}");

        // An account directory without a header is not a wallet
        assert!(store.retrieve_wallets().unwrap().is_empty());
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let id = Uuid::new_v4();
        {
            let store = FilesystemStore::new(dir.path()).unwrap();
            store.store_wallet(id, "kept", br#"{"name":"kept"}"#).unwrap();
        }

        let store = FilesystemStore::new(dir.path()).unwrap();
        assert!(store.retrieve_wallet("kept").is_ok());
    }
}
