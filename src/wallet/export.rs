//! Encrypted wallet export and import
//!
//! The plaintext bundle is `{"wallet": <header>, "accounts": [<record>, ...]}`;
//! the encryptor seals it under the export passphrase.

use crate::account::{Account, AccountRecord};
use crate::encryptor::Encryptor;
use crate::errors::{KeystoreError, Result};
use crate::keyservice::{http_client, DEFAULT_REQUEST_TIMEOUT};
use crate::store::Store;
use crate::wallet::{ensure_absent, AccountIndex, Wallet, WalletHeader};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
struct ExportBundle {
    wallet: Value,
    accounts: Vec<Value>,
}

impl Wallet {
    /// Seal the header and every account record under `passphrase`
    pub async fn export(&self, passphrase: &[u8]) -> Result<Vec<u8>> {
        let accounts = self
            .accounts()
            .await?
            .iter()
            .map(|a| a.to_record().to_value())
            .collect::<Result<Vec<_>>>()?;
        let count = accounts.len();

        let bundle = ExportBundle {
            wallet: self.header().to_value()?,
            accounts,
        };
        let plaintext = serde_json::to_vec(&bundle)?;
        let sealed = self.encryptor.encrypt(&plaintext, passphrase)?;

        info!("Exported wallet {} with {} accounts", self.name, count);
        Ok(sealed)
    }

    /// Recreate an exported wallet inside `store`
    pub async fn import(
        dump: &[u8],
        passphrase: &[u8],
        store: Arc<dyn Store>,
        encryptor: Arc<dyn Encryptor>,
    ) -> Result<Self> {
        Self::import_with_timeout(dump, passphrase, store, encryptor, DEFAULT_REQUEST_TIMEOUT).await
    }

    pub async fn import_with_timeout(
        dump: &[u8],
        passphrase: &[u8],
        store: Arc<dyn Store>,
        encryptor: Arc<dyn Encryptor>,
        timeout: Duration,
    ) -> Result<Self> {
        let plaintext = encryptor.decrypt(dump, passphrase)?;
        let bundle: ExportBundle = serde_json::from_slice(&plaintext).map_err(|e| {
            KeystoreError::ValidationError(format!("export bundle invalid: {}", e))
        })?;

        let header = WalletHeader::from_value(bundle.wallet)?;
        ensure_absent(
            store.retrieve_wallet_by_id(header.id),
            format!("wallet {}", header.id),
        )?;
        ensure_absent(
            store.retrieve_wallet(&header.name),
            format!("wallet {}", header.name),
        )?;

        let http = http_client(timeout)?;

        // Decode everything before touching the store
        let mut accounts = BTreeMap::new();
        for value in bundle.accounts {
            let record = AccountRecord::from_value(value)?;
            let account = Account::from_record(record, header.id, http.clone())?;
            accounts.insert(account.id(), Arc::new(account));
        }

        let wallet = Self::from_header(header, AccountIndex::new(), store, encryptor, http)?;
        wallet.store_header()?;
        for account in accounts.values() {
            wallet.store_account(account).await?;
        }
        *wallet.accounts.write().await = Some(accounts);

        info!("Imported wallet {} ({})", wallet.name, wallet.id);
        Ok(wallet)
    }
}
