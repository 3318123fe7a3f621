//! Persistence backends for wallets, accounts and account indices
//!
//! Stores deal in opaque bytes. Wallets and accounts hand them their own
//! serialized records and decode whatever comes back.

pub mod filesystem;
pub mod memory;

pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;

use crate::errors::Result;
use uuid::Uuid;

/// Backend holding wallet headers, account records and account indices
pub trait Store: Send + Sync {
    /// Short backend name, e.g. "memory"
    fn name(&self) -> &str;

    /// Write or replace a wallet header
    fn store_wallet(&self, wallet_id: Uuid, wallet_name: &str, data: &[u8]) -> Result<()>;

    fn retrieve_wallet(&self, wallet_name: &str) -> Result<Vec<u8>>;

    fn retrieve_wallet_by_id(&self, wallet_id: Uuid) -> Result<Vec<u8>>;

    /// Every wallet header held by the store
    fn retrieve_wallets(&self) -> Result<Vec<Vec<u8>>>;

    fn store_account(&self, wallet_id: Uuid, account_id: Uuid, data: &[u8]) -> Result<()>;

    fn retrieve_account(&self, wallet_id: Uuid, account_id: Uuid) -> Result<Vec<u8>>;

    /// Every account record of one wallet
    fn retrieve_accounts(&self, wallet_id: Uuid) -> Result<Vec<Vec<u8>>>;

    fn store_accounts_index(&self, wallet_id: Uuid, data: &[u8]) -> Result<()>;

    fn retrieve_accounts_index(&self, wallet_id: Uuid) -> Result<Vec<u8>>;
}
