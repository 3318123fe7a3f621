//! mpc-keystore - wallets and accounts whose keys live in an MPC key service
//!
//! Accounts hold only a BLS12-381 public key and the address of the remote
//! key service that owns the key shares. Signing is a single HTTP round trip
//! to that service, gated by a local lock flag.
//!
//! - [`keyservice`]: HTTP client for the key service protocol
//! - [`account`]: lockable accounts and their persisted records
//! - [`wallet`]: account creation, lookup, export and import
//! - [`store`] / [`encryptor`]: persistence and export sealing backends
//!
//! # Example
//!
//! ```no_run
//! use mpc_keystore::{KeystoreEncryptor, MemoryStore, Wallet};
//! use std::sync::Arc;
//!
//! # async fn run() -> mpc_keystore::Result<()> {
//! let wallet = Wallet::create(
//!     "validators",
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(KeystoreEncryptor::new()),
//!     "http://mpc.internal:8000",
//! )?;
//! wallet.unlock(b"").await?;
//!
//! let account = wallet.create_account("validator 1", b"").await?;
//! account.unlock(b"").await?;
//! let signature = account.sign(b"block root", 7).await?;
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod config;
pub mod crypto;
pub mod encryptor;
pub mod errors;
pub mod keyservice;
pub mod logging;
pub mod store;
pub mod types;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use account::{Account, AccountRecord, KeystoreScheme};
pub use crate::config::Config;
pub use crypto::{PublicKey, Signature};
pub use encryptor::{Encryptor, KeystoreEncryptor};
pub use errors::{KeystoreError, Result};
pub use keyservice::{KeyServiceClient, ProtocolVersion};
pub use store::{FilesystemStore, MemoryStore, Store};
pub use types::{KeyWallet, WalletAccount};
pub use wallet::Wallet;
