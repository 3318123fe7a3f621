//! Remote MPC key service
//!
//! This module provides:
//! - The version 1 wire protocol and persisted binding format
//! - An HTTP client that fetches public keys and requests signatures

pub mod client;
pub mod protocol;

pub use client::{http_client, KeyServiceClient, DEFAULT_REQUEST_TIMEOUT};
pub use protocol::{KeyServiceBinding, ProtocolVersion};
