//! Cryptographic types for remotely produced BLS signatures

pub mod bls;

pub use bls::{PublicKey, Signature, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};
