//! BLS12-381 public keys and signatures
//!
//! Keys live on G1 (48-byte compressed), signatures on G2 (96-byte
//! compressed). This process never holds a secret key: signatures come back
//! from the key service and are only decoded and verified here.
//!
//! The domain tag is bound into a signature as the 8-byte little-endian
//! augmentation of the hashed message, under the proof-of-possession
//! ciphersuite tag below.

use crate::errors::{KeystoreError, Result};
use blst::min_pk;
use blst::BLST_ERROR;
use std::fmt;

/// Compressed public key length
pub const PUBLIC_KEY_LENGTH: usize = 48;

/// Compressed signature length
pub const SIGNATURE_LENGTH: usize = 96;

/// Hash-to-curve ciphersuite tag
pub const SIGNING_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Augmentation bytes mixing a domain tag into the signed message
pub fn domain_aug(domain: u64) -> [u8; 8] {
    domain.to_le_bytes()
}

/// BLS public key
#[derive(Clone, Copy)]
pub struct PublicKey {
    point: min_pk::PublicKey,
}

impl PublicKey {
    /// Decode a compressed public key. The identity and points outside the
    /// prime-order subgroup are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PUBLIC_KEY_LENGTH {
            return Err(KeystoreError::CryptoError(format!(
                "public key must be {} bytes",
                PUBLIC_KEY_LENGTH
            )));
        }

        let point = min_pk::PublicKey::key_validate(bytes).map_err(|e| {
            KeystoreError::CryptoError(format!("invalid public key: {:?}", e))
        })?;

        Ok(Self { point })
    }

    /// Decode a hex-encoded compressed public key
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| KeystoreError::CryptoError(format!("invalid public key hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Compressed bytes
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LENGTH] {
        self.point.compress()
    }

    /// Lower-case hex of the compressed bytes
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    pub(crate) fn point(&self) -> &min_pk::PublicKey {
        &self.point
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// BLS signature
#[derive(Clone, Copy)]
pub struct Signature {
    point: min_pk::Signature,
}

impl Signature {
    /// Decode a compressed signature
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SIGNATURE_LENGTH {
            return Err(KeystoreError::CryptoError(format!(
                "signature must be {} bytes",
                SIGNATURE_LENGTH
            )));
        }

        let point = min_pk::Signature::from_bytes(bytes).map_err(|e| {
            KeystoreError::CryptoError(format!("invalid signature: {:?}", e))
        })?;

        Ok(Self { point })
    }

    /// Decode a hex-encoded compressed signature
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| KeystoreError::CryptoError(format!("invalid signature hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Compressed bytes
    pub fn to_bytes(&self) -> [u8; SIGNATURE_LENGTH] {
        self.point.compress()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Check this signature over `payload` under `domain` for `public_key`
    pub fn verify(&self, payload: &[u8], public_key: &PublicKey, domain: u64) -> bool {
        let aug = domain_aug(domain);
        self.point.verify(true, payload, SIGNING_DST, &aug, public_key.point(), true)
            == BLST_ERROR::BLST_SUCCESS
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for Signature {}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestSigner;

    const PUBKEY_HEX: &str = "a99a76ed7796f7be22d5b7e85deeb7c5677e88e511e0b337618f8c4eb61349b4bf2d153f649f7b53359fe8b94a38e44c";

    #[test]
    fn test_public_key_hex() {
        let pk = PublicKey::from_hex(PUBKEY_HEX).unwrap();
        assert_eq!(pk.to_hex(), PUBKEY_HEX);
        assert_eq!(pk.to_bytes().len(), PUBLIC_KEY_LENGTH);
    }

    #[test]
    fn test_public_key_wrong_length() {
        let result = PublicKey::from_hex(&format!("{}4c", PUBKEY_HEX));
        let err = result.unwrap_err();
        assert!(matches!(err, KeystoreError::CryptoError(_)));
        assert_eq!(err.to_string(), "public key must be 48 bytes");
    }

    #[test]
    fn test_public_key_bad_hex() {
        let bad = format!("{}h", &PUBKEY_HEX[..95]);
        assert!(matches!(
            PublicKey::from_hex(&bad),
            Err(KeystoreError::CryptoError(_))
        ));
    }

    #[test]
    fn test_public_key_identity_rejected() {
        // Compressed point at infinity
        let identity = format!("c0{}", "00".repeat(47));
        let err = PublicKey::from_hex(&identity).unwrap_err();
        assert!(matches!(err, KeystoreError::CryptoError(_)));
        assert!(err.to_string().starts_with("invalid public key"));
    }

    #[test]
    fn test_sign_verify() {
        let signer = TestSigner::from_seed(1);
        let sig = signer.sign(b"abcd", 42);

        assert!(sig.verify(b"abcd", &signer.public_key(), 42));
        assert!(!sig.verify(b"abcd", &signer.public_key(), 43));
        assert!(!sig.verify(b"abce", &signer.public_key(), 42));

        let other = TestSigner::from_seed(2);
        assert!(!sig.verify(b"abcd", &other.public_key(), 42));
    }

    #[test]
    fn test_signature_bytes() {
        let signer = TestSigner::from_seed(3);
        let sig = signer.sign(b"payload", 0);

        let decoded = Signature::from_hex(&sig.to_hex()).unwrap();
        assert_eq!(decoded, sig);

        let err = Signature::from_bytes(&[0u8; 48]).unwrap_err();
        assert_eq!(err.to_string(), "signature must be 96 bytes");
    }
}
