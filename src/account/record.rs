//! Persisted account records
//!
//! Records are decoded in two phases. The JSON is first parsed into an untyped
//! object, then each field is checked for presence and type in a fixed order
//! (uuid, name, pubkey, version, keyService) so that the first defect reported
//! is always the same one. A field holding `null` is present but invalid.

use crate::crypto::PublicKey;
use crate::errors::{KeystoreError, Result};
use crate::keyservice::protocol::json_u64;
use crate::keyservice::KeyServiceBinding;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Supported keystore schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeystoreScheme {
    /// keystorev4
    V4,
}

impl KeystoreScheme {
    pub fn as_u32(&self) -> u32 {
        match self {
            KeystoreScheme::V4 => 4,
        }
    }

    pub fn from_u32(version: u32) -> Result<Self> {
        match version {
            4 => Ok(KeystoreScheme::V4),
            _ => Err(KeystoreError::UnsupportedVersion(
                "unsupported keystore version".to_string(),
            )),
        }
    }
}

#[derive(Serialize)]
struct AccountRecordJson<'a> {
    uuid: Uuid,
    name: &'a str,
    pubkey: String,
    version: u32,
    #[serde(rename = "keyService")]
    key_service: &'a KeyServiceBinding,
}

/// A validated account record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub id: Uuid,
    pub name: String,
    pub public_key: PublicKey,
    pub scheme: KeystoreScheme,
    pub key_service: KeyServiceBinding,
}

fn invalid(msg: &str) -> KeystoreError {
    KeystoreError::ValidationError(msg.to_string())
}

impl AccountRecord {
    /// Serialize to the persisted JSON form
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_json())?)
    }

    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self.to_json())?)
    }

    fn to_json(&self) -> AccountRecordJson<'_> {
        AccountRecordJson {
            uuid: self.id,
            name: &self.name,
            pubkey: self.public_key.to_hex(),
            version: self.scheme.as_u32(),
            key_service: &self.key_service,
        }
    }

    /// Parse and validate a persisted record
    pub fn decode(data: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(data)?;
        Self::from_value(value)
    }

    /// Decode an already-parsed JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Self::validate(fields),
            _ => Err(invalid("account record is not a JSON object")),
        }
    }

    fn validate(mut fields: Map<String, Value>) -> Result<Self> {
        // Older records used "id"
        let raw_id = fields.remove("uuid").or_else(|| fields.remove("id"));
        let id = match raw_id {
            Some(Value::String(s)) => Uuid::parse_str(&s).map_err(|_| invalid("account ID invalid"))?,
            Some(_) => return Err(invalid("account ID invalid")),
            None => return Err(invalid("account ID missing")),
        };

        let name = match fields.remove("name") {
            Some(Value::String(s)) => s,
            Some(_) => return Err(invalid("account name invalid")),
            None => return Err(invalid("account name missing")),
        };

        let public_key = match fields.remove("pubkey") {
            Some(Value::String(s)) => PublicKey::from_hex(&s)?,
            Some(_) => return Err(invalid("account pubkey invalid")),
            None => return Err(invalid("account pubkey missing")),
        };

        let version = match fields.remove("version") {
            Some(v) => json_u64(&v).ok_or_else(|| invalid("account version invalid"))?,
            None => return Err(invalid("account version missing")),
        };
        let scheme = u32::try_from(version)
            .map_err(|_| {
                KeystoreError::UnsupportedVersion("unsupported keystore version".to_string())
            })
            .and_then(KeystoreScheme::from_u32)?;

        let key_service = match fields.remove("keyService") {
            Some(v @ Value::Object(_)) => KeyServiceBinding::from_value(&v)?,
            Some(_) => return Err(invalid("account keyService invalid")),
            None => return Err(invalid("account keyService missing")),
        };

        if let Some(bound) = &key_service.pubkey {
            if PublicKey::from_hex(bound)? != public_key {
                return Err(invalid("account keyService pubkey mismatch"));
            }
        }

        Ok(Self {
            id,
            name,
            public_key,
            scheme,
            key_service,
        })
    }
}
