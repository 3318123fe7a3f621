//! Persisted wallet header
//!
//! Decoding is two-phase like account records. Fields are checked in the
//! order uuid, name, crypto, nextaccount, type, version, keyService, and the
//! first missing or mistyped one is reported. `null` counts as mistyped.

use crate::errors::{KeystoreError, Result};
use crate::keyservice::protocol::json_u64;
use crate::keyservice::KeyServiceBinding;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// The only wallet type this crate handles
pub const WALLET_TYPE: &str = "multi-party";

/// Current wallet header version
pub const WALLET_VERSION: u32 = 1;

#[derive(Serialize)]
struct WalletHeaderJson<'a> {
    uuid: Uuid,
    name: &'a str,
    nextaccount: u64,
    #[serde(rename = "type")]
    wallet_type: &'a str,
    version: u32,
    crypto: &'a Map<String, Value>,
    #[serde(rename = "keyService")]
    key_service: &'a KeyServiceBinding,
}

/// A validated wallet header
#[derive(Debug, Clone, PartialEq)]
pub struct WalletHeader {
    pub id: Uuid,
    pub name: String,
    pub next_account: u64,
    pub version: u32,
    pub crypto: Map<String, Value>,
    pub key_service: KeyServiceBinding,
}

fn invalid(msg: &str) -> KeystoreError {
    KeystoreError::ValidationError(msg.to_string())
}

impl WalletHeader {
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_json())?)
    }

    /// The header as a JSON value, as embedded in exports
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self.to_json())?)
    }

    fn to_json(&self) -> WalletHeaderJson<'_> {
        WalletHeaderJson {
            uuid: self.id,
            name: &self.name,
            nextaccount: self.next_account,
            wallet_type: WALLET_TYPE,
            version: self.version,
            crypto: &self.crypto,
            key_service: &self.key_service,
        }
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(data)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Self::validate(fields),
            _ => Err(invalid("wallet header is not a JSON object")),
        }
    }

    fn validate(mut fields: Map<String, Value>) -> Result<Self> {
        let raw_id = fields.remove("uuid").or_else(|| fields.remove("id"));
        let id = match raw_id {
            Some(Value::String(s)) => Uuid::parse_str(&s).map_err(|_| invalid("wallet ID invalid"))?,
            Some(_) => return Err(invalid("wallet ID invalid")),
            None => return Err(invalid("wallet ID missing")),
        };

        let name = match fields.remove("name") {
            Some(Value::String(s)) => s,
            Some(_) => return Err(invalid("wallet name invalid")),
            None => return Err(invalid("wallet name missing")),
        };

        let crypto = match fields.remove("crypto") {
            Some(Value::Object(map)) => map,
            Some(_) => return Err(invalid("wallet crypto invalid")),
            None => return Err(invalid("wallet crypto missing")),
        };

        let next_account = match fields.remove("nextaccount") {
            Some(v) => json_u64(&v).ok_or_else(|| invalid("wallet next account invalid"))?,
            None => return Err(invalid("wallet next account missing")),
        };

        match fields.remove("type") {
            Some(Value::String(t)) if t == WALLET_TYPE => {}
            Some(Value::String(t)) => {
                return Err(KeystoreError::ValidationError(format!(
                    "wallet type \"{}\" unexpected",
                    t
                )))
            }
            Some(_) => return Err(invalid("wallet type invalid")),
            None => return Err(invalid("wallet type missing")),
        }

        let version = match fields.remove("version") {
            Some(v) => json_u64(&v)
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| invalid("wallet version invalid"))?,
            None => return Err(invalid("wallet version missing")),
        };

        let key_service = match fields.remove("keyService") {
            Some(v @ Value::Object(_)) => KeyServiceBinding::from_value(&v)?,
            Some(_) => return Err(invalid("wallet keyService invalid")),
            None => return Err(invalid("wallet keyService missing")),
        };

        Ok(Self {
            id,
            name,
            next_account,
            version,
            crypto,
            key_service,
        })
    }
}
