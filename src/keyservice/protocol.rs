//! Key service wire types
//!
//! Version 1 of the protocol:
//! - `GET {base}` answers `{"pk": "<hex>"}`
//! - `POST {base}/{hex(pubkey)}` with `{"payload": "...", "domain": n}`
//!   answers `{"sign": "<hex>"}`

use crate::errors::{KeystoreError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

/// Parse a key service endpoint, which must be an absolute URL
pub(crate) fn parse_url(raw: &str) -> Result<Url> {
    match Url::parse(raw) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Err(KeystoreError::ConfigError(
            format!("keyService URL '{}' is not absolute", raw),
        )),
        Err(e) => Err(KeystoreError::ConfigError(format!(
            "keyService URL '{}' is invalid: {}",
            raw, e
        ))),
    }
}

/// Read a JSON number as an unsigned integer. Integral floats such as `4.0`
/// are accepted; fractions, negatives and non-numbers are not.
pub(crate) fn json_u64(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    let f = value.as_f64()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

/// Supported key service protocol versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    V1,
}

impl ProtocolVersion {
    pub const CURRENT: ProtocolVersion = ProtocolVersion::V1;

    pub fn as_u32(&self) -> u32 {
        match self {
            ProtocolVersion::V1 => 1,
        }
    }

    pub fn from_u32(version: u32) -> Result<Self> {
        match version {
            1 => Ok(ProtocolVersion::V1),
            other => Err(KeystoreError::UnsupportedVersion(format!(
                "keyService version {} unsupported",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct PublicKeyResponse {
    #[serde(default)]
    pub pk: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SignRequest<'a> {
    pub payload: &'a str,
    pub domain: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignResponse {
    #[serde(default)]
    pub sign: String,
}

/// Persisted form of a key service binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyServiceBinding {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,
    pub version: u32,
}

impl KeyServiceBinding {
    /// Validate a binding object field by field: url, pubkey, version
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            KeystoreError::ValidationError("keyService invalid".to_string())
        })?;

        let url = match obj.get("url") {
            Some(Value::String(url)) => url.clone(),
            Some(_) => {
                return Err(KeystoreError::ValidationError(
                    "keyService url invalid".to_string(),
                ))
            }
            None => {
                return Err(KeystoreError::ValidationError(
                    "keyService url missing".to_string(),
                ))
            }
        };

        parse_url(&url)?;

        let pubkey = match obj.get("pubkey") {
            Some(Value::String(pk)) if !pk.is_empty() => Some(pk.clone()),
            Some(Value::String(_)) | Some(Value::Null) | None => None,
            Some(_) => {
                return Err(KeystoreError::ValidationError(
                    "keyService pubkey invalid".to_string(),
                ))
            }
        };

        let version = match obj.get("version") {
            Some(v) => json_u64(v)
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| {
                    KeystoreError::ValidationError("keyService version invalid".to_string())
                })?,
            None => {
                return Err(KeystoreError::ValidationError(
                    "keyService version missing".to_string(),
                ))
            }
        };
        ProtocolVersion::from_u32(version)?;

        Ok(Self {
            url,
            pubkey,
            version,
        })
    }
}
