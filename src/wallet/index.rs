//! Account index: account UUID to account name, one per wallet

use crate::errors::{KeystoreError, Result};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountIndex {
    entries: BTreeMap<Uuid, String>,
}

impl AccountIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: Uuid, name: &str) {
        self.entries.insert(id, name.to_string());
    }

    pub fn remove(&mut self, id: &Uuid) -> Option<String> {
        self.entries.remove(id)
    }

    pub fn name(&self, id: &Uuid) -> Option<&str> {
        self.entries.get(id).map(String::as_str)
    }

    pub fn id(&self, name: &str) -> Option<Uuid> {
        self.entries
            .iter()
            .find(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.id(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `{"<uuid>": "<name>", ...}`
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.entries)?)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let entries: BTreeMap<Uuid, String> = serde_json::from_slice(data).map_err(|e| {
            KeystoreError::ValidationError(format!("account index invalid: {}", e))
        })?;
        Ok(Self { entries })
    }
}
