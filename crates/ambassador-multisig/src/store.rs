//! Out-of-band storage for pending decisions.
//!
//! Values are opaque strings grouped by bucket. Every write names the
//! version it replaces (`None` for a create) and fails with
//! [`MultisigError::Conflict`] when another writer got there first.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::MultisigError;

/// A stored value and the version it was written at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: String,
    pub version: u64,
}

#[async_trait]
pub trait DecisionStore: Send + Sync {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Versioned>, MultisigError>;

    /// Write `value` if the stored version equals `expected`, returning the
    /// new version.
    async fn save(
        &self,
        bucket: &str,
        key: &str,
        value: String,
        expected: Option<u64>,
    ) -> Result<u64, MultisigError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), MultisigError>;
}

/// In-process store.
#[derive(Default)]
pub struct MemoryDecisionStore {
    entries: RwLock<HashMap<(String, String), Versioned>>,
}

impl MemoryDecisionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DecisionStore for MemoryDecisionStore {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<Versioned>, MultisigError> {
        Ok(self
            .entries
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned())
    }

    async fn save(
        &self,
        bucket: &str,
        key: &str,
        value: String,
        expected: Option<u64>,
    ) -> Result<u64, MultisigError> {
        let mut entries = self.entries.write().await;
        let slot = (bucket.to_string(), key.to_string());
        let found = entries.get(&slot).map(|v| v.version);
        if found != expected {
            return Err(MultisigError::Conflict {
                key: key.to_string(),
                expected,
                found,
            });
        }
        let version = found.map_or(1, |v| v + 1);
        entries.insert(slot, Versioned { value, version });
        Ok(version)
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), MultisigError> {
        self.entries
            .write()
            .await
            .remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}
