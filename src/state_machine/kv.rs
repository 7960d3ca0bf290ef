//! In-memory item store.
//!
//! Identical sequences of commitments produce identical maps on every node;
//! values are opaque strings. Uniqueness is enforced here, not by callers:
//! `add` of a present key and `update` onto a different present key are
//! rejected.

use std::collections::HashMap;

use tracing::warn;

use super::{bootstrap_log, StoreError};
use crate::core::log::{CommitOp, Commitment};

/// Deterministic mapping of key to value with add/update/delete semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemStore {
    items: HashMap<String, String>,
}

impl ItemStore {
    /// An empty store, used as the fold baseline in tests.
    pub fn new() -> Self {
        ItemStore::default()
    }

    /// A store seeded with the bootstrap sequence, the state every node
    /// starts from.
    pub fn bootstrap() -> Self {
        Self::rebuild(&bootstrap_log())
    }

    /// Re-seed to the bootstrap baseline and fold an entire transported log.
    /// Apply errors are logged and skipped so every node converges on the
    /// same surviving entries.
    pub fn rebuild(log: &[Commitment]) -> Self {
        let mut store = ItemStore::new();
        for commitment in bootstrap_log().iter().chain(log) {
            if let Err(err) = store.apply(commitment) {
                warn!(key = %commitment.key, %err, "skipping log entry during rebuild");
            }
        }
        store
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    /// Snapshot of the full mapping, for `itemMap` responses.
    pub fn all(&self) -> HashMap<String, String> {
        self.items.clone()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        if self.items.contains_key(key) {
            return Err(StoreError::Exists);
        }
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Rename `old_key` to `key` and set its value. Renaming onto an
    /// existing key other than `old_key` is rejected; an absent `old_key`
    /// makes the removal a no-op and the update an insert.
    pub fn update(&mut self, old_key: &str, key: &str, value: &str) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }
        if key != old_key && self.items.contains_key(key) {
            return Err(StoreError::Taken);
        }
        self.items.remove(old_key);
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        if self.items.remove(key).is_none() {
            return Err(StoreError::Missing);
        }
        Ok(())
    }

    /// Apply one commitment.
    pub fn apply(&mut self, commitment: &Commitment) -> Result<(), StoreError> {
        match commitment.op {
            CommitOp::Add => self.add(&commitment.key, &commitment.value),
            CommitOp::Update => {
                self.update(&commitment.old_key, &commitment.key, &commitment.value)
            }
            CommitOp::Delete => self.delete(&commitment.key),
        }
    }
}
