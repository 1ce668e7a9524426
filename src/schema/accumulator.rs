//! Order-preserving key accumulator
//!
//! Collects every key path observed while flattening a batch of documents.
//! Keys are kept in the order they were first seen and never removed; the
//! final key list is the column order of the exported table.

use std::collections::HashSet;

/// Append-only ordered set of key paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySchema {
    keys: Vec<String>,
    seen: HashSet<String>,
}

impl KeySchema {
    pub fn new() -> Self {
        KeySchema::default()
    }

    /// Create a schema whose first columns are `keys`
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut schema = KeySchema::new();
        for key in keys {
            schema.insert(key);
        }
        schema
    }

    /// Append `key` unless it is already present. Returns true when added.
    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        let key = key.into();
        if self.seen.contains(&key) {
            return false;
        }
        self.seen.insert(key.clone());
        self.keys.push(key);
        true
    }

    /// Order-preserving union with another schema
    pub fn merge(&mut self, other: &KeySchema) {
        for key in other.keys() {
            self.insert(key.as_str());
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    /// Keys in first-seen order
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for KeySchema {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        KeySchema::with_keys(iter)
    }
}
