//! In-memory keyed byte store
//!
//! The store itself has no synchronisation: it is owned by exactly one store
//! actor and only ever touched from that task.

use crate::config::Delimiters;
use bytes::Bytes;
use std::collections::HashMap;

/// Trait defining the storage operations the store actor relies on
pub trait Store: Send + 'static {
    /// Create or overwrite the entry at `key`
    fn put(&mut self, key: Bytes, value: Bytes);

    /// Get the value at `key`
    fn get(&self, key: &[u8]) -> Option<Bytes>;

    /// Snapshot of every stored value, in no particular order
    fn values(&self) -> Vec<Bytes>;

    /// Remove `key`, returning its value if it was present
    fn remove(&mut self, key: &[u8]) -> Option<Bytes>;

    /// Remove every entry and hand back the values that were stored
    fn drain(&mut self) -> Vec<Bytes>;

    /// Discard every entry
    fn clear(&mut self);

    /// Every stored key/value pair, in no particular order
    fn entries(&self) -> Vec<(Bytes, Bytes)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hash map backed store
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: HashMap<Bytes, Bytes>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn put(&mut self, key: Bytes, value: Bytes) {
        self.data.insert(key, value);
    }

    fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.data.get(key).cloned()
    }

    fn values(&self) -> Vec<Bytes> {
        self.data.values().cloned().collect()
    }

    fn remove(&mut self, key: &[u8]) -> Option<Bytes> {
        self.data.remove(key)
    }

    fn drain(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.data).into_values().collect()
    }

    fn clear(&mut self) {
        self.data = HashMap::new();
    }

    fn entries(&self) -> Vec<(Bytes, Bytes)> {
        self.data
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

/// Render every entry as `key<FD>value<MD>`, the format of the `det` dump
pub fn render_detail<S: Store + ?Sized>(store: &S, delimiters: &Delimiters) -> Vec<u8> {
    let mut out = Vec::new();
    for (key, value) in store.entries() {
        out.extend_from_slice(&key);
        out.push(delimiters.field);
        out.extend_from_slice(&value);
        out.push(delimiters.message);
    }
    out
}
