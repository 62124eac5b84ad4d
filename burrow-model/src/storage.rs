//! Storage abstraction
//!
//! Isolates the storage engine from the replication logic: a `Master` owns
//! exactly one `StorageBackend` and is the only writer that touches it.
//! Any conforming engine (in-memory, on-disk) is pluggable at construction.

use std::collections::BTreeMap;

/// Error type for storage operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("backend failure: {0}")]
    Backend(String),
}

/// Minimal key-value engine contract consumed by the store layer.
///
/// Keys and values are opaque byte strings. `snapshot` exists so a master can
/// bootstrap a late-attaching replica with its full state. Backends live
/// inside spawned actors whose futures hold `&self` across awaits, hence
/// `Send + Sync`.
pub trait StorageBackend: Send + Sync + 'static {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError>;

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StorageError>;

    fn erase(&mut self, key: &[u8]) -> Result<(), StorageError>;

    /// Full dump of the current state, key-ordered.
    fn snapshot(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError>;
}

/// Default in-memory backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl StorageBackend for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.map.get(key).cloned())
    }

    fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StorageError> {
        self.map.insert(key, value);
        Ok(())
    }

    fn erase(&mut self, key: &[u8]) -> Result<(), StorageError> {
        self.map.remove(key);
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StorageError> {
        Ok(self
            .map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_erase() {
        let mut store = MemoryStore::new();
        store.put(b"k".to_vec(), b"v".to_vec()).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));

        store.put(b"k".to_vec(), b"v2".to_vec()).unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v2".to_vec()));

        store.erase(b"k").unwrap();
        assert_eq!(store.get(b"k").unwrap(), None);
    }

    #[test]
    fn erase_missing_key_is_noop() {
        let mut store = MemoryStore::new();
        store.erase(b"nope").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn snapshot_is_key_ordered() {
        let mut store = MemoryStore::new();
        store.put(b"b".to_vec(), b"2".to_vec()).unwrap();
        store.put(b"a".to_vec(), b"1".to_vec()).unwrap();
        let snap = store.snapshot().unwrap();
        assert_eq!(
            snap,
            vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"b".to_vec(), b"2".to_vec())
            ]
        );
    }
}
