//! Cache storage seam and an in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::data::CacheEntry;
use crate::error::StoreError;

/// Persists cache entries keyed by request identity.
///
/// Implementations must tolerate concurrent reads and writes. Concurrent
/// `put`s for the same key race; the last one wins. Eviction policy is the
/// implementation's business.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Arc<CacheEntry>>, StoreError>;

    fn put(&self, key: &str, entry: CacheEntry) -> Result<(), StoreError>;

    fn evict(&self, key: &str) -> Result<(), StoreError>;
}

impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<Arc<CacheEntry>>, StoreError> {
        (**self).get(key)
    }

    fn put(&self, key: &str, entry: CacheEntry) -> Result<(), StoreError> {
        (**self).put(key, entry)
    }

    fn evict(&self, key: &str) -> Result<(), StoreError> {
        (**self).evict(key)
    }
}

/// Unbounded process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Arc<CacheEntry>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.entries
            .write()
            .map_err(|_| StoreError::Poisoned)?
            .clear();
        Ok(())
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Arc<CacheEntry>>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, entry: CacheEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_owned(), Arc::new(entry));
        Ok(())
    }

    fn evict(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Headers;
    use std::thread;

    #[test]
    fn put_get_evict() {
        let store = MemoryStore::new();
        assert!(store.get("k").unwrap().is_none());

        store.put("k", CacheEntry::new("v1", Headers::new())).unwrap();
        store.put("k", CacheEntry::new("v2", Headers::new())).unwrap();
        assert_eq!(&store.get("k").unwrap().unwrap().body[..], b"v2");
        assert_eq!(store.len(), 1);

        store.evict("k").unwrap();
        assert!(store.is_empty());
        store.evict("missing").unwrap();
    }

    #[test]
    fn concurrent_writers_keep_one_entry_per_key() {
        let store = MemoryStore::new();

        thread::scope(|s| {
            for i in 0..8 {
                let store = &store;
                s.spawn(move || {
                    for j in 0..50 {
                        let key = format!("k{}", j % 4);
                        store
                            .put(&key, CacheEntry::new(format!("{i}-{j}"), Headers::new()))
                            .unwrap();
                        assert!(store.get(&key).unwrap().is_some());
                    }
                });
            }
        });

        assert_eq!(store.len(), 4);
    }
}
