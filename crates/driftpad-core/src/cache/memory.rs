//! Process-local cache, lost on exit

use std::collections::BTreeMap;
use std::sync::RwLock;

use super::error::{CacheError, CacheResult};
use super::CacheStore;

/// In-memory cache backend
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn put_raw(&self, key: &str, value: &str) -> CacheResult<()> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete_raw(&self, key: &str) -> CacheResult<bool> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.remove(key).is_some())
    }

    fn keys(&self) -> CacheResult<Vec<String>> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        Ok(entries.keys().cloned().collect())
    }
}
