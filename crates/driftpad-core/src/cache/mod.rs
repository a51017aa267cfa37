//! Local cache store
//!
//! Durable, synchronous key-value persistence for documents. Every edit is
//! written here before any remote attempt, so the latest keystrokes survive
//! a crash or an abandoned session.
//!
//! ## Layout
//!
//! - key: `document_{id}`
//! - value: `{"content": .., "createdAt": .., "updatedAt": ..}` (JSON)
//!
//! Backends only move raw strings; the document semantics live in the
//! provided methods of [`CacheStore`] so every backend behaves the same.

pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;

use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::models::{Document, DocumentId, DocumentRecord};

pub use error::{CacheError, CacheResult};
pub use memory::MemoryCache;
pub use sqlite::SqliteCache;

/// Prefix of every document key
pub const KEY_PREFIX: &str = "document_";

/// Cache key for a document id
pub fn cache_key(id: &DocumentId) -> String {
    format!("{}{}", KEY_PREFIX, id)
}

/// Synchronous key-value store backing the local copy of each document
pub trait CacheStore: Send + Sync {
    /// Read the raw value stored under `key`
    fn get_raw(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn put_raw(&self, key: &str, value: &str) -> CacheResult<()>;

    /// Remove `key`, returning whether it existed
    fn delete_raw(&self, key: &str) -> CacheResult<bool>;

    /// All keys currently stored
    fn keys(&self) -> CacheResult<Vec<String>>;

    /// Load a document, reporting corrupt entries as `LocalCacheCorrupt`
    fn load(&self, id: &DocumentId) -> SyncResult<Option<Document>> {
        let key = cache_key(id);
        let Some(raw) = self.get_raw(&key)? else {
            return Ok(None);
        };

        let record: DocumentRecord =
            serde_json::from_str(&raw).map_err(|e| SyncError::LocalCacheCorrupt {
                key,
                details: e.to_string(),
            })?;

        Ok(Some(Document::from_record(id.clone(), record)))
    }

    /// Read a document, treating corrupt or unreadable entries as absent
    fn read(&self, id: &DocumentId) -> Option<Document> {
        match self.load(id) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(doc_id = %id, "Ignoring cached document: {}", e);
                None
            }
        }
    }

    /// Write a document, carrying forward any `createdAt` already stored
    ///
    /// Returns the document exactly as stored.
    fn write(&self, doc: &Document) -> SyncResult<Document> {
        let key = cache_key(&doc.id);
        let mut record = doc.to_record();

        match self.load(&doc.id) {
            Ok(Some(prior)) => {
                if let Some(created_at) = prior.created_at {
                    record.created_at = Some(created_at);
                }
            }
            Ok(None) => {}
            Err(SyncError::LocalCacheCorrupt { details, .. }) => {
                debug!(doc_id = %doc.id, "Overwriting corrupt cache entry: {}", details);
            }
            Err(e) => return Err(e),
        }

        let raw = serde_json::to_string(&record).map_err(CacheError::from)?;
        self.put_raw(&key, &raw)?;

        Ok(Document::from_record(doc.id.clone(), record))
    }

    /// Remove a cached document
    fn remove(&self, id: &DocumentId) -> SyncResult<bool> {
        Ok(self.delete_raw(&cache_key(id))?)
    }

    /// Ids of every cached document, sorted
    fn list_ids(&self) -> SyncResult<Vec<DocumentId>> {
        let mut ids: Vec<DocumentId> = self
            .keys()?
            .into_iter()
            .filter_map(|key| {
                key.strip_prefix(KEY_PREFIX)
                    .and_then(|id| DocumentId::parse(id).ok())
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn doc(id: &DocumentId, content: &str) -> Document {
        let mut doc = Document::new(id.clone(), content);
        doc.touch(Utc::now());
        doc
    }

    #[test]
    fn test_cache_key() {
        let id = DocumentId::parse("abc").unwrap();
        assert_eq!(cache_key(&id), "document_abc");
    }

    #[test]
    fn test_write_and_load_round_trip() {
        let cache = MemoryCache::new();
        let id = DocumentId::local();
        let original = doc(&id, "line one\nline \"two\"\ttabbed ✓");

        cache.write(&original).unwrap();
        let loaded = cache.load(&id).unwrap().unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_write_preserves_created_at() {
        let cache = MemoryCache::new();
        let id = DocumentId::local();
        let first = doc(&id, "first");
        cache.write(&first).unwrap();

        // A later write with a different created_at keeps the stored one
        let mut second = Document::new(id.clone(), "second");
        second.touch(Utc::now() + Duration::minutes(5));
        let stored = cache.write(&second).unwrap();

        assert_eq!(stored.created_at, first.created_at);
        assert_eq!(stored.updated_at, second.updated_at);
        assert_eq!(stored.content, "second");

        let loaded = cache.read(&id).unwrap();
        assert_eq!(loaded.created_at, first.created_at);
    }

    #[test]
    fn test_corrupt_entry() {
        let cache = MemoryCache::new();
        let id = DocumentId::parse("broken").unwrap();
        cache.put_raw("document_broken", "{not json").unwrap();

        assert!(matches!(
            cache.load(&id),
            Err(SyncError::LocalCacheCorrupt { .. })
        ));
        assert!(cache.read(&id).is_none());

        // Writing over a corrupt entry succeeds
        let stored = cache.write(&doc(&id, "fixed")).unwrap();
        assert_eq!(stored.content, "fixed");
        assert_eq!(cache.read(&id).unwrap().content, "fixed");
    }

    #[test]
    fn test_list_and_remove() {
        let cache = MemoryCache::new();
        let a = DocumentId::parse("a").unwrap();
        let b = DocumentId::parse("b").unwrap();
        cache.write(&doc(&b, "b")).unwrap();
        cache.write(&doc(&a, "a")).unwrap();
        cache.put_raw("unrelated", "x").unwrap();

        assert_eq!(cache.list_ids().unwrap(), vec![a.clone(), b.clone()]);

        assert!(cache.remove(&a).unwrap());
        assert!(!cache.remove(&a).unwrap());
        assert_eq!(cache.list_ids().unwrap(), vec![b]);
    }
}
