//! SQLite-backed cache
//!
//! Storage location: `{data_dir}/cache.db` (configurable via `Config`)

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::error::{CacheError, CacheResult};
use super::schema::{init_schema, needs_init};
use super::CacheStore;
use crate::config::Config;

/// Durable cache stored in a SQLite database
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Open or create the cache database for a configuration
    pub fn open(config: &Config) -> CacheResult<Self> {
        Self::open_path(&config.cache_path())
    }

    /// Open or create the cache database at a specific path
    pub fn open_path(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| CacheError::from_io(e, parent.to_path_buf()))?;
        }

        let conn = Connection::open(path)?;
        if needs_init(&conn) {
            init_schema(&conn)?;
        }

        debug!("Opened cache database at {:?}", path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> CacheResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }
}

impl CacheStore for SqliteCache {
    fn get_raw(&self, key: &str) -> CacheResult<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put_raw(&self, key: &str, value: &str) -> CacheResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO cache_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn delete_raw(&self, key: &str) -> CacheResult<bool> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM cache_entries WHERE key = ?", [key])?;
        Ok(removed > 0)
    }

    fn keys(&self) -> CacheResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM cache_entries ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, DocumentId};
    use tempfile::TempDir;

    #[test]
    fn test_raw_operations() {
        let cache = SqliteCache::open_in_memory().unwrap();

        assert!(cache.get_raw("k").unwrap().is_none());

        cache.put_raw("k", "v1").unwrap();
        assert_eq!(cache.get_raw("k").unwrap().as_deref(), Some("v1"));

        cache.put_raw("k", "v2").unwrap();
        assert_eq!(cache.get_raw("k").unwrap().as_deref(), Some("v2"));
        assert_eq!(cache.keys().unwrap(), vec!["k".to_string()]);

        assert!(cache.delete_raw("k").unwrap());
        assert!(cache.get_raw("k").unwrap().is_none());
    }

    #[test]
    fn test_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("cache.db");
        let id = DocumentId::parse("persisted").unwrap();

        {
            let cache = SqliteCache::open_path(&path).unwrap();
            let mut doc = Document::new(id.clone(), "survives restarts");
            doc.touch(Utc::now());
            cache.write(&doc).unwrap();
        }

        let cache = SqliteCache::open_path(&path).unwrap();
        let loaded = cache.read(&id).unwrap();
        assert_eq!(loaded.content, "survives restarts");
        assert!(loaded.created_at.is_some());
    }

    #[test]
    fn test_open_with_config() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };

        let cache = SqliteCache::open(&config).unwrap();
        cache.put_raw("document_x", r#"{"content":"x"}"#).unwrap();
        assert!(config.cache_path().exists());
        assert_eq!(cache.list_ids().unwrap().len(), 1);
    }
}
