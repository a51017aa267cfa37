//! Sync engine
//!
//! Explicitly constructed root that owns the shared collaborators and opens
//! sessions on documents.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::session::{spawn_session, LoadPlan, SessionHandle, SessionParts};
use crate::cache::CacheStore;
use crate::config::SyncTiming;
use crate::connectivity::ConnectivityMonitor;
use crate::models::{Document, DocumentId, PLACEHOLDER_CONTENT};
use crate::remote::RemoteStore;

/// Opens documents against one cache, one remote, and one connectivity monitor
#[derive(Clone)]
pub struct SyncEngine {
    cache: Arc<dyn CacheStore>,
    remote: Arc<dyn RemoteStore>,
    monitor: ConnectivityMonitor,
    timing: SyncTiming,
}

impl SyncEngine {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        remote: Arc<dyn RemoteStore>,
        monitor: ConnectivityMonitor,
    ) -> Self {
        Self {
            cache,
            remote,
            monitor,
            timing: SyncTiming::default(),
        }
    }

    /// Override the debounce timing
    pub fn with_timing(mut self, timing: SyncTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.monitor
    }

    pub fn timing(&self) -> SyncTiming {
        self.timing
    }

    /// Open a session on an existing or not-yet-created document
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(&self, id: DocumentId) -> SessionHandle {
        self.spawn(id, LoadPlan::Fetch)
    }

    /// Allocate a new document and open it
    ///
    /// When the remote cannot allocate one, a device-local id is generated,
    /// the placeholder is cached, and the session starts offline.
    pub async fn create_new(&self) -> SessionHandle {
        if let Some(id) = self.remote.create_new().await {
            info!(doc_id = %id, "Created document");
            return self.open(id);
        }

        let id = DocumentId::local();
        warn!(doc_id = %id, "Remote could not allocate a document, working locally");

        let mut doc = Document::new(id.clone(), PLACEHOLDER_CONTENT);
        doc.touch(Utc::now());
        if let Err(e) = self.cache.write(&doc) {
            warn!(doc_id = %id, "Could not cache new document: {}", e);
        }

        self.spawn(id, LoadPlan::LocalOnly)
    }

    fn spawn(&self, doc_id: DocumentId, plan: LoadPlan) -> SessionHandle {
        spawn_session(SessionParts {
            doc_id,
            plan,
            timing: self.timing,
            cache: self.cache.clone(),
            remote: self.remote.clone(),
            connectivity: self.monitor.subscribe(),
            initially_online: self.monitor.currently_online(),
        })
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("online", &self.monitor.currently_online())
            .field("timing", &self.timing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::models::INITIAL_CONTENT;
    use crate::remote::{MemoryRemote, Unreachable};
    use crate::sync::SyncPhase;

    #[tokio::test(start_paused = true)]
    async fn test_create_new_with_remote() {
        let remote = MemoryRemote::new();
        let engine = SyncEngine::new(
            Arc::new(MemoryCache::new()),
            Arc::new(remote.clone()),
            ConnectivityMonitor::new(true),
        );

        let mut session = engine.create_new().await;
        let state = session.wait_loaded().await.unwrap();

        assert!(!session.doc_id().is_local());
        assert_eq!(state.content, INITIAL_CONTENT);
        assert_eq!(state.phase, SyncPhase::OnlineSynced);
        assert!(remote.document(session.doc_id()).is_some());
        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_new_falls_back_to_local_id() {
        let cache = Arc::new(MemoryCache::new());
        let engine = SyncEngine::new(
            cache.clone(),
            Arc::new(Unreachable),
            ConnectivityMonitor::new(true),
        );

        let mut session = engine.create_new().await;
        let state = session.wait_loaded().await.unwrap();

        assert!(session.doc_id().is_local());
        assert_eq!(state.phase, SyncPhase::OfflineLocal);
        assert!(state.offline_mode);
        assert_eq!(
            cache.read(session.doc_id()).unwrap().content,
            PLACEHOLDER_CONTENT
        );
        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_while_offline_skips_fetch() {
        let remote = MemoryRemote::new();
        let cache = Arc::new(MemoryCache::new());
        let id = DocumentId::parse("known").unwrap();
        remote.write_from_peer(&id, "remote");
        let mut cached = Document::new(id.clone(), "cached");
        cached.touch(Utc::now());
        cache.write(&cached).unwrap();

        let engine = SyncEngine::new(cache, Arc::new(remote), ConnectivityMonitor::new(false));
        let mut session = engine.open(id);
        let state = session.wait_loaded().await.unwrap();

        assert_eq!(state.content, "cached");
        assert!(!state.is_connected);
        assert_eq!(state.phase, SyncPhase::OfflineLocal);
        session.close().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_offline_edits_survive_restart() {
        use crate::cache::SqliteCache;
        use crate::models::DocumentRecord;
        use std::time::Duration;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("cache.db");
        let remote = MemoryRemote::new();
        let id = DocumentId::parse("travel-notes").unwrap();
        let old = Utc::now() - chrono::Duration::hours(1);
        remote.insert(
            &id,
            DocumentRecord {
                content: "before the trip".to_string(),
                created_at: Some(old),
                updated_at: Some(old),
            },
        );

        {
            let cache = Arc::new(SqliteCache::open_path(&db_path).unwrap());
            let engine = SyncEngine::new(
                cache,
                Arc::new(remote.clone()),
                ConnectivityMonitor::new(true),
            );
            let mut session = engine.open(id.clone());
            session.wait_loaded().await.unwrap();

            remote.set_available(false);
            session.edit("written on the plane").await.unwrap();
            tokio::time::sleep(Duration::from_millis(1100)).await;
            assert!(session.state().offline_mode);
            session.close().await.unwrap();
        }

        remote.set_available(true);
        let cache = Arc::new(SqliteCache::open_path(&db_path).unwrap());
        let engine = SyncEngine::new(cache, Arc::new(remote.clone()), ConnectivityMonitor::new(true));
        let mut session = engine.open(id.clone());
        let state = session.wait_loaded().await.unwrap();
        assert_eq!(state.content, "written on the plane");

        session.wait_until(|s| s.last_saved.is_some()).await.unwrap();
        assert_eq!(
            remote.document(&id).unwrap().content,
            "written on the plane"
        );
        session.close().await.unwrap();
    }
}
