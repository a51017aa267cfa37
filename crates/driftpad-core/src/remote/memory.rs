//! In-process realtime store
//!
//! Behaves like a hosted realtime database: writes are fanned out to every
//! subscriber of the document in order, including the writer. Availability
//! and latency can be changed at runtime to exercise offline handling.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::{RemoteStore, Subscription};
use crate::error::{SyncError, SyncResult};
use crate::models::{Document, DocumentId, DocumentRecord, RemoteUpdate, INITIAL_CONTENT};

#[derive(Debug)]
struct MemoryState {
    available: bool,
    latency: Duration,
    documents: HashMap<DocumentId, DocumentRecord>,
    subscribers: HashMap<DocumentId, Vec<(u64, mpsc::UnboundedSender<RemoteUpdate>)>>,
    next_subscriber: u64,
    persist_calls: usize,
    persisted: Vec<(DocumentId, String)>,
}

impl MemoryState {
    fn broadcast(&mut self, id: &DocumentId, record: &DocumentRecord) {
        if let Some(subs) = self.subscribers.get_mut(id) {
            subs.retain(|(_, tx)| tx.send(RemoteUpdate::from(record.clone())).is_ok());
        }
    }
}

/// Realtime document store living in this process
///
/// Clones share the same data.
#[derive(Debug, Clone)]
pub struct MemoryRemote {
    state: Arc<Mutex<MemoryState>>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                available: true,
                latency: Duration::ZERO,
                documents: HashMap::new(),
                subscribers: HashMap::new(),
                next_subscriber: 0,
                persist_calls: 0,
                persisted: Vec::new(),
            })),
        }
    }

    /// Make every call succeed or fail with `RemoteUnavailable`
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    pub fn is_available(&self) -> bool {
        self.lock().available
    }

    /// Delay applied to fetch and persist calls
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Store a record without notifying anyone
    pub fn insert(&self, id: &DocumentId, record: DocumentRecord) {
        self.lock().documents.insert(id.clone(), record);
    }

    /// Current remote copy of a document
    pub fn document(&self, id: &DocumentId) -> Option<DocumentRecord> {
        self.lock().documents.get(id).cloned()
    }

    /// Simulate a write by another client
    pub fn write_from_peer(&self, id: &DocumentId, content: &str) {
        let mut state = self.lock();
        let now = Utc::now();
        let created_at = state
            .documents
            .get(id)
            .and_then(|r| r.created_at)
            .unwrap_or(now);
        let record = DocumentRecord {
            content: content.to_string(),
            created_at: Some(created_at),
            updated_at: Some(now),
        };
        state.documents.insert(id.clone(), record.clone());
        state.broadcast(id, &record);
    }

    /// Number of persist calls received, failed ones included
    pub fn persist_calls(&self) -> usize {
        self.lock().persist_calls
    }

    /// Contents of every successful persist, in order
    pub fn persisted(&self) -> Vec<(DocumentId, String)> {
        self.lock().persisted.clone()
    }

    /// Number of active subscriptions to a document
    pub fn subscriber_count(&self, id: &DocumentId) -> usize {
        let mut state = self.lock();
        match state.subscribers.get_mut(id) {
            Some(subs) => {
                subs.retain(|(_, tx)| !tx.is_closed());
                subs.len()
            }
            None => 0,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Check availability and apply latency
    async fn round_trip(&self) -> SyncResult<()> {
        let (available, latency) = {
            let state = self.lock();
            (state.available, state.latency)
        };

        if !available {
            return Err(SyncError::remote("memory remote is offline"));
        }
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn fetch(&self, id: &DocumentId) -> SyncResult<Option<Document>> {
        self.round_trip().await?;
        let record = self.lock().documents.get(id).cloned();
        Ok(record.map(|r| Document::from_record(id.clone(), r)))
    }

    async fn persist(&self, doc: &Document) -> SyncResult<()> {
        self.lock().persist_calls += 1;
        self.round_trip().await?;

        let mut state = self.lock();
        // Availability may have changed while the call was in flight
        if !state.available {
            return Err(SyncError::remote("memory remote went offline"));
        }

        let record = doc.to_record();
        state.documents.insert(doc.id.clone(), record.clone());
        state.persisted.push((doc.id.clone(), doc.content.clone()));
        state.broadcast(&doc.id, &record);
        debug!(doc_id = %doc.id, "Persisted {} bytes", doc.content.len());
        Ok(())
    }

    async fn subscribe(&self, id: &DocumentId) -> SyncResult<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscriber = {
            let mut state = self.lock();
            if !state.available {
                return Err(SyncError::remote("memory remote is offline"));
            }

            // Current value is delivered first, as realtime stores do
            if let Some(record) = state.documents.get(id) {
                let _ = tx.send(RemoteUpdate::from(record.clone()));
            }

            let subscriber = state.next_subscriber;
            state.next_subscriber += 1;
            state
                .subscribers
                .entry(id.clone())
                .or_default()
                .push((subscriber, tx));
            subscriber
        };

        let state = self.state.clone();
        let key = id.clone();
        Ok(Subscription::new(id.clone(), rx, move || {
            let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(subs) = state.subscribers.get_mut(&key) {
                subs.retain(|(n, _)| *n != subscriber);
            }
        }))
    }

    async fn create_new(&self) -> Option<DocumentId> {
        if self.round_trip().await.is_err() {
            return None;
        }

        let suffix = Uuid::new_v4().simple().to_string();
        let id = DocumentId::parse(format!("m{}", &suffix[..12])).ok()?;
        self.insert(
            &id,
            DocumentRecord {
                content: INITIAL_CONTENT.to_string(),
                created_at: None,
                updated_at: None,
            },
        );
        Some(id)
    }
}
