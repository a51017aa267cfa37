//! Remote document store
//!
//! The authoritative copy of each document lives behind a [`RemoteStore`].
//! The engine only needs four capabilities from it: read, write, watch, and
//! allocate. Clients are constructed explicitly and injected into the engine.
//!
//! ## Implementations
//!
//! - [`HttpRemote`]: REST store addressed as `documents/{id}`
//! - [`MemoryRemote`]: in-process realtime store
//! - [`Unreachable`]: always offline, for purely local use

mod http;
mod memory;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{SyncError, SyncResult};
use crate::models::{Document, DocumentId, RemoteUpdate};

pub use http::HttpRemote;
pub use memory::MemoryRemote;

/// Abstract realtime key-value store holding documents
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read a document; `None` if the remote has never seen it
    async fn fetch(&self, id: &DocumentId) -> SyncResult<Option<Document>>;

    /// Overwrite the remote copy of a document
    async fn persist(&self, doc: &Document) -> SyncResult<()>;

    /// Watch a document for remote-side changes
    ///
    /// Every change is delivered in order, including echoes of our own writes.
    async fn subscribe(&self, id: &DocumentId) -> SyncResult<Subscription>;

    /// Allocate a fresh document with placeholder content
    ///
    /// Returns `None` when the remote is unreachable.
    async fn create_new(&self) -> Option<DocumentId>;
}

/// A live watch on one remote document
///
/// Updates arrive in the order the remote produced them. After
/// [`Subscription::unsubscribe`] (or drop) nothing more is delivered.
pub struct Subscription {
    id: DocumentId,
    updates: mpsc::UnboundedReceiver<RemoteUpdate>,
    on_unsubscribe: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a receiver; `on_unsubscribe` releases whatever feeds it
    pub fn new(
        id: DocumentId,
        updates: mpsc::UnboundedReceiver<RemoteUpdate>,
        on_unsubscribe: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            id,
            updates,
            on_unsubscribe: Some(Box::new(on_unsubscribe)),
        }
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.id
    }

    /// Wait for the next remote update
    ///
    /// Returns `None` when the remote ended the subscription.
    pub async fn recv(&mut self) -> Option<RemoteUpdate> {
        self.updates.recv().await
    }

    /// Take an already-delivered update without waiting
    pub fn try_recv(&mut self) -> Option<RemoteUpdate> {
        self.updates.try_recv().ok()
    }

    /// Stop watching
    pub fn unsubscribe(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        self.updates.close();
        while self.updates.try_recv().is_ok() {}
        if let Some(release) = self.on_unsubscribe.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.on_unsubscribe.is_some())
            .finish()
    }
}

/// A remote that is never reachable
#[derive(Debug, Clone, Copy, Default)]
pub struct Unreachable;

#[async_trait]
impl RemoteStore for Unreachable {
    async fn fetch(&self, _id: &DocumentId) -> SyncResult<Option<Document>> {
        Err(SyncError::remote("no remote store configured"))
    }

    async fn persist(&self, _doc: &Document) -> SyncResult<()> {
        Err(SyncError::remote("no remote store configured"))
    }

    async fn subscribe(&self, _id: &DocumentId) -> SyncResult<Subscription> {
        Err(SyncError::remote("no remote store configured"))
    }

    async fn create_new(&self) -> Option<DocumentId> {
        None
    }
}
