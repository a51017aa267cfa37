//! Document sync session
//!
//! One background task owns the document for as long as it is open. The
//! UI talks to it through a [`SessionHandle`]: commands go in over a channel,
//! state comes back on a `watch` channel and notices on an event channel.
//!
//! ## Reconciliation
//!
//! - Every edit is written to the cache immediately and arms the debounce.
//! - Remote writes run concurrently with the task loop, so edits keep flowing
//!   while a push is outstanding.
//! - A failed push switches the session to offline mode, which sticks until
//!   a resync succeeds while connected. Coming back online triggers one resync.
//! - Debounced pushes never overlap each other or a resync; a debounce that
//!   fires meanwhile is queued and replayed with the then-current content.
//! - Remote updates are ignored while a local edit is still unpushed or the
//!   session is offline. Late echoes of our own earlier pushes are dropped.
//!   Concurrent writers resolve by last write wins.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::scheduler::SaveScheduler;
use super::state::{derive_phase, PushOrigin, SyncPhase, SyncSnapshot};
use crate::cache::CacheStore;
use crate::config::SyncTiming;
use crate::connectivity::ConnectivityListener;
use crate::error::{SyncError, SyncResult};
use crate::models::{Document, DocumentId, RemoteUpdate, PLACEHOLDER_CONTENT};
use crate::remote::{RemoteStore, Subscription};

/// Pushed contents remembered for echo detection
const TRACKED_PUSHES: usize = 16;

/// Commands sent to the session task
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Replace the whole content
    Edit(String),
    /// Insert a fragment at a char offset (dictation)
    Insert { position: usize, fragment: String },
    /// Push now, bypassing the debounce
    ForceSave,
    /// Set the content to empty
    Clear,
    /// Push the local copy and leave offline mode on success
    Resync,
    /// Stop the session
    Shutdown,
}

impl SessionCommand {
    fn name(&self) -> &'static str {
        match self {
            SessionCommand::Edit(_) => "edit",
            SessionCommand::Insert { .. } => "insert",
            SessionCommand::ForceSave => "force-save",
            SessionCommand::Clear => "clear",
            SessionCommand::Resync => "resync",
            SessionCommand::Shutdown => "shutdown",
        }
    }
}

/// Notices emitted by the session task
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Load finished
    Loaded { phase: SyncPhase },
    /// Nothing could be loaded; the session is in `Error`
    LoadFailed { reason: String },
    /// A remote write succeeded
    Saved {
        origin: PushOrigin,
        at: DateTime<Utc>,
    },
    /// A save was recorded locally because the session is offline
    SavedLocally { at: DateTime<Utc> },
    /// A remote write failed
    SyncFailed { origin: PushOrigin, error: String },
    /// The session entered offline mode
    SwitchedOffline { reason: String },
    /// A resync succeeded and offline mode was cleared
    Resynced,
    /// Content was replaced by a remote change
    RemoteApplied { content: String },
    /// A cached entry could not be parsed and was ignored
    CacheCorrupt { details: String },
    /// The cache rejected a write
    CacheWriteFailed { error: String },
    /// A command was refused
    Rejected {
        command: &'static str,
        reason: String,
    },
}

/// How the session obtains its document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoadPlan {
    /// Fetch from the remote with cache fallback
    Fetch,
    /// Use the local cache only and start offline
    LocalOnly,
}

/// Everything a session task needs
pub(crate) struct SessionParts {
    pub doc_id: DocumentId,
    pub plan: LoadPlan,
    pub timing: SyncTiming,
    pub cache: Arc<dyn CacheStore>,
    pub remote: Arc<dyn RemoteStore>,
    pub connectivity: ConnectivityListener,
    pub initially_online: bool,
}

/// Handle to control an open document
///
/// Dropping the handle stops the session; [`SessionHandle::close`] also
/// waits for it to finish.
pub struct SessionHandle {
    doc_id: DocumentId,
    command_tx: mpsc::Sender<SessionCommand>,
    event_rx: mpsc::UnboundedReceiver<SessionEvent>,
    state_rx: watch::Receiver<SyncSnapshot>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn doc_id(&self) -> &DocumentId {
        &self.doc_id
    }

    /// Replace the content
    pub async fn edit(&self, content: impl Into<String>) -> SyncResult<()> {
        self.send(SessionCommand::Edit(content.into())).await
    }

    /// Insert a text fragment at a char offset, clamped to the end
    pub async fn insert(&self, position: usize, fragment: impl Into<String>) -> SyncResult<()> {
        self.send(SessionCommand::Insert {
            position,
            fragment: fragment.into(),
        })
        .await
    }

    /// Push the current content now
    pub async fn force_save(&self) -> SyncResult<()> {
        self.send(SessionCommand::ForceSave).await
    }

    /// Empty the document
    pub async fn clear(&self) -> SyncResult<()> {
        self.send(SessionCommand::Clear).await
    }

    /// Try to leave offline mode
    pub async fn resync(&self) -> SyncResult<()> {
        self.send(SessionCommand::Resync).await
    }

    /// Latest published state
    pub fn state(&self) -> SyncSnapshot {
        self.state_rx.borrow().clone()
    }

    /// Independent receiver for state changes
    pub fn subscribe_state(&self) -> watch::Receiver<SyncSnapshot> {
        self.state_rx.clone()
    }

    /// Wait for the next notice
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.event_rx.recv().await
    }

    /// Take an already-emitted notice without waiting
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Wait until the state satisfies `predicate`
    pub async fn wait_until(
        &mut self,
        mut predicate: impl FnMut(&SyncSnapshot) -> bool,
    ) -> SyncResult<SyncSnapshot> {
        loop {
            {
                let snapshot = self.state_rx.borrow_and_update();
                if predicate(&*snapshot) {
                    return Ok(snapshot.clone());
                }
            }
            self.state_rx
                .changed()
                .await
                .map_err(|_| SyncError::SessionClosed)?;
        }
    }

    /// Wait for the load to finish
    pub async fn wait_loaded(&mut self) -> SyncResult<SyncSnapshot> {
        self.wait_until(SyncSnapshot::is_loaded).await
    }

    /// Stop the session and wait for the task to exit
    ///
    /// The debounce timer is cancelled and the remote subscription released;
    /// nothing fires afterwards.
    pub async fn close(self) -> SyncResult<()> {
        let _ = self.command_tx.send(SessionCommand::Shutdown).await;
        self.task.await.map_err(|e| {
            error!("Session task ended abnormally: {}", e);
            SyncError::SessionClosed
        })
    }

    async fn send(&self, command: SessionCommand) -> SyncResult<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SyncError::SessionClosed)
    }
}

/// Spawn a session task
pub(crate) fn spawn_session(parts: SessionParts) -> SessionHandle {
    let (command_tx, command_rx) = mpsc::channel(64);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(SyncSnapshot::loading(parts.doc_id.clone()));

    let doc_id = parts.doc_id.clone();
    let plan = parts.plan;
    let actor = SessionActor::new(parts, command_rx, event_tx, state_tx);
    let task = tokio::spawn(actor.run(plan));

    SessionHandle {
        doc_id,
        command_tx,
        event_rx,
        state_rx,
        task,
    }
}

/// Result of one remote write
struct PushOutcome {
    origin: PushOrigin,
    /// Edit sequence number the pushed content reflects
    seq: u64,
    result: SyncResult<()>,
    /// Fresh subscription obtained by a resync
    subscription: Option<Subscription>,
}

struct SessionActor {
    doc: Document,
    cache: Arc<dyn CacheStore>,
    remote: Arc<dyn RemoteStore>,
    scheduler: SaveScheduler,
    subscription: Option<Subscription>,
    in_flight: FuturesUnordered<BoxFuture<'static, PushOutcome>>,
    /// Contents pushed since the remote last echoed the current content
    pushed_contents: VecDeque<String>,

    command_rx: mpsc::Receiver<SessionCommand>,
    connectivity: ConnectivityListener,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    state_tx: watch::Sender<SyncSnapshot>,

    loading: bool,
    failure: Option<String>,
    is_connected: bool,
    offline_mode: bool,
    last_saved: Option<DateTime<Utc>>,
    is_applying_remote_update: bool,
    edit_seq: u64,
    debounced_in_flight: bool,
    debounce_queued: bool,
    resync_in_flight: bool,
}

impl SessionActor {
    fn new(
        parts: SessionParts,
        command_rx: mpsc::Receiver<SessionCommand>,
        event_tx: mpsc::UnboundedSender<SessionEvent>,
        state_tx: watch::Sender<SyncSnapshot>,
    ) -> Self {
        let mut connectivity = parts.connectivity;
        // The first queued event is the status at registration time
        let is_connected = connectivity
            .try_recv()
            .map(|event| event.is_online())
            .unwrap_or(parts.initially_online);

        Self {
            doc: Document::new(parts.doc_id, String::new()),
            cache: parts.cache,
            remote: parts.remote,
            scheduler: SaveScheduler::new(parts.timing),
            subscription: None,
            in_flight: FuturesUnordered::new(),
            pushed_contents: VecDeque::new(),
            command_rx,
            connectivity,
            event_tx,
            state_tx,
            loading: true,
            failure: None,
            is_connected,
            offline_mode: false,
            last_saved: None,
            is_applying_remote_update: false,
            edit_seq: 0,
            debounced_in_flight: false,
            debounce_queued: false,
            resync_in_flight: false,
        }
    }

    async fn run(mut self, plan: LoadPlan) {
        self.load(plan).await;

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Shutdown) | None => break,
                        Some(cmd) => self.handle_command(cmd),
                    }
                }

                _ = self.scheduler.fired() => {
                    self.on_debounce_fired();
                }

                Some(outcome) = self.in_flight.next() => {
                    self.on_push_complete(outcome);
                }

                Some(event) = self.connectivity.recv() => {
                    self.on_connectivity(event.is_online());
                }

                update = next_update(&mut self.subscription) => {
                    match update {
                        Some(update) => self.on_remote_update(update),
                        None => {
                            warn!(doc_id = %self.doc.id, "Remote ended the subscription");
                            self.subscription = None;
                        }
                    }
                }
            }
        }

        self.teardown();
    }

    // ---- load -------------------------------------------------------------

    async fn load(&mut self, plan: LoadPlan) {
        let id = self.doc.id.clone();
        let cached = self.read_cache();

        if plan == LoadPlan::LocalOnly {
            self.doc = cached.unwrap_or_else(|| placeholder(&id));
            self.go_offline("document was created without the remote");
            self.finish_load();
            return;
        }

        if !self.is_connected {
            self.fall_back(cached, "offline at open".to_string());
            return;
        }

        let fetched = match self.remote.fetch(&id).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(doc_id = %id, "Fetch failed: {}", e);
                self.fall_back(cached, e.to_string());
                return;
            }
        };

        let needs_push = match (fetched, cached) {
            (Some(remote), Some(local)) if local.is_newer_than(&remote) => {
                info!(doc_id = %id, "Local copy is newer than the remote, keeping it");
                self.doc = local;
                true
            }
            (Some(remote), _) => {
                self.doc = remote;
                self.write_cache();
                false
            }
            (None, Some(local)) => {
                info!(doc_id = %id, "Remote has no copy, publishing the cached one");
                self.doc = local;
                true
            }
            (None, None) => {
                info!(doc_id = %id, "Creating document");
                self.doc = placeholder(&id);
                self.write_cache();
                true
            }
        };

        match self.remote.subscribe(&id).await {
            Ok(mut subscription) => {
                if needs_push {
                    // The remote's current value is about to be overwritten
                    while subscription.try_recv().is_some() {}
                }
                self.subscription = Some(subscription);
            }
            Err(e) => {
                warn!(doc_id = %id, "Subscription failed: {}", e);
                self.go_offline(&format!("subscription failed: {}", e));
            }
        }

        if needs_push && !self.offline_mode {
            // Hold off the subscription's initial value until ours is out
            self.is_applying_remote_update = true;
            self.start_push(PushOrigin::Initial);
        }

        self.finish_load();
    }

    fn fall_back(&mut self, cached: Option<Document>, reason: String) {
        match cached {
            Some(doc) => {
                info!(doc_id = %doc.id, "Using cached copy: {}", reason);
                self.doc = doc;
                self.go_offline(&reason);
                self.finish_load();
            }
            None => {
                let failure = SyncError::LoadFailed {
                    id: self.doc.id.to_string(),
                    reason,
                };
                error!("{}", failure);
                self.loading = false;
                self.failure = Some(failure.to_string());
                self.emit(SessionEvent::LoadFailed {
                    reason: failure.to_string(),
                });
                self.publish();
            }
        }
    }

    fn finish_load(&mut self) {
        self.loading = false;
        self.publish();
        let phase = self.state_tx.borrow().phase;
        debug!(doc_id = %self.doc.id, %phase, "Loaded");
        self.emit(SessionEvent::Loaded { phase });
    }

    // ---- commands ---------------------------------------------------------

    fn handle_command(&mut self, cmd: SessionCommand) {
        if let Some(failure) = &self.failure {
            let reason = failure.clone();
            self.emit(SessionEvent::Rejected {
                command: cmd.name(),
                reason,
            });
            return;
        }

        match cmd {
            SessionCommand::Edit(content) => self.apply_edit(content),
            SessionCommand::Insert { position, fragment } => {
                let content = insert_at(&self.doc.content, position, &fragment);
                self.apply_edit(content);
            }
            SessionCommand::Clear => self.apply_edit(String::new()),
            SessionCommand::ForceSave => self.force_save(),
            SessionCommand::Resync => self.resync(),
            SessionCommand::Shutdown => {}
        }
    }

    fn apply_edit(&mut self, content: String) {
        self.doc.set_content(content, Utc::now());
        self.edit_seq += 1;
        self.is_applying_remote_update = true;
        self.write_cache();
        self.scheduler.schedule(self.doc.content.clone());
        self.publish();
    }

    fn force_save(&mut self) {
        if self.offline_mode || !self.is_connected {
            self.save_locally();
        } else {
            self.start_push(PushOrigin::Manual);
        }
        self.publish();
    }

    fn resync(&mut self) {
        if self.resync_in_flight {
            debug!(doc_id = %self.doc.id, "Resync already in flight");
            return;
        }
        info!(doc_id = %self.doc.id, "Resyncing");
        self.start_push(PushOrigin::Resync);
        self.publish();
    }

    // ---- timers and remote writes -----------------------------------------

    /// Push the latest content, or record a local save while offline
    fn on_debounce_fired(&mut self) {
        if self.resync_in_flight || self.debounced_in_flight {
            // Decided again once the outstanding push completes
            debug!(doc_id = %self.doc.id, "Debounced push queued behind in-flight one");
            self.debounce_queued = true;
        } else if self.offline_mode || !self.is_connected {
            self.is_applying_remote_update = false;
            self.save_locally();
        } else {
            self.start_push(PushOrigin::Debounced);
        }
        self.publish();
    }

    fn start_push(&mut self, origin: PushOrigin) {
        let mut doc = self.doc.clone();
        doc.touch(Utc::now());
        let seq = self.edit_seq;
        let remote = self.remote.clone();
        let resubscribe = origin == PushOrigin::Resync && self.subscription.is_none();

        if self.pushed_contents.len() == TRACKED_PUSHES {
            self.pushed_contents.pop_front();
        }
        self.pushed_contents.push_back(doc.content.clone());

        match origin {
            PushOrigin::Debounced => self.debounced_in_flight = true,
            PushOrigin::Resync => self.resync_in_flight = true,
            PushOrigin::Manual | PushOrigin::Initial => {}
        }

        debug!(doc_id = %doc.id, %origin, seq, "Pushing");
        self.in_flight.push(Box::pin(async move {
            let result = remote.persist(&doc).await;
            let subscription = if resubscribe && result.is_ok() {
                match remote.subscribe(&doc.id).await {
                    Ok(subscription) => Some(subscription),
                    Err(e) => {
                        debug!(doc_id = %doc.id, "Resubscribe failed: {}", e);
                        None
                    }
                }
            } else {
                None
            };
            PushOutcome {
                origin,
                seq,
                result,
                subscription,
            }
        }));
    }

    fn on_push_complete(&mut self, outcome: PushOutcome) {
        let PushOutcome {
            origin,
            seq,
            result,
            subscription,
        } = outcome;

        match origin {
            PushOrigin::Debounced => self.debounced_in_flight = false,
            PushOrigin::Resync => self.resync_in_flight = false,
            PushOrigin::Manual | PushOrigin::Initial => {}
        }

        if seq == self.edit_seq {
            self.is_applying_remote_update = false;
        }

        match result {
            Ok(()) => {
                let now = Utc::now();
                self.last_saved = Some(now);
                if origin == PushOrigin::Resync {
                    if self.subscription.is_none() {
                        self.subscription = subscription;
                    }
                    if self.offline_mode && self.is_connected {
                        self.offline_mode = false;
                        info!(doc_id = %self.doc.id, "Back in sync");
                        self.emit(SessionEvent::Resynced);
                    } else if self.offline_mode {
                        // Leaving offline mode waits for the online edge
                        info!(doc_id = %self.doc.id, "Pushed local copy, still disconnected");
                    }
                }
                debug!(doc_id = %self.doc.id, %origin, "Saved");
                self.emit(SessionEvent::Saved { origin, at: now });
            }
            Err(e) => {
                warn!(doc_id = %self.doc.id, %origin, "Push failed: {}", e);
                self.emit(SessionEvent::SyncFailed {
                    origin,
                    error: e.to_string(),
                });
                self.go_offline(&e.to_string());
            }
        }

        if self.debounce_queued && !self.debounced_in_flight && !self.resync_in_flight {
            self.debounce_queued = false;
            self.on_debounce_fired();
        }

        self.publish();
    }

    fn save_locally(&mut self) {
        let now = Utc::now();
        self.last_saved = Some(now);
        debug!(doc_id = %self.doc.id, "Saved locally");
        self.emit(SessionEvent::SavedLocally { at: now });
    }

    // ---- external changes -------------------------------------------------

    fn on_connectivity(&mut self, online: bool) {
        if self.failure.is_some() || online == self.is_connected {
            return;
        }

        self.is_connected = online;
        if !online {
            self.go_offline("connection lost");
        } else if self.offline_mode {
            info!(doc_id = %self.doc.id, "Connection restored, resyncing");
            self.resync();
        }
        self.publish();
    }

    fn on_remote_update(&mut self, update: RemoteUpdate) {
        if self.is_applying_remote_update || self.offline_mode {
            debug!(doc_id = %self.doc.id, "Holding off remote update");
            return;
        }
        if update.content == self.doc.content {
            // The remote has caught up with us; older echoes are done
            self.pushed_contents.clear();
            return;
        }
        if self.pushed_contents.contains(&update.content) {
            debug!(doc_id = %self.doc.id, "Dropping late echo of an earlier push");
            return;
        }

        self.pushed_contents.clear();
        self.doc.content = update.content;
        self.doc.updated_at = update.updated_at.or_else(|| Some(Utc::now()));
        self.write_cache();
        debug!(doc_id = %self.doc.id, "Applied remote update");
        self.emit(SessionEvent::RemoteApplied {
            content: self.doc.content.clone(),
        });
        self.publish();
    }

    fn go_offline(&mut self, reason: &str) {
        if self.offline_mode {
            return;
        }
        self.offline_mode = true;
        warn!(doc_id = %self.doc.id, "Switched to offline mode: {}", reason);
        self.emit(SessionEvent::SwitchedOffline {
            reason: reason.to_string(),
        });
    }

    // ---- cache ------------------------------------------------------------

    fn read_cache(&mut self) -> Option<Document> {
        match self.cache.load(&self.doc.id) {
            Ok(doc) => doc,
            Err(SyncError::LocalCacheCorrupt { key, details }) => {
                warn!(doc_id = %self.doc.id, "Cache entry {} is corrupt: {}", key, details);
                self.emit(SessionEvent::CacheCorrupt { details });
                None
            }
            Err(e) => {
                warn!(doc_id = %self.doc.id, "Cache read failed: {}", e);
                None
            }
        }
    }

    fn write_cache(&mut self) {
        match self.cache.write(&self.doc) {
            Ok(stored) => self.doc.created_at = stored.created_at,
            Err(e) => {
                error!(doc_id = %self.doc.id, "Cache write failed: {}", e);
                self.emit(SessionEvent::CacheWriteFailed {
                    error: e.to_string(),
                });
            }
        }
    }

    // ---- plumbing ---------------------------------------------------------

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }

    fn publish(&self) {
        let is_saving = !self.in_flight.is_empty();
        let snapshot = SyncSnapshot {
            doc_id: self.doc.id.clone(),
            content: self.doc.content.clone(),
            phase: derive_phase(
                self.loading,
                self.failure.is_some(),
                self.is_connected,
                self.offline_mode,
                is_saving,
            ),
            is_connected: self.is_connected,
            offline_mode: self.offline_mode,
            is_saving,
            last_saved: self.last_saved,
            is_applying_remote_update: self.is_applying_remote_update,
            error: self.failure.clone(),
        };
        self.state_tx.send_replace(snapshot);
    }

    fn teardown(&mut self) {
        self.scheduler.cancel();
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        let abandoned = self.in_flight.len();
        if abandoned > 0 {
            debug!(doc_id = %self.doc.id, "Abandoning {} in-flight pushes", abandoned);
        }
        self.in_flight = FuturesUnordered::new();
        info!(doc_id = %self.doc.id, "Session closed");
    }
}

/// Next update from an optional subscription; pending forever without one
async fn next_update(subscription: &mut Option<Subscription>) -> Option<RemoteUpdate> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

/// Brand-new document with placeholder content
fn placeholder(id: &DocumentId) -> Document {
    let mut doc = Document::new(id.clone(), PLACEHOLDER_CONTENT);
    doc.touch(Utc::now());
    doc
}

/// Insert `fragment` at char offset `position`, clamped to the end
fn insert_at(content: &str, position: usize, fragment: &str) -> String {
    let byte_index = content
        .char_indices()
        .nth(position)
        .map(|(i, _)| i)
        .unwrap_or(content.len());

    let mut result = String::with_capacity(content.len() + fragment.len());
    result.push_str(&content[..byte_index]);
    result.push_str(fragment);
    result.push_str(&content[byte_index..]);
    result
}
