//! driftpad Core Library
//!
//! This crate provides the local-first synchronization engine behind
//! driftpad, a single-document text pad that stays editable offline and
//! syncs to a remote store when it can.
//!
//! # Architecture
//!
//! - **Local cache**: every keystroke is written here first, synchronously
//! - **Remote store**: the authoritative copy, written through a debounce
//! - **Connectivity monitor**: edge-triggered online/offline signal
//! - **Sync session**: one task per open document reconciling the above
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let cache = Arc::new(SqliteCache::open(&config)?);
//! let engine = SyncEngine::new(cache, Arc::new(MemoryRemote::new()), ConnectivityMonitor::default())
//!     .with_timing(config.timing());
//!
//! let mut session = engine.create_new().await;
//! session.wait_loaded().await?;
//! session.edit("Hello world").await?;
//! session.close().await?;
//! ```
//!
//! # Modules
//!
//! - `sync`: Sync engine, sessions, and the debounce scheduler (main entry point)
//! - `models`: Document, ids, and serialized records
//! - `cache`: Local cache store and its backends
//! - `remote`: Remote store interface and clients
//! - `connectivity`: Online/offline monitoring
//! - `config`: Application configuration
//! - `error`: Error types

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod models;
pub mod remote;
pub mod sync;

pub use cache::{CacheError, CacheStore, MemoryCache, SqliteCache};
pub use config::{Config, SyncTiming};
pub use connectivity::{spawn_reachability_probe, ConnectivityEvent, ConnectivityMonitor};
pub use error::{SyncError, SyncResult};
pub use models::{Document, DocumentId, DocumentRecord, RemoteUpdate};
pub use remote::{HttpRemote, MemoryRemote, RemoteStore, Subscription, Unreachable};
pub use sync::{
    PushOrigin, SessionEvent, SessionHandle, SyncEngine, SyncPhase, SyncSnapshot,
};
