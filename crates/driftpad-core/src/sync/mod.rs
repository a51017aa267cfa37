//! Local-first document sync
//!
//! Ties the cache, the remote store, and the connectivity monitor together.
//!
//! ## Usage
//!
//! ```ignore
//! let engine = SyncEngine::new(cache, remote, monitor);
//! let mut session = engine.open(DocumentId::parse("abc")?);
//! session.wait_loaded().await?;
//! session.edit("Hello world").await?;
//! session.close().await?;
//! ```

mod engine;
mod scheduler;
mod session;
mod state;

pub use engine::SyncEngine;
pub use scheduler::SaveScheduler;
pub use session::{SessionCommand, SessionEvent, SessionHandle};
pub use state::{PushOrigin, SyncPhase, SyncSnapshot};
