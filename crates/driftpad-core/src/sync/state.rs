//! Observable session state

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::DocumentId;

/// Lifecycle phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncPhase {
    /// Initial fetch in progress
    Loading,
    /// Remote and local agree, nothing outstanding
    OnlineSynced,
    /// A remote write is outstanding
    OnlineSaving,
    /// Edits only reach the local cache
    OfflineLocal,
    /// Nothing usable could be loaded
    Error,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SyncPhase::Loading => "loading",
            SyncPhase::OnlineSynced => "online-synced",
            SyncPhase::OnlineSaving => "online-saving",
            SyncPhase::OfflineLocal => "offline-local",
            SyncPhase::Error => "error",
        };
        write!(f, "{}", label)
    }
}

/// Why a remote write was started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PushOrigin {
    /// The debounce timer fired
    Debounced,
    /// Explicit save request
    Manual,
    /// Recovery from offline mode
    Resync,
    /// Publishing local or placeholder content right after load
    Initial,
}

impl std::fmt::Display for PushOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PushOrigin::Debounced => "debounced",
            PushOrigin::Manual => "manual",
            PushOrigin::Resync => "resync",
            PushOrigin::Initial => "initial",
        };
        write!(f, "{}", label)
    }
}

/// Point-in-time view of a session, published after every change
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSnapshot {
    pub doc_id: DocumentId,
    pub content: String,
    pub phase: SyncPhase,
    pub is_connected: bool,
    /// Sticky until a resync succeeds
    pub offline_mode: bool,
    pub is_saving: bool,
    pub last_saved: Option<DateTime<Utc>>,
    /// A local edit has not been pushed yet; remote updates are held off
    pub is_applying_remote_update: bool,
    pub error: Option<String>,
}

impl SyncSnapshot {
    /// State of a session that has not finished loading
    pub fn loading(doc_id: DocumentId) -> Self {
        Self {
            doc_id,
            content: String::new(),
            phase: SyncPhase::Loading,
            is_connected: false,
            offline_mode: false,
            is_saving: false,
            last_saved: None,
            is_applying_remote_update: false,
            error: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.phase != SyncPhase::Loading
    }
}

/// Derive the phase from the session flags
pub(crate) fn derive_phase(
    loading: bool,
    failed: bool,
    is_connected: bool,
    offline_mode: bool,
    is_saving: bool,
) -> SyncPhase {
    if failed {
        SyncPhase::Error
    } else if loading {
        SyncPhase::Loading
    } else if offline_mode || !is_connected {
        SyncPhase::OfflineLocal
    } else if is_saving {
        SyncPhase::OnlineSaving
    } else {
        SyncPhase::OnlineSynced
    }
}
