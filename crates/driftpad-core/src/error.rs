//! Sync error taxonomy
//!
//! Every failure the engine can observe maps onto one of these variants.
//! Only `LoadFailed` is fatal to a session; the rest are recovered locally
//! and surfaced through state flags and session events.

use thiserror::Error;

use crate::cache::CacheError;

/// Errors produced by the sync engine
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or backend failure talking to the remote store
    #[error("Remote store unavailable: {0}")]
    RemoteUnavailable(String),

    /// A cached value could not be parsed
    #[error("Cached value for '{key}' is corrupt: {details}")]
    LocalCacheCorrupt { key: String, details: String },

    /// Neither the remote nor the cache produced a usable document
    #[error("Failed to load document '{id}': {reason}")]
    LoadFailed { id: String, reason: String },

    /// Local cache backend failure
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Document id cannot be used as a key
    #[error("Invalid document id: {0}")]
    InvalidDocumentId(String),

    /// The session task is no longer running
    #[error("Sync session is closed")]
    SessionClosed,
}

impl SyncError {
    /// Build a `RemoteUnavailable` from any displayable cause
    pub fn remote(cause: impl std::fmt::Display) -> Self {
        SyncError::RemoteUnavailable(cause.to_string())
    }

    /// Check if the engine keeps working after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SyncError::RemoteUnavailable(_)
                | SyncError::LocalCacheCorrupt { .. }
                | SyncError::Cache(_)
        )
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(SyncError::remote("connection refused").is_recoverable());
        assert!(SyncError::LocalCacheCorrupt {
            key: "document_a".to_string(),
            details: "expected value".to_string(),
        }
        .is_recoverable());
        assert!(!SyncError::LoadFailed {
            id: "a".to_string(),
            reason: "offline".to_string(),
        }
        .is_recoverable());
        assert!(!SyncError::SessionClosed.is_recoverable());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::remote("timed out");
        assert_eq!(err.to_string(), "Remote store unavailable: timed out");

        let err = SyncError::LoadFailed {
            id: "abc".to_string(),
            reason: "no cached copy".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc"));
        assert!(msg.contains("no cached copy"));
    }
}
