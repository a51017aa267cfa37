//! Cache error handling
//!
//! Provides typed errors for local cache operations with descriptive messages
//! and recovery suggestions.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in a cache backend
#[derive(Error, Debug)]
pub enum CacheError {
    /// Failed to create data directory
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Disk is full or quota exceeded
    #[error(
        "Disk full or quota exceeded while writing to '{path}'. Free up disk space and try again."
    )]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Value could not be encoded for storage
    #[error("Failed to encode cached value: {0}")]
    Encode(#[from] serde_json::Error),

    /// In-memory backend lock was poisoned by a panicking writer
    #[error("Cache lock poisoned")]
    Poisoned,

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CacheError {
    /// Create an error from an I/O error with path context
    ///
    /// Classifies the error based on its kind (permission, disk full, etc.)
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => CacheError::PermissionDenied {
                path,
                source: error,
            },
            _ if is_disk_full_error(&error) => CacheError::DiskFull {
                path,
                source: error,
            },
            _ => CacheError::CreateDirectory {
                path,
                source: error,
            },
        }
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            CacheError::DiskFull { .. } => Some("Free up disk space and try again."),
            CacheError::PermissionDenied { .. } => {
                Some("Check file and directory permissions for the data directory.")
            }
            CacheError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            _ => None,
        }
    }
}

/// Check if an I/O error indicates disk full condition
fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_classification() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = CacheError::from_io(io_err, PathBuf::from("/test/path"));

        assert!(matches!(err, CacheError::PermissionDenied { .. }));
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_disk_full_detection() {
        let io_err = io::Error::new(io::ErrorKind::Other, "No space left on device");
        let err = CacheError::from_io(io_err, PathBuf::from("/full/disk"));

        assert!(matches!(err, CacheError::DiskFull { .. }));
    }

    #[test]
    fn test_other_io_is_create_directory() {
        let io_err = io::Error::new(io::ErrorKind::Other, "read-only file system");
        let err = CacheError::from_io(io_err, PathBuf::from("/ro"));

        let msg = err.to_string();
        assert!(msg.contains("Failed to create data directory"));
        assert!(msg.contains("/ro"));
    }
}
