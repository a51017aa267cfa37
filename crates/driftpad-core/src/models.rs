//! Data models for driftpad
//!
//! Defines the document being edited and the flat record shape shared by the
//! local cache and the remote store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SyncError;

/// Content given to a document that is first created while loading
pub const PLACEHOLDER_CONTENT: &str =
    "Start typing here...\n\nShare this link with others to collaborate in real-time.";

/// Content the remote seeds when it allocates a new document
pub const INITIAL_CONTENT: &str = "Initial content";

/// Prefix for ids generated on this device when the remote cannot allocate one
const LOCAL_ID_PREFIX: &str = "local-";

/// Characters that cannot appear in a document id (remote key paths)
const FORBIDDEN_ID_CHARS: &[char] = &['/', '.', '#', '$', '[', ']'];

/// Opaque, stable identifier of a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// Parse an id, rejecting values that cannot be used as a remote key
    pub fn parse(value: impl Into<String>) -> Result<Self, SyncError> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(SyncError::InvalidDocumentId(
                "document id cannot be empty".to_string(),
            ));
        }

        if let Some(c) = trimmed.chars().find(|c| FORBIDDEN_ID_CHARS.contains(c)) {
            return Err(SyncError::InvalidDocumentId(format!(
                "document id '{}' contains forbidden character '{}'",
                trimmed, c
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Generate an id on this device
    pub fn local() -> Self {
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{}{}", LOCAL_ID_PREFIX, &suffix[..10]))
    }

    /// Whether this id was generated on a device rather than by the remote
    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DocumentId {
    type Error = SyncError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

/// The single text document owned by a sync session
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Stable identifier
    pub id: DocumentId,
    /// Full text body
    pub content: String,
    /// Set once at first persistence
    pub created_at: Option<DateTime<Utc>>,
    /// Set on every persistence
    pub updated_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Create a document that has never been persisted
    pub fn new(id: DocumentId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Rebuild a document from its stored record
    pub fn from_record(id: DocumentId, record: DocumentRecord) -> Self {
        Self {
            id,
            content: record.content,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    /// Stamp a persistence at `now`
    ///
    /// `created_at` is only filled when it has never been set.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = Some(now);
        self.created_at.get_or_insert(now);
    }

    /// Replace the content and stamp the change
    pub fn set_content(&mut self, content: impl Into<String>, now: DateTime<Utc>) {
        self.content = content.into();
        self.touch(now);
    }

    /// Flat record without the id
    pub fn to_record(&self) -> DocumentRecord {
        DocumentRecord {
            content: self.content.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Whether this copy was written strictly after `other`
    pub fn is_newer_than(&self, other: &Document) -> bool {
        match (self.updated_at, other.updated_at) {
            (Some(ours), Some(theirs)) => ours > theirs,
            (Some(_), None) => true,
            _ => false,
        }
    }
}

/// Serialized value stored under `documents/{id}` remotely and `document_{id}` locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A remote-side change delivered through a subscription
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteUpdate {
    /// Content currently held by the remote
    pub content: String,
    /// Remote timestamp of the change, when the remote records one
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<DocumentRecord> for RemoteUpdate {
    fn from(record: DocumentRecord) -> Self {
        Self {
            content: record.content,
            updated_at: record.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_parse_document_id() {
        let id = DocumentId::parse("abc123").unwrap();
        assert_eq!(id.as_str(), "abc123");
        assert_eq!(id.to_string(), "abc123");

        // Surrounding whitespace is ignored
        assert_eq!(DocumentId::parse("  xyz \n").unwrap().as_str(), "xyz");
    }

    #[test]
    fn test_parse_rejects_bad_ids() {
        assert!(DocumentId::parse("").is_err());
        assert!(DocumentId::parse("   ").is_err());
        assert!(DocumentId::parse("a/b").is_err());
        assert!(DocumentId::parse("doc.json").is_err());
        assert!(DocumentId::parse("x#y").is_err());
    }

    #[test]
    fn test_local_id() {
        let a = DocumentId::local();
        let b = DocumentId::local();
        assert!(a.is_local());
        assert_eq!(a.as_str().len(), "local-".len() + 10);
        assert_ne!(a, b);
        assert!(DocumentId::parse(a.as_str()).is_ok());
    }

    #[test]
    fn test_touch_preserves_created_at() {
        let mut doc = Document::new(DocumentId::local(), "hello");
        let first = Utc::now();
        doc.touch(first);
        assert_eq!(doc.created_at, Some(first));
        assert_eq!(doc.updated_at, Some(first));

        let later = first + Duration::seconds(30);
        doc.set_content("hello world", later);
        assert_eq!(doc.created_at, Some(first));
        assert_eq!(doc.updated_at, Some(later));
        assert_eq!(doc.content, "hello world");
    }

    #[test]
    fn test_is_newer_than() {
        let now = Utc::now();
        let mut older = Document::new(DocumentId::local(), "a");
        older.touch(now);
        let mut newer = older.clone();
        newer.touch(now + Duration::seconds(1));

        assert!(newer.is_newer_than(&older));
        assert!(!older.is_newer_than(&newer));
        assert!(!older.is_newer_than(&older.clone()));

        let unstamped = Document::new(DocumentId::local(), "b");
        assert!(older.is_newer_than(&unstamped));
        assert!(!unstamped.is_newer_than(&older));
    }

    #[test]
    fn test_record_field_names() {
        let mut doc = Document::new(DocumentId::local(), "text");
        doc.touch(Utc::now());

        let json = serde_json::to_value(doc.to_record()).unwrap();
        assert!(json.get("content").is_some());
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
    }

    #[test]
    fn test_record_without_timestamps() {
        // Documents allocated by the remote carry only content
        let record: DocumentRecord =
            serde_json::from_str(r#"{"content":"Initial content"}"#).unwrap();
        assert_eq!(record.content, INITIAL_CONTENT);
        assert!(record.created_at.is_none());
        assert!(record.updated_at.is_none());

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"content":"Initial content"}"#);
    }
}
