//! REST document store
//!
//! Documents live at `{base}/documents/{id}.json`. A `GET` returns the stored
//! record or `null`, a `PUT` overwrites it, and a `POST` to
//! `{base}/documents.json` allocates a new key returned as `{"name": ...}`.
//! Subscriptions poll the document and forward every observed change.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{RemoteStore, Subscription};
use crate::error::{SyncError, SyncResult};
use crate::models::{Document, DocumentId, DocumentRecord, RemoteUpdate, INITIAL_CONTENT};

/// Request timeout in seconds
const REQUEST_TIMEOUT: u64 = 10;

/// Response to a key allocation
#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

/// HTTP client for a REST document store
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: Client,
    base_url: Url,
    poll_interval: Duration,
}

impl HttpRemote {
    /// Create a client for the store at `base_url`
    pub fn new(base_url: &str, poll_interval: Duration) -> SyncResult<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .map_err(|e| SyncError::remote(format!("invalid remote URL '{}': {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT))
            .user_agent(concat!("driftpad/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(SyncError::remote)?;

        Ok(Self {
            client,
            base_url,
            poll_interval,
        })
    }

    /// `host:port` of the store, for reachability probing
    pub fn probe_target(&self) -> Option<String> {
        let host = self.base_url.host_str()?;
        let port = self.base_url.port_or_known_default()?;
        Some(format!("{}:{}", host, port))
    }

    fn document_url(&self, id: &DocumentId) -> String {
        format!("{}/documents/{}.json", self.base(), id)
    }

    fn collection_url(&self) -> String {
        format!("{}/documents.json", self.base())
    }

    fn base(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }
}

/// GET a record, treating `null` as absent
async fn fetch_record(client: &Client, url: &str) -> SyncResult<Option<DocumentRecord>> {
    let resp = client.get(url).send().await.map_err(SyncError::remote)?;

    if !resp.status().is_success() {
        return Err(SyncError::remote(format!(
            "GET {} returned {}",
            url,
            resp.status()
        )));
    }

    resp.json::<Option<DocumentRecord>>()
        .await
        .map_err(SyncError::remote)
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn fetch(&self, id: &DocumentId) -> SyncResult<Option<Document>> {
        let record = fetch_record(&self.client, &self.document_url(id)).await?;
        Ok(record.map(|r| Document::from_record(id.clone(), r)))
    }

    async fn persist(&self, doc: &Document) -> SyncResult<()> {
        let url = self.document_url(&doc.id);
        let resp = self
            .client
            .put(&url)
            .json(&doc.to_record())
            .send()
            .await
            .map_err(SyncError::remote)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SyncError::remote(format!(
                "PUT {} returned {}: {}",
                url, status, body
            )));
        }

        debug!(doc_id = %doc.id, "Persisted {} bytes", doc.content.len());
        Ok(())
    }

    async fn subscribe(&self, id: &DocumentId) -> SyncResult<Subscription> {
        let url = self.document_url(id);

        // The first read doubles as the reachability check for the subscription
        let mut last = fetch_record(&self.client, &url).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(record) = &last {
            let _ = tx.send(RemoteUpdate::from(record.clone()));
        }

        let client = self.client.clone();
        let interval = self.poll_interval;
        let doc_id = id.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;

                match fetch_record(&client, &url).await {
                    Ok(Some(record)) if last.as_ref() != Some(&record) => {
                        if tx.send(RemoteUpdate::from(record.clone())).is_err() {
                            break;
                        }
                        last = Some(record);
                    }
                    Ok(_) => {}
                    Err(e) => debug!(doc_id = %doc_id, "Poll failed: {}", e),
                }
            }
        });

        Ok(Subscription::new(id.clone(), rx, move || task.abort()))
    }

    async fn create_new(&self) -> Option<DocumentId> {
        let record = DocumentRecord {
            content: INITIAL_CONTENT.to_string(),
            created_at: None,
            updated_at: None,
        };

        let resp = match self
            .client
            .post(self.collection_url())
            .json(&record)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                warn!("Document allocation returned {}", resp.status());
                return None;
            }
            Err(e) => {
                warn!("Document allocation failed: {}", e);
                return None;
            }
        };

        let pushed: PushResponse = match resp.json().await {
            Ok(pushed) => pushed,
            Err(e) => {
                warn!("Unexpected allocation response: {}", e);
                return None;
            }
        };

        match DocumentId::parse(pushed.name) {
            Ok(id) => {
                info!(doc_id = %id, "Allocated remote document");
                Some(id)
            }
            Err(e) => {
                warn!("Remote returned unusable key: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let remote = HttpRemote::new("https://pad.example.com/", Duration::from_secs(1)).unwrap();
        let id = DocumentId::parse("abc").unwrap();

        assert_eq!(
            remote.document_url(&id),
            "https://pad.example.com/documents/abc.json"
        );
        assert_eq!(
            remote.collection_url(),
            "https://pad.example.com/documents.json"
        );
        assert_eq!(
            remote.probe_target().as_deref(),
            Some("pad.example.com:443")
        );
    }

    #[test]
    fn test_urls_with_path_prefix() {
        let remote =
            HttpRemote::new("http://localhost:9000/api", Duration::from_secs(1)).unwrap();
        let id = DocumentId::parse("xyz").unwrap();

        assert_eq!(
            remote.document_url(&id),
            "http://localhost:9000/api/documents/xyz.json"
        );
        assert_eq!(remote.probe_target().as_deref(), Some("localhost:9000"));
    }

    #[test]
    fn test_invalid_url() {
        let result = HttpRemote::new("not a url", Duration::from_secs(1));
        assert!(matches!(result, Err(SyncError::RemoteUnavailable(_))));
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        // Nothing listens on port 1
        let remote = HttpRemote::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap();
        let id = DocumentId::parse("abc").unwrap();

        assert!(matches!(
            remote.fetch(&id).await,
            Err(SyncError::RemoteUnavailable(_))
        ));
        assert!(remote.subscribe(&id).await.is_err());
        assert!(remote.create_new().await.is_none());
    }
}
