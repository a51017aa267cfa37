//! Output formatting for CLI
//!
//! Provides consistent output formatting across all commands:
//! - Human-readable default output
//! - JSON output (--json flag)
//! - Quiet mode for scripting (--quiet flag)

use driftpad_core::{Document, DocumentId, SessionEvent, SyncPhase, SyncSnapshot};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable output (default)
    Human,
    /// JSON output
    Json,
    /// Quiet mode - minimal output
    Quiet,
}

impl OutputFormat {
    /// Create format from CLI flags
    pub fn from_flags(json: bool, quiet: bool) -> Self {
        if quiet {
            OutputFormat::Quiet
        } else if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

/// Output helper for consistent formatting
pub struct Output {
    /// The output format
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Print a document with its sync state
    pub fn print_snapshot(&self, snapshot: &SyncSnapshot) {
        match self.format {
            OutputFormat::Human => {
                println!("ID:        {}", snapshot.doc_id);
                println!("State:     {}", describe_state(snapshot));
                println!(
                    "Saved:     {}",
                    snapshot
                        .last_saved
                        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "never".to_string())
                );
                if let Some(ref error) = snapshot.error {
                    println!("Error:     {}", error);
                }
                println!("────────────────────────────────────────");
                println!("{}", snapshot.content);
            }
            OutputFormat::Json => print_json(snapshot),
            OutputFormat::Quiet => {
                println!("{}", snapshot.content);
            }
        }
    }

    /// Print the state line only
    pub fn print_status(&self, snapshot: &SyncSnapshot) {
        match self.format {
            OutputFormat::Human => {
                println!(
                    "{} | {} | {} chars",
                    snapshot.doc_id,
                    describe_state(snapshot),
                    snapshot.content.chars().count()
                );
            }
            OutputFormat::Json => print_json(snapshot),
            OutputFormat::Quiet => println!("{}", snapshot.phase),
        }
    }

    /// Print a newly created document
    pub fn print_created(&self, snapshot: &SyncSnapshot) {
        match self.format {
            OutputFormat::Human => {
                println!("Created document {}", snapshot.doc_id);
                if snapshot.doc_id.is_local() {
                    println!("The remote store was unreachable; the document lives on this device");
                    println!("until you resync it (driftpad edit {} then :resync).", snapshot.doc_id);
                }
                println!("State: {}", describe_state(snapshot));
            }
            OutputFormat::Json => print_json(snapshot),
            OutputFormat::Quiet => println!("{}", snapshot.doc_id),
        }
    }

    /// Print cached documents
    pub fn print_documents(&self, docs: &[(DocumentId, Option<Document>)]) {
        match self.format {
            OutputFormat::Human => {
                if docs.is_empty() {
                    println!("No cached documents.");
                    return;
                }
                for (id, doc) in docs {
                    match doc {
                        Some(doc) => println!(
                            "{} | {} | {}",
                            id,
                            doc.updated_at
                                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                                .unwrap_or_else(|| "-".to_string()),
                            truncate_line(&doc.content, 50)
                        ),
                        None => println!("{} | (unreadable)", id),
                    }
                }
                println!("\n{} document(s)", docs.len());
            }
            OutputFormat::Json => {
                let json_docs: Vec<_> = docs
                    .iter()
                    .map(|(id, doc)| {
                        serde_json::json!({
                            "id": id,
                            "content": doc.as_ref().map(|d| &d.content),
                            "updated_at": doc.as_ref().and_then(|d| d.updated_at),
                        })
                    })
                    .collect();
                print_json(&json_docs);
            }
            OutputFormat::Quiet => {
                for (id, _) in docs {
                    println!("{}", id);
                }
            }
        }
    }

    /// Print a session notice
    pub fn print_event(&self, event: &SessionEvent) {
        match self.format {
            OutputFormat::Human => {
                if let Some(text) = describe_event(event) {
                    eprintln!("» {}", text);
                }
            }
            OutputFormat::Json => {
                if let Ok(json) = serde_json::to_string(event) {
                    println!("{}", json);
                }
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        match self.format {
            OutputFormat::Human => println!("✓ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "success", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        match self.format {
            OutputFormat::Human => eprintln!("⚠ {}", message),
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::json!({"status": "warning", "message": message})
                );
            }
            OutputFormat::Quiet => {}
        }
    }

    /// Print an informational message
    pub fn message(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("{}", msg),
            OutputFormat::Json => {
                println!("{}", serde_json::json!({"message": msg}));
            }
            OutputFormat::Quiet => {}
        }
    }
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Could not encode output: {}", e),
    }
}

/// One-line summary of the sync state
fn describe_state(snapshot: &SyncSnapshot) -> String {
    let mut flags = Vec::new();
    if !snapshot.is_connected {
        flags.push("disconnected");
    }
    if snapshot.offline_mode && snapshot.phase != SyncPhase::Error {
        flags.push("offline mode");
    }
    if snapshot.is_saving {
        flags.push("saving");
    }

    if flags.is_empty() {
        snapshot.phase.to_string()
    } else {
        format!("{} ({})", snapshot.phase, flags.join(", "))
    }
}

/// Human text for a notice; `None` for routine ones
fn describe_event(event: &SessionEvent) -> Option<String> {
    let text = match event {
        SessionEvent::Loaded { .. } | SessionEvent::SavedLocally { .. } => return None,
        SessionEvent::LoadFailed { reason } => format!("Load failed: {}", reason),
        SessionEvent::Saved { origin, at } => {
            format!("Saved ({}) at {}", origin, at.format("%H:%M:%S"))
        }
        SessionEvent::SyncFailed { origin, error } => {
            format!("Sync failed ({}): {}", origin, error)
        }
        SessionEvent::SwitchedOffline { reason } => format!(
            "Switched to offline mode: {}. Changes are saved locally.",
            reason
        ),
        SessionEvent::Resynced => "Changes synced".to_string(),
        SessionEvent::RemoteApplied { .. } => "Document updated remotely".to_string(),
        SessionEvent::CacheCorrupt { details } => {
            format!("Ignored corrupt local copy: {}", details)
        }
        SessionEvent::CacheWriteFailed { error } => format!("Local save failed: {}", error),
        SessionEvent::Rejected { command, reason } => {
            format!("Cannot {}: {}", command, reason)
        }
    };
    Some(text)
}

/// Truncate a string to max chars, adding "..." if truncated
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Truncate to first line and max length
fn truncate_line(s: &str, max_len: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    truncate(first_line, max_len)
}
