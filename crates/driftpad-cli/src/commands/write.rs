//! Write command handler

use anyhow::{bail, Result};

use driftpad_core::{DocumentId, PushOrigin, SessionEvent};

use crate::backend::Backend;
use crate::output::Output;

/// Replace a document's content and save it right away
pub async fn write(backend: &Backend, id: DocumentId, text: String, output: &Output) -> Result<()> {
    let mut session = backend.engine.open(id);
    super::load(&mut session, output).await?;

    session.edit(text).await?;
    session.force_save().await?;

    loop {
        let Some(event) = session.next_event().await else {
            bail!("Session ended before the save completed");
        };

        match event {
            SessionEvent::Saved {
                origin: PushOrigin::Manual,
                ..
            } => {
                output.success(&format!("Saved {}", session.doc_id()));
                break;
            }
            SessionEvent::SavedLocally { .. } => {
                output.warning(&format!(
                    "Saved {} locally; it will sync on the next resync",
                    session.doc_id()
                ));
                break;
            }
            SessionEvent::SyncFailed {
                origin: PushOrigin::Manual,
                ref error,
            } => {
                output.warning(&format!(
                    "Saved {} locally; remote save failed: {}",
                    session.doc_id(),
                    error
                ));
                break;
            }
            other => output.print_event(&other),
        }
    }

    super::finish(session, output).await
}
