//! Show command handler

use anyhow::Result;

use driftpad_core::DocumentId;

use crate::backend::Backend;
use crate::output::Output;

/// Load a document and print it with its sync state
pub async fn show(backend: &Backend, id: DocumentId, output: &Output) -> Result<()> {
    let mut session = backend.engine.open(id);
    let snapshot = super::load(&mut session, output).await?;

    output.print_snapshot(&snapshot);
    super::finish(session, output).await
}
