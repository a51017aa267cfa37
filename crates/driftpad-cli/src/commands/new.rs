//! New command handler

use anyhow::Result;

use crate::backend::Backend;
use crate::output::Output;

/// Create a document and print its id
pub async fn create(backend: &Backend, output: &Output) -> Result<()> {
    let mut session = backend.engine.create_new().await;
    let snapshot = super::load(&mut session, output).await?;

    output.print_created(&snapshot);
    super::finish(session, output).await
}
