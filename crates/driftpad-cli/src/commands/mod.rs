//! Command handlers

pub mod config;
pub mod edit;
pub mod list;
pub mod new;
pub mod show;
pub mod write;

use anyhow::{bail, Result};

use driftpad_core::{SessionHandle, SyncPhase, SyncSnapshot};

use crate::output::Output;

/// Wait for a session to load, failing if it ended up in `Error`
///
/// Notices emitted while loading are printed.
pub(crate) async fn load(session: &mut SessionHandle, output: &Output) -> Result<SyncSnapshot> {
    let snapshot = session.wait_loaded().await?;
    while let Some(event) = session.try_next_event() {
        output.print_event(&event);
    }

    if snapshot.phase == SyncPhase::Error {
        let reason = snapshot
            .error
            .unwrap_or_else(|| "document could not be loaded".to_string());
        bail!("{}", reason);
    }
    Ok(snapshot)
}

/// Let outstanding remote writes land, then close the session
pub(crate) async fn finish(mut session: SessionHandle, output: &Output) -> Result<()> {
    session.wait_until(|s| !s.is_saving).await?;
    while let Some(event) = session.try_next_event() {
        output.print_event(&event);
    }
    session.close().await?;
    Ok(())
}
