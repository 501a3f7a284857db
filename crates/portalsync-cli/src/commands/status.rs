//! Status command handler

use std::path::Path;

use anyhow::Result;

use portalsync_core::PendingChange;

use crate::commands::{open_foreground, sync_down};
use crate::output::Output;

/// Refresh, rescan and list pending changes
pub async fn show(dir: &Path, output: &Output) -> Result<()> {
    let mut engine = open_foreground(dir, output)?;
    let summary = sync_down(&mut engine).await?;
    if summary.canceled {
        output.message("Refresh canceled; changes may be out of date.");
    }

    let changes: Vec<PendingChange> = engine.changes().cloned().collect();
    output.print_changes(engine.root(), &changes);
    Ok(())
}
