//! Discard command handler

use std::path::Path;

use anyhow::Result;

use crate::commands::{cancellable, open_foreground, sync_down};
use crate::output::Output;

/// Throw away local changes, removing files the portal never had
pub async fn discard(dir: &Path, output: &Output) -> Result<()> {
    let mut engine = open_foreground(dir, output)?;
    sync_down(&mut engine).await?;

    if engine.pending_count() == 0 {
        output.message("No changes to discard.");
        return Ok(());
    }

    let flag = engine.cancel_flag();
    match cancellable(flag, engine.discard()).await? {
        Some(summary) => {
            output.print_download(&summary);
            if !summary.canceled {
                output.success("Discarded local changes");
            }
        }
        None => output.message("Discard canceled."),
    }
    Ok(())
}
