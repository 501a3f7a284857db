//! Commit command handler

use std::path::Path;

use anyhow::{bail, Result};

use crate::commands::{open_foreground, sync_down};
use crate::output::Output;

/// Push every pending change to the portal
pub async fn commit(dir: &Path, output: &Output) -> Result<()> {
    let mut engine = open_foreground(dir, output)?;
    let refreshed = sync_down(&mut engine).await?;
    if refreshed.canceled {
        bail!("Refresh canceled; nothing was committed");
    }

    let summary = engine.commit().await?;
    output.print_commit(engine.root(), &summary);

    if !summary.is_success() {
        bail!(
            "{} change(s) could not be committed and are still pending",
            summary.failures.len()
        );
    }
    Ok(())
}
