//! Checkout command handler

use std::path::Path;

use anyhow::Result;

use crate::commands::{cancellable, open_foreground, sync_down};
use crate::output::Output;

/// Overwrite the workspace with the portal's content
///
/// Refused while there are pending changes.
pub async fn checkout(dir: &Path, output: &Output) -> Result<()> {
    let mut engine = open_foreground(dir, output)?;
    sync_down(&mut engine).await?;

    let flag = engine.cancel_flag();
    match cancellable(flag, engine.checkout()).await? {
        Some(summary) => {
            output.print_download(&summary);
            if !summary.canceled {
                output.success("Checked out");
            }
        }
        None => output.message("Checkout canceled."),
    }
    Ok(())
}
