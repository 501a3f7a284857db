//! Init command handler

use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::commands::{cancellable, open_foreground};
use crate::output::{Output, OutputFormat};

/// Bind a workspace to a portal and download everything into it
pub async fn init(dir: &Path, output: &Output) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create workspace '{}'", dir.display()))?;

    let mut engine = open_foreground(dir, output)?;
    let flag = engine.cancel_flag();
    let Some(summary) = cancellable(flag, engine.download(true)).await? else {
        bail!("No portal selected; nothing was downloaded");
    };

    let portal = engine.portal().map(|p| p.portal_name.clone());
    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "workspace": engine.root(),
                    "portal": portal,
                    "download": summary
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", engine.root().display());
        }
        OutputFormat::Human => {
            output.print_download(&summary);
            if !summary.canceled {
                println!();
                println!(
                    "Workspace {} is bound to {}.",
                    engine.root().display(),
                    portal.as_deref().unwrap_or("(unknown portal)")
                );
            }
        }
    }

    Ok(())
}
