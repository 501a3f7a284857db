//! Show command handler

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::commands::{open_foreground, sync_down};
use crate::output::{Output, OutputFormat};

/// Print the portal's version of a local file
pub async fn show(dir: &Path, file: &Path, output: &Output) -> Result<()> {
    let path = absolute(file)?;
    let mut engine = open_foreground(dir, output)?;
    sync_down(&mut engine).await?;

    let Some(content) = engine.original_content(&path)? else {
        bail!("'{}' has no remote version", file.display());
    };

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({ "path": path, "content": content })
            );
        }
        _ => print!("{}", content),
    }
    Ok(())
}

/// Resolve against the current directory; deleted files cannot be canonicalized
fn absolute(file: &Path) -> Result<PathBuf> {
    if let Ok(path) = std::fs::canonicalize(file) {
        return Ok(path);
    }
    let cwd = std::env::current_dir().context("Failed to read the current directory")?;
    let joined = cwd.join(file);

    // The parent usually still exists
    match (joined.parent(), joined.file_name()) {
        (Some(parent), Some(name)) => match std::fs::canonicalize(parent) {
            Ok(parent) => Ok(parent.join(name)),
            Err(_) => Ok(joined),
        },
        _ => Ok(joined),
    }
}
