//! Command handlers

pub mod checkout;
pub mod commit;
pub mod config;
pub mod discard;
pub mod init;
pub mod show;
pub mod status;
pub mod watch;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use portalsync_core::{remote, CancelFlag, Config, DownloadSummary, Interaction, SyncEngine};

use crate::output::Output;
use crate::prompt::TerminalPrompt;

/// Canonical root of an existing workspace directory
pub fn workspace_root(dir: &Path) -> Result<PathBuf> {
    if !dir.is_dir() {
        bail!("Workspace '{}' is not a directory", dir.display());
    }
    std::fs::canonicalize(dir)
        .with_context(|| format!("Failed to resolve workspace '{}'", dir.display()))
}

/// Engine for one workspace, wired to the Dataverse gateway
pub fn open_engine(
    root: &Path,
    config: &Config,
    interaction: Arc<dyn Interaction>,
) -> Result<SyncEngine> {
    let gateway = remote::connect(config)?;
    debug!("Opening workspace {}", root.display());
    SyncEngine::open(root, config, Arc::new(gateway), interaction)
        .with_context(|| format!("Failed to open workspace '{}'", root.display()))
}

/// Open the workspace for a foreground command, asking on the terminal
pub fn open_foreground(dir: &Path, output: &Output) -> Result<SyncEngine> {
    let config = Config::load().context("Failed to load configuration")?;
    let root = workspace_root(dir)?;
    open_engine(
        &root,
        &config,
        Arc::new(TerminalPrompt::new(output.shows_progress())),
    )
}

/// Bring the snapshot up to date and rescan the workspace
///
/// Fails when the workspace has no portal and none was picked.
pub async fn sync_down(engine: &mut SyncEngine) -> Result<DownloadSummary> {
    let flag = engine.cancel_flag();
    match cancellable(flag, engine.download(false)).await? {
        Some(summary) => Ok(summary),
        None => bail!("No portal selected for '{}'", engine.root().display()),
    }
}

/// Run `work`, letting Ctrl-C raise the cancel flag meanwhile
pub async fn cancellable<F: Future>(flag: CancelFlag, work: F) -> F::Output {
    let listener = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping after the current step");
            flag.store(true, Ordering::SeqCst);
        }
    });

    let result = work.await;
    listener.abort();
    result
}
