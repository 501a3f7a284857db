//! Watch command
//!
//! Keeps several workspaces live at once. Each workspace gets its own task
//! owning its engine and filesystem watcher; the foreground loop reads
//! commands from stdin and forwards them to every task, printing what the
//! tasks report back.
//!
//! Within a task, filesystem events, the periodic refresh and commands are
//! handled one at a time, so a refresh never overlaps a commit.

use std::future::pending;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use portalsync_core::{
    CancelFlag, CommitSummary, Config, DownloadSummary, PendingChange, SyncEngine, Unattended,
    WorkspaceRegistry, WorkspaceWatcher,
};

use crate::commands::open_engine;
use crate::output::{change_line, Output, OutputFormat};

// ==================== Messages ====================

/// Commands sent to a workspace task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceCommand {
    /// Report pending changes
    Status,
    /// Push pending changes
    Commit,
    /// Incremental download
    Refresh,
    /// Throw away local changes
    Discard,
    /// Stop the task
    Shutdown,
}

impl WorkspaceCommand {
    /// Parse one line typed on stdin
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "status" | "st" => Some(Self::Status),
            "commit" => Some(Self::Commit),
            "refresh" => Some(Self::Refresh),
            "discard" => Some(Self::Discard),
            "quit" | "exit" | "q" => Some(Self::Shutdown),
            _ => None,
        }
    }
}

/// Events emitted by workspace tasks
#[derive(Debug)]
pub enum WorkspaceEvent {
    /// A download finished
    Downloaded(PathBuf, DownloadSummary),
    /// The set of pending changes changed or was asked for
    Changes(PathBuf, Vec<PendingChange>),
    /// A commit finished
    Committed(PathBuf, CommitSummary),
    /// An operation failed
    Error(PathBuf, String),
    /// The task ended
    Stopped(PathBuf),
}

/// Handle to control one workspace task
pub struct WorkspaceHandle {
    /// Send commands to the task
    pub command_tx: mpsc::Sender<WorkspaceCommand>,
    /// Stops a running download
    pub cancel: CancelFlag,
    task: JoinHandle<()>,
}

/// Spawn the task that owns a workspace's engine
pub fn spawn_workspace_task(
    engine: SyncEngine,
    watcher: WorkspaceWatcher,
    refresh_every: Option<Duration>,
    event_tx: mpsc::Sender<WorkspaceEvent>,
) -> WorkspaceHandle {
    let (command_tx, command_rx) = mpsc::channel(16);
    let cancel = engine.cancel_flag();

    let task = tokio::spawn(workspace_loop(
        engine,
        watcher,
        refresh_every,
        command_rx,
        event_tx,
    ));

    WorkspaceHandle {
        command_tx,
        cancel,
        task,
    }
}

// ==================== Workspace task ====================

async fn workspace_loop(
    mut engine: SyncEngine,
    mut watcher: WorkspaceWatcher,
    refresh_every: Option<Duration>,
    mut command_rx: mpsc::Receiver<WorkspaceCommand>,
    event_tx: mpsc::Sender<WorkspaceEvent>,
) {
    let root = engine.root().to_path_buf();

    match engine.download(false).await {
        Ok(Some(summary)) => {
            let _ = event_tx
                .send(WorkspaceEvent::Downloaded(root.clone(), summary))
                .await;
        }
        Ok(None) => {
            let _ = event_tx
                .send(WorkspaceEvent::Error(
                    root.clone(),
                    "no portal bound; run `portalsync init` first".to_string(),
                ))
                .await;
            let _ = event_tx.send(WorkspaceEvent::Stopped(root)).await;
            return;
        }
        Err(e) => {
            let _ = event_tx
                .send(WorkspaceEvent::Error(root.clone(), e.to_string()))
                .await;
        }
    }

    let mut last_reported: Vec<PendingChange> = engine.changes().cloned().collect();
    let _ = event_tx
        .send(WorkspaceEvent::Changes(root.clone(), last_reported.clone()))
        .await;

    let mut refresh = refresh_every.map(|every| {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        interval
    });

    loop {
        let deadline = engine.deadline();

        tokio::select! {
            cmd = command_rx.recv() => {
                let cmd = cmd.unwrap_or(WorkspaceCommand::Shutdown);
                if cmd == WorkspaceCommand::Shutdown {
                    break;
                }
                handle_command(&mut engine, cmd, &event_tx).await;
                last_reported = engine.changes().cloned().collect();
            }

            Some(path) = watcher.events.recv() => {
                engine.record_event(path);
            }

            _ = settle(deadline) => {
                engine.process_events().await;
                let current: Vec<PendingChange> = engine.changes().cloned().collect();
                if !same_changes(&current, &last_reported) {
                    let _ = event_tx
                        .send(WorkspaceEvent::Changes(root.clone(), current.clone()))
                        .await;
                    last_reported = current;
                }
            }

            _ = tick(&mut refresh) => {
                debug!("Periodic refresh of {}", root.display());
                match engine.refresh().await {
                    Ok(_) => {
                        let current: Vec<PendingChange> = engine.changes().cloned().collect();
                        if !same_changes(&current, &last_reported) {
                            let _ = event_tx
                                .send(WorkspaceEvent::Changes(root.clone(), current.clone()))
                                .await;
                            last_reported = current;
                        }
                    }
                    Err(e) => warn!("Periodic refresh of {} failed: {}", root.display(), e),
                }
            }
        }
    }

    info!("Stopped watching {}", root.display());
    let _ = event_tx.send(WorkspaceEvent::Stopped(root)).await;
}

async fn handle_command(
    engine: &mut SyncEngine,
    cmd: WorkspaceCommand,
    event_tx: &mpsc::Sender<WorkspaceEvent>,
) {
    let root = engine.root().to_path_buf();

    let event = match cmd {
        WorkspaceCommand::Status => {
            engine.process_events().await;
            WorkspaceEvent::Changes(root, engine.changes().cloned().collect())
        }
        WorkspaceCommand::Commit => {
            engine.process_events().await;
            match engine.commit().await {
                Ok(summary) => WorkspaceEvent::Committed(root, summary),
                Err(e) => WorkspaceEvent::Error(root, e.to_string()),
            }
        }
        WorkspaceCommand::Refresh => match engine.refresh().await {
            Ok(Some(summary)) => WorkspaceEvent::Downloaded(root, summary),
            Ok(None) => WorkspaceEvent::Error(root, "no portal bound".to_string()),
            Err(e) => WorkspaceEvent::Error(root, e.to_string()),
        },
        WorkspaceCommand::Discard => match engine.discard().await {
            Ok(Some(summary)) => WorkspaceEvent::Downloaded(root, summary),
            Ok(None) => return,
            Err(e) => WorkspaceEvent::Error(root, e.to_string()),
        },
        WorkspaceCommand::Shutdown => return,
    };

    let _ = event_tx.send(event).await;
}

/// Resolves once recorded events have settled; never without a deadline
async fn settle(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => pending().await,
    }
}

/// Next periodic refresh; never when periodic refresh is off
async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => pending().await,
    }
}

fn same_changes(a: &[PendingChange], b: &[PendingChange]) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b)
            .all(|(x, y)| x.path == y.path && x.kind == y.kind)
}

// ==================== Foreground loop ====================

/// Watch workspaces until `quit`, end of input or Ctrl-C
pub async fn watch(dirs: Vec<PathBuf>, output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let refresh_every = config
        .periodic_refresh
        .then(|| config.refresh_interval());

    let dirs = if dirs.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        dirs
    };

    let (event_tx, mut event_rx) = mpsc::channel(64);
    let mut registry: WorkspaceRegistry<WorkspaceHandle> = WorkspaceRegistry::new();

    for dir in dirs {
        let root = WorkspaceRegistry::<WorkspaceHandle>::key(&dir)
            .with_context(|| format!("Cannot watch '{}'", dir.display()))?;
        if registry.contains(&root) {
            warn!("{} is listed more than once", root.display());
            continue;
        }

        let engine = open_engine(&root, &config, Arc::new(Unattended))?;
        let watcher = WorkspaceWatcher::new(&root)?;
        let handle = spawn_workspace_task(engine, watcher, refresh_every, event_tx.clone());
        registry.insert(&root, handle)?;
    }
    drop(event_tx);

    if registry.is_empty() {
        bail!("No workspace to watch");
    }
    output.message(&format!(
        "Watching {} workspace(s). Commands: status, commit, refresh, discard, quit",
        registry.len()
    ));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => {
                let cmd = match line {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => match WorkspaceCommand::parse(&line) {
                        Some(cmd) => cmd,
                        None => {
                            output.message(&format!("Unknown command '{}'", line.trim()));
                            continue;
                        }
                    },
                    // End of input stops everything, like `quit`
                    Ok(None) | Err(_) => {
                        stdin_open = false;
                        WorkspaceCommand::Shutdown
                    }
                };
                dispatch(&registry, cmd).await;
            }

            event = event_rx.recv() => {
                let Some(event) = event else { break };
                if let WorkspaceEvent::Stopped(root) = &event {
                    if let Some(handle) = registry.remove(root) {
                        let _ = handle.task.await;
                    }
                }
                print_event(output, &event);
                if registry.is_empty() {
                    break;
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted; stopping");
                for (_, handle) in registry.iter() {
                    handle.cancel.store(true, std::sync::atomic::Ordering::SeqCst);
                }
                dispatch(&registry, WorkspaceCommand::Shutdown).await;
                stdin_open = false;
            }
        }
    }

    for (_, handle) in registry.drain() {
        handle.task.abort();
    }
    Ok(())
}

/// Send one command to every workspace
async fn dispatch(registry: &WorkspaceRegistry<WorkspaceHandle>, cmd: WorkspaceCommand) {
    for (root, handle) in registry.iter() {
        if handle.command_tx.send(cmd).await.is_err() {
            debug!("{} is no longer listening", root.display());
        }
    }
}

fn print_event(output: &Output, event: &WorkspaceEvent) {
    match output.format {
        OutputFormat::Json => {
            let value = match event {
                WorkspaceEvent::Downloaded(root, summary) => {
                    serde_json::json!({"workspace": root, "event": "downloaded", "download": summary})
                }
                WorkspaceEvent::Changes(root, changes) => {
                    serde_json::json!({"workspace": root, "event": "changes", "changes": changes})
                }
                WorkspaceEvent::Committed(root, summary) => {
                    serde_json::json!({"workspace": root, "event": "committed", "commit": summary})
                }
                WorkspaceEvent::Error(root, message) => {
                    serde_json::json!({"workspace": root, "event": "error", "message": message})
                }
                WorkspaceEvent::Stopped(root) => {
                    serde_json::json!({"workspace": root, "event": "stopped"})
                }
            };
            println!("{}", value);
        }
        OutputFormat::Quiet => {
            if let WorkspaceEvent::Error(root, message) = event {
                eprintln!("{}: {}", root.display(), message);
            }
        }
        OutputFormat::Human => match event {
            WorkspaceEvent::Downloaded(root, summary) => {
                println!("[{}]", label(root));
                output.print_download(summary);
            }
            WorkspaceEvent::Changes(root, changes) => {
                println!("[{}] {} change(s)", label(root), changes.len());
                for change in changes {
                    println!("  {}", change_line(root, change));
                }
            }
            WorkspaceEvent::Committed(root, summary) => {
                println!("[{}]", label(root));
                output.print_commit(root, summary);
            }
            WorkspaceEvent::Error(root, message) => {
                eprintln!("[{}] Error: {}", label(root), message);
            }
            WorkspaceEvent::Stopped(root) => {
                println!("[{}] stopped", label(root));
            }
        },
    }
}

/// Short name of a workspace for prefixed output
fn label(root: &Path) -> String {
    root.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use portalsync_core::ChangeKind;

    fn change(path: &str, kind: ChangeKind) -> PendingChange {
        PendingChange {
            path: PathBuf::from(path),
            kind,
            last_seen_dirty: Utc::now(),
        }
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(WorkspaceCommand::parse("status"), Some(WorkspaceCommand::Status));
        assert_eq!(WorkspaceCommand::parse(" Commit\n"), Some(WorkspaceCommand::Commit));
        assert_eq!(WorkspaceCommand::parse("refresh"), Some(WorkspaceCommand::Refresh));
        assert_eq!(WorkspaceCommand::parse("discard"), Some(WorkspaceCommand::Discard));
        assert_eq!(WorkspaceCommand::parse("quit"), Some(WorkspaceCommand::Shutdown));
        assert_eq!(WorkspaceCommand::parse("push"), None);
    }

    #[test]
    fn test_same_changes_ignores_timestamps() {
        let a = vec![change("/w/Templates/a.html", ChangeKind::Modified)];
        let b = vec![change("/w/Templates/a.html", ChangeKind::Modified)];
        assert!(same_changes(&a, &b));

        let c = vec![change("/w/Templates/a.html", ChangeKind::Deleted)];
        assert!(!same_changes(&a, &c));
        assert!(!same_changes(&a, &[]));
    }

    #[test]
    fn test_label_uses_folder_name() {
        assert_eq!(label(Path::new("/work/customer-portal")), "customer-portal");
    }

    #[tokio::test]
    async fn test_settle_waits_for_deadline() {
        let at = std::time::Instant::now() + Duration::from_millis(20);
        tokio::time::timeout(Duration::from_secs(1), settle(Some(at)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_idle_branches_never_fire() {
        let mut none: Option<Interval> = None;
        let idle = async {
            tokio::select! {
                _ = settle(None) => {}
                _ = tick(&mut none) => {}
            }
        };
        assert!(tokio::time::timeout(Duration::from_millis(50), idle)
            .await
            .is_err());
    }
}
