//! Filesystem watcher
//!
//! Watches a workspace recursively and forwards the paths of created,
//! modified and removed entries into a tokio channel. Debouncing happens in
//! the change tracker, not here.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::SyncResult;

/// Recursive watcher for one workspace
pub struct WorkspaceWatcher {
    _watcher: RecommendedWatcher,
    /// Paths touched on disk, one message per path
    pub events: mpsc::UnboundedReceiver<PathBuf>,
}

impl WorkspaceWatcher {
    pub fn new(root: &Path) -> SyncResult<Self> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut watcher =
            notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
                Ok(event) => {
                    for path in relevant_paths(&event) {
                        // Receiver gone means the workspace is shutting down
                        let _ = tx.send(path);
                    }
                }
                Err(e) => warn!("Watch error: {}", e),
            })?;

        watcher.watch(root, RecursiveMode::Recursive)?;
        debug!("Watching {}", root.display());

        Ok(Self {
            _watcher: watcher,
            events: rx,
        })
    }
}

/// Paths of an event worth evaluating
///
/// Only creations, modifications (renames included) and removals count.
pub fn relevant_paths(event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_) => event.paths.clone(),
        _ => Vec::new(),
    }
}
