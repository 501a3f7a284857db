//! Workspace registry
//!
//! Several workspaces can be open at once, each with its own engine. The
//! registry maps a workspace's canonical root to whatever the caller keeps
//! per workspace (an engine, a task handle, ...). It is owned by the caller;
//! the engine knows nothing about it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{SyncError, SyncResult};

/// Open workspaces keyed by canonical root
#[derive(Debug)]
pub struct WorkspaceRegistry<T> {
    entries: BTreeMap<PathBuf, T>,
}

impl<T> Default for WorkspaceRegistry<T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> WorkspaceRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical key for a workspace root
    pub fn key(root: &Path) -> SyncResult<PathBuf> {
        std::fs::canonicalize(root).map_err(|e| SyncError::from_io(e, root))
    }

    /// Register a workspace; returns its key and any entry it replaced
    pub fn insert(&mut self, root: &Path, value: T) -> SyncResult<(PathBuf, Option<T>)> {
        let key = Self::key(root)?;
        let previous = self.entries.insert(key.clone(), value);
        Ok((key, previous))
    }

    pub fn get(&self, root: &Path) -> Option<&T> {
        let key = Self::key(root).ok()?;
        self.entries.get(&key)
    }

    pub fn get_mut(&mut self, root: &Path) -> Option<&mut T> {
        let key = Self::key(root).ok()?;
        self.entries.get_mut(&key)
    }

    pub fn remove(&mut self, root: &Path) -> Option<T> {
        let key = Self::key(root).ok()?;
        self.entries.remove(&key)
    }

    pub fn contains(&self, root: &Path) -> bool {
        self.get(root).is_some()
    }

    /// Workspace a path lies in; the deepest root wins for nested workspaces
    pub fn workspace_of(&self, path: &Path) -> Option<(&Path, &T)> {
        self.entries
            .iter()
            .filter(|(root, _)| path.starts_with(root))
            .max_by_key(|(root, _)| root.components().count())
            .map(|(root, value)| (root.as_path(), value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &T)> {
        self.entries.iter().map(|(k, v)| (k.as_path(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Path, &mut T)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_path(), v))
    }

    /// Remove every workspace, yielding their entries
    pub fn drain(&mut self) -> impl Iterator<Item = (PathBuf, T)> {
        std::mem::take(&mut self.entries).into_iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
