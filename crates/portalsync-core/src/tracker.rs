//! Change tracking
//!
//! Turns raw filesystem events into the set of pending changes. Events are
//! recorded into an unordered path set; once the debounce window has been
//! quiet for [`DEBOUNCE_WINDOW`], [`ChangeTracker::flush`] evaluates every
//! settled path once against the snapshot.
//!
//! ## States
//!
//! ```text
//! Clean --content differs--> Dirty(modified | added) --reconciled/reverted--> Clean
//! Clean --file vanishes----> Dirty(deleted)          --reconciled----------> gone
//! ```
//!
//! A path that was never in the snapshot and disappears is dropped without
//! ever being tracked.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{SyncError, SyncResult};
use crate::kinds::{self, Encoding, KindStrategy};
use crate::models::{ChangeKind, FileId, PendingChange, ResourceKind};
use crate::paths::PathResolver;
use crate::snapshot::ContentSnapshot;

/// Quiet period before recorded events are evaluated
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Extensions ignored unless configured otherwise
pub const DEFAULT_IGNORED_EXTENSIONS: &[&str] = &["ds_store"];

// ==================== Ignore list ====================

/// Extension blacklist applied before any content comparison
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreList {
    /// Lower-case extensions without the leading dot
    extensions: Vec<String>,
}

impl IgnoreList {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    /// Check if a path is ignored
    ///
    /// Matches on the file name suffix, so dot-files like `.DS_Store` are
    /// caught even though they have no extension in the `Path` sense.
    pub fn is_ignored(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let name = name.to_lowercase();
        self.extensions
            .iter()
            .any(|ext| name.ends_with(&format!(".{}", ext)))
    }
}

impl Default for IgnoreList {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_EXTENSIONS)
    }
}

// ==================== Debounce ====================

/// Coalescing window for event bursts
///
/// Every new event pushes the deadline out by the full window.
#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debounce {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Register an event at `now`
    pub fn touch(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    /// When the window closes, if one is open
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Check if the window has closed
    pub fn is_due(&self, now: Instant) -> bool {
        self.deadline.is_some_and(|deadline| now >= deadline)
    }

    pub fn clear(&mut self) {
        self.deadline = None;
    }
}

impl Default for Debounce {
    fn default() -> Self {
        Self::new(DEBOUNCE_WINDOW)
    }
}

// ==================== Tracker ====================

/// Authoritative set of pending changes for one workspace
#[derive(Debug, Default)]
pub struct ChangeTracker {
    ignore: IgnoreList,
    queued: BTreeSet<PathBuf>,
    changes: BTreeMap<PathBuf, PendingChange>,
    debounce: Debounce,
}

impl ChangeTracker {
    pub fn new(ignore: IgnoreList) -> Self {
        Self {
            ignore,
            ..Self::default()
        }
    }

    /// Queue a path for evaluation and restart the debounce window
    pub fn record(&mut self, path: impl Into<PathBuf>) {
        self.record_at(path, Instant::now());
    }

    /// Queue a path as if the event arrived at `now`
    pub fn record_at(&mut self, path: impl Into<PathBuf>, now: Instant) {
        self.queued.insert(path.into());
        self.debounce.touch(now);
    }

    /// Queue many paths at once
    pub fn record_all(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        self.queued.extend(paths);
        self.debounce.touch(Instant::now());
    }

    /// When queued events become due
    pub fn deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// Check if queued events have settled
    pub fn is_due(&self, now: Instant) -> bool {
        self.debounce.is_due(now)
    }

    /// Number of paths waiting for evaluation
    pub fn queued(&self) -> usize {
        self.queued.len()
    }

    /// Evaluate every queued path once
    ///
    /// Existing `deleted` entries are queued again first, so a marker goes
    /// away once its identity left the snapshot or the file came back.
    /// Per-path failures are logged; they never stop the batch.
    pub async fn flush(&mut self, resolver: &PathResolver, snapshot: &ContentSnapshot) -> usize {
        let deleted: Vec<PathBuf> = self
            .changes
            .values()
            .filter(|c| c.kind == ChangeKind::Deleted)
            .map(|c| c.path.clone())
            .collect();
        self.queued.extend(deleted);

        let queued = std::mem::take(&mut self.queued);
        self.debounce.clear();

        debug!("Evaluating {} queued path(s)", queued.len());
        for path in queued {
            if let Err(e) = self.evaluate(resolver, snapshot, &path).await {
                warn!("Could not evaluate {}: {}", path.display(), e);
            }
        }

        self.count()
    }

    /// Classify one path against the snapshot and update its entry
    ///
    /// Returns the pending change kind, or `None` when the path is clean or
    /// not tracked.
    pub async fn evaluate(
        &mut self,
        resolver: &PathResolver,
        snapshot: &ContentSnapshot,
        path: &Path,
    ) -> SyncResult<Option<ChangeKind>> {
        let Some(key) = resolver.relative(path).map(|r| resolver.root().join(r)) else {
            return Ok(None);
        };

        let Some((kind, id)) = resolver.identify(&key) else {
            self.changes.remove(&key);
            return Ok(None);
        };
        if self.ignore.is_ignored(&key) {
            self.changes.remove(&key);
            return Ok(None);
        }
        let Some(strategy) = kinds::strategy(kind) else {
            return Ok(None);
        };

        let stored = snapshot.get(kind, &id);
        let state = match tokio::fs::read(&key).await {
            Ok(local) => match stored {
                None => Some(ChangeKind::Added),
                Some(doc) if same_content(strategy, &key, &local, &doc.content) => None,
                Some(_) => Some(ChangeKind::Modified),
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => match stored {
                Some(_) => match locate_on_disk(resolver, kind, &id) {
                    Some(found) => {
                        debug!("{} lives at {}", id, found.display());
                        None
                    }
                    None => Some(ChangeKind::Deleted),
                },
                None => None,
            },
            Err(e) if key.is_dir() => {
                debug!("Skipping directory {}: {}", key.display(), e);
                None
            }
            Err(e) => return Err(SyncError::from_io(e, key)),
        };

        match state {
            Some(change) => {
                debug!("{} {} ({})", change.marker(), key.display(), kind);
                self.changes.insert(
                    key.clone(),
                    PendingChange {
                        path: key,
                        kind: change,
                        last_seen_dirty: Utc::now(),
                    },
                );
            }
            None => {
                self.changes.remove(&key);
            }
        }
        Ok(state)
    }

    /// Pending changes in path order
    pub fn changes(&self) -> impl Iterator<Item = &PendingChange> {
        self.changes.values()
    }

    /// Pending change for a path
    pub fn get(&self, path: &Path) -> Option<&PendingChange> {
        self.changes.get(path)
    }

    /// Number of pending changes
    pub fn count(&self) -> usize {
        self.changes.len()
    }

    /// Drop the entry of a reconciled path
    pub fn resolve(&mut self, path: &Path) -> Option<PendingChange> {
        self.changes.remove(path)
    }

    /// Forget all pending state
    pub fn reset(&mut self) {
        self.changes.clear();
        self.queued.clear();
        self.debounce.clear();
    }
}

/// Every path a full rescan should look at
///
/// That is every file found under the managed folders plus the local path of
/// each snapshot document no file on disk resolves to. Names on disk may
/// differ in case from the materialized path.
pub fn scan_paths(resolver: &PathResolver, snapshot: &ContentSnapshot) -> Vec<PathBuf> {
    let mut paths = BTreeSet::new();

    for strategy in kinds::all() {
        let on_disk = files_under(resolver, strategy.kind);
        let present: BTreeSet<FileId> = on_disk
            .iter()
            .filter_map(|path| resolver.identify(path))
            .filter(|(kind, _)| *kind == strategy.kind)
            .map(|(_, id)| id)
            .collect();

        for (id, _) in snapshot.documents(strategy.kind) {
            if present.contains(id) {
                continue;
            }
            if let Some(path) = resolver.local_path(strategy.kind, id) {
                paths.insert(path);
            }
        }
        paths.extend(on_disk);
    }

    paths.into_iter().collect()
}

/// First file under the kind's folder whose identity is `id`
fn locate_on_disk(resolver: &PathResolver, kind: ResourceKind, id: &FileId) -> Option<PathBuf> {
    files_by_identity(resolver, kind).remove(id)
}

/// Files under the kind's folder keyed by identity; the first name wins
pub fn files_by_identity(resolver: &PathResolver, kind: ResourceKind) -> BTreeMap<FileId, PathBuf> {
    let mut found = BTreeMap::new();
    for path in files_under(resolver, kind) {
        if let Some((found_kind, id)) = resolver.identify(&path) {
            if found_kind == kind {
                found.entry(id).or_insert(path);
            }
        }
    }
    found
}

fn files_under(resolver: &PathResolver, kind: ResourceKind) -> Vec<PathBuf> {
    let Some(folder) = resolver.folder(kind) else {
        return Vec::new();
    };
    if !folder.is_dir() {
        return Vec::new();
    }
    WalkDir::new(&folder)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

fn strip_line_breaks(text: &str) -> String {
    text.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

/// Compare local bytes with the stored form of a document
///
/// Textual content ignores every `\r` and `\n`. Binary content, and text
/// that is not valid UTF-8, compares as base64.
fn same_content(strategy: &KindStrategy, path: &Path, local: &[u8], stored: &str) -> bool {
    match strategy.encoding {
        Encoding::Text => match std::str::from_utf8(local) {
            Ok(text) => strip_line_breaks(text) == strip_line_breaks(stored),
            Err(_) => false,
        },
        Encoding::Base64 => {
            if kinds::is_textual(path) {
                let remote = strategy.encoding.decode(stored).ok();
                let remote = remote.as_deref().and_then(|b| std::str::from_utf8(b).ok());
                if let (Ok(text), Some(remote)) = (std::str::from_utf8(local), remote) {
                    return strip_line_breaks(text) == strip_line_breaks(remote);
                }
            }
            strategy.encoding.encode(local) == stored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Document, FileId};
    use crate::paths::FileLayout;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        resolver: PathResolver,
        snapshot: ContentSnapshot,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let resolver = PathResolver::new(dir.path(), FileLayout::Flat);
            let mut snapshot = ContentSnapshot::new("contoso", "Portal", "p1");
            snapshot
                .put(
                    ResourceKind::PageTemplate,
                    FileId::new("home"),
                    Document::template("t1", "Home", "<h1>\nHello\n</h1>"),
                )
                .unwrap();
            snapshot
                .put(
                    ResourceKind::BinaryFile,
                    FileId::new("/logo.png"),
                    Document::file("f1", "n1", "logo.png", "image/png", "AAEC", None),
                )
                .unwrap();
            Self {
                _dir: dir,
                resolver,
                snapshot,
            }
        }

        fn write(&self, relative: &str, content: &[u8]) -> PathBuf {
            let path = self.resolver.root().join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, content).unwrap();
            path
        }
    }

    #[tokio::test]
    async fn test_line_endings_are_ignored() {
        let fx = Fixture::new();
        let path = fx.write("Templates/home.html", b"<h1>\r\nHello\r\n</h1>\r\n");
        let mut tracker = ChangeTracker::default();

        let state = tracker.evaluate(&fx.resolver, &fx.snapshot, &path).await.unwrap();
        assert_eq!(state, None);
        assert_eq!(tracker.count(), 0);
    }

    #[tokio::test]
    async fn test_modified_template() {
        let fx = Fixture::new();
        let path = fx.write("Templates/Home.html", b"<h1>Bye</h1>");
        let mut tracker = ChangeTracker::default();

        let state = tracker.evaluate(&fx.resolver, &fx.snapshot, &path).await.unwrap();
        assert_eq!(state, Some(ChangeKind::Modified));
        assert_eq!(tracker.get(&path).unwrap().kind, ChangeKind::Modified);
    }

    #[tokio::test]
    async fn test_evaluate_is_idempotent() {
        let fx = Fixture::new();
        let clean = fx.write("Templates/home.html", b"<h1>\nHello\n</h1>");
        let dirty = fx.write("Files/logo.png", &[9, 9, 9]);
        let mut tracker = ChangeTracker::default();

        for _ in 0..2 {
            let a = tracker.evaluate(&fx.resolver, &fx.snapshot, &clean).await.unwrap();
            let b = tracker.evaluate(&fx.resolver, &fx.snapshot, &dirty).await.unwrap();
            assert_eq!(a, None);
            assert_eq!(b, Some(ChangeKind::Modified));
        }
        assert_eq!(tracker.count(), 1);
    }

    #[tokio::test]
    async fn test_binary_file_compares_base64() {
        let fx = Fixture::new();
        let path = fx.write("Files/logo.png", &[0, 1, 2]);
        let mut tracker = ChangeTracker::default();

        let state = tracker.evaluate(&fx.resolver, &fx.snapshot, &path).await.unwrap();
        assert_eq!(state, None);
    }

    #[tokio::test]
    async fn test_textual_file_ignores_line_endings() {
        let mut fx = Fixture::new();
        fx.snapshot
            .put(
                ResourceKind::BinaryFile,
                FileId::new("/site.css"),
                Document::file("f2", "n2", "site.css", "text/css", "YQpiCg==", None),
            )
            .unwrap();
        let path = fx.write("Files/site.css", b"a\r\nb\r\n");
        let mut tracker = ChangeTracker::default();

        let state = tracker.evaluate(&fx.resolver, &fx.snapshot, &path).await.unwrap();
        assert_eq!(state, None);
    }

    #[tokio::test]
    async fn test_added_and_deleted() {
        let fx = Fixture::new();
        let added = fx.write("Templates/new.html", b"x");
        let deleted = fx.resolver.root().join("Templates/home.html");
        let never = fx.resolver.root().join("Templates/ghost.html");
        let mut tracker = ChangeTracker::default();

        assert_eq!(
            tracker.evaluate(&fx.resolver, &fx.snapshot, &added).await.unwrap(),
            Some(ChangeKind::Added)
        );
        assert_eq!(
            tracker.evaluate(&fx.resolver, &fx.snapshot, &deleted).await.unwrap(),
            Some(ChangeKind::Deleted)
        );
        assert_eq!(
            tracker.evaluate(&fx.resolver, &fx.snapshot, &never).await.unwrap(),
            None
        );
        assert_eq!(tracker.count(), 2);
    }

    #[tokio::test]
    async fn test_reverting_clears_entry() {
        let fx = Fixture::new();
        let path = fx.write("Templates/home.html", b"changed");
        let mut tracker = ChangeTracker::default();
        tracker.evaluate(&fx.resolver, &fx.snapshot, &path).await.unwrap();
        assert_eq!(tracker.count(), 1);

        fx.write("Templates/home.html", b"<h1>\nHello\n</h1>");
        tracker.evaluate(&fx.resolver, &fx.snapshot, &path).await.unwrap();
        assert_eq!(tracker.count(), 0);
    }

    #[tokio::test]
    async fn test_other_and_ignored_paths() {
        let fx = Fixture::new();
        let other = fx.write("notes/readme.md", b"x");
        let ignored = fx.write("Files/.DS_Store", b"x");
        let mut tracker = ChangeTracker::default();

        assert_eq!(tracker.evaluate(&fx.resolver, &fx.snapshot, &other).await.unwrap(), None);
        assert_eq!(tracker.evaluate(&fx.resolver, &fx.snapshot, &ignored).await.unwrap(), None);
        assert_eq!(tracker.count(), 0);
    }

    #[tokio::test]
    async fn test_flush_revalidates_deleted_markers() {
        let mut fx = Fixture::new();
        let path = fx.resolver.root().join("Templates/home.html");
        let mut tracker = ChangeTracker::default();

        tracker.record(path.clone());
        assert_eq!(tracker.flush(&fx.resolver, &fx.snapshot).await, 1);
        assert_eq!(tracker.get(&path).unwrap().kind, ChangeKind::Deleted);

        fx.snapshot.remove(ResourceKind::PageTemplate, &FileId::new("home"));
        assert_eq!(tracker.flush(&fx.resolver, &fx.snapshot).await, 0);
    }

    #[tokio::test]
    async fn test_flush_coalesces_events() {
        let fx = Fixture::new();
        let path = fx.write("Templates/new.html", b"x");
        let mut tracker = ChangeTracker::default();

        for _ in 0..5 {
            tracker.record(path.clone());
        }
        assert_eq!(tracker.queued(), 1);
        assert_eq!(tracker.flush(&fx.resolver, &fx.snapshot).await, 1);
        assert_eq!(tracker.queued(), 0);
        assert!(tracker.deadline().is_none());
    }

    #[test]
    fn test_debounce_window_extends() {
        let start = Instant::now();
        let mut debounce = Debounce::default();
        assert!(!debounce.is_due(start));

        debounce.touch(start);
        assert!(!debounce.is_due(start + Duration::from_millis(400)));

        debounce.touch(start + Duration::from_millis(400));
        assert!(!debounce.is_due(start + Duration::from_millis(600)));
        assert!(debounce.is_due(start + Duration::from_millis(900)));
    }

    #[test]
    fn test_ignore_list() {
        let ignore = IgnoreList::new([".tmp", "DS_Store"]);
        assert!(ignore.is_ignored(Path::new("/w/Files/.DS_Store")));
        assert!(ignore.is_ignored(Path::new("/w/Files/a.TMP")));
        assert!(!ignore.is_ignored(Path::new("/w/Files/a.png")));
    }

    #[test]
    fn test_scan_paths_includes_snapshot_and_disk() {
        let fx = Fixture::new();
        let extra = fx.write("Files/extra.png", b"x");
        let paths = scan_paths(&fx.resolver, &fx.snapshot);

        assert!(paths.contains(&extra));
        assert!(paths.contains(&fx.resolver.root().join("Templates/home.html")));
        assert!(paths.contains(&fx.resolver.root().join("Files/logo.png")));
    }

    #[test]
    fn test_scan_paths_prefers_the_name_on_disk() {
        let fx = Fixture::new();
        let renamed = fx.write("Templates/Home.html", b"<h1>Hello</h1>");
        let paths = scan_paths(&fx.resolver, &fx.snapshot);

        assert!(paths.contains(&renamed));
        assert!(!paths.contains(&fx.resolver.root().join("Templates/home.html")));
    }

    #[tokio::test]
    async fn test_document_under_another_case_is_not_deleted() {
        let fx = Fixture::new();
        let renamed = fx.write("Templates/Home.html", b"<h1>Hello</h1>");
        let materialized = fx.resolver.root().join("Templates/home.html");
        let mut tracker = ChangeTracker::default();

        let state = tracker
            .evaluate(&fx.resolver, &fx.snapshot, &materialized)
            .await
            .unwrap();
        assert_eq!(state, None);
        assert!(tracker.get(&materialized).is_none());

        let state = tracker
            .evaluate(&fx.resolver, &fx.snapshot, &renamed)
            .await
            .unwrap();
        assert_eq!(state, None);
        assert_eq!(tracker.count(), 0);

        assert_eq!(
            locate_on_disk(&fx.resolver, ResourceKind::PageTemplate, &FileId::new("home")),
            Some(renamed)
        );
    }
}
