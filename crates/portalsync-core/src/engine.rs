//! Sync engine
//!
//! One [`SyncEngine`] per workspace. It owns the snapshot, the change
//! tracker and the path resolver, and runs the user-visible operations on
//! top of them:
//!
//! - `download` / `refresh`: remote → snapshot (full or incremental)
//! - `commit`: pending changes → remote, item by item
//! - `checkout` / `discard`: remote → snapshot → local files
//!
//! Operations take `&mut self`, so a caller can never run two of them
//! against the same workspace at once.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{SyncError, SyncResult};
use crate::gateway::{
    pair_files_with_notes, FileRecord, NewFile, NewNote, NewSnippet, NewTemplate, NoteRecord,
    RemoteGateway, Since,
};
use crate::hierarchy::PageTree;
use crate::interaction::Interaction;
use crate::kinds;
use crate::materialize::{self, PageDefaults};
use crate::models::{
    ChangeKind, Document, DocumentMeta, FileId, PendingChange, ResourceKind,
};
use crate::paths::{FileLayout, PathResolver, SnippetName};
use crate::sidecar::PortalFile;
use crate::snapshot::ContentSnapshot;
use crate::tracker::{files_by_identity, scan_paths, ChangeTracker};

/// Shared flag that asks a running download to stop
pub type CancelFlag = Arc<AtomicBool>;

// ==================== Summaries ====================

/// Outcome of a download
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DownloadSummary {
    /// Whether the snapshot was replaced rather than merged into
    pub full: bool,
    pub templates: usize,
    pub snippets: usize,
    pub files: usize,
    pub pages: usize,
    /// Stopped early; the previous snapshot was kept
    pub canceled: bool,
}

impl DownloadSummary {
    fn into_canceled(mut self) -> Self {
        self.canceled = true;
        self
    }
}

/// Per-kind commit counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// A pending change that could not be committed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitFailure {
    pub path: PathBuf,
    pub change: ChangeKind,
    pub reason: String,
}

/// Outcome of a commit
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommitSummary {
    pub counts: BTreeMap<ResourceKind, KindCounts>,
    pub failures: Vec<CommitFailure>,
}

impl CommitSummary {
    fn record(&mut self, kind: ResourceKind, change: ChangeKind) {
        let counts = self.counts.entry(kind).or_default();
        match change {
            ChangeKind::Added => counts.added += 1,
            ChangeKind::Modified => counts.updated += 1,
            ChangeKind::Deleted => counts.deleted += 1,
        }
    }

    /// Number of changes that reached the remote
    pub fn committed(&self) -> usize {
        self.counts
            .values()
            .map(|c| c.added + c.updated + c.deleted)
            .sum()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Download phases, in order; cancellation is checked after each
#[derive(Debug, Clone, Copy)]
enum Phase {
    Languages,
    PublishedState,
    Templates,
    Snippets,
    Pages,
    Files,
}

// ==================== Engine ====================

/// Keeps one workspace and its portal in sync
pub struct SyncEngine {
    resolver: PathResolver,
    snapshot: ContentSnapshot,
    tracker: ChangeTracker,
    gateway: Arc<dyn RemoteGateway>,
    interaction: Arc<dyn Interaction>,
    instance_name: String,
    portal: Option<PortalFile>,
    /// Whether `portal` is on disk already
    portal_saved: bool,
    cancel: CancelFlag,
    /// Start time of the last completed download
    last_refresh: Option<DateTime<Utc>>,
}

impl SyncEngine {
    /// Create an engine for a workspace without reading its sidecar
    pub fn new(
        root: impl Into<PathBuf>,
        config: &Config,
        gateway: Arc<dyn RemoteGateway>,
        interaction: Arc<dyn Interaction>,
    ) -> Self {
        Self {
            resolver: PathResolver::new(root, config.layout()),
            snapshot: ContentSnapshot::default(),
            tracker: ChangeTracker::new(config.ignore_list()),
            gateway,
            interaction,
            instance_name: config.instance_name.clone().unwrap_or_default(),
            portal: None,
            portal_saved: false,
            cancel: Arc::new(AtomicBool::new(false)),
            last_refresh: None,
        }
    }

    /// Open a workspace, picking up its `.portal` binding if there is one
    pub fn open(
        root: &Path,
        config: &Config,
        gateway: Arc<dyn RemoteGateway>,
        interaction: Arc<dyn Interaction>,
    ) -> anyhow::Result<Self> {
        let portal = PortalFile::load(root, config.layout())?;
        let engine = Self::new(root, config, gateway, interaction);
        Ok(match portal {
            Some(portal) => engine.with_portal(portal),
            None => engine,
        })
    }

    /// Bind to a portal that is already persisted
    pub fn with_portal(mut self, portal: PortalFile) -> Self {
        self.portal = Some(portal);
        self.portal_saved = true;
        self
    }

    // ==================== Accessors ====================

    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn snapshot(&self) -> &ContentSnapshot {
        &self.snapshot
    }

    pub fn portal(&self) -> Option<&PortalFile> {
        self.portal.as_ref()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_refresh
    }

    /// Pending changes in path order
    pub fn changes(&self) -> impl Iterator<Item = &PendingChange> {
        self.tracker.changes()
    }

    pub fn pending_count(&self) -> usize {
        self.tracker.count()
    }

    /// Handle for canceling a running download from elsewhere
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    // ==================== Change tracking ====================

    /// Feed one filesystem event into the tracker
    pub fn record_event(&mut self, path: impl Into<PathBuf>) {
        self.tracker.record(path);
    }

    /// When recorded events settle
    pub fn deadline(&self) -> Option<Instant> {
        self.tracker.deadline()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.tracker.is_due(now)
    }

    /// Evaluate every recorded event; returns the pending count
    pub async fn process_events(&mut self) -> usize {
        self.tracker.flush(&self.resolver, &self.snapshot).await
    }

    /// Re-evaluate every snapshot document and every file on disk
    pub async fn rescan(&mut self) -> usize {
        let paths = scan_paths(&self.resolver, &self.snapshot);
        debug!("Rescanning {} path(s)", paths.len());
        self.tracker.record_all(paths);
        self.process_events().await
    }

    /// Remote content of a local path, decoded for display
    pub fn original_content(&self, path: &Path) -> SyncResult<Option<String>> {
        self.snapshot.decode(&self.resolver, path, false)
    }

    // ==================== Download ====================

    /// Incremental download of everything changed since the last one
    pub async fn refresh(&mut self) -> SyncResult<Option<DownloadSummary>> {
        self.download(false).await
    }

    /// Download the portal into the snapshot
    ///
    /// A full download replaces the snapshot; an incremental one merges
    /// records modified since the last download into it. The first download
    /// of an engine is always full. Returns `None` when the user declined a
    /// required choice. A canceled download keeps the previous snapshot.
    pub async fn download(&mut self, full: bool) -> SyncResult<Option<DownloadSummary>> {
        if self.ensure_portal().await?.is_none() {
            return Ok(None);
        }
        if self.resolver.layout() == FileLayout::Hierarchical && !self.ensure_page_template().await? {
            return Ok(None);
        }
        let Some(portal) = self.portal.clone() else {
            return Ok(None);
        };

        let same_site = self.snapshot.portal_id == portal.portal_id;
        let full = full || self.last_refresh.is_none() || !same_site;
        let since: Since = if full { None } else { self.last_refresh };
        let started = Utc::now();
        let site = portal.portal_id.as_str();
        let layout = self.resolver.layout();

        info!(
            "{} download of portal {} ({})",
            if full { "Full" } else { "Incremental" },
            portal.portal_name,
            site
        );
        self.interaction
            .progress(&format!("Downloading {}", portal.portal_name));

        let mut working = if full {
            let mut fresh =
                ContentSnapshot::new(&self.instance_name, &portal.portal_name, site);
            if same_site {
                fresh.languages = self.snapshot.languages.clone();
                fresh.languages_loaded = self.snapshot.languages_loaded;
                fresh.published_state_id = self.snapshot.published_state_id.clone();
            }
            fresh
        } else {
            self.snapshot.clone()
        };
        let mut summary = DownloadSummary {
            full,
            ..DownloadSummary::default()
        };

        if !working.languages_loaded {
            self.interaction.progress("Fetching languages");
            working.languages = self.gateway.list_languages(site).await?;
            working.languages_loaded = true;
            if working.languages.is_empty() {
                warn!(
                    "No languages found for portal {}; snippets get no language folder",
                    portal.portal_name
                );
            }
        }
        if self.canceled(Phase::Languages) {
            return Ok(Some(summary.into_canceled()));
        }

        if working.published_state_id.is_none() {
            working.published_state_id = Some(self.gateway.published_state_id(site).await?);
        }
        if self.canceled(Phase::PublishedState) {
            return Ok(Some(summary.into_canceled()));
        }

        self.interaction.progress("Fetching web templates");
        for record in self.gateway.list_templates(site, true, since).await? {
            let doc = Document::template(record.id, record.name, record.source)
                .with_revision(record.revision);
            if absorb(&mut working, layout, ResourceKind::PageTemplate, doc) {
                summary.templates += 1;
            }
        }
        if self.canceled(Phase::Templates) {
            return Ok(Some(summary.into_canceled()));
        }

        self.interaction.progress("Fetching content snippets");
        let snippets = self
            .gateway
            .list_snippets(site, &working.languages, true, since)
            .await?;
        for record in snippets {
            let doc = Document::snippet(record.id, record.name, record.value, record.language_id)
                .with_revision(record.revision);
            if absorb(&mut working, layout, ResourceKind::TextSnippet, doc) {
                summary.snippets += 1;
            }
        }
        if self.canceled(Phase::Snippets) {
            return Ok(Some(summary.into_canceled()));
        }

        self.interaction.progress("Fetching web pages");
        working.pages = PageTree::build(self.gateway.list_pages(site).await?);
        summary.pages = working.pages.len();
        if self.canceled(Phase::Pages) {
            return Ok(Some(summary.into_canceled()));
        }

        self.interaction.progress("Fetching web files");
        match self.fetch_files(site, since).await {
            Ok(pairs) => {
                for (file, note) in pairs {
                    let doc = Document::file(
                        file.id,
                        note.id,
                        note.file_name,
                        note.mime_type,
                        note.body,
                        file.parent_page_id,
                    )
                    .with_revision(note.revision);
                    if absorb(&mut working, layout, ResourceKind::BinaryFile, doc) {
                        summary.files += 1;
                    }
                }
            }
            Err(e) => {
                warn!("Could not download web files: {}", e);
                if full && same_site {
                    for (id, doc) in self.snapshot.documents(ResourceKind::BinaryFile) {
                        // Identities already passed the collision check once
                        let _ = working.put(ResourceKind::BinaryFile, id.clone(), doc.clone());
                    }
                }
            }
        }
        if self.canceled(Phase::Files) {
            return Ok(Some(summary.into_canceled()));
        }

        self.snapshot = working;
        self.last_refresh = Some(started);
        info!(
            "Downloaded {} template(s), {} snippet(s), {} file(s), {} page(s)",
            summary.templates, summary.snippets, summary.files, summary.pages
        );

        if full && !self.portal_saved {
            self.save_portal();
        }

        self.rescan().await;
        Ok(Some(summary))
    }

    /// Web files paired with their notes
    ///
    /// Incremental downloads only pick up files whose note changed.
    async fn fetch_files(
        &self,
        site: &str,
        since: Since,
    ) -> SyncResult<Vec<(FileRecord, NoteRecord)>> {
        let files = self.gateway.list_files(site, true, None).await?;
        let complete = since.is_none();
        let notes = self.gateway.list_file_notes(since).await?;
        Ok(pair_files_with_notes(files, notes, complete))
    }

    /// Check and clear the cancel flag
    fn canceled(&self, after: Phase) -> bool {
        let canceled = self.cancel.swap(false, Ordering::SeqCst);
        if canceled {
            info!("Download canceled after {:?}", after);
        }
        canceled
    }

    /// Make sure the workspace is bound to a portal, asking if needed
    async fn ensure_portal(&mut self) -> SyncResult<Option<&PortalFile>> {
        if self.portal.is_none() {
            let portals = self.gateway.list_portals().await?;
            if portals.is_empty() {
                return Err(SyncError::Configuration(
                    "no portals found in this instance".to_string(),
                ));
            }
            let names: Vec<String> = portals.keys().cloned().collect();
            let chosen = self
                .interaction
                .choose("Select a portal", &names)
                .await
                .and_then(|index| names.get(index))
                .and_then(|name| portals.get(name).map(|id| PortalFile::new(id, name)));
            let Some(portal) = chosen else {
                info!("No portal chosen");
                return Ok(None);
            };
            info!("Bound to portal {} ({})", portal.portal_name, portal.portal_id);
            self.portal = Some(portal);
            self.portal_saved = false;
        }
        Ok(self.portal.as_ref())
    }

    /// Make sure a default page template is chosen; `false` if declined
    async fn ensure_page_template(&mut self) -> SyncResult<bool> {
        let Some(portal) = &self.portal else {
            return Ok(false);
        };
        if portal
            .default_page_template_id
            .as_deref()
            .is_some_and(|id| !id.is_empty())
        {
            return Ok(true);
        }

        let templates = self.gateway.list_page_templates(&portal.portal_id).await?;
        let names: Vec<String> = templates.iter().map(|t| t.name.clone()).collect();
        let chosen = self
            .interaction
            .choose(
                "Select a default page template for new web file folders (recommended: 'Page')",
                &names,
            )
            .await
            .and_then(|index| templates.get(index));
        let Some(template) = chosen else {
            info!("No default page template chosen");
            return Ok(false);
        };

        if let Some(portal) = self.portal.as_mut() {
            portal.default_page_template_id = Some(template.id.clone());
        }
        if self.portal_saved {
            self.save_portal();
        }
        Ok(true)
    }

    fn save_portal(&mut self) {
        let Some(portal) = &self.portal else {
            return;
        };
        match portal.save(self.resolver.root()) {
            Ok(()) => {
                debug!("Wrote portal file for {}", portal.portal_name);
                self.portal_saved = true;
            }
            Err(e) => warn!("Could not write portal file: {:#}", e),
        }
    }

    // ==================== Commit ====================

    /// Push every pending change to the remote
    ///
    /// Items are independent: a failed item is reported in the summary and
    /// stays pending, the rest still go through.
    pub async fn commit(&mut self) -> SyncResult<CommitSummary> {
        if self.last_refresh.is_none() {
            return Err(SyncError::Configuration(
                "nothing has been downloaded for this workspace yet".to_string(),
            ));
        }

        let pending: Vec<PendingChange> = self.tracker.changes().cloned().collect();
        let mut summary = CommitSummary::default();
        self.interaction
            .progress(&format!("Committing {} change(s)", pending.len()));

        for change in &pending {
            match self.commit_one(change).await {
                Ok(kind) => {
                    summary.record(kind, change.kind);
                    self.tracker.resolve(&change.path);
                }
                Err(e) => {
                    error!("Could not commit {}: {}", change.path.display(), e);
                    summary.failures.push(CommitFailure {
                        path: change.path.clone(),
                        change: change.kind,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.tracker
            .record_all(pending.into_iter().map(|change| change.path));
        self.process_events().await;

        info!(
            "Committed {} change(s), {} failed",
            summary.committed(),
            summary.failures.len()
        );
        Ok(summary)
    }

    async fn commit_one(&mut self, change: &PendingChange) -> SyncResult<ResourceKind> {
        let path = change.path.as_path();
        let (kind, id) = self
            .resolver
            .identify(path)
            .ok_or_else(|| SyncError::reconcile(path, "not a tracked resource path"))?;

        match change.kind {
            ChangeKind::Deleted => self.delete_remote(kind, &id).await?,
            ChangeKind::Modified | ChangeKind::Added => {
                if self.snapshot.get(kind, &id).is_some() {
                    self.update_remote(kind, id, path).await?;
                } else {
                    self.create_remote(kind, id, path).await?;
                }
            }
        }
        Ok(kind)
    }

    async fn delete_remote(&mut self, kind: ResourceKind, id: &FileId) -> SyncResult<()> {
        let Some(doc) = self.snapshot.get(kind, id).cloned() else {
            debug!("{} {} is already gone", kind, id);
            return Ok(());
        };

        match &doc.meta {
            DocumentMeta::Template => self.gateway.delete_template(&doc.remote_id).await?,
            DocumentMeta::Snippet { .. } => self.gateway.delete_snippet(&doc.remote_id).await?,
            DocumentMeta::File { note_id, .. } => {
                self.gateway.delete_file(&doc.remote_id, note_id).await?
            }
        }

        self.snapshot.remove(kind, id);
        info!("{} {} was deleted", kind, doc.display_name);
        Ok(())
    }

    async fn update_remote(&mut self, kind: ResourceKind, id: FileId, path: &Path) -> SyncResult<()> {
        let content = read_encoded(kind, path).await?;
        let mut doc = self
            .snapshot
            .get(kind, &id)
            .cloned()
            .ok_or_else(|| SyncError::reconcile(path, "no longer in the snapshot"))?;

        match &doc.meta {
            DocumentMeta::Template => {
                let record = self.gateway.update_template(&doc.remote_id, &content).await?;
                doc.revision = record.revision;
            }
            DocumentMeta::Snippet { .. } => {
                let record = self.gateway.update_snippet(&doc.remote_id, &content).await?;
                doc.revision = record.revision;
            }
            DocumentMeta::File {
                note_id, mime_type, ..
            } => {
                self.gateway
                    .update_file_content(note_id, &content, mime_type)
                    .await?;
            }
        }

        info!("{} {} was updated", kind, doc.display_name);
        doc.content = content;
        self.snapshot.put(kind, id, doc)
    }

    async fn create_remote(&mut self, kind: ResourceKind, id: FileId, path: &Path) -> SyncResult<()> {
        let content = read_encoded(kind, path).await?;
        let site = self.site_id()?;

        let doc = match kind {
            ResourceKind::PageTemplate => {
                let name = self
                    .resolver
                    .template_name(path)
                    .ok_or_else(|| SyncError::reconcile(path, "not a template path"))?;
                let record = self
                    .gateway
                    .create_template(&NewTemplate {
                        site_id: site,
                        name,
                        source: content,
                    })
                    .await?;
                Document::template(record.id, record.name, record.source)
                    .with_revision(record.revision)
            }
            ResourceKind::TextSnippet => {
                let SnippetName { name, language_id } = self
                    .resolver
                    .snippet_name(path, &self.snapshot.languages)
                    .ok_or_else(|| SyncError::reconcile(path, "not a snippet path"))?;
                let record = self
                    .gateway
                    .create_snippet(&NewSnippet {
                        site_id: site,
                        name,
                        value: content,
                        language_id,
                    })
                    .await?;
                Document::snippet(record.id, record.name, record.value, record.language_id)
                    .with_revision(record.revision)
            }
            ResourceKind::BinaryFile => self.create_file(site, path, content).await?,
            ResourceKind::Other => {
                return Err(SyncError::reconcile(path, "not a tracked resource path"))
            }
        };

        info!("{} {} was created", kind, doc.display_name);
        self.snapshot.put(kind, id, doc)
    }

    /// Create a web file and its note under the right page
    async fn create_file(&mut self, site: String, path: &Path, body: String) -> SyncResult<Document> {
        let file_name = self
            .resolver
            .file_name(path)
            .ok_or_else(|| SyncError::reconcile(path, "not a web file path"))?;
        let published = self.snapshot.published_state_id.clone().ok_or_else(|| {
            SyncError::Configuration("the published state of the portal is unknown".to_string())
        })?;

        let parent = match self.resolver.layout() {
            FileLayout::Hierarchical => {
                let folders = self
                    .resolver
                    .file_folders(path)
                    .ok_or_else(|| SyncError::reconcile(path, "not a web file path"))?;
                let template = self
                    .portal
                    .as_ref()
                    .and_then(|p| p.default_page_template_id.clone())
                    .ok_or_else(|| {
                        SyncError::Configuration("no default page template is set".to_string())
                    })?;
                let defaults = PageDefaults {
                    site_id: &site,
                    page_template_id: &template,
                    published_state_id: &published,
                };
                materialize::ensure_page_path(
                    self.gateway.as_ref(),
                    &mut self.snapshot.pages,
                    &folders,
                    &defaults,
                )
                .await?
            }
            FileLayout::Flat => self.choose_parent_page(&site, &file_name).await?,
        };

        let mime_type = kinds::media_type(path).to_string();
        let file = self
            .gateway
            .create_file(&NewFile {
                site_id: site,
                name: file_name.clone(),
                parent_page_id: parent.clone(),
                published_state_id: published,
            })
            .await?;
        let note = self
            .gateway
            .create_note(&NewNote {
                file_id: file.id.clone(),
                file_name: file_name.clone(),
                mime_type: mime_type.clone(),
                body: body.clone(),
            })
            .await?;

        Ok(
            Document::file(file.id, note.id, file_name, mime_type, body, Some(parent))
                .with_revision(note.revision),
        )
    }

    /// Ask which page a new flat-layout file hangs under
    async fn choose_parent_page(&mut self, site: &str, file_name: &str) -> SyncResult<String> {
        if self.snapshot.pages.is_empty() {
            self.snapshot.pages = PageTree::build(self.gateway.list_pages(site).await?);
        }

        let tree = &self.snapshot.pages;
        let mut options: Vec<(String, String)> = tree
            .pages()
            .filter_map(|page| {
                let path = tree.full_path(&page.id)?;
                let label = if path.is_empty() { "/".to_string() } else { path };
                Some((label, page.id.clone()))
            })
            .collect();
        options.sort();
        if options.is_empty() {
            return Err(SyncError::reconcile(
                file_name,
                "the portal has no pages to attach the file to",
            ));
        }

        let labels: Vec<String> = options.iter().map(|(label, _)| label.clone()).collect();
        self.interaction
            .choose(&format!("Select the parent page for {}", file_name), &labels)
            .await
            .and_then(|index| options.get(index))
            .map(|(_, id)| id.clone())
            .ok_or_else(|| SyncError::reconcile(file_name, "no parent page was chosen"))
    }

    fn site_id(&self) -> SyncResult<String> {
        if self.snapshot.portal_id.is_empty() {
            return Err(SyncError::Configuration(
                "the workspace is not bound to a portal".to_string(),
            ));
        }
        Ok(self.snapshot.portal_id.clone())
    }

    // ==================== Checkout / discard ====================

    /// Replace local files with the remote state
    ///
    /// Refuses while there are pending changes.
    pub async fn checkout(&mut self) -> SyncResult<Option<DownloadSummary>> {
        if !self
            .interaction
            .confirm("Check out the portal? Local files will be overwritten.")
            .await
        {
            return Ok(None);
        }

        self.process_events().await;
        let count = self.tracker.count();
        if count > 0 {
            return Err(SyncError::PendingChanges { count });
        }

        self.download_and_reset(Vec::new()).await
    }

    /// Throw away every local change
    ///
    /// Files that were added locally and never existed remotely are deleted.
    pub async fn discard(&mut self) -> SyncResult<Option<DownloadSummary>> {
        if !self
            .interaction
            .confirm("Discard all local changes? This cannot be undone.")
            .await
        {
            return Ok(None);
        }

        self.process_events().await;
        let untracked: Vec<PathBuf> = self
            .tracker
            .changes()
            .filter(|change| change.kind == ChangeKind::Added)
            .map(|change| change.path.clone())
            .collect();

        self.download_and_reset(untracked).await
    }

    async fn download_and_reset(
        &mut self,
        untracked: Vec<PathBuf>,
    ) -> SyncResult<Option<DownloadSummary>> {
        let Some(summary) = self.download(true).await? else {
            return Ok(None);
        };
        if summary.canceled {
            return Ok(Some(summary));
        }

        for path in untracked {
            if self.snapshot.exists(&self.resolver, &path) {
                continue;
            }
            match tokio::fs::remove_file(&path).await {
                Ok(()) => info!("Removed untracked file {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!("Could not remove {}: {}", path.display(), e),
            }
        }

        self.reset_to_clean().await;
        Ok(Some(summary))
    }

    /// Write every snapshot document to its local path and clear pending state
    ///
    /// A document already on disk under a differently cased name is written
    /// there. Files that cannot be written are logged and queued for
    /// evaluation so they show up as changed. Returns the number of files
    /// written.
    pub async fn reset_to_clean(&mut self) -> usize {
        let mut written = 0;
        let mut failed = Vec::new();

        for strategy in kinds::all() {
            let ids: Vec<FileId> = self
                .snapshot
                .documents(strategy.kind)
                .map(|(id, _)| id.clone())
                .collect();
            let mut on_disk = files_by_identity(&self.resolver, strategy.kind);

            for id in ids {
                let Some(path) = on_disk
                    .remove(&id)
                    .or_else(|| self.resolver.local_path(strategy.kind, &id))
                else {
                    continue;
                };
                let bytes = match self.snapshot.bytes_of(strategy.kind, &id) {
                    Ok(Some(bytes)) => bytes,
                    Ok(None) => continue,
                    Err(e) => {
                        warn!("Skipping {}: {}", path.display(), e);
                        continue;
                    }
                };
                match write_file(&path, &bytes).await {
                    Ok(()) => written += 1,
                    Err(e) => {
                        warn!("{}", e);
                        failed.push(path);
                    }
                }
            }
        }

        self.tracker.reset();
        self.tracker.record_all(failed);
        info!("Wrote {} file(s)", written);
        written
    }
}

/// Store a remote record in a snapshot under its derived identity
///
/// Records without an identity, or whose identity is taken by another
/// record, are logged and skipped.
fn absorb(
    snapshot: &mut ContentSnapshot,
    layout: FileLayout,
    kind: ResourceKind,
    doc: Document,
) -> bool {
    let Some(strategy) = kinds::strategy(kind) else {
        return false;
    };
    let Some(id) = (strategy.remote_identity)(&doc, &snapshot.identity_scope(layout)) else {
        warn!(
            "Could not resolve a local path for {} {}",
            kind, doc.display_name
        );
        return false;
    };
    let name = doc.display_name.clone();
    match snapshot.put(kind, id, doc) {
        Ok(()) => true,
        Err(e) => {
            warn!("Skipping {} {}: {}", kind, name, e);
            false
        }
    }
}

/// Read a local file into its stored form
async fn read_encoded(kind: ResourceKind, path: &Path) -> SyncResult<String> {
    let strategy = kinds::strategy(kind)
        .ok_or_else(|| SyncError::reconcile(path, "not a tracked resource path"))?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| SyncError::from_io(e, path))?;
    Ok(strategy.encoding.encode(&bytes))
}

async fn write_file(path: &Path, bytes: &[u8]) -> SyncResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SyncError::from_io(e, parent))?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| SyncError::from_io(e, path))
}
