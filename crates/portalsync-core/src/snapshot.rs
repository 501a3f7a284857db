//! In-memory snapshot of the remote site
//!
//! Holds the last known state of every tracked document, keyed by file
//! identity per kind, plus the page tree, language table and publish state.
//! The snapshot does no I/O; callers pair it with a [`PathResolver`] to go
//! from local paths to documents.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::error::{SyncError, SyncResult};
use crate::hierarchy::PageTree;
use crate::kinds::{self, IdentityScope};
use crate::models::{Document, FileId, LanguageTable, ResourceKind};
use crate::paths::{FileLayout, PathResolver};

type Collection = BTreeMap<FileId, Document>;

/// Last known state of one bound site
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentSnapshot {
    pub instance_name: String,
    pub portal_name: String,
    pub portal_id: String,
    templates: Collection,
    snippets: Collection,
    files: Collection,
    pub pages: PageTree,
    pub languages: LanguageTable,
    /// Whether the language table was fetched; it may legitimately be empty
    pub languages_loaded: bool,
    /// Required when creating pages and files
    pub published_state_id: Option<String>,
}

impl ContentSnapshot {
    /// Create an empty snapshot bound to a site
    pub fn new(
        instance_name: impl Into<String>,
        portal_name: impl Into<String>,
        portal_id: impl Into<String>,
    ) -> Self {
        Self {
            instance_name: instance_name.into(),
            portal_name: portal_name.into(),
            portal_id: portal_id.into(),
            ..Self::default()
        }
    }

    fn collection(&self, kind: ResourceKind) -> Option<&Collection> {
        match kind {
            ResourceKind::PageTemplate => Some(&self.templates),
            ResourceKind::TextSnippet => Some(&self.snippets),
            ResourceKind::BinaryFile => Some(&self.files),
            ResourceKind::Other => None,
        }
    }

    fn collection_mut(&mut self, kind: ResourceKind) -> Option<&mut Collection> {
        match kind {
            ResourceKind::PageTemplate => Some(&mut self.templates),
            ResourceKind::TextSnippet => Some(&mut self.snippets),
            ResourceKind::BinaryFile => Some(&mut self.files),
            ResourceKind::Other => None,
        }
    }

    /// Look up a document
    pub fn get(&self, kind: ResourceKind, id: &FileId) -> Option<&Document> {
        self.collection(kind)?.get(id)
    }

    /// Store a document under an identity
    ///
    /// Fails with [`SyncError::IdentityCollision`] when the identity already
    /// belongs to a document with a different remote id. A document that
    /// moved to a new identity (renamed remotely) loses its old entry.
    pub fn put(&mut self, kind: ResourceKind, id: FileId, doc: Document) -> SyncResult<()> {
        let collection = self.collection_mut(kind).ok_or_else(|| {
            SyncError::reconcile(id.as_str(), "resource kind is not tracked")
        })?;

        if let Some(existing) = collection.get(&id) {
            if existing.remote_id != doc.remote_id {
                return Err(SyncError::IdentityCollision {
                    kind,
                    identity: id.to_string(),
                });
            }
        }

        let stale: Vec<FileId> = collection
            .iter()
            .filter(|(key, existing)| **key != id && existing.remote_id == doc.remote_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            debug!("{} {} moved to {}", kind, key, id);
            collection.remove(&key);
        }

        collection.insert(id, doc);
        Ok(())
    }

    /// Drop a document
    pub fn remove(&mut self, kind: ResourceKind, id: &FileId) -> Option<Document> {
        self.collection_mut(kind)?.remove(id)
    }

    /// All documents of a kind in identity order
    pub fn documents(&self, kind: ResourceKind) -> impl Iterator<Item = (&FileId, &Document)> {
        self.collection(kind).into_iter().flat_map(|c| c.iter())
    }

    /// Number of documents of a kind
    pub fn count(&self, kind: ResourceKind) -> usize {
        self.collection(kind).map_or(0, Collection::len)
    }

    /// Check if the snapshot holds no documents at all
    pub fn is_empty(&self) -> bool {
        ResourceKind::TRACKED.iter().all(|kind| self.count(*kind) == 0)
    }

    /// Identity a remote id is stored under
    pub fn find_by_remote_id(&self, kind: ResourceKind, remote_id: &str) -> Option<&FileId> {
        self.documents(kind)
            .find(|(_, doc)| doc.remote_id == remote_id)
            .map(|(id, _)| id)
    }

    /// Identity derivation context for remote records
    pub fn identity_scope(&self, layout: FileLayout) -> IdentityScope<'_> {
        IdentityScope {
            languages: &self.languages,
            pages: &self.pages,
            layout,
        }
    }

    /// Resolve a local path to its stored document
    pub fn lookup(
        &self,
        resolver: &PathResolver,
        path: &Path,
    ) -> Option<(ResourceKind, FileId, &Document)> {
        let (kind, id) = resolver.identify(path)?;
        let doc = self.get(kind, &id)?;
        Some((kind, id, doc))
    }

    /// Check if a local path maps to a stored document
    pub fn exists(&self, resolver: &PathResolver, path: &Path) -> bool {
        self.lookup(resolver, path).is_some()
    }

    /// Stored content for a local path
    ///
    /// With `as_raw` binary files come back in their stored base64 form;
    /// otherwise they are decoded and read as (lossy) UTF-8 for display.
    /// Text kinds are returned as-is either way.
    pub fn decode(
        &self,
        resolver: &PathResolver,
        path: &Path,
        as_raw: bool,
    ) -> SyncResult<Option<String>> {
        let Some((kind, _, doc)) = self.lookup(resolver, path) else {
            return Ok(None);
        };
        let Some(strategy) = kinds::strategy(kind) else {
            return Ok(None);
        };
        if as_raw || strategy.encoding == kinds::Encoding::Text {
            return Ok(Some(doc.content.clone()));
        }
        let bytes = strategy
            .encoding
            .decode(&doc.content)
            .map_err(|e| SyncError::reconcile(path, format!("stored content is not base64: {}", e)))?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Bytes a document is written to disk as
    pub fn bytes_of(&self, kind: ResourceKind, id: &FileId) -> SyncResult<Option<Vec<u8>>> {
        let (Some(strategy), Some(doc)) = (kinds::strategy(kind), self.get(kind, id)) else {
            return Ok(None);
        };
        strategy
            .encoding
            .decode(&doc.content)
            .map(Some)
            .map_err(|e| SyncError::reconcile(id.as_str(), format!("stored content is not base64: {}", e)))
    }
}
