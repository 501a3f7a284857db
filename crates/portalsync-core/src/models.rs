//! Data models for portalsync
//!
//! Defines the records the snapshot stores: documents (templates, snippets,
//! files), pages, and languages, plus the resource-kind tag every local path
//! is classified with.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::paths::fold_identity;

/// The kind of portal resource a local path belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Liquid/HTML page templates
    PageTemplate,
    /// Localized text snippets
    TextSnippet,
    /// Binary files attached to pages
    BinaryFile,
    /// Anything else; never tracked
    Other,
}

impl ResourceKind {
    /// Every kind that maps to a snapshot collection
    pub const TRACKED: [ResourceKind; 3] = [
        ResourceKind::PageTemplate,
        ResourceKind::TextSnippet,
        ResourceKind::BinaryFile,
    ];

    /// Check if paths of this kind are tracked at all
    pub fn is_tracked(self) -> bool {
        !matches!(self, ResourceKind::Other)
    }

    /// Human-readable name
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::PageTemplate => "page template",
            ResourceKind::TextSnippet => "text snippet",
            ResourceKind::BinaryFile => "binary file",
            ResourceKind::Other => "other",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalized logical key of a document within one resource kind
///
/// Always lower-cased and `/`-separated. Construct it through
/// [`FileId::new`] so the folding rule lives in one place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(String);

impl FileId {
    /// Fold a raw logical path into an identity
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(fold_identity(raw.as_ref()))
    }

    /// The identity as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identity segments, skipping empty ones
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind-specific data carried by a [`Document`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentMeta {
    Template,
    Snippet {
        /// Website language id the snippet belongs to
        language_id: Option<String>,
    },
    File {
        /// Id of the note (attachment) holding the bytes
        note_id: String,
        /// File name as stored on the note
        file_name: String,
        mime_type: String,
        /// Page the file hangs under
        parent_page_id: Option<String>,
    },
}

/// One remote document as last seen
///
/// `content` is UTF-8 text for templates and snippets and base64 for binary
/// files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub remote_id: String,
    pub display_name: String,
    pub content: String,
    /// Remote version stamp, when the service reports one
    pub revision: Option<String>,
    pub meta: DocumentMeta,
}

impl Document {
    /// Create a template document
    pub fn template(
        remote_id: impl Into<String>,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            remote_id: remote_id.into(),
            display_name: name.into(),
            content: source.into(),
            revision: None,
            meta: DocumentMeta::Template,
        }
    }

    /// Create a snippet document
    pub fn snippet(
        remote_id: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
        language_id: Option<String>,
    ) -> Self {
        Self {
            remote_id: remote_id.into(),
            display_name: name.into(),
            content: value.into(),
            revision: None,
            meta: DocumentMeta::Snippet { language_id },
        }
    }

    /// Create a binary file document from base64 content
    pub fn file(
        remote_id: impl Into<String>,
        note_id: impl Into<String>,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        base64_body: impl Into<String>,
        parent_page_id: Option<String>,
    ) -> Self {
        let file_name = file_name.into();
        Self {
            remote_id: remote_id.into(),
            display_name: file_name.clone(),
            content: base64_body.into(),
            revision: None,
            meta: DocumentMeta::File {
                note_id: note_id.into(),
                file_name,
                mime_type: mime_type.into(),
                parent_page_id,
            },
        }
    }

    /// Attach a revision stamp
    pub fn with_revision(mut self, revision: Option<String>) -> Self {
        self.revision = revision;
        self
    }

    /// Parent page of a binary file, if any
    pub fn parent_page_id(&self) -> Option<&str> {
        match &self.meta {
            DocumentMeta::File { parent_page_id, .. } => parent_page_id.as_deref(),
            _ => None,
        }
    }
}

/// One node of the remote page tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebPage {
    pub id: String,
    pub parent_id: Option<String>,
    pub partial_url: String,
    pub display_name: String,
}

impl WebPage {
    pub fn new(
        id: impl Into<String>,
        parent_id: Option<String>,
        partial_url: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            parent_id,
            partial_url: partial_url.into(),
            display_name: display_name.into(),
        }
    }
}

/// A language variant enabled on the site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// Culture code, e.g. `en-US`
    pub code: String,
    pub display_name: String,
}

/// Website language id to language
pub type LanguageTable = BTreeMap<String, Language>;

/// How a tracked path differs from the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Modified,
    Added,
    Deleted,
}

impl ChangeKind {
    /// One-letter status marker, as shown by `status`
    pub fn marker(self) -> char {
        match self {
            ChangeKind::Modified => 'M',
            ChangeKind::Added => 'A',
            ChangeKind::Deleted => 'D',
        }
    }
}

/// A local path whose content differs from the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingChange {
    pub path: std::path::PathBuf,
    pub kind: ChangeKind,
    pub last_seen_dirty: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_is_folded() {
        let id = FileId::new("Account\\SignIn/PageCopy");
        assert_eq!(id.as_str(), "account/signin/pagecopy");
        assert_eq!(id, FileId::new("account/signin/PAGECOPY"));
    }

    #[test]
    fn test_file_id_segments() {
        let id = FileId::new("/blog/posts/image.png");
        let segments: Vec<_> = id.segments().collect();
        assert_eq!(segments, vec!["blog", "posts", "image.png"]);
    }

    #[test]
    fn test_resource_kind_tracked() {
        assert!(ResourceKind::TextSnippet.is_tracked());
        assert!(!ResourceKind::Other.is_tracked());
        assert_eq!(ResourceKind::TRACKED.len(), 3);
    }

    #[test]
    fn test_document_parent_page() {
        let file = Document::file("f1", "n1", "a.png", "image/png", "AA==", Some("p1".into()));
        assert_eq!(file.parent_page_id(), Some("p1"));
        assert_eq!(file.display_name, "a.png");

        let template = Document::template("t1", "Home", "<h1/>");
        assert_eq!(template.parent_page_id(), None);
    }

    #[test]
    fn test_change_kind_marker() {
        assert_eq!(ChangeKind::Deleted.marker(), 'D');
        let json = serde_json::to_string(&ChangeKind::Added).unwrap();
        assert_eq!(json, "\"added\"");
    }
}
