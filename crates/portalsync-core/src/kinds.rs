//! Per-kind strategy table
//!
//! Everything that differs between page templates, text snippets and binary
//! files lives in one [`KindStrategy`] record per kind: the folder it lives
//! in, how its content is encoded, and how identities are derived from local
//! paths and from remote records. Path resolution, change tracking and the
//! engine all dispatch through [`strategy`] instead of matching on the kind.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use mime_guess::mime;

use crate::hierarchy::PageTree;
use crate::models::{
    Document, DocumentMeta, FileId, LanguageTable, ResourceKind,
};
use crate::paths::{strip_html, FileLayout, HTML_SUFFIX};

/// Folder holding page templates
pub const TEMPLATES_FOLDER: &str = "Templates";
/// Folder holding text snippets
pub const SNIPPETS_FOLDER: &str = "Snippets";
/// Folder holding binary files
pub const FILES_FOLDER: &str = "Files";

/// How a kind's `Document::content` is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// UTF-8 text, written to disk as-is
    Text,
    /// Base64 of the raw bytes
    Base64,
}

impl Encoding {
    /// Bytes to write to disk for stored content
    pub fn decode(self, stored: &str) -> Result<Vec<u8>, base64::DecodeError> {
        match self {
            Encoding::Text => Ok(stored.as_bytes().to_vec()),
            Encoding::Base64 => STANDARD.decode(stored),
        }
    }

    /// Stored form of bytes read from disk
    pub fn encode(self, bytes: &[u8]) -> String {
        match self {
            Encoding::Text => String::from_utf8_lossy(bytes).into_owned(),
            Encoding::Base64 => STANDARD.encode(bytes),
        }
    }
}

/// Snapshot state needed to derive an identity from a remote record
#[derive(Debug, Clone, Copy)]
pub struct IdentityScope<'a> {
    pub languages: &'a LanguageTable,
    pub pages: &'a PageTree,
    pub layout: FileLayout,
}

/// Behaviour of one tracked resource kind
pub struct KindStrategy {
    pub kind: ResourceKind,
    /// Top-level workspace folder
    pub folder: &'static str,
    pub encoding: Encoding,
    /// Path segments below the folder to identity
    pub identify: fn(&[String], FileLayout) -> Option<FileId>,
    /// Identity to path below the folder
    pub relative_path: fn(&FileId) -> PathBuf,
    /// Remote record to identity
    pub remote_identity: fn(&Document, &IdentityScope<'_>) -> Option<FileId>,
}

static STRATEGIES: [KindStrategy; 3] = [
    KindStrategy {
        kind: ResourceKind::PageTemplate,
        folder: TEMPLATES_FOLDER,
        encoding: Encoding::Text,
        identify: identify_text,
        relative_path: text_relative_path,
        remote_identity: template_identity,
    },
    KindStrategy {
        kind: ResourceKind::TextSnippet,
        folder: SNIPPETS_FOLDER,
        encoding: Encoding::Text,
        identify: identify_text,
        relative_path: text_relative_path,
        remote_identity: snippet_identity,
    },
    KindStrategy {
        kind: ResourceKind::BinaryFile,
        folder: FILES_FOLDER,
        encoding: Encoding::Base64,
        identify: identify_file,
        relative_path: file_relative_path,
        remote_identity: file_identity,
    },
];

/// Strategy for a kind; `None` for [`ResourceKind::Other`]
pub fn strategy(kind: ResourceKind) -> Option<&'static KindStrategy> {
    STRATEGIES.iter().find(|s| s.kind == kind)
}

/// Strategy owning a top-level folder (case-insensitive)
pub fn for_folder(folder: &str) -> Option<&'static KindStrategy> {
    STRATEGIES
        .iter()
        .find(|s| s.folder.eq_ignore_ascii_case(folder))
}

/// Every tracked kind's strategy
pub fn all() -> &'static [KindStrategy] {
    &STRATEGIES
}

/// Identity of a snippet name in a language
///
/// The language code is inserted before the leaf:
/// `Account/SignIn/PageCopy` in `en-US` is `account/signin/en-us/pagecopy`.
pub fn snippet_key(name: &str, language_code: &str) -> FileId {
    let mut segments: Vec<&str> = name.split('/').collect();
    let leaf = segments.pop().unwrap_or_default();
    segments.push(language_code);
    segments.push(leaf);
    FileId::new(segments.join("/"))
}

/// Guess the media type of a file name
pub fn media_type(path: &Path) -> mime::Mime {
    mime_guess::from_path(path).first_or_octet_stream()
}

/// Check if a file's content should be compared as text
pub fn is_textual(path: &Path) -> bool {
    let media = media_type(path);
    media.type_() == mime::TEXT
        || matches!(
            media.essence_str(),
            "application/json" | "application/javascript" | "application/xml" | "image/svg+xml"
        )
}

fn identify_text(rest: &[String], _layout: FileLayout) -> Option<FileId> {
    let (leaf, prefix) = rest.split_last()?;
    let stem = strip_html(leaf)?;
    let mut segments: Vec<&str> = prefix.iter().map(String::as_str).collect();
    segments.push(stem);
    Some(FileId::new(segments.join("/")))
}

fn identify_file(rest: &[String], layout: FileLayout) -> Option<FileId> {
    if layout == FileLayout::Flat && rest.len() != 1 {
        return None;
    }
    Some(FileId::new(format!("/{}", rest.join("/"))))
}

fn text_relative_path(id: &FileId) -> PathBuf {
    let mut segments: Vec<String> = id.segments().map(str::to_string).collect();
    if let Some(leaf) = segments.last_mut() {
        leaf.push_str(HTML_SUFFIX);
    }
    segments.iter().collect()
}

fn file_relative_path(id: &FileId) -> PathBuf {
    id.segments().collect()
}

fn template_identity(doc: &Document, _scope: &IdentityScope<'_>) -> Option<FileId> {
    Some(FileId::new(&doc.display_name))
}

/// Snippets without a known language keep an empty language slot, the same
/// identity a language-less local path resolves to
fn snippet_identity(doc: &Document, scope: &IdentityScope<'_>) -> Option<FileId> {
    let DocumentMeta::Snippet { language_id } = &doc.meta else {
        return None;
    };
    let language = language_id.as_ref().and_then(|id| scope.languages.get(id));
    Some(match language {
        Some(language) => snippet_key(&doc.display_name, &language.code),
        None => FileId::new(&doc.display_name),
    })
}

fn file_identity(doc: &Document, scope: &IdentityScope<'_>) -> Option<FileId> {
    let DocumentMeta::File {
        file_name,
        parent_page_id,
        ..
    } = &doc.meta
    else {
        return None;
    };
    match (scope.layout, parent_page_id) {
        (FileLayout::Hierarchical, Some(parent)) => scope
            .pages
            .full_path(parent)
            .map(|path| FileId::new(format!("{}/{}", path, file_name))),
        _ => Some(FileId::new(format!("/{}", file_name))),
    }
}
