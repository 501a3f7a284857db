//! Remote gateway contract
//!
//! The engine talks to the portal CMS only through [`RemoteGateway`]. Records
//! here are transport-neutral; [`crate::remote`] maps them to the Dataverse
//! Web API. Every list call may return an empty result and callers treat
//! that as valid.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::{AuthError, GatewayResult};
use crate::models::{LanguageTable, WebPage};

/// Modification cut-off for incremental listing
pub type Since = Option<DateTime<Utc>>;

// ==================== Records ====================

/// A web template as stored remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateRecord {
    pub id: String,
    pub name: String,
    pub source: String,
    pub revision: Option<String>,
}

/// A content snippet as stored remotely
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnippetRecord {
    pub id: String,
    pub name: String,
    pub value: String,
    /// Website language id; `None` means the default language
    pub language_id: Option<String>,
    pub revision: Option<String>,
}

/// A web file record (the content lives on its note)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub partial_url: String,
    pub parent_page_id: Option<String>,
}

/// A note (attachment) holding a web file's bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteRecord {
    pub id: String,
    /// Id of the web file the note is attached to
    pub object_id: Option<String>,
    pub file_name: String,
    pub mime_type: String,
    /// Base64 document body
    pub body: String,
    pub revision: Option<String>,
}

/// A page template that new pages can be created with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTemplateRecord {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTemplate {
    pub site_id: String,
    pub name: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSnippet {
    pub site_id: String,
    pub name: String,
    pub value: String,
    pub language_id: Option<String>,
}

/// A page to create, hidden from the sitemap
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPage {
    pub site_id: String,
    pub name: String,
    pub partial_url: String,
    pub parent_id: Option<String>,
    pub page_template_id: String,
    pub published_state_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFile {
    pub site_id: String,
    pub name: String,
    pub parent_page_id: String,
    pub published_state_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNote {
    pub file_id: String,
    pub file_name: String,
    pub mime_type: String,
    /// Base64 document body
    pub body: String,
}

// ==================== Traits ====================

/// Supplies bearer tokens for remote calls
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, AuthError>;
}

/// Typed access to the portal's collections
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Portal name to site id
    async fn list_portals(&self) -> GatewayResult<BTreeMap<String, String>>;

    async fn list_languages(&self, site_id: &str) -> GatewayResult<LanguageTable>;

    /// Id of the `Published` publishing state; an empty result is an error
    async fn published_state_id(&self, site_id: &str) -> GatewayResult<String>;

    async fn list_templates(
        &self,
        site_id: &str,
        active_only: bool,
        since: Since,
    ) -> GatewayResult<Vec<TemplateRecord>>;

    async fn create_template(&self, template: &NewTemplate) -> GatewayResult<TemplateRecord>;

    async fn update_template(&self, id: &str, source: &str) -> GatewayResult<TemplateRecord>;

    async fn delete_template(&self, id: &str) -> GatewayResult<()>;

    /// Snippets of a site; language ids missing from `languages` come back as `None`
    async fn list_snippets(
        &self,
        site_id: &str,
        languages: &LanguageTable,
        active_only: bool,
        since: Since,
    ) -> GatewayResult<Vec<SnippetRecord>>;

    async fn create_snippet(&self, snippet: &NewSnippet) -> GatewayResult<SnippetRecord>;

    async fn update_snippet(&self, id: &str, value: &str) -> GatewayResult<SnippetRecord>;

    async fn delete_snippet(&self, id: &str) -> GatewayResult<()>;

    /// Flat list of every page of a site
    async fn list_pages(&self, site_id: &str) -> GatewayResult<Vec<WebPage>>;

    async fn create_page(&self, page: &NewPage) -> GatewayResult<WebPage>;

    async fn list_page_templates(&self, site_id: &str) -> GatewayResult<Vec<PageTemplateRecord>>;

    async fn list_files(
        &self,
        site_id: &str,
        active_only: bool,
        since: Since,
    ) -> GatewayResult<Vec<FileRecord>>;

    /// Document notes attached to web files
    async fn list_file_notes(&self, since: Since) -> GatewayResult<Vec<NoteRecord>>;

    async fn create_file(&self, file: &NewFile) -> GatewayResult<FileRecord>;

    async fn create_note(&self, note: &NewNote) -> GatewayResult<NoteRecord>;

    async fn update_file_content(
        &self,
        note_id: &str,
        body: &str,
        mime_type: &str,
    ) -> GatewayResult<()>;

    /// Delete a web file and its note
    async fn delete_file(&self, file_id: &str, note_id: &str) -> GatewayResult<()>;
}

/// Match web files with the notes attached to them
///
/// Files without a note are skipped. When `notes` is the complete set that is
/// worth a warning; an incremental note list only covers changed files.
pub fn pair_files_with_notes(
    files: Vec<FileRecord>,
    notes: Vec<NoteRecord>,
    complete: bool,
) -> Vec<(FileRecord, NoteRecord)> {
    let mut by_object: HashMap<String, NoteRecord> = notes
        .into_iter()
        .filter_map(|note| note.object_id.clone().map(|id| (id, note)))
        .collect();

    files
        .into_iter()
        .filter_map(|file| match by_object.remove(&file.id) {
            Some(note) => Some((file, note)),
            None if complete => {
                warn!(
                    "Could not get file contents for web file with id {} and name {}",
                    file.id, file.name
                );
                None
            }
            None => {
                debug!("Web file {} unchanged since last download", file.name);
                None
            }
        })
        .collect()
}
