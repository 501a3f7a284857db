//! Test doubles
//!
//! [`FakeGateway`] keeps a whole portal in memory, logs every call and can
//! be told to fail specific operations. [`ScriptedInteraction`] answers
//! prompts from a script.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{
    FileRecord, NewFile, NewNote, NewPage, NewSnippet, NewTemplate, NoteRecord,
    PageTemplateRecord, RemoteGateway, Since, SnippetRecord, TemplateRecord,
};
use crate::interaction::Interaction;
use crate::models::{Language, LanguageTable, WebPage};

pub const SITE_ID: &str = "6f1c2a8e-3d4b-4c5a-9e7f-0a1b2c3d4e5f";
pub const SITE_NAME: &str = "Customer Portal";
pub const PUBLISHED: &str = "published";

type Stamped<T> = (T, DateTime<Utc>);

#[derive(Default)]
struct State {
    portals: BTreeMap<String, String>,
    languages: LanguageTable,
    published_state: Option<String>,
    page_templates: Vec<PageTemplateRecord>,
    templates: Vec<Stamped<TemplateRecord>>,
    snippets: Vec<Stamped<SnippetRecord>>,
    pages: Vec<WebPage>,
    created_pages: Vec<NewPage>,
    files: Vec<FileRecord>,
    notes: Vec<Stamped<NoteRecord>>,
    failures: HashSet<String>,
    calls: Vec<String>,
    next_id: u32,
}

impl State {
    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

fn fresh(stamp: &DateTime<Utc>, since: Since) -> bool {
    since.map_or(true, |since| *stamp >= since)
}

/// In-memory portal
pub struct FakeGateway {
    state: Mutex<State>,
}

impl FakeGateway {
    /// One portal with a published state and nothing else
    pub fn new() -> Self {
        let mut state = State {
            published_state: Some(PUBLISHED.to_string()),
            ..State::default()
        };
        state
            .portals
            .insert(SITE_NAME.to_string(), SITE_ID.to_string());
        Self {
            state: Mutex::new(state),
        }
    }

    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    /// Log a call and fail it when a failure was injected
    fn call(&self, op: &str, id: Option<&str>) -> GatewayResult<()> {
        self.with(|s| {
            let entry = match id {
                Some(id) => format!("{}:{}", op, id),
                None => op.to_string(),
            };
            s.calls.push(entry.clone());
            if s.failures.contains(op) || s.failures.contains(&entry) {
                return Err(GatewayError::Http {
                    status: 500,
                    message: format!("injected failure on {}", entry),
                });
            }
            Ok(())
        })
    }

    // ==================== Setup ====================

    pub fn add_portal(&self, name: &str, id: &str) {
        self.with(|s| s.portals.insert(name.to_string(), id.to_string()));
    }

    pub fn add_language(&self, id: &str, code: &str) {
        self.with(|s| {
            s.languages.insert(
                id.to_string(),
                Language {
                    code: code.to_string(),
                    display_name: code.to_string(),
                },
            )
        });
    }

    pub fn add_page_template(&self, id: &str, name: &str) {
        self.with(|s| {
            s.page_templates.push(PageTemplateRecord {
                id: id.to_string(),
                name: name.to_string(),
            })
        });
    }

    pub fn add_template(&self, id: &str, name: &str, source: &str) {
        let record = TemplateRecord {
            id: id.to_string(),
            name: name.to_string(),
            source: source.to_string(),
            revision: None,
        };
        self.with(|s| s.templates.push((record, Utc::now())));
    }

    /// Change a template's source as if someone edited it remotely
    pub fn edit_template(&self, id: &str, source: &str) {
        self.with(|s| {
            if let Some((record, stamp)) = s.templates.iter_mut().find(|(t, _)| t.id == id) {
                record.source = source.to_string();
                *stamp = Utc::now();
            }
        });
    }

    pub fn add_snippet(&self, id: &str, name: &str, value: &str, language_id: Option<&str>) {
        let record = SnippetRecord {
            id: id.to_string(),
            name: name.to_string(),
            value: value.to_string(),
            language_id: language_id.map(str::to_string),
            revision: None,
        };
        self.with(|s| s.snippets.push((record, Utc::now())));
    }

    pub fn add_page(&self, page: WebPage) {
        self.with(|s| s.pages.push(page));
    }

    /// Add a web file together with its note
    pub fn add_file(
        &self,
        file_id: &str,
        note_id: &str,
        name: &str,
        parent_page_id: Option<&str>,
        mime_type: &str,
        body: &str,
    ) {
        self.with(|s| {
            s.files.push(FileRecord {
                id: file_id.to_string(),
                name: name.to_string(),
                partial_url: name.to_string(),
                parent_page_id: parent_page_id.map(str::to_string),
            });
            s.notes.push((
                NoteRecord {
                    id: note_id.to_string(),
                    object_id: Some(file_id.to_string()),
                    file_name: name.to_string(),
                    mime_type: mime_type.to_string(),
                    body: body.to_string(),
                    revision: None,
                },
                Utc::now(),
            ));
        });
    }

    pub fn clear_published_state(&self) {
        self.with(|s| s.published_state = None);
    }

    /// Fail every call of an operation, or `op:id` for a single record
    pub fn fail_on(&self, op: &str) {
        self.with(|s| s.failures.insert(op.to_string()));
    }

    pub fn clear_failures(&self) {
        self.with(|s| s.failures.clear());
    }

    // ==================== Inspection ====================

    pub fn calls(&self) -> Vec<String> {
        self.with(|s| s.calls.clone())
    }

    pub fn clear_calls(&self) {
        self.with(|s| s.calls.clear());
    }

    pub fn created_pages(&self) -> Vec<NewPage> {
        self.with(|s| s.created_pages.clone())
    }

    pub fn template(&self, id: &str) -> Option<TemplateRecord> {
        self.with(|s| {
            s.templates
                .iter()
                .find(|(t, _)| t.id == id)
                .map(|(t, _)| t.clone())
        })
    }

    pub fn template_named(&self, name: &str) -> Option<TemplateRecord> {
        self.with(|s| {
            s.templates
                .iter()
                .find(|(t, _)| t.name == name)
                .map(|(t, _)| t.clone())
        })
    }

    pub fn snippet_named(&self, name: &str) -> Option<SnippetRecord> {
        self.with(|s| {
            s.snippets
                .iter()
                .find(|(t, _)| t.name == name)
                .map(|(t, _)| t.clone())
        })
    }

    pub fn file_named(&self, name: &str) -> Option<FileRecord> {
        self.with(|s| s.files.iter().find(|f| f.name == name).cloned())
    }

    pub fn note_for(&self, file_id: &str) -> Option<NoteRecord> {
        self.with(|s| {
            s.notes
                .iter()
                .find(|(n, _)| n.object_id.as_deref() == Some(file_id))
                .map(|(n, _)| n.clone())
        })
    }

    pub fn has_note(&self, note_id: &str) -> bool {
        self.with(|s| s.notes.iter().any(|(n, _)| n.id == note_id))
    }

    pub fn has_file(&self, file_id: &str) -> bool {
        self.with(|s| s.files.iter().any(|f| f.id == file_id))
    }
}

#[async_trait]
impl RemoteGateway for FakeGateway {
    async fn list_portals(&self) -> GatewayResult<BTreeMap<String, String>> {
        self.call("list_portals", None)?;
        Ok(self.with(|s| s.portals.clone()))
    }

    async fn list_languages(&self, _site_id: &str) -> GatewayResult<LanguageTable> {
        self.call("list_languages", None)?;
        Ok(self.with(|s| s.languages.clone()))
    }

    async fn published_state_id(&self, _site_id: &str) -> GatewayResult<String> {
        self.call("published_state_id", None)?;
        self.with(|s| s.published_state.clone())
            .ok_or_else(|| GatewayError::Empty("no published state".to_string()))
    }

    async fn list_templates(
        &self,
        _site_id: &str,
        _active_only: bool,
        since: Since,
    ) -> GatewayResult<Vec<TemplateRecord>> {
        self.call("list_templates", None)?;
        Ok(self.with(|s| {
            s.templates
                .iter()
                .filter(|(_, stamp)| fresh(stamp, since))
                .map(|(t, _)| t.clone())
                .collect()
        }))
    }

    async fn create_template(&self, template: &NewTemplate) -> GatewayResult<TemplateRecord> {
        self.call("create_template", Some(&template.name))?;
        Ok(self.with(|s| {
            let record = TemplateRecord {
                id: s.id("template"),
                name: template.name.clone(),
                source: template.source.clone(),
                revision: None,
            };
            s.templates.push((record.clone(), Utc::now()));
            record
        }))
    }

    async fn update_template(&self, id: &str, source: &str) -> GatewayResult<TemplateRecord> {
        self.call("update_template", Some(id))?;
        self.with(|s| {
            let (record, stamp) = s
                .templates
                .iter_mut()
                .find(|(t, _)| t.id == id)
                .ok_or_else(|| GatewayError::Http {
                    status: 404,
                    message: format!("template {} not found", id),
                })?;
            record.source = source.to_string();
            *stamp = Utc::now();
            Ok(record.clone())
        })
    }

    async fn delete_template(&self, id: &str) -> GatewayResult<()> {
        self.call("delete_template", Some(id))?;
        self.with(|s| s.templates.retain(|(t, _)| t.id != id));
        Ok(())
    }

    async fn list_snippets(
        &self,
        _site_id: &str,
        languages: &LanguageTable,
        _active_only: bool,
        since: Since,
    ) -> GatewayResult<Vec<SnippetRecord>> {
        self.call("list_snippets", None)?;
        Ok(self.with(|s| {
            s.snippets
                .iter()
                .filter(|(_, stamp)| fresh(stamp, since))
                .map(|(snippet, _)| {
                    let mut snippet = snippet.clone();
                    snippet.language_id = snippet
                        .language_id
                        .filter(|id| languages.contains_key(id));
                    snippet
                })
                .collect()
        }))
    }

    async fn create_snippet(&self, snippet: &NewSnippet) -> GatewayResult<SnippetRecord> {
        self.call("create_snippet", Some(&snippet.name))?;
        Ok(self.with(|s| {
            let record = SnippetRecord {
                id: s.id("snippet"),
                name: snippet.name.clone(),
                value: snippet.value.clone(),
                language_id: snippet.language_id.clone(),
                revision: None,
            };
            s.snippets.push((record.clone(), Utc::now()));
            record
        }))
    }

    async fn update_snippet(&self, id: &str, value: &str) -> GatewayResult<SnippetRecord> {
        self.call("update_snippet", Some(id))?;
        self.with(|s| {
            let (record, stamp) = s
                .snippets
                .iter_mut()
                .find(|(t, _)| t.id == id)
                .ok_or_else(|| GatewayError::Http {
                    status: 404,
                    message: format!("snippet {} not found", id),
                })?;
            record.value = value.to_string();
            *stamp = Utc::now();
            Ok(record.clone())
        })
    }

    async fn delete_snippet(&self, id: &str) -> GatewayResult<()> {
        self.call("delete_snippet", Some(id))?;
        self.with(|s| s.snippets.retain(|(t, _)| t.id != id));
        Ok(())
    }

    async fn list_pages(&self, _site_id: &str) -> GatewayResult<Vec<WebPage>> {
        self.call("list_pages", None)?;
        Ok(self.with(|s| s.pages.clone()))
    }

    async fn create_page(&self, page: &NewPage) -> GatewayResult<WebPage> {
        self.call("create_page", Some(&page.name))?;
        Ok(self.with(|s| {
            let created = WebPage::new(
                s.id("page"),
                page.parent_id.clone(),
                page.partial_url.clone(),
                page.name.clone(),
            );
            s.pages.push(created.clone());
            s.created_pages.push(page.clone());
            created
        }))
    }

    async fn list_page_templates(&self, _site_id: &str) -> GatewayResult<Vec<PageTemplateRecord>> {
        self.call("list_page_templates", None)?;
        Ok(self.with(|s| s.page_templates.clone()))
    }

    async fn list_files(
        &self,
        _site_id: &str,
        _active_only: bool,
        _since: Since,
    ) -> GatewayResult<Vec<FileRecord>> {
        self.call("list_files", None)?;
        Ok(self.with(|s| s.files.clone()))
    }

    async fn list_file_notes(&self, since: Since) -> GatewayResult<Vec<NoteRecord>> {
        self.call("list_file_notes", None)?;
        Ok(self.with(|s| {
            s.notes
                .iter()
                .filter(|(_, stamp)| fresh(stamp, since))
                .map(|(n, _)| n.clone())
                .collect()
        }))
    }

    async fn create_file(&self, file: &NewFile) -> GatewayResult<FileRecord> {
        self.call("create_file", Some(&file.name))?;
        Ok(self.with(|s| {
            let record = FileRecord {
                id: s.id("file"),
                name: file.name.clone(),
                partial_url: file.name.clone(),
                parent_page_id: Some(file.parent_page_id.clone()),
            };
            s.files.push(record.clone());
            record
        }))
    }

    async fn create_note(&self, note: &NewNote) -> GatewayResult<NoteRecord> {
        self.call("create_note", Some(&note.file_name))?;
        Ok(self.with(|s| {
            let record = NoteRecord {
                id: s.id("note"),
                object_id: Some(note.file_id.clone()),
                file_name: note.file_name.clone(),
                mime_type: note.mime_type.clone(),
                body: note.body.clone(),
                revision: None,
            };
            s.notes.push((record.clone(), Utc::now()));
            record
        }))
    }

    async fn update_file_content(
        &self,
        note_id: &str,
        body: &str,
        mime_type: &str,
    ) -> GatewayResult<()> {
        self.call("update_file_content", Some(note_id))?;
        self.with(|s| {
            let (note, stamp) = s
                .notes
                .iter_mut()
                .find(|(n, _)| n.id == note_id)
                .ok_or_else(|| GatewayError::Http {
                    status: 404,
                    message: format!("note {} not found", note_id),
                })?;
            note.body = body.to_string();
            note.mime_type = mime_type.to_string();
            *stamp = Utc::now();
            Ok(())
        })
    }

    async fn delete_file(&self, file_id: &str, note_id: &str) -> GatewayResult<()> {
        self.call("delete_file", Some(file_id))?;
        self.with(|s| {
            s.notes.retain(|(n, _)| n.id != note_id);
            s.files.retain(|f| f.id != file_id);
        });
        Ok(())
    }
}

/// Answers prompts from a script
///
/// `choose` picks the option whose label equals the next scripted answer;
/// with no answer left, or no matching option, nothing is picked.
pub struct ScriptedInteraction {
    confirm: bool,
    answers: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedInteraction {
    pub fn new(confirm: bool) -> Self {
        Self {
            confirm,
            answers: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue the label to pick at the next `choose`
    pub fn answer(self, label: &str) -> Self {
        self.answers.lock().unwrap().push_back(label.to_string());
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Interaction for ScriptedInteraction {
    async fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.confirm
    }

    async fn choose(&self, prompt: &str, options: &[String]) -> Option<usize> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let answer = self.answers.lock().unwrap().pop_front()?;
        options.iter().position(|o| *o == answer)
    }

    fn progress(&self, _message: &str) {}
}
