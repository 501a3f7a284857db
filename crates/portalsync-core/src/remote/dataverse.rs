//! Dataverse Web API gateway
//!
//! Implements [`RemoteGateway`] over the OData v4 endpoint of a Dataverse
//! environment (`https://<instance>.<region>.dynamics.com/api/data/v9.1/`).
//! List calls follow `@odata.nextLink` until the result set is exhausted.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::{GatewayError, GatewayResult};
use crate::gateway::{
    FileRecord, NewFile, NewNote, NewPage, NewSnippet, NewTemplate, NoteRecord,
    PageTemplateRecord, RemoteGateway, Since, SnippetRecord, TemplateRecord, TokenProvider,
};
use crate::models::{Language, LanguageTable, WebPage};

const API_PATH: &str = "api/data/v9.1";

const WEBTEMPLATE_SELECT: &[&str] = &["adx_name", "adx_source", "adx_webtemplateid", "versionnumber"];
const CONTENTSNIPPET_SELECT: &[&str] = &[
    "adx_name",
    "adx_value",
    "adx_contentsnippetid",
    "versionnumber",
    "_adx_contentsnippetlanguageid_value",
];
const WEBPAGE_SELECT: &[&str] = &["adx_webpageid", "adx_name", "adx_partialurl", "_adx_parentpageid_value"];
const PAGETEMPLATE_SELECT: &[&str] = &["adx_pagetemplateid", "adx_name"];
const WEBFILE_SELECT: &[&str] = &["adx_webfileid", "adx_name", "adx_partialurl", "_adx_parentpageid_value"];
const NOTE_SELECT: &[&str] = &[
    "annotationid",
    "filename",
    "isdocument",
    "documentbody",
    "versionnumber",
    "_objectid_value",
    "mimetype",
];

// ==================== Wire types ====================

#[derive(Debug, Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Website {
    adx_websiteid: String,
    adx_name: String,
}

#[derive(Debug, Deserialize)]
struct WebsiteLanguage {
    adx_websitelanguageid: String,
    adx_name: Option<String>,
    #[serde(rename = "_adx_portallanguageid_value")]
    portal_language_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PortalLanguage {
    adx_portallanguageid: String,
    adx_languagecode: String,
    adx_displayname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PublishingState {
    adx_publishingstateid: String,
}

#[derive(Debug, Deserialize)]
struct WebTemplate {
    adx_webtemplateid: Option<String>,
    adx_name: String,
    adx_source: Option<String>,
    versionnumber: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ContentSnippet {
    adx_contentsnippetid: Option<String>,
    adx_name: String,
    adx_value: Option<String>,
    #[serde(rename = "_adx_contentsnippetlanguageid_value")]
    language_id: Option<String>,
    versionnumber: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Webpage {
    adx_webpageid: Option<String>,
    adx_name: Option<String>,
    adx_partialurl: Option<String>,
    #[serde(rename = "_adx_parentpageid_value")]
    parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageTemplate {
    adx_pagetemplateid: String,
    adx_name: String,
}

#[derive(Debug, Deserialize)]
struct WebFile {
    adx_webfileid: Option<String>,
    adx_name: String,
    adx_partialurl: Option<String>,
    #[serde(rename = "_adx_parentpageid_value")]
    parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Note {
    annotationid: Option<String>,
    #[serde(rename = "_objectid_value")]
    object_id: Option<String>,
    filename: Option<String>,
    documentbody: Option<String>,
    mimetype: Option<String>,
    versionnumber: Option<i64>,
}

fn required(
    value: Option<String>,
    collection: &'static str,
    field: &'static str,
) -> GatewayResult<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or(GatewayError::MissingField { collection, field })
}

impl TryFrom<WebTemplate> for TemplateRecord {
    type Error = GatewayError;

    fn try_from(t: WebTemplate) -> GatewayResult<Self> {
        Ok(Self {
            id: required(t.adx_webtemplateid, "adx_webtemplates", "adx_webtemplateid")?,
            name: t.adx_name,
            source: t.adx_source.unwrap_or_default(),
            revision: t.versionnumber.map(|v| v.to_string()),
        })
    }
}

impl TryFrom<ContentSnippet> for SnippetRecord {
    type Error = GatewayError;

    fn try_from(c: ContentSnippet) -> GatewayResult<Self> {
        Ok(Self {
            id: required(c.adx_contentsnippetid, "adx_contentsnippets", "adx_contentsnippetid")?,
            name: c.adx_name,
            value: c.adx_value.unwrap_or_default(),
            language_id: c.language_id,
            revision: c.versionnumber.map(|v| v.to_string()),
        })
    }
}

impl TryFrom<Webpage> for WebPage {
    type Error = GatewayError;

    fn try_from(p: Webpage) -> GatewayResult<Self> {
        let id = required(p.adx_webpageid, "adx_webpages", "adx_webpageid")?;
        let partial_url = p.adx_partialurl.unwrap_or_default();
        let name = p.adx_name.unwrap_or_else(|| partial_url.clone());
        Ok(WebPage::new(id, p.parent_id, partial_url, name))
    }
}

impl TryFrom<WebFile> for FileRecord {
    type Error = GatewayError;

    fn try_from(f: WebFile) -> GatewayResult<Self> {
        Ok(Self {
            id: required(f.adx_webfileid, "adx_webfiles", "adx_webfileid")?,
            partial_url: f.adx_partialurl.unwrap_or_else(|| f.adx_name.clone()),
            name: f.adx_name,
            parent_page_id: f.parent_id,
        })
    }
}

impl TryFrom<Note> for NoteRecord {
    type Error = GatewayError;

    fn try_from(n: Note) -> GatewayResult<Self> {
        Ok(Self {
            id: required(n.annotationid, "annotations", "annotationid")?,
            object_id: n.object_id,
            file_name: required(n.filename, "annotations", "filename")?,
            mime_type: n
                .mimetype
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            body: n.documentbody.unwrap_or_default(),
            revision: n.versionnumber.map(|v| v.to_string()),
        })
    }
}

// ==================== Queries ====================

/// `$select` / `$filter` pair for a list request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ODataQuery {
    select: &'static [&'static str],
    filter: String,
}

impl ODataQuery {
    pub fn new(select: &'static [&'static str], filter: impl Into<String>) -> Self {
        Self {
            select,
            filter: filter.into(),
        }
    }

    /// Query scoped to one website
    pub fn for_site(select: &'static [&'static str], site_id: &str) -> Self {
        Self::new(select, format!("_adx_websiteid_value eq {}", site_id))
    }

    /// Append the active-state and modified-since conditions
    pub fn with_standard_filters(mut self, active_only: bool, since: Since) -> Self {
        if active_only {
            self.filter.push_str(" and statecode eq 0");
        }
        if let Some(since) = since {
            self.filter.push_str(&format!(
                " and modifiedon ge '{}'",
                since.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
            ));
        }
        self
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if !self.select.is_empty() {
            params.push(("$select", self.select.join(",")));
        }
        if !self.filter.is_empty() {
            params.push(("$filter", self.filter.clone()));
        }
        params
    }
}

/// Quote a string literal for an OData filter
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

// ==================== Gateway ====================

/// [`RemoteGateway`] backed by the Dataverse Web API
pub struct DataverseGateway {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl DataverseGateway {
    /// Create a gateway for `https://<instance_url>`
    pub fn new(
        instance_url: &str,
        tokens: Arc<dyn TokenProvider>,
        timeout: Duration,
    ) -> GatewayResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert("odata-maxversion", HeaderValue::from_static("4.0"));
        headers.insert("odata-version", HeaderValue::from_static("4.0"));

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: format!(
                "https://{}/{}",
                instance_url.trim_end_matches('/'),
                API_PATH
            ),
            tokens,
        })
    }

    fn url(&self, collection: &str) -> String {
        format!("{}/{}", self.base_url, collection)
    }

    fn entity_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}({})", self.base_url, collection, id)
    }

    fn bind(collection: &str, id: &str) -> String {
        format!("/{}({})", collection, id)
    }

    async fn send(&self, request: RequestBuilder) -> GatewayResult<Response> {
        let token = self.tokens.token().await?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or(body);
        Err(GatewayError::Http {
            status: status.as_u16(),
            message,
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    /// Every record of a query, following next links
    async fn list<T: DeserializeOwned>(
        &self,
        collection: &str,
        query: &ODataQuery,
    ) -> GatewayResult<Vec<T>> {
        debug!("GET {} ({})", collection, query.filter());
        let mut request = self.http.get(self.url(collection)).query(&query.params());
        let mut records = Vec::new();

        loop {
            let page: Collection<T> = Self::decode(self.send(request).await?).await?;
            records.extend(page.value);
            match page.next_link {
                Some(next) => request = self.http.get(next),
                None => break,
            }
        }

        debug!("{} record(s) from {}", records.len(), collection);
        Ok(records)
    }

    async fn create<T: DeserializeOwned>(&self, collection: &str, body: &Value) -> GatewayResult<T> {
        debug!("POST {}", collection);
        let request = self
            .http
            .post(self.url(collection))
            .header("Prefer", "return=representation")
            .json(body);
        Self::decode(self.send(request).await?).await
    }

    async fn update<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
        body: &Value,
        select: &'static [&'static str],
    ) -> GatewayResult<T> {
        debug!("PATCH {}({})", collection, id);
        let request = self
            .http
            .patch(self.entity_url(collection, id))
            .query(&[("$select", select.join(","))])
            .header("Prefer", "return=representation")
            .json(body);
        Self::decode(self.send(request).await?).await
    }

    async fn patch(&self, collection: &str, id: &str, body: &Value) -> GatewayResult<()> {
        debug!("PATCH {}({})", collection, id);
        let request = self.http.patch(self.entity_url(collection, id)).json(body);
        self.send(request).await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> GatewayResult<()> {
        debug!("DELETE {}({})", collection, id);
        self.send(self.http.delete(self.entity_url(collection, id)))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteGateway for DataverseGateway {
    async fn list_portals(&self) -> GatewayResult<BTreeMap<String, String>> {
        let query = ODataQuery::new(&["adx_websiteid", "adx_name"], "");
        let sites: Vec<Website> = self.list("adx_websites", &query).await?;
        Ok(sites
            .into_iter()
            .map(|s| (s.adx_name, s.adx_websiteid))
            .collect())
    }

    async fn list_languages(&self, site_id: &str) -> GatewayResult<LanguageTable> {
        let site_query = ODataQuery::for_site(
            &["adx_websitelanguageid", "adx_name", "_adx_portallanguageid_value"],
            site_id,
        );
        let site_languages: Vec<WebsiteLanguage> =
            self.list("adx_websitelanguages", &site_query).await?;

        let portal_query = ODataQuery::new(
            &["adx_languagecode", "adx_displayname", "adx_portallanguageid"],
            "",
        );
        let portal_languages: Vec<PortalLanguage> =
            self.list("adx_portallanguages", &portal_query).await?;

        let mut table = LanguageTable::new();
        for site_language in site_languages {
            let matched = portal_languages.iter().find(|p| {
                Some(&p.adx_portallanguageid) == site_language.portal_language_id.as_ref()
            });
            match matched {
                Some(portal) => {
                    table.insert(
                        site_language.adx_websitelanguageid,
                        Language {
                            code: portal.adx_languagecode.clone(),
                            display_name: portal
                                .adx_displayname
                                .clone()
                                .unwrap_or_else(|| portal.adx_languagecode.clone()),
                        },
                    );
                }
                None => warn!(
                    "Could not match website language {} to a portal language",
                    site_language.adx_name.as_deref().unwrap_or("<unnamed>")
                ),
            }
        }
        Ok(table)
    }

    async fn published_state_id(&self, site_id: &str) -> GatewayResult<String> {
        let query = ODataQuery::new(
            &["adx_publishingstateid"],
            format!(
                "_adx_websiteid_value eq {} and adx_name eq {}",
                site_id,
                quote("Published")
            ),
        );
        let states: Vec<PublishingState> = self.list("adx_publishingstates", &query).await?;
        states
            .into_iter()
            .next()
            .map(|s| s.adx_publishingstateid)
            .ok_or_else(|| {
                GatewayError::Empty(format!(
                    "Found no publishing state for portal with id {}. Filter expression: {}",
                    site_id,
                    query.filter()
                ))
            })
    }

    async fn list_templates(
        &self,
        site_id: &str,
        active_only: bool,
        since: Since,
    ) -> GatewayResult<Vec<TemplateRecord>> {
        let query = ODataQuery::for_site(WEBTEMPLATE_SELECT, site_id)
            .with_standard_filters(active_only, since);
        let templates: Vec<WebTemplate> = self.list("adx_webtemplates", &query).await?;
        templates.into_iter().map(TemplateRecord::try_from).collect()
    }

    async fn create_template(&self, template: &NewTemplate) -> GatewayResult<TemplateRecord> {
        let body = json!({
            "adx_name": template.name,
            "adx_source": template.source,
            "adx_websiteid@odata.bind": Self::bind("adx_websites", &template.site_id),
        });
        let created: WebTemplate = self.create("adx_webtemplates", &body).await?;
        created.try_into()
    }

    async fn update_template(&self, id: &str, source: &str) -> GatewayResult<TemplateRecord> {
        let body = json!({ "adx_source": source });
        let updated: WebTemplate = self
            .update("adx_webtemplates", id, &body, WEBTEMPLATE_SELECT)
            .await?;
        updated.try_into()
    }

    async fn delete_template(&self, id: &str) -> GatewayResult<()> {
        self.delete("adx_webtemplates", id).await
    }

    async fn list_snippets(
        &self,
        site_id: &str,
        languages: &LanguageTable,
        active_only: bool,
        since: Since,
    ) -> GatewayResult<Vec<SnippetRecord>> {
        let query = ODataQuery::for_site(CONTENTSNIPPET_SELECT, site_id)
            .with_standard_filters(active_only, since);
        let snippets: Vec<ContentSnippet> = self.list("adx_contentsnippets", &query).await?;

        snippets
            .into_iter()
            .map(|c| {
                let mut record = SnippetRecord::try_from(c)?;
                if record
                    .language_id
                    .as_ref()
                    .is_some_and(|id| !languages.contains_key(id))
                {
                    record.language_id = None;
                }
                Ok(record)
            })
            .collect()
    }

    async fn create_snippet(&self, snippet: &NewSnippet) -> GatewayResult<SnippetRecord> {
        let mut body = json!({
            "adx_name": snippet.name,
            "adx_value": snippet.value,
            "adx_websiteid@odata.bind": Self::bind("adx_websites", &snippet.site_id),
        });
        if let Some(language_id) = &snippet.language_id {
            body["adx_contentsnippetlanguageid@odata.bind"] =
                Value::String(Self::bind("adx_websitelanguages", language_id));
        }
        let created: ContentSnippet = self.create("adx_contentsnippets", &body).await?;
        created.try_into()
    }

    async fn update_snippet(&self, id: &str, value: &str) -> GatewayResult<SnippetRecord> {
        let body = json!({ "adx_value": value });
        let updated: ContentSnippet = self
            .update("adx_contentsnippets", id, &body, CONTENTSNIPPET_SELECT)
            .await?;
        updated.try_into()
    }

    async fn delete_snippet(&self, id: &str) -> GatewayResult<()> {
        self.delete("adx_contentsnippets", id).await
    }

    async fn list_pages(&self, site_id: &str) -> GatewayResult<Vec<WebPage>> {
        let query = ODataQuery::for_site(WEBPAGE_SELECT, site_id);
        let pages: Vec<Webpage> = self.list("adx_webpages", &query).await?;
        pages.into_iter().map(WebPage::try_from).collect()
    }

    async fn create_page(&self, page: &NewPage) -> GatewayResult<WebPage> {
        let mut body = json!({
            "adx_name": page.name,
            "adx_partialurl": page.partial_url,
            "adx_hiddenfromsitemap": true,
            "adx_publishingstateid@odata.bind": Self::bind("adx_publishingstates", &page.published_state_id),
            "adx_pagetemplateid@odata.bind": Self::bind("adx_pagetemplates", &page.page_template_id),
            "adx_websiteid@odata.bind": Self::bind("adx_websites", &page.site_id),
        });
        if let Some(parent_id) = &page.parent_id {
            body["adx_parentpageid@odata.bind"] =
                Value::String(Self::bind("adx_webpages", parent_id));
        }
        let created: Webpage = self.create("adx_webpages", &body).await?;
        created.try_into()
    }

    async fn list_page_templates(&self, site_id: &str) -> GatewayResult<Vec<PageTemplateRecord>> {
        let query =
            ODataQuery::for_site(PAGETEMPLATE_SELECT, site_id).with_standard_filters(true, None);
        let templates: Vec<PageTemplate> = self.list("adx_pagetemplates", &query).await?;
        Ok(templates
            .into_iter()
            .map(|t| PageTemplateRecord {
                id: t.adx_pagetemplateid,
                name: t.adx_name,
            })
            .collect())
    }

    async fn list_files(
        &self,
        site_id: &str,
        active_only: bool,
        since: Since,
    ) -> GatewayResult<Vec<FileRecord>> {
        let query = ODataQuery::for_site(WEBFILE_SELECT, site_id)
            .with_standard_filters(active_only, since);
        let files: Vec<WebFile> = self.list("adx_webfiles", &query).await?;
        files.into_iter().map(FileRecord::try_from).collect()
    }

    async fn list_file_notes(&self, since: Since) -> GatewayResult<Vec<NoteRecord>> {
        let query = ODataQuery::new(
            NOTE_SELECT,
            format!(
                "objecttypecode eq {} and isdocument eq true",
                quote("adx_webfile")
            ),
        )
        .with_standard_filters(false, since);
        let notes: Vec<Note> = self.list("annotations", &query).await?;
        notes.into_iter().map(NoteRecord::try_from).collect()
    }

    async fn create_file(&self, file: &NewFile) -> GatewayResult<FileRecord> {
        let body = json!({
            "adx_name": file.name,
            "adx_partialurl": file.name,
            "adx_websiteid@odata.bind": Self::bind("adx_websites", &file.site_id),
            "adx_parentpageid@odata.bind": Self::bind("adx_webpages", &file.parent_page_id),
            "adx_publishingstateid@odata.bind": Self::bind("adx_publishingstates", &file.published_state_id),
        });
        let created: WebFile = self.create("adx_webfiles", &body).await?;
        created.try_into()
    }

    async fn create_note(&self, note: &NewNote) -> GatewayResult<NoteRecord> {
        let body = json!({
            "filename": note.file_name,
            "isdocument": true,
            "documentbody": note.body,
            "mimetype": note.mime_type,
            "objectid_adx_webfile@odata.bind": Self::bind("adx_webfiles", &note.file_id),
        });
        let created: Note = self.create("annotations", &body).await?;
        let mut record = NoteRecord::try_from(created)?;
        record.object_id.get_or_insert_with(|| note.file_id.clone());
        Ok(record)
    }

    async fn update_file_content(
        &self,
        note_id: &str,
        body: &str,
        mime_type: &str,
    ) -> GatewayResult<()> {
        let patch = json!({ "documentbody": body, "mimetype": mime_type });
        self.patch("annotations", note_id, &patch).await
    }

    async fn delete_file(&self, file_id: &str, note_id: &str) -> GatewayResult<()> {
        self.delete("annotations", note_id).await?;
        self.delete("adx_webfiles", file_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::StaticToken;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_standard_filters() {
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let query = ODataQuery::for_site(WEBTEMPLATE_SELECT, "abc")
            .with_standard_filters(true, Some(since));
        assert_eq!(
            query.filter(),
            "_adx_websiteid_value eq abc and statecode eq 0 and modifiedon ge '2024-03-01T12:00:00Z'"
        );

        let plain = ODataQuery::for_site(WEBTEMPLATE_SELECT, "abc").with_standard_filters(false, None);
        assert_eq!(plain.filter(), "_adx_websiteid_value eq abc");
    }

    #[test]
    fn test_query_params() {
        let query = ODataQuery::new(&["a", "b"], "");
        assert_eq!(query.params(), vec![("$select", "a,b".to_string())]);
    }

    #[test]
    fn test_quote_escapes() {
        assert_eq!(quote("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_urls() {
        let gateway = DataverseGateway::new(
            "contoso.crm4.dynamics.com",
            Arc::new(StaticToken::new("t")),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            gateway.url("adx_webpages"),
            "https://contoso.crm4.dynamics.com/api/data/v9.1/adx_webpages"
        );
        assert_eq!(
            gateway.entity_url("annotations", "n1"),
            "https://contoso.crm4.dynamics.com/api/data/v9.1/annotations(n1)"
        );
        assert_eq!(DataverseGateway::bind("adx_websites", "w"), "/adx_websites(w)");
    }

    #[test]
    fn test_wire_records() {
        let collection: Collection<WebTemplate> = serde_json::from_value(json!({
            "value": [
                {"adx_webtemplateid": "t1", "adx_name": "Home", "adx_source": null, "versionnumber": 7}
            ],
            "@odata.nextLink": "https://next"
        }))
        .unwrap();
        assert_eq!(collection.next_link.as_deref(), Some("https://next"));

        let record = TemplateRecord::try_from(collection.value.into_iter().next().unwrap()).unwrap();
        assert_eq!(record.source, "");
        assert_eq!(record.revision.as_deref(), Some("7"));

        let missing: WebTemplate =
            serde_json::from_value(json!({"adx_name": "x"})).unwrap();
        assert!(matches!(
            TemplateRecord::try_from(missing),
            Err(GatewayError::MissingField { field: "adx_webtemplateid", .. })
        ));
    }

    #[test]
    fn test_page_falls_back_to_partial_url() {
        let page: Webpage = serde_json::from_value(json!({
            "adx_webpageid": "p1",
            "adx_partialurl": "blog",
            "_adx_parentpageid_value": "root"
        }))
        .unwrap();
        let page = WebPage::try_from(page).unwrap();
        assert_eq!(page.display_name, "blog");
        assert_eq!(page.parent_id.as_deref(), Some("root"));
    }
}
