use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::crawler::error::{CrawlError, ModelError};

// ============================================================================
// Element / form records
// ============================================================================

/// An interactive element found on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementRecord {
    selector: String,
    element_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    is_visible: bool,
    #[serde(default)]
    is_clickable: bool,
}

impl ElementRecord {
    /// New element, visible and not clickable until told otherwise.
    pub fn new(
        selector: impl Into<String>,
        element_type: impl Into<String>,
    ) -> Result<Self, ModelError> {
        let record = Self {
            selector: selector.into(),
            element_type: element_type.into(),
            text: None,
            attributes: BTreeMap::new(),
            is_visible: true,
            is_clickable: false,
        };
        record.validate()?;
        Ok(record)
    }

    /// Set the text, trimmed. Blank text is stored as absent.
    pub fn with_text(mut self, text: Option<&str>) -> Self {
        self.text = text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        self
    }

    pub fn with_attribute(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_visibility(mut self, visible: bool, clickable: bool) -> Self {
        self.is_visible = visible;
        self.is_clickable = clickable;
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.selector.trim().is_empty() {
            return Err(ModelError::EmptyField {
                record: "ElementRecord",
                field: "selector",
            });
        }
        if self.element_type.trim().is_empty() {
            return Err(ModelError::EmptyField {
                record: "ElementRecord",
                field: "element_type",
            });
        }
        Ok(())
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Attribute value; empty values count as absent.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn is_visible(&self) -> bool {
        self.is_visible
    }

    pub fn is_clickable(&self) -> bool {
        self.is_clickable
    }
}

/// HTTP method a form submits with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormMethod {
    #[default]
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
}

impl FormMethod {
    /// Parse a `method` attribute. Absent, empty and unknown values fall
    /// back to GET, as browsers do.
    pub fn from_attribute(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(m) if m.eq_ignore_ascii_case("post") => FormMethod::Post,
            _ => FormMethod::Get,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FormMethod::Get => "GET",
            FormMethod::Post => "POST",
        }
    }
}

/// A form with its fields, submit button and synthesized sample values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormRecord {
    form_selector: String,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    method: FormMethod,
    #[serde(default)]
    fields: Vec<ElementRecord>,
    #[serde(default)]
    submit_button: Option<ElementRecord>,
    #[serde(default)]
    sample_data: BTreeMap<String, String>,
}

impl FormRecord {
    pub fn new(form_selector: impl Into<String>) -> Result<Self, ModelError> {
        let record = Self {
            form_selector: form_selector.into(),
            action: None,
            method: FormMethod::Get,
            fields: Vec::new(),
            submit_button: None,
            sample_data: BTreeMap::new(),
        };
        record.validate()?;
        Ok(record)
    }

    pub fn with_action(mut self, action: Option<String>) -> Self {
        self.action = action;
        self
    }

    pub fn with_method(mut self, method: FormMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_field(mut self, field: ElementRecord) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_submit_button(mut self, button: ElementRecord) -> Self {
        self.submit_button = Some(button);
        self
    }

    pub fn with_sample(mut self, field_name: &str, value: &str) -> Self {
        self.sample_data
            .insert(field_name.to_string(), value.to_string());
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.form_selector.trim().is_empty() {
            return Err(ModelError::EmptyField {
                record: "FormRecord",
                field: "form_selector",
            });
        }
        for field in &self.fields {
            field.validate()?;
        }
        if let Some(button) = &self.submit_button {
            button.validate()?;
        }
        Ok(())
    }

    pub fn form_selector(&self) -> &str {
        &self.form_selector
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn method(&self) -> FormMethod {
        self.method
    }

    pub fn fields(&self) -> &[ElementRecord] {
        &self.fields
    }

    pub fn submit_button(&self) -> Option<&ElementRecord> {
        self.submit_button.as_ref()
    }

    pub fn sample_data(&self) -> &BTreeMap<String, String> {
        &self.sample_data
    }
}

// ============================================================================
// Page record
// ============================================================================

/// Everything one crawl attempt learned about a URL.
///
/// Built once per attempt by the controller; afterwards it is only read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub(crate) url: String,
    #[serde(default)]
    pub(crate) title: String,
    pub(crate) depth: usize,
    #[serde(default)]
    pub(crate) parent_url: Option<String>,
    #[serde(default = "default_status")]
    pub(crate) status_code: u16,
    #[serde(default = "default_content_type")]
    pub(crate) content_type: String,
    #[serde(default)]
    pub(crate) elements: Vec<ElementRecord>,
    #[serde(default)]
    pub(crate) forms: Vec<FormRecord>,
    #[serde(default)]
    pub(crate) links: Vec<String>,
    #[serde(default)]
    pub(crate) screenshot_path: Option<PathBuf>,
    #[serde(default)]
    pub(crate) html_path: Option<PathBuf>,
    #[serde(default)]
    pub(crate) has_errors: bool,
    #[serde(default)]
    pub(crate) error_message: Option<String>,
}

impl PageRecord {
    /// A page at `depth` reached from `parent_url`. The root is the only
    /// page at depth 0 and the only one without a parent.
    pub fn new(
        url: impl Into<String>,
        depth: usize,
        parent_url: Option<String>,
    ) -> Result<Self, ModelError> {
        let record = Self::attempt(url.into(), depth, parent_url);
        record.validate()?;
        Ok(record)
    }

    /// Blank record for a crawl attempt; the frontier guarantees the
    /// root/parent invariant.
    pub(crate) fn attempt(url: String, depth: usize, parent_url: Option<String>) -> Self {
        Self {
            url,
            title: String::new(),
            depth,
            parent_url,
            status_code: default_status(),
            content_type: default_content_type(),
            elements: Vec::new(),
            forms: Vec::new(),
            links: Vec::new(),
            screenshot_path: None,
            html_path: None,
            has_errors: false,
            error_message: None,
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    pub fn with_status(mut self, status_code: u16, content_type: &str) -> Self {
        self.status_code = status_code;
        self.content_type = content_type.to_string();
        self
    }

    pub fn with_elements(mut self, elements: Vec<ElementRecord>) -> Self {
        self.elements = elements;
        self
    }

    pub fn with_forms(mut self, forms: Vec<FormRecord>) -> Self {
        self.forms = forms;
        self
    }

    pub fn with_links(mut self, links: Vec<String>) -> Self {
        self.links = links;
        self
    }

    pub fn with_artifacts(mut self, screenshot: Option<PathBuf>, html: Option<PathBuf>) -> Self {
        self.screenshot_path = screenshot;
        self.html_path = html;
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.mark_failed(message.into());
        self
    }

    pub(crate) fn mark_failed(&mut self, message: String) {
        self.has_errors = true;
        self.error_message = Some(message);
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.url.trim().is_empty() {
            return Err(ModelError::EmptyField {
                record: "PageRecord",
                field: "url",
            });
        }
        if (self.depth == 0) != self.parent_url.is_none() {
            return Err(ModelError::RootMismatch {
                url: self.url.clone(),
                depth: self.depth,
            });
        }
        for element in &self.elements {
            element.validate()?;
        }
        for form in &self.forms {
            form.validate()?;
        }
        Ok(())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn parent_url(&self) -> Option<&str> {
        self.parent_url.as_deref()
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn elements(&self) -> &[ElementRecord] {
        &self.elements
    }

    pub fn forms(&self) -> &[FormRecord] {
        &self.forms
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    pub fn screenshot_path(&self) -> Option<&Path> {
        self.screenshot_path.as_deref()
    }

    pub fn html_path(&self) -> Option<&Path> {
        self.html_path.as_deref()
    }

    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

// ============================================================================
// Aggregate dataset
// ============================================================================

/// Aggregate counters computed when the crawl loop exits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlStats {
    pub pages: usize,
    pub failed: usize,
    pub depth: usize,
    pub links: usize,
    pub forms: usize,
    pub elements: usize,
}

/// Everything a crawl produced.
///
/// Pages are keyed by canonical URL and iterate in URL order, so anything
/// derived from a dataset is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlDataset {
    /// Canonical root URL
    pub base_url: String,

    /// Directory holding per-page artifacts
    pub output_dir: PathBuf,

    /// Recorded pages; first discovery wins
    pub pages: BTreeMap<String, PageRecord>,

    /// Every URL an attempt was made for
    pub visited_urls: BTreeSet<String>,

    /// URL → error message for failed attempts
    pub failed_urls: BTreeMap<String, String>,

    pub max_depth_reached: usize,

    pub stats: CrawlStats,

    /// Milliseconds since the Unix epoch
    pub start_time_ms: u64,

    #[serde(default)]
    pub end_time_ms: Option<u64>,
}

impl CrawlDataset {
    pub fn new(base_url: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            output_dir: output_dir.into(),
            pages: BTreeMap::new(),
            visited_urls: BTreeSet::new(),
            failed_urls: BTreeMap::new(),
            max_depth_reached: 0,
            stats: CrawlStats::default(),
            start_time_ms: now_ms(),
            end_time_ms: None,
        }
    }

    /// Number of recorded pages.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn has_page(&self, url: &str) -> bool {
        self.pages.contains_key(url)
    }

    pub fn page(&self, url: &str) -> Option<&PageRecord> {
        self.pages.get(url)
    }

    /// Record a finished attempt. Returns `false` (and drops the record)
    /// when the URL was already recorded.
    pub(crate) fn record_page(&mut self, page: PageRecord) -> bool {
        self.visited_urls.insert(page.url.clone());
        self.max_depth_reached = self.max_depth_reached.max(page.depth);
        if page.has_errors {
            self.failed_urls.insert(
                page.url.clone(),
                page.error_message
                    .clone()
                    .unwrap_or_else(|| "Unknown error".to_string()),
            );
        }
        if self.pages.contains_key(&page.url) {
            return false;
        }
        self.pages.insert(page.url.clone(), page);
        true
    }

    /// An attempt that produced no record at all.
    pub(crate) fn record_lost(&mut self, url: &str, message: String) {
        self.visited_urls.insert(url.to_string());
        self.failed_urls.insert(url.to_string(), message);
    }

    pub(crate) fn finish(&mut self) {
        self.stats = CrawlStats {
            pages: self.pages.len(),
            failed: self.failed_urls.len(),
            depth: self.max_depth_reached,
            links: self.pages.values().map(|p| p.links.len()).sum(),
            forms: self.pages.values().map(|p| p.forms.len()).sum(),
            elements: self.pages.values().map(|p| p.elements.len()).sum(),
        };
        self.end_time_ms = Some(now_ms());
    }

    /// Check every record and the depth invariant across pages.
    pub fn validate(&self) -> Result<(), ModelError> {
        for page in self.pages.values() {
            page.validate()?;
            if let Some(parent) = page.parent_url.as_deref().and_then(|p| self.pages.get(p)) {
                if page.depth != parent.depth + 1 {
                    return Err(ModelError::DepthMismatch {
                        url: page.url.clone(),
                        depth: page.depth,
                        parent_depth: parent.depth,
                    });
                }
            }
        }
        Ok(())
    }

    /// Write the dataset as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), CrawlError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| CrawlError::Dataset {
            path: path.display().to_string(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| CrawlError::Io {
            path: path.display().to_string(),
            source: e,
        })
    }

    /// Read and validate a dataset written by [`CrawlDataset::save`].
    pub fn load(path: &Path) -> Result<Self, CrawlError> {
        let content = std::fs::read_to_string(path).map_err(|e| CrawlError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let dataset: CrawlDataset =
            serde_json::from_str(&content).map_err(|e| CrawlError::Dataset {
                path: path.display().to_string(),
                source: e,
            })?;
        dataset.validate()?;
        Ok(dataset)
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// Serde default helpers
fn default_true() -> bool { true }
fn default_status() -> u16 { 200 }
fn default_content_type() -> String { "text/html".to_string() }
