use std::error::Error;
use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::browser::driver::{Document, ElementHandle, PageSession};
use crate::browser::error::BrowserError;
use crate::crawler::models::{ElementRecord, FormMethod, FormRecord};
use crate::crawler::url_filter::{canonicalize, is_same_origin};

/// Interactive element selectors, scanned in this order.
const ELEMENT_SELECTORS: &[&str] = &[
    "a[href]",
    "button",
    "input[type='button']",
    "input[type='submit']",
    "[role='button']",
];

const FIELD_SELECTOR: &str = "input, select, textarea";

const SUBMIT_SELECTORS: &[&str] = &[
    "input[type='submit']",
    "button[type='submit']",
    "button:not([type])",
];

/// Input types that are buttons rather than data fields.
const NON_FIELD_INPUTS: &[&str] = &["submit", "button", "reset"];

pub const SAMPLE_EMAIL: &str = "test@example.com";
pub const SAMPLE_PASSWORD: &str = "Password123!";
pub const SAMPLE_NAME: &str = "Test User";
pub const SAMPLE_PHONE: &str = "123-456-7890";

/// Records extracted from one loaded page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub elements: Vec<ElementRecord>,
    pub forms: Vec<FormRecord>,
    pub links: Vec<String>,
}

/// Artifact files written for one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Artifacts {
    pub screenshot: Option<PathBuf>,
    pub html: Option<PathBuf>,
}

/// Plausible test value for a form field.
pub fn sample_value(input_type: &str, name: &str) -> String {
    let lowered = name.to_lowercase();
    if input_type.eq_ignore_ascii_case("email") {
        SAMPLE_EMAIL.to_string()
    } else if input_type.eq_ignore_ascii_case("password") {
        SAMPLE_PASSWORD.to_string()
    } else if lowered.contains("name") {
        SAMPLE_NAME.to_string()
    } else if lowered.contains("phone") {
        SAMPLE_PHONE.to_string()
    } else {
        format!("test_{}", name)
    }
}

/// Extract forms, interactive elements and same-origin links.
///
/// Only whole-document queries can fail the extraction; an individual
/// element that cannot be read is skipped.
pub fn extract(document: &mut dyn Document, page_url: &Url) -> Result<Extraction, BrowserError> {
    Ok(Extraction {
        forms: extract_forms(document)?,
        elements: extract_elements(document)?,
        links: extract_links(document, page_url)?,
    })
}

// ============================================================================
// Forms
// ============================================================================

pub fn extract_forms(document: &mut dyn Document) -> Result<Vec<FormRecord>, BrowserError> {
    let mut forms = Vec::new();

    for (i, form) in document.query_all(None, "form")?.into_iter().enumerate() {
        let form_selector = format!("form:nth-of-type({})", i + 1);
        match read_form(document, form, &form_selector) {
            Ok(record) => forms.push(record),
            Err(e) => debug!(form = %form_selector, error = %e, "Skipping unreadable form"),
        }
    }

    Ok(forms)
}

fn read_form(
    document: &mut dyn Document,
    form: ElementHandle,
    form_selector: &str,
) -> Result<FormRecord, Box<dyn Error>> {
    let action = non_empty(document.attribute(form, "action")?);
    let method = FormMethod::from_attribute(document.attribute(form, "method")?.as_deref());

    let mut record = FormRecord::new(form_selector)?
        .with_action(action)
        .with_method(method);

    for field in document.query_all(Some(form), FIELD_SELECTOR)? {
        match read_field(document, field, form_selector) {
            Ok(Some((element, sample))) => {
                if let Some((name, value)) = sample {
                    record = record.with_sample(&name, &value);
                }
                record = record.with_field(element);
            }
            Ok(None) => {}
            Err(e) => debug!(form = %form_selector, error = %e, "Skipping unreadable field"),
        }
    }

    if let Some(button) = document.query_first(Some(form), &SUBMIT_SELECTORS.join(", "))? {
        record = record.with_submit_button(read_submit(document, button, form_selector)?);
    }

    Ok(record)
}

type FieldSample = Option<(String, String)>;

/// A field and its sample datum, or `None` for button-like inputs.
fn read_field(
    document: &mut dyn Document,
    field: ElementHandle,
    form_selector: &str,
) -> Result<Option<(ElementRecord, FieldSample)>, Box<dyn Error>> {
    let tag = document.tag_name(field)?;
    let input_type = non_empty(document.attribute(field, "type")?)
        .map(|t| t.to_lowercase())
        .unwrap_or_else(|| "text".to_string());

    if tag == "input" && NON_FIELD_INPUTS.contains(&input_type.as_str()) {
        return Ok(None);
    }

    let id = non_empty(document.attribute(field, "id")?);
    let name = non_empty(document.attribute(field, "name")?);
    let placeholder = non_empty(document.attribute(field, "placeholder")?);

    let target = match (&id, &name) {
        (Some(id), _) => format!("#{}", id),
        (None, Some(name)) => format!("[name={}]", css_string(name)),
        (None, None) => format!("input[type={}]", css_string(&input_type)),
    };
    let element_type = match tag.as_str() {
        "textarea" => "input-textarea".to_string(),
        "select" => "select".to_string(),
        _ => format!("input-{}", input_type),
    };

    let mut element = ElementRecord::new(format!("{} {}", form_selector, target), element_type)?
        .with_text(placeholder.as_deref())
        .with_visibility(document.is_visible(field)?, false)
        .with_attribute("type", &input_type);
    for (key, value) in [("name", &name), ("id", &id), ("placeholder", &placeholder)] {
        if let Some(value) = value {
            element = element.with_attribute(key, value);
        }
    }

    let sample = name.map(|name| {
        let value = sample_value(&input_type, &name);
        (name, value)
    });

    Ok(Some((element, sample)))
}

/// Quote `value` as a CSS string for an attribute selector.
fn css_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' | '\'' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\a "),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn read_submit(
    document: &mut dyn Document,
    button: ElementHandle,
    form_selector: &str,
) -> Result<ElementRecord, Box<dyn Error>> {
    let selector = match non_empty(document.attribute(button, "id")?) {
        Some(id) => format!("{} #{}", form_selector, id),
        None => SUBMIT_SELECTORS
            .iter()
            .map(|s| format!("{} {}", form_selector, s))
            .collect::<Vec<_>>()
            .join(", "),
    };

    let text = non_empty(document.text_content(button)?.map(|t| t.trim().to_string()))
        .or(non_empty(document.attribute(button, "value")?))
        .unwrap_or_else(|| "Submit".to_string());

    Ok(ElementRecord::new(selector, "submit")?
        .with_text(Some(&text))
        .with_visibility(document.is_visible(button)?, true))
}

// ============================================================================
// Interactive elements
// ============================================================================

pub fn extract_elements(document: &mut dyn Document) -> Result<Vec<ElementRecord>, BrowserError> {
    let mut elements = Vec::new();

    for selector in ELEMENT_SELECTORS {
        for handle in document.query_all(None, selector)? {
            match read_element(document, handle, selector) {
                Ok(element) => elements.push(element),
                Err(e) => debug!(selector = %selector, error = %e, "Skipping unreadable element"),
            }
        }
    }

    Ok(elements)
}

fn read_element(
    document: &mut dyn Document,
    handle: ElementHandle,
    matched: &str,
) -> Result<ElementRecord, Box<dyn Error>> {
    let id = non_empty(document.attribute(handle, "id")?);
    let class = non_empty(document.attribute(handle, "class")?);
    let href = non_empty(document.attribute(handle, "href")?);

    let selector = match (&id, &class) {
        (Some(id), _) => format!("#{}", id),
        (None, Some(class)) => format!(".{}", class.split_whitespace().collect::<Vec<_>>().join(".")),
        (None, None) => matched.to_string(),
    };

    let element_type = match non_empty(document.attribute(handle, "type")?) {
        Some(t) => t.to_lowercase(),
        None => match matched.split('[').next() {
            Some(tag) if !tag.is_empty() => tag.to_string(),
            _ => "button".to_string(),
        },
    };

    let visible = document.is_visible(handle)?;
    let text = document.text_content(handle)?;

    let mut element = ElementRecord::new(selector, element_type)?
        .with_text(text.as_deref())
        .with_visibility(visible, visible);
    for (key, value) in [("id", &id), ("class", &class), ("href", &href)] {
        if let Some(value) = value {
            element = element.with_attribute(key, value);
        }
    }

    Ok(element)
}

// ============================================================================
// Links
// ============================================================================

/// Same-origin `a[href]` targets, resolved and without fragments, in
/// document order. Duplicates are kept.
pub fn extract_links(document: &mut dyn Document, page_url: &Url) -> Result<Vec<String>, BrowserError> {
    let mut links = Vec::new();

    for handle in document.query_all(None, "a[href]")? {
        let href = match document.attribute(handle, "href") {
            Ok(Some(href)) if !href.trim().is_empty() => href,
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable link");
                continue;
            }
        };

        let Ok(resolved) = canonicalize(&href, Some(page_url)) else {
            continue;
        };
        let Ok(parsed) = Url::parse(&resolved) else {
            continue;
        };
        if is_same_origin(&parsed, page_url) {
            links.push(resolved);
        }
    }

    Ok(links)
}

// ============================================================================
// Artifacts
// ============================================================================

/// Write `source.html` (always) and `screenshot.png` (when asked and the
/// backend can render) into `page_dir`.
pub fn capture_artifacts(
    session: &mut dyn PageSession,
    page_dir: &Path,
    screenshot: bool,
) -> Result<Artifacts, BrowserError> {
    std::fs::create_dir_all(page_dir).map_err(|e| BrowserError::Io {
        path: page_dir.display().to_string(),
        source: e,
    })?;

    let mut artifacts = Artifacts::default();

    if screenshot {
        let path = page_dir.join("screenshot.png");
        if session.screenshot(&path)? {
            artifacts.screenshot = Some(path);
        }
    }

    let html_path = page_dir.join("source.html");
    let markup = session.content()?;
    std::fs::write(&html_path, markup).map_err(|e| BrowserError::Io {
        path: html_path.display().to_string(),
        source: e,
    })?;
    artifacts.html = Some(html_path);

    Ok(artifacts)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
