use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};

use crate::browser::driver::{Document, ElementHandle};
use crate::browser::error::BrowserError;

/// Tags whose content never renders.
const NON_RENDERED_TAGS: &[&str] = &[
    "head", "script", "style", "template", "noscript", "title", "meta", "link",
];

#[derive(Debug, Clone)]
struct ElementData {
    tag: String,
    attributes: HashMap<String, String>,
    text: String,
    visible: bool,
    /// Number of descendant elements. Descendants of element `i` are exactly
    /// the elements `i + 1 ..= i + descendants` in document order.
    descendants: usize,
}

/// A parsed, static HTML document implementing [`Document`].
///
/// Handles are document-order element indices. Visibility is a static
/// heuristic: an element is hidden when it (or an ancestor) is a
/// non-rendered tag, carries the `hidden` attribute, is an
/// `input[type=hidden]`, or has an inline `display:none` /
/// `visibility:hidden` style.
pub struct HtmlDocument {
    html: Html,
    elements: Vec<ElementData>,
}

impl HtmlDocument {
    pub fn parse(markup: &str) -> Self {
        let html = Html::parse_document(markup);
        let elements = index_elements(&html);
        Self { html, elements }
    }

    pub fn empty() -> Self {
        Self::parse("")
    }

    /// Trimmed `<title>` text, empty when missing.
    pub fn title(&self) -> String {
        let Ok(selector) = Selector::parse("title") else {
            return String::new();
        };
        self.html
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default()
    }

    /// Number of elements in the document.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    fn data(&self, element: ElementHandle) -> Result<&ElementData, BrowserError> {
        usize::try_from(element.0)
            .ok()
            .and_then(|i| self.elements.get(i))
            .ok_or(BrowserError::StaleHandle(element.0))
    }
}

impl Document for HtmlDocument {
    fn query_all(
        &mut self,
        scope: Option<ElementHandle>,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        let parsed = Selector::parse(selector).map_err(|e| BrowserError::InvalidSelector {
            selector: selector.to_string(),
            reason: format!("{:?}", e),
        })?;

        let (start, len) = match scope {
            None => (0, self.elements.len()),
            Some(handle) => {
                let data = self.data(handle)?;
                (handle.0 as usize + 1, data.descendants)
            }
        };

        let matches = self
            .html
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
            .enumerate()
            .skip(start)
            .take(len)
            .filter(|(_, el)| parsed.matches(el))
            .map(|(i, _)| ElementHandle(i as u64))
            .collect();

        Ok(matches)
    }

    fn attribute(&mut self, element: ElementHandle, name: &str) -> Result<Option<String>, BrowserError> {
        Ok(self.data(element)?.attributes.get(name).cloned())
    }

    fn text_content(&mut self, element: ElementHandle) -> Result<Option<String>, BrowserError> {
        Ok(Some(self.data(element)?.text.clone()))
    }

    fn is_visible(&mut self, element: ElementHandle) -> Result<bool, BrowserError> {
        Ok(self.data(element)?.visible)
    }

    fn tag_name(&mut self, element: ElementHandle) -> Result<String, BrowserError> {
        Ok(self.data(element)?.tag.clone())
    }
}

/// Walk the element tree once in document order and precompute everything
/// the `Document` queries read.
fn index_elements(html: &Html) -> Vec<ElementData> {
    let mut elements: Vec<ElementData> = Vec::new();
    let mut parents: Vec<Option<usize>> = Vec::new();
    let mut index_of = HashMap::new();

    for (i, el) in html
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .enumerate()
    {
        index_of.insert((*el).id(), i);

        let parent = (*el).parent().and_then(|p| index_of.get(&p.id()).copied());
        let parent_hidden = parent.map(|p| !elements[p].visible).unwrap_or(false);

        let value = el.value();
        let tag = value.name().to_ascii_lowercase();
        let attributes: HashMap<String, String> = value
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        let visible = !parent_hidden && !hidden_by_itself(&tag, &attributes);

        elements.push(ElementData {
            tag,
            attributes,
            text: el.text().collect(),
            visible,
            descendants: 0,
        });
        parents.push(parent);
    }

    for i in (0..elements.len()).rev() {
        if let Some(p) = parents[i] {
            elements[p].descendants += elements[i].descendants + 1;
        }
    }

    elements
}

fn hidden_by_itself(tag: &str, attributes: &HashMap<String, String>) -> bool {
    if NON_RENDERED_TAGS.contains(&tag) || attributes.contains_key("hidden") {
        return true;
    }

    if tag == "input"
        && attributes
            .get("type")
            .is_some_and(|t| t.eq_ignore_ascii_case("hidden"))
    {
        return true;
    }

    match attributes.get("style") {
        Some(style) => {
            let compact: String = style
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            compact.contains("display:none") || compact.contains("visibility:hidden")
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head><title> Shop </title></head><body>
          <form id="f"><input name="q"><button>Go</button></form>
          <div hidden><a href="/secret">Secret</a></div>
          <a href="/about" style="display: none">About</a>
          <a href="/contact">Contact</a>
        </body></html>"#;

    #[test]
    fn reads_title_trimmed() {
        assert_eq!(HtmlDocument::parse(PAGE).title(), "Shop");
    }

    #[test]
    fn scoped_query_only_returns_descendants() {
        let mut doc = HtmlDocument::parse(PAGE);
        let form = doc.query_first(None, "form").unwrap().unwrap();
        let inside = doc.query_all(Some(form), "input, button").unwrap();
        assert_eq!(inside.len(), 2);

        let all_links = doc.query_all(None, "a").unwrap();
        assert_eq!(all_links.len(), 3);
        assert!(doc.query_all(Some(form), "a").unwrap().is_empty());
    }

    #[test]
    fn visibility_is_inherited_and_style_aware() {
        let mut doc = HtmlDocument::parse(PAGE);
        let links = doc.query_all(None, "a").unwrap();
        let visible: Vec<bool> = links.iter().map(|h| doc.is_visible(*h).unwrap()).collect();
        assert_eq!(visible, vec![false, false, true]);
    }

    #[test]
    fn bad_selector_is_an_error() {
        let mut doc = HtmlDocument::parse(PAGE);
        assert!(matches!(
            doc.query_all(None, "a[[["),
            Err(BrowserError::InvalidSelector { .. })
        ));
    }

    #[test]
    fn unknown_handle_is_stale() {
        let mut doc = HtmlDocument::parse(PAGE);
        assert!(matches!(
            doc.attribute(ElementHandle(10_000), "id"),
            Err(BrowserError::StaleHandle(10_000))
        ));
    }
}
