use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::Serialize;

use crate::crawler::models::ElementRecord;
use crate::generator::naming::element_name;
use crate::generator::source::FunctionDef;

/// A named CSS locator on a page object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElementLocator {
    pub name: String,
    pub selector: String,
    pub selector_type: String,
    pub description: String,
    pub element_type: String,
}

impl ElementLocator {
    pub fn from_element(element: &ElementRecord) -> Self {
        Self {
            name: element_name(element),
            selector: element.selector().to_string(),
            selector_type: "css".to_string(),
            description: element.text().unwrap_or_default().to_string(),
            element_type: element.element_type().to_string(),
        }
    }

    /// Text-like form field (`input-*`).
    pub fn is_input(&self) -> bool {
        self.element_type.starts_with("input")
    }

    pub fn is_submit(&self) -> bool {
        self.element_type == "submit"
    }
}

/// Insertion-ordered locators keyed by name.
///
/// Inserting a name that already exists replaces that locator but keeps
/// its original position (last write wins).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocatorMap {
    entries: Vec<ElementLocator>,
}

impl LocatorMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the replaced locator, if any.
    pub fn insert(&mut self, locator: ElementLocator) -> Option<ElementLocator> {
        match self.entries.iter_mut().find(|l| l.name == locator.name) {
            Some(existing) => Some(std::mem::replace(existing, locator)),
            None => {
                self.entries.push(locator);
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ElementLocator> {
        self.entries.iter().find(|l| l.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ElementLocator> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|l| l.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Locators of one kept form, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormLocators {
    pub name: String,
    pub locators: Vec<ElementLocator>,
}

impl FormLocators {
    pub fn inputs(&self) -> impl Iterator<Item = &ElementLocator> {
        self.locators.iter().filter(|l| l.is_input())
    }

    pub fn submit(&self) -> Option<&ElementLocator> {
        self.locators.iter().find(|l| l.is_submit())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageObjectModel {
    pub name: String,
    pub file_name: String,
    pub url: String,
    pub title: String,
    pub elements: LocatorMap,
    pub forms: Vec<FormLocators>,
    pub methods: Vec<FunctionDef>,
    pub imports: BTreeSet<String>,
}

impl PageObjectModel {
    pub fn method(&self, name: &str) -> Option<&FunctionDef> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.method(name).is_some()
    }

    /// Python module path, e.g. `page_objects.contact_us_page`.
    pub fn module_path(&self) -> String {
        let stem = self
            .file_name
            .strip_suffix(".py")
            .unwrap_or(&self.file_name);
        format!("page_objects.{}", stem)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TestCaseKind {
    Navigation,
    Elements,
    Form,
}

impl TestCaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestCaseKind::Navigation => "navigation",
            TestCaseKind::Elements => "elements",
            TestCaseKind::Form => "form",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedTestModel {
    pub name: String,
    pub file_name: String,
    pub page_objects: Vec<String>,
    pub test_cases: Vec<(TestCaseKind, FunctionDef)>,
    pub imports: BTreeSet<String>,
}

impl GeneratedTestModel {
    pub fn case(&self, kind: TestCaseKind) -> Option<&FunctionDef> {
        self.test_cases
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, f)| f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    PageObject,
    Test,
    Fixture,
    Marker,
}

/// A file ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub content: String,
    pub kind: FileKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator(name: &str, selector: &str) -> ElementLocator {
        ElementLocator {
            name: name.into(),
            selector: selector.into(),
            selector_type: "css".into(),
            description: String::new(),
            element_type: "a".into(),
        }
    }

    #[test]
    fn collision_replaces_in_place() {
        let mut map = LocatorMap::new();
        map.insert(locator("home", "#first"));
        map.insert(locator("about", "#about"));
        let old = map.insert(locator("home", "#second"));

        assert_eq!(old.unwrap().selector, "#first");
        assert_eq!(map.names(), vec!["home", "about"]);
        assert_eq!(map.get("home").unwrap().selector, "#second");
    }
}
