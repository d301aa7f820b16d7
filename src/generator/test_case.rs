use std::collections::BTreeSet;

use crate::crawler::extractor::sample_value;
use crate::generator::models::{ElementLocator, GeneratedTestModel, PageObjectModel, TestCaseKind};
use crate::generator::naming::{sanitize_name, test_name};
use crate::generator::source::{py_string, FunctionDef, SourceModule, Stmt};

/// Visibility assertions per elements test.
pub const MAX_ELEMENT_ASSERTIONS: usize = 5;

/// Build the test module model for a page object. Cases whose
/// precondition does not hold are left out.
pub fn build_test(page_object: &PageObjectModel) -> GeneratedTestModel {
    let mut test_cases = vec![(TestCaseKind::Navigation, navigation_case(page_object))];
    if let Some(case) = elements_case(page_object) {
        test_cases.push((TestCaseKind::Elements, case));
    }
    if let Some(case) = form_case(page_object) {
        test_cases.push((TestCaseKind::Form, case));
    }

    let mut imports = BTreeSet::from([
        "import re".to_string(),
        "from playwright.sync_api import Page, expect".to_string(),
    ]);
    imports.insert(format!(
        "from {} import {}",
        page_object.module_path(),
        page_object.name
    ));

    GeneratedTestModel {
        name: test_name(&page_object.name),
        file_name: format!("test_{}", page_object.file_name),
        page_objects: vec![page_object.name.clone()],
        test_cases,
        imports,
    }
}

pub fn render_test(model: &GeneratedTestModel) -> String {
    let mut module = SourceModule::new(format!("Tests for {}.", model.name));
    for import in &model.imports {
        module.import(import.clone());
    }
    for (_, case) in &model.test_cases {
        module.function(case.clone());
    }
    module.render()
}

/// `{name: value}` for every input locator of a form, in form order.
pub fn form_sample_data(locators: &[ElementLocator]) -> Vec<(String, String)> {
    locators
        .iter()
        .filter(|l| l.is_input())
        .map(|l| {
            let input_type = l.element_type.strip_prefix("input-").unwrap_or("");
            (l.name.clone(), sample_value(input_type, &l.name))
        })
        .collect()
}

fn case_function(page_object: &PageObjectModel, suffix: &str, doc: String) -> FunctionDef {
    FunctionDef::new(format!("test_{}_{}", sanitize_name(&page_object.name), suffix))
        .with_param("page: Page")
        .with_returns("None")
        .with_doc(doc)
        .with_line(format!("page_object = {}(page)", page_object.name))
        .with_line("page_object.navigate()")
}

fn navigation_case(page_object: &PageObjectModel) -> FunctionDef {
    let pattern = if page_object.title.is_empty() {
        ".*".to_string()
    } else {
        regex::escape(&page_object.title)
    };

    case_function(
        page_object,
        "navigation",
        format!("Test navigation to {}.", page_object.name),
    )
    .with_line(format!(
        "expect(page).to_have_title(re.compile({}))",
        py_string(&pattern)
    ))
}

fn elements_case(page_object: &PageObjectModel) -> Option<FunctionDef> {
    if page_object.elements.is_empty() {
        return None;
    }

    let case = case_function(
        page_object,
        "elements",
        format!("Test elements on {}.", page_object.name),
    );
    Some(
        page_object
            .elements
            .iter()
            .take(MAX_ELEMENT_ASSERTIONS)
            .fold(case, |case, locator| {
                case.with_line(format!(
                    "expect(page_object.get_{}()).to_be_visible()",
                    locator.name
                ))
            }),
    )
}

fn form_case(page_object: &PageObjectModel) -> Option<FunctionDef> {
    let form = page_object.forms.first()?;
    let fill = format!("fill_{}", form.name);
    if !page_object.has_method(&fill) {
        return None;
    }

    let data = form_sample_data(&form.locators);
    if data.is_empty() {
        return None;
    }
    let entries: Vec<String> = data
        .iter()
        .map(|(name, value)| format!("    {}: {},", py_string(name), py_string(value)))
        .collect();

    Some(
        case_function(
            page_object,
            "form_submission",
            format!("Test form submission on {}.", page_object.name),
        )
        .with_stmt(Stmt::Comment("Fill and submit the form".to_string()))
        .with_line(format!("form_data = {{\n{}\n}}", entries.join("\n")))
        .with_line(format!("page_object.{}(form_data)", fill))
        .with_line("page.wait_for_load_state(\"networkidle\")"),
    )
}
