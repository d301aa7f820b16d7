use std::collections::BTreeSet;

use crate::crawler::models::PageRecord;
use crate::generator::models::{ElementLocator, FormLocators, LocatorMap, PageObjectModel};
use crate::generator::naming::sanitize_name;
use crate::generator::source::{py_string, ClassDef, FunctionDef, SourceModule, Stmt};

const PAGE_IMPORT: &str = "from playwright.sync_api import Locator, Page";

/// Pages that get a page object: loaded without error and not an HTTP
/// error response.
pub fn is_eligible(page: &PageRecord) -> bool {
    !page.has_errors() && page.status_code() < 400
}

/// Build the page object for `page` under the given class name.
pub fn build_page_object(page: &PageRecord, name: &str) -> PageObjectModel {
    let mut elements = LocatorMap::new();
    for element in page.elements() {
        if element.is_visible() && element.is_clickable() {
            elements.insert(ElementLocator::from_element(element));
        }
    }

    let mut forms: Vec<FormLocators> = Vec::new();
    for form in page.forms() {
        let mut locators: Vec<ElementLocator> = form
            .fields()
            .iter()
            .filter(|f| f.is_visible())
            .map(ElementLocator::from_element)
            .collect();
        if let Some(submit) = form.submit_button() {
            locators.push(ElementLocator::from_element(submit));
        }
        if locators.is_empty() {
            continue;
        }
        forms.push(FormLocators {
            name: format!("form_{}", forms.len() + 1),
            locators,
        });
    }

    let mut methods = vec![init_method(), navigate_method()];
    methods.extend(elements.iter().map(getter_method));
    methods.extend(forms.iter().filter_map(fill_method));

    PageObjectModel {
        name: name.to_string(),
        file_name: format!("{}.py", sanitize_name(name)),
        url: page.url().to_string(),
        title: page.title().to_string(),
        elements,
        forms,
        methods,
        imports: BTreeSet::from([PAGE_IMPORT.to_string()]),
    }
}

/// Render a page object as a Python module.
pub fn render_page_object(model: &PageObjectModel) -> String {
    let mut module = SourceModule::new(format!("Page object for {}.", model.name));
    for import in &model.imports {
        module.import(import.clone());
    }
    module.constant("PAGE_URL", py_string(&model.url));

    let class = model.methods.iter().cloned().fold(
        ClassDef::new(&model.name).with_doc(format!("Page object for {}.", model.url)),
        ClassDef::with_method,
    );
    module.class(class);

    module.render()
}

fn init_method() -> FunctionDef {
    FunctionDef::new("__init__")
        .with_param("self")
        .with_param("page: Page")
        .with_returns("None")
        .with_doc("Initialize the page object.")
        .with_line("self.page = page")
}

fn navigate_method() -> FunctionDef {
    FunctionDef::new("navigate")
        .with_param("self")
        .with_returns("None")
        .with_doc("Navigate to the page.")
        .with_line("self.page.goto(PAGE_URL)")
        .with_line("self.page.wait_for_load_state(\"domcontentloaded\")")
}

fn getter_method(locator: &ElementLocator) -> FunctionDef {
    FunctionDef::new(format!("get_{}", locator.name))
        .with_param("self")
        .with_returns("Locator")
        .with_doc(format!("Get the {} element.", locator.name))
        .with_line(format!("return self.page.locator({})", py_string(&locator.selector)))
}

/// `fill_{form}` for a form with at least one input and a submit button.
fn fill_method(form: &FormLocators) -> Option<FunctionDef> {
    let submit = form.submit()?;
    let fills: Vec<Stmt> = form
        .inputs()
        .map(|input| {
            Stmt::line(format!(
                "self.page.locator({}).fill(data.get({}, \"\"))",
                py_string(&input.selector),
                py_string(&input.name)
            ))
        })
        .collect();
    if fills.is_empty() {
        return None;
    }

    let method = fills.into_iter().fold(
        FunctionDef::new(format!("fill_{}", form.name))
            .with_param("self")
            .with_param("data: dict")
            .with_returns("None")
            .with_doc(format!("Fill and submit {}.", form.name)),
        FunctionDef::with_stmt,
    );
    Some(method.with_line(format!(
        "self.page.locator({}).click()",
        py_string(&submit.selector)
    )))
}
