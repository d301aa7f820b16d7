use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::browser::driver::Viewport;
use crate::crawler::models::CrawlDataset;
use crate::generator::error::GenerateError;
use crate::generator::models::{FileKind, GeneratedFile, PageObjectModel};
use crate::generator::naming::{page_object_name, sanitize_name};
use crate::generator::page_object::{build_page_object, is_eligible, render_page_object};
use crate::generator::source::{py_string, FunctionDef, SourceModule, Stmt};
use crate::generator::test_case::{build_test, render_test};

const ARTIFACT_DIRS: &[&str] = &["screenshots", "videos", "traces", "reports"];

/// Where and for which browsers the suite is generated.
#[derive(Debug, Clone)]
pub struct GeneratorOptions {
    pub output_root: PathBuf,
    pub browsers: Vec<String>,
    pub viewport: Viewport,
    pub headless: bool,

    /// Also create `screenshots/ videos/ traces/ reports/`
    pub artifact_dirs: bool,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("output/tests"),
            browsers: vec!["chromium".to_string()],
            viewport: Viewport::default(),
            headless: true,
            artifact_dirs: true,
        }
    }
}

/// Page objects for every eligible page, in dataset URL order.
///
/// Two pages that would share a class name are told apart with a numeric
/// suffix before `Page` (`ContactUsPage`, `ContactUs2Page`). The suffix
/// grows until neither the class nor its module file is taken.
pub fn build_page_objects(dataset: &CrawlDataset) -> Vec<PageObjectModel> {
    let mut taken: HashSet<String> = HashSet::new();

    dataset
        .pages
        .values()
        .filter(|page| is_eligible(page))
        .map(|page| {
            let base = page_object_name(page);
            let stem = base.strip_suffix("Page").unwrap_or(&base).to_string();
            let mut name = base;
            let mut n = 2;
            while !taken.insert(sanitize_name(&name)) {
                name = format!("{}{}Page", stem, n);
                n += 1;
            }
            build_page_object(page, &name)
        })
        .collect()
}

/// Every file of the suite, fully rendered. Touches nothing on disk.
pub fn build_files(dataset: &CrawlDataset, options: &GeneratorOptions) -> Vec<GeneratedFile> {
    let root = &options.output_root;
    let page_objects = build_page_objects(dataset);
    let mut files = Vec::new();

    for page_object in &page_objects {
        files.push(GeneratedFile {
            path: root.join("page_objects").join(&page_object.file_name),
            content: render_page_object(page_object),
            kind: FileKind::PageObject,
        });
    }

    for page_object in &page_objects {
        let test = build_test(page_object);
        if test.test_cases.is_empty() {
            debug!(page_object = %page_object.name, "No test cases, skipping test file");
            continue;
        }
        files.push(GeneratedFile {
            path: root.join("tests").join(&test.file_name),
            content: render_test(&test),
            kind: FileKind::Test,
        });
    }

    files.push(GeneratedFile {
        path: root.join("tests").join("conftest.py"),
        content: conftest(options),
        kind: FileKind::Fixture,
    });

    for dir in [root.clone(), root.join("page_objects"), root.join("tests")] {
        files.push(GeneratedFile {
            path: dir.join("__init__.py"),
            content: "\"\"\"Generated test files.\"\"\"\n".to_string(),
            kind: FileKind::Marker,
        });
    }

    files
}

/// Build the suite in memory, then write it under `options.output_root`.
pub fn generate(
    dataset: &CrawlDataset,
    options: &GeneratorOptions,
) -> Result<Vec<GeneratedFile>, GenerateError> {
    let files = build_files(dataset, options);

    if options.artifact_dirs {
        for dir in ARTIFACT_DIRS {
            create_dir(&options.output_root.join(dir))?;
        }
    }

    for file in &files {
        if let Some(parent) = file.path.parent() {
            create_dir(parent)?;
        }
        std::fs::write(&file.path, &file.content).map_err(|e| GenerateError::Io {
            path: file.path.display().to_string(),
            source: e,
        })?;
    }

    info!(
        files = files.len(),
        output = %options.output_root.display(),
        "Generated test suite"
    );
    Ok(files)
}

fn create_dir(path: &Path) -> Result<(), GenerateError> {
    std::fs::create_dir_all(path).map_err(|e| GenerateError::Io {
        path: path.display().to_string(),
        source: e,
    })
}

// ============================================================================
// conftest.py
// ============================================================================

fn conftest(options: &GeneratorOptions) -> String {
    let mut module = SourceModule::new("Pytest configuration for the generated suite.");
    module.import("import os");
    module.import("import sys");
    module.import("import pytest");

    let browsers: Vec<String> = options.browsers.iter().map(|b| py_string(b)).collect();
    module.constant(
        "OUTPUT_DIR",
        "os.path.dirname(os.path.dirname(os.path.abspath(__file__)))",
    );
    module.constant("BROWSERS", format!("[{}]", browsers.join(", ")));
    module.constant(
        "VIEWPORT",
        format!(
            "{{\"width\": {}, \"height\": {}}}",
            options.viewport.width, options.viewport.height
        ),
    );
    module.constant("HEADLESS", if options.headless { "True" } else { "False" });

    module.function(
        FunctionDef::new("pytest_configure")
            .with_param("config")
            .with_doc("Make the page_objects package importable.")
            .with_stmt(Stmt::block(
                "if OUTPUT_DIR not in sys.path",
                vec![Stmt::line("sys.path.insert(0, OUTPUT_DIR)")],
            )),
    );

    module.function(
        FunctionDef::new("browser_name")
            .with_decorator("pytest.fixture(scope=\"session\", params=BROWSERS)")
            .with_param("request")
            .with_returns("str")
            .with_doc("Run every test once per configured browser.")
            .with_line("return request.param"),
    );

    module.function(
        FunctionDef::new("browser_type_launch_args")
            .with_decorator("pytest.fixture(scope=\"session\")")
            .with_param("browser_type_launch_args")
            .with_returns("dict")
            .with_doc("Browser launch options.")
            .with_line("return {**browser_type_launch_args, \"headless\": HEADLESS}"),
    );

    module.function(
        FunctionDef::new("browser_context_args")
            .with_decorator("pytest.fixture(scope=\"session\")")
            .with_param("browser_context_args")
            .with_returns("dict")
            .with_doc("Viewport and video recording for every context.")
            .with_line(
                "return {\n    **browser_context_args,\n    \"viewport\": VIEWPORT,\n    \"record_video_dir\": os.path.join(OUTPUT_DIR, \"videos\"),\n}",
            ),
    );

    module.function(
        FunctionDef::new("pytest_runtest_makereport")
            .with_decorator("pytest.hookimpl(hookwrapper=True)")
            .with_param("item")
            .with_param("call")
            .with_doc("Save a full-page screenshot when a test body fails.")
            .with_line("outcome = yield")
            .with_line("report = outcome.get_result()")
            .with_stmt(Stmt::block(
                "if report.when == \"call\" and report.failed",
                vec![
                    Stmt::line("page = item.funcargs.get(\"page\")"),
                    Stmt::block(
                        "if page is not None",
                        vec![
                            Stmt::line("screenshot_dir = os.path.join(OUTPUT_DIR, \"screenshots\")"),
                            Stmt::line("os.makedirs(screenshot_dir, exist_ok=True)"),
                            Stmt::line("name = item.nodeid.replace(\"/\", \"_\").replace(\"::\", \"_\")"),
                            Stmt::line(
                                "page.screenshot(path=os.path.join(screenshot_dir, f\"{name}.png\"), full_page=True)",
                            ),
                        ],
                    ),
                ],
            )),
    );

    module.render()
}
