//! Compiles a crawl dataset into a pytest + Playwright suite: one page
//! object module and one test module per page, plus shared fixtures.

pub mod error;
pub mod models;
pub mod naming;
pub mod page_object;
pub mod source;
pub mod test_case;
pub mod writer;

pub use error::GenerateError;
pub use models::{
    ElementLocator, FileKind, GeneratedFile, GeneratedTestModel, LocatorMap, PageObjectModel,
    TestCaseKind,
};
pub use writer::{build_files, build_page_objects, generate, GeneratorOptions};
