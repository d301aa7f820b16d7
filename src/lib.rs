//! Crawls a website and compiles what it finds into a pytest + Playwright
//! regression suite.
//!
//! - [`crawler`] walks same-origin links in parallel batches and records
//!   pages, forms and interactive elements.
//! - [`browser`] is the automation collaborator the crawler drives.
//! - [`generator`] turns a crawl dataset into page objects and tests.

pub mod browser;
pub mod cli;
pub mod crawler;
pub mod generator;
