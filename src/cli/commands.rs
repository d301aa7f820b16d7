use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::browser::driver::BrowserLauncher;
use crate::browser::http::HttpLauncher;
use crate::browser::playwright::PlaywrightLauncher;
use crate::cli::config::{AppConfig, DriverKind};
use crate::crawler::controller::Crawler;
use crate::crawler::models::CrawlDataset;
use crate::crawler::progress::{FanoutProgress, JsonlProgress, TracingProgress};
use crate::generator::models::FileKind;
use crate::generator::writer::generate;

pub const DATASET_FILE: &str = "crawl_data.json";
pub const EVENTS_FILE: &str = "crawl_events.jsonl";

/// Where `generate` gets its dataset from.
#[derive(Debug, Clone)]
pub enum DatasetSource {
    Crawl(String),
    File(PathBuf),
}

pub fn build_launcher(kind: DriverKind, config: &AppConfig, script: &str) -> Arc<dyn BrowserLauncher> {
    match kind {
        DriverKind::Playwright => Arc::new(playwright_launcher(config, script)),
        DriverKind::Http => Arc::new(HttpLauncher),
    }
}

/// The crawl runs in the first configured browser, headed when the suite is.
pub fn playwright_launcher(config: &AppConfig, script: &str) -> PlaywrightLauncher {
    let browser = config
        .test
        .browsers
        .first()
        .map(String::as_str)
        .unwrap_or("chromium");
    PlaywrightLauncher::new(script)
        .with_browser(browser)
        .headless(config.test.headless)
}

// ============================================================================
// crawl subcommand
// ============================================================================

/// Crawl `url`, save the dataset next to the page artifacts and print a
/// summary.
pub async fn cmd_crawl(
    config: &AppConfig,
    launcher: Arc<dyn BrowserLauncher>,
    url: &str,
) -> Result<CrawlDataset, Box<dyn std::error::Error>> {
    let options = config.crawl_options();
    let crawl_dir = options.output_dir.clone();
    std::fs::create_dir_all(&crawl_dir)?;

    let progress = FanoutProgress::new()
        .with(Arc::new(TracingProgress))
        .with(Arc::new(JsonlProgress::new(&crawl_dir.join(EVENTS_FILE))));

    let dataset = Crawler::new(launcher, options)
        .with_progress(Arc::new(progress))
        .crawl(url)
        .await?;

    let dataset_path = crawl_dir.join(DATASET_FILE);
    dataset.save(&dataset_path)?;
    info!(path = %dataset_path.display(), "Saved crawl dataset");

    println!(
        "Crawled {} pages ({} failed, max depth {}), {} forms, {} elements",
        dataset.stats.pages,
        dataset.stats.failed,
        dataset.stats.depth,
        dataset.stats.forms,
        dataset.stats.elements
    );
    for page in dataset.pages.values() {
        let status = if page.has_errors() { "ERR" } else { "OK " };
        println!("  [{}] {} {} ({})", page.depth(), status, page.url(), page.title());
    }
    println!("Dataset: {}", dataset_path.display());

    Ok(dataset)
}

// ============================================================================
// generate subcommand
// ============================================================================

pub async fn cmd_generate(
    config: &AppConfig,
    launcher: Arc<dyn BrowserLauncher>,
    source: DatasetSource,
    output_dir: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let dataset = match source {
        DatasetSource::Crawl(url) => cmd_crawl(config, launcher, &url).await?,
        DatasetSource::File(path) => CrawlDataset::load(&path)?,
    };

    let output_root = match output_dir {
        Some(dir) => dir.to_path_buf(),
        None => default_suite_dir(config, &dataset),
    };

    let files = generate(&dataset, &config.generator_options(output_root.clone()))?;

    let count = |kind: FileKind| files.iter().filter(|f| f.kind == kind).count();
    println!(
        "Generated {} page objects and {} test modules in {}/",
        count(FileKind::PageObject),
        count(FileKind::Test),
        output_root.display()
    );
    Ok(())
}

/// `{report.output_dir}/tests/{crawl end time}`
fn default_suite_dir(config: &AppConfig, dataset: &CrawlDataset) -> PathBuf {
    let stamp = dataset.end_time_ms.unwrap_or(dataset.start_time_ms);
    Path::new(&config.report.output_dir)
        .join("tests")
        .join(stamp.to_string())
}
