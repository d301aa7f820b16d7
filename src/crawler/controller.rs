use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use regex::Regex;
use tracing::{debug, info, warn};
use url::Url;

use crate::browser::driver::{BrowserDriver, BrowserLauncher, SessionOptions, Viewport};
use crate::browser::error::BrowserError;
use crate::crawler::error::CrawlError;
use crate::crawler::extractor::{capture_artifacts, extract};
use crate::crawler::models::{CrawlDataset, PageRecord};
use crate::crawler::progress::{CrawlProgress, NoProgress};
use crate::crawler::url_filter::{canonicalize, page_dir_key, UrlFilter};

/// Crawl limits and per-page browser settings.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Links are followed while `depth + 1 <= max_depth`
    pub max_depth: usize,

    /// Upper bound on recorded pages
    pub max_pages: usize,

    /// Pages loaded in parallel per batch
    pub concurrency: usize,

    pub page_timeout: Duration,

    /// Pause after the DOM is ready, before anything is read
    pub settle_delay: Duration,

    /// Regexes; a link matching any of them is never followed
    pub exclude_patterns: Vec<String>,

    pub user_agent: String,
    pub viewport: Viewport,
    pub capture_screenshots: bool,

    /// Root of the per-page artifact directories
    pub output_dir: PathBuf,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_pages: 100,
            concurrency: 2,
            page_timeout: Duration::from_millis(30_000),
            settle_delay: Duration::from_millis(1_000),
            exclude_patterns: Vec::new(),
            user_agent: "Mozilla/5.0 Website-Test-Bot".to_string(),
            viewport: Viewport::default(),
            capture_screenshots: true,
            output_dir: PathBuf::from("output/crawl"),
        }
    }
}

impl CrawlOptions {
    /// Hard deadline for one page task, on top of the browser's own timeouts.
    ///
    /// A blocking worker cannot be cancelled. A task past its deadline is
    /// recorded as an errored page and left detached; it keeps its session
    /// until the load returns, possibly after the crawl has finished and the
    /// driver was closed. Its result is discarded.
    fn task_deadline(&self) -> Duration {
        self.page_timeout * 2 + self.settle_delay
    }
}

// ============================================================================
// Frontier
// ============================================================================

#[derive(Debug, Clone)]
struct FrontierEntry {
    url: Url,
    depth: usize,
    parent: Option<String>,
}

impl FrontierEntry {
    fn key(&self) -> String {
        self.url.to_string()
    }
}

/// FIFO queue of URLs waiting to be crawled. A URL is never queued twice.
#[derive(Debug, Default)]
struct Frontier {
    queue: VecDeque<FrontierEntry>,
    pending: HashSet<String>,
}

impl Frontier {
    fn push(&mut self, entry: FrontierEntry) -> bool {
        if !self.pending.insert(entry.key()) {
            return false;
        }
        self.queue.push_back(entry);
        true
    }

    fn pop_batch(&mut self, size: usize) -> Vec<FrontierEntry> {
        let take = size.min(self.queue.len());
        let batch: Vec<FrontierEntry> = self.queue.drain(..take).collect();
        for entry in &batch {
            self.pending.remove(&entry.key());
        }
        batch
    }

    fn contains(&self, url: &str) -> bool {
        self.pending.contains(url)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }

    fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

// ============================================================================
// Crawler
// ============================================================================

/// Result of one page task.
enum Outcome {
    Page(PageRecord),

    /// The task died without producing a record
    Lost { url: String, depth: usize, message: String },
}

/// Closes the driver on every exit path.
struct DriverGuard {
    driver: Arc<dyn BrowserDriver>,
    closed: bool,
}

impl DriverGuard {
    async fn close(mut self) {
        self.closed = true;
        let driver = Arc::clone(&self.driver);
        match tokio::task::spawn_blocking(move || driver.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Failed to close browser"),
            Err(e) => warn!(error = %e, "Browser close task failed"),
        }
    }
}

impl Drop for DriverGuard {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.driver.close() {
                warn!(error = %e, "Failed to close browser");
            }
        }
    }
}

/// Breadth-first, batch-parallel site crawler.
pub struct Crawler {
    launcher: Arc<dyn BrowserLauncher>,
    options: Arc<CrawlOptions>,
    progress: Arc<dyn CrawlProgress>,
}

impl Crawler {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, options: CrawlOptions) -> Self {
        Self {
            launcher,
            options: Arc::new(options),
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn CrawlProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    /// Crawl the site reachable from `root_url`.
    ///
    /// Only invalid input, a failed browser launch or an unwritable output
    /// directory fail the crawl. Page-level failures end up in the dataset.
    pub async fn crawl(&self, root_url: &str) -> Result<CrawlDataset, CrawlError> {
        let filter = compile_filter(&self.options.exclude_patterns)?;
        let root = canonicalize(root_url, None)
            .and_then(|canonical| Url::parse(&canonical))
            .map_err(|source| CrawlError::InvalidUrl {
                url: root_url.to_string(),
                source,
            })?;

        std::fs::create_dir_all(&self.options.output_dir).map_err(|e| CrawlError::Io {
            path: self.options.output_dir.display().to_string(),
            source: e,
        })?;

        let launcher = Arc::clone(&self.launcher);
        let driver = tokio::task::spawn_blocking(move || launcher.launch())
            .await
            .map_err(|e| CrawlError::Launch(BrowserError::SessionIO(e.to_string())))?
            .map_err(CrawlError::Launch)?;
        let guard = DriverGuard {
            driver: Arc::clone(&driver),
            closed: false,
        };

        let mut dataset = CrawlDataset::new(root.as_str(), self.options.output_dir.clone());
        let mut frontier = Frontier::default();
        frontier.push(FrontierEntry {
            url: root.clone(),
            depth: 0,
            parent: None,
        });

        info!(root = %root, max_depth = self.options.max_depth, max_pages = self.options.max_pages, "Starting crawl");
        self.progress.crawl_started(root.as_str());

        let concurrency = self.options.concurrency.max(1);
        let mut batch_no = 0;

        while !frontier.is_empty() && dataset.page_count() < self.options.max_pages {
            batch_no += 1;
            let budget = self.options.max_pages - dataset.page_count();
            let batch = frontier.pop_batch(concurrency.min(budget));
            let urls: Vec<String> = batch.iter().map(FrontierEntry::key).collect();
            self.progress.batch_started(batch_no, &urls);

            let outcomes = self.run_batch(&driver, batch).await;

            // In-flight URLs of this batch count as visited before any link
            // from it is admitted.
            dataset.visited_urls.extend(urls);

            for outcome in outcomes {
                self.merge(&mut dataset, &mut frontier, &filter, outcome);
            }

            self.progress
                .batch_finished(batch_no, dataset.page_count(), frontier.len());
        }

        dataset.finish();
        guard.close().await;

        info!(
            pages = dataset.stats.pages,
            failed = dataset.stats.failed,
            depth = dataset.stats.depth,
            "Crawl complete"
        );
        self.progress.crawl_finished(&dataset);

        Ok(dataset)
    }

    /// Load every entry on its own blocking worker and wait for all of them.
    async fn run_batch(&self, driver: &Arc<dyn BrowserDriver>, batch: Vec<FrontierEntry>) -> Vec<Outcome> {
        let deadline = self.options.task_deadline();

        let tasks = batch.into_iter().map(|entry| {
            let driver = Arc::clone(driver);
            let options = Arc::clone(&self.options);
            let url = entry.key();
            let depth = entry.depth;
            let parent = entry.parent.clone();

            async move {
                let task = tokio::task::spawn_blocking(move || crawl_page(driver.as_ref(), &options, entry));
                match tokio::time::timeout(deadline, task).await {
                    Ok(Ok(page)) => Outcome::Page(page),
                    Ok(Err(e)) => Outcome::Lost {
                        url,
                        depth,
                        message: format!("Crawl task failed: {}", e),
                    },
                    Err(_) => Outcome::Page(PageRecord::attempt(url, depth, parent).with_error(format!(
                        "Page task exceeded its deadline of {} ms",
                        deadline.as_millis()
                    ))),
                }
            }
        });

        join_all(tasks).await
    }

    /// Fold one outcome into the dataset. Runs on the single merge path.
    fn merge(
        &self,
        dataset: &mut CrawlDataset,
        frontier: &mut Frontier,
        filter: &UrlFilter,
        outcome: Outcome,
    ) {
        let page = match outcome {
            Outcome::Page(page) => page,
            Outcome::Lost { url, depth, message } => {
                warn!(url = %url, error = %message, "Page task lost");
                self.progress.page_finished(&url, depth, Some(&message));
                dataset.record_lost(&url, message);
                return;
            }
        };

        self.progress
            .page_finished(page.url(), page.depth(), page.error_message());

        if page.has_errors() {
            warn!(url = %page.url(), error = ?page.error_message(), "Page failed");
            dataset.record_page(page);
            return;
        }

        let parent = page.url().to_string();
        let child_depth = page.depth() + 1;
        let links = page.links().to_vec();

        if !dataset.record_page(page) {
            debug!(url = %parent, "Duplicate page dropped");
            return;
        }
        if child_depth > self.options.max_depth {
            return;
        }

        for link in links {
            if dataset.visited_urls.contains(&link)
                || dataset.failed_urls.contains_key(&link)
                || frontier.contains(&link)
                || !filter.is_admissible(&link)
            {
                continue;
            }
            let Ok(url) = Url::parse(&link) else {
                continue;
            };
            frontier.push(FrontierEntry {
                url,
                depth: child_depth,
                parent: Some(parent.clone()),
            });
        }
    }
}

fn compile_filter(patterns: &[String]) -> Result<UrlFilter, CrawlError> {
    let excludes = patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|source| CrawlError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(UrlFilter::from_regexes(excludes))
}

// ============================================================================
// Page task (runs on a blocking worker)
// ============================================================================

fn crawl_page(driver: &dyn BrowserDriver, options: &CrawlOptions, entry: FrontierEntry) -> PageRecord {
    let mut page = PageRecord::attempt(entry.key(), entry.depth, entry.parent);

    if let Err(e) = visit(driver, options, &entry.url, &mut page) {
        page.mark_failed(e.to_string());
    }

    page
}

/// Load one page in a fresh session and fill in `page`. The session is
/// released when this returns, on success or failure.
fn visit(
    driver: &dyn BrowserDriver,
    options: &CrawlOptions,
    url: &Url,
    page: &mut PageRecord,
) -> Result<(), BrowserError> {
    let mut session = driver.new_session(&SessionOptions {
        viewport: options.viewport,
        user_agent: options.user_agent.clone(),
    })?;

    let navigation = session.goto(url.as_str(), options.page_timeout)?;
    if !options.settle_delay.is_zero() {
        std::thread::sleep(options.settle_delay);
    }

    page.title = session.title()?;
    page.status_code = navigation.status;
    page.content_type = navigation.content_type;

    let page_dir = options
        .output_dir
        .join(format!("page_{}", page_dir_key(url.as_str())));
    let artifacts = capture_artifacts(session.as_mut(), &page_dir, options.capture_screenshots)?;
    page.screenshot_path = artifacts.screenshot;
    page.html_path = artifacts.html;

    let extraction = extract(session.document(), url)?;
    page.forms = extraction.forms;
    page.elements = extraction.elements;
    page.links = extraction.links;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str) -> FrontierEntry {
        FrontierEntry {
            url: Url::parse(url).unwrap(),
            depth: 1,
            parent: Some("https://a.test/".into()),
        }
    }

    #[test]
    fn frontier_never_queues_twice() {
        let mut frontier = Frontier::default();
        assert!(frontier.push(entry("https://a.test/a")));
        assert!(!frontier.push(entry("https://a.test/a")));
        assert_eq!(frontier.len(), 1);
    }

    #[test]
    fn pop_batch_is_fifo_and_clears_pending() {
        let mut frontier = Frontier::default();
        for path in ["a", "b", "c"] {
            frontier.push(entry(&format!("https://a.test/{}", path)));
        }

        let batch = frontier.pop_batch(2);
        let keys: Vec<String> = batch.iter().map(FrontierEntry::key).collect();
        assert_eq!(keys, vec!["https://a.test/a", "https://a.test/b"]);
        assert!(!frontier.contains("https://a.test/a"));
        assert!(frontier.contains("https://a.test/c"));
        assert_eq!(frontier.pop_batch(10).len(), 1);
        assert!(frontier.is_empty());
    }

    #[test]
    fn invalid_exclude_pattern_names_the_pattern() {
        let err = compile_filter(&["ok".into(), "(".into()]).unwrap_err();
        assert!(matches!(err, CrawlError::InvalidPattern { ref pattern, .. } if pattern == "("));
    }
}
