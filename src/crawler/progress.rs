use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{info, warn};

use crate::crawler::models::{now_ms, CrawlDataset};

/// Observer of crawl progress. Called only from the controller's merge
/// loop, never from worker threads. Every hook defaults to a no-op.
pub trait CrawlProgress: Send + Sync {
    fn crawl_started(&self, _root: &str) {}

    fn batch_started(&self, _batch: usize, _urls: &[String]) {}

    fn page_finished(&self, _url: &str, _depth: usize, _error: Option<&str>) {}

    fn batch_finished(&self, _batch: usize, _pages: usize, _frontier: usize) {}

    fn crawl_finished(&self, _dataset: &CrawlDataset) {}
}

/// Reports nothing.
#[derive(Debug, Default)]
pub struct NoProgress;

impl CrawlProgress for NoProgress {}

// ============================================================================
// tracing
// ============================================================================

/// Reports progress as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingProgress;

impl CrawlProgress for TracingProgress {
    fn crawl_started(&self, root: &str) {
        info!(root, "Crawl started");
    }

    fn batch_started(&self, batch: usize, urls: &[String]) {
        info!(batch, size = urls.len(), "Batch started");
    }

    fn page_finished(&self, url: &str, depth: usize, error: Option<&str>) {
        match error {
            Some(error) => warn!(url, depth, error, "Page failed"),
            None => info!(url, depth, "Page crawled"),
        }
    }

    fn batch_finished(&self, batch: usize, pages: usize, frontier: usize) {
        info!(batch, pages, frontier, "Batch finished");
    }

    fn crawl_finished(&self, dataset: &CrawlDataset) {
        info!(
            pages = dataset.stats.pages,
            failed = dataset.stats.failed,
            depth = dataset.stats.depth,
            "Crawl finished"
        );
    }
}

// ============================================================================
// JSON lines
// ============================================================================

/// One line of the progress log.
#[derive(Debug, Serialize)]
pub struct CrawlEvent {
    pub timestamp_ms: u64,
    pub event: &'static str,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frontier: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CrawlEvent {
    pub fn now(event: &'static str) -> Self {
        Self {
            timestamp_ms: now_ms(),
            event,
            url: None,
            batch: None,
            depth: None,
            size: None,
            pages: None,
            frontier: None,
            error: None,
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = Some(batch);
        self
    }

    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Number of URLs in a batch.
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_counts(mut self, pages: usize, frontier: usize) -> Self {
        self.pages = Some(pages);
        self.frontier = Some(frontier);
        self
    }

    pub fn with_error(mut self, error: Option<&str>) -> Self {
        self.error = error.map(str::to_string);
        self
    }
}

/// Appends one JSON [`CrawlEvent`] per line to a file. Write failures are
/// logged and otherwise ignored.
pub struct JsonlProgress {
    file: Option<Mutex<File>>,
}

impl JsonlProgress {
    pub fn new(path: &Path) -> Self {
        let file = OpenOptions::new().create(true).append(true).open(path);

        match file {
            Ok(f) => Self {
                file: Some(Mutex::new(f)),
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not open progress log");
                Self { file: None }
            }
        }
    }

    pub fn log(&self, event: &CrawlEvent) {
        let Some(file_mutex) = &self.file else {
            return;
        };

        let json = match serde_json::to_string(event) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "Failed to serialize progress event");
                return;
            }
        };

        let mut file = match file_mutex.lock() {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "Progress log lock poisoned");
                return;
            }
        };

        if let Err(e) = writeln!(file, "{}", json) {
            warn!(error = %e, "Failed to write progress event");
        }
    }
}

impl CrawlProgress for JsonlProgress {
    fn crawl_started(&self, root: &str) {
        self.log(&CrawlEvent::now("crawl_started").with_url(root));
    }

    fn batch_started(&self, batch: usize, urls: &[String]) {
        self.log(
            &CrawlEvent::now("batch_started")
                .with_batch(batch)
                .with_size(urls.len()),
        );
    }

    fn page_finished(&self, url: &str, depth: usize, error: Option<&str>) {
        self.log(
            &CrawlEvent::now("page_finished")
                .with_url(url)
                .with_depth(depth)
                .with_error(error),
        );
    }

    fn batch_finished(&self, batch: usize, pages: usize, frontier: usize) {
        self.log(
            &CrawlEvent::now("batch_finished")
                .with_batch(batch)
                .with_counts(pages, frontier),
        );
    }

    fn crawl_finished(&self, dataset: &CrawlDataset) {
        self.log(
            &CrawlEvent::now("crawl_finished")
                .with_url(&dataset.base_url)
                .with_depth(dataset.max_depth_reached)
                .with_counts(dataset.stats.pages, 0),
        );
    }
}

// ============================================================================
// Fan-out
// ============================================================================

/// Forwards every hook to each inner reporter in order.
#[derive(Default)]
pub struct FanoutProgress {
    reporters: Vec<Arc<dyn CrawlProgress>>,
}

impl FanoutProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reporter: Arc<dyn CrawlProgress>) -> Self {
        self.reporters.push(reporter);
        self
    }
}

impl CrawlProgress for FanoutProgress {
    fn crawl_started(&self, root: &str) {
        self.reporters.iter().for_each(|r| r.crawl_started(root));
    }

    fn batch_started(&self, batch: usize, urls: &[String]) {
        self.reporters.iter().for_each(|r| r.batch_started(batch, urls));
    }

    fn page_finished(&self, url: &str, depth: usize, error: Option<&str>) {
        self.reporters
            .iter()
            .for_each(|r| r.page_finished(url, depth, error));
    }

    fn batch_finished(&self, batch: usize, pages: usize, frontier: usize) {
        self.reporters
            .iter()
            .for_each(|r| r.batch_finished(batch, pages, frontier));
    }

    fn crawl_finished(&self, dataset: &CrawlDataset) {
        self.reporters.iter().for_each(|r| r.crawl_finished(dataset));
    }
}
