pub mod controller;
pub mod error;
pub mod extractor;
pub mod models;
pub mod progress;
pub mod url_filter;

pub use controller::{CrawlOptions, Crawler};
pub use error::{CrawlError, ModelError};
pub use models::{CrawlDataset, CrawlStats, ElementRecord, FormMethod, FormRecord, PageRecord};
pub use progress::{CrawlProgress, FanoutProgress, JsonlProgress, NoProgress, TracingProgress};
