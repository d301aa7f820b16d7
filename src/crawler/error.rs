use std::fmt;

use crate::browser::error::BrowserError;

/// A record violated one of its construction invariants.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A required string field was empty
    EmptyField { record: &'static str, field: &'static str },

    /// A page's depth is not its parent's depth + 1
    DepthMismatch { url: String, depth: usize, parent_depth: usize },

    /// The root page (no parent) is not at depth 0, or a child has no parent
    RootMismatch { url: String, depth: usize },

    /// More pages than the crawl budget allows
    TooManyPages { pages: usize, max_pages: usize },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::EmptyField { record, field } => {
                write!(f, "{}.{} must not be empty", record, field)
            }
            ModelError::DepthMismatch {
                url,
                depth,
                parent_depth,
            } => write!(
                f,
                "{} has depth {} but its parent has depth {}",
                url, depth, parent_depth
            ),
            ModelError::RootMismatch { url, depth } => {
                write!(f, "{} at depth {} has inconsistent parent", url, depth)
            }
            ModelError::TooManyPages { pages, max_pages } => {
                write!(f, "dataset holds {} pages, budget is {}", pages, max_pages)
            }
        }
    }
}

impl std::error::Error for ModelError {}

#[derive(Debug)]
pub enum CrawlError {
    /// Root URL could not be parsed
    InvalidUrl { url: String, source: url::ParseError },

    /// An exclude pattern is not a valid regex
    InvalidPattern { pattern: String, source: regex::Error },

    /// The browser collaborator could not be started
    Launch(BrowserError),

    /// Output directory or dataset file I/O
    Io { path: String, source: std::io::Error },

    /// Dataset (de)serialization
    Dataset { path: String, source: serde_json::Error },

    /// A loaded dataset failed validation
    Model(ModelError),
}

impl fmt::Display for CrawlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrawlError::InvalidUrl { url, source } => {
                write!(f, "Invalid root URL '{}': {}", url, source)
            }
            CrawlError::InvalidPattern { pattern, source } => {
                write!(f, "Invalid exclude pattern '{}': {}", pattern, source)
            }
            CrawlError::Launch(e) => write!(f, "Failed to launch browser: {}", e),
            CrawlError::Io { path, source } => write!(f, "I/O error on {}: {}", path, source),
            CrawlError::Dataset { path, source } => {
                write!(f, "Crawl dataset {} is unreadable: {}", path, source)
            }
            CrawlError::Model(e) => write!(f, "Invalid crawl dataset: {}", e),
        }
    }
}

impl std::error::Error for CrawlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CrawlError::InvalidUrl { source, .. } => Some(source),
            CrawlError::InvalidPattern { source, .. } => Some(source),
            CrawlError::Launch(e) => Some(e),
            CrawlError::Io { source, .. } => Some(source),
            CrawlError::Dataset { source, .. } => Some(source),
            CrawlError::Model(e) => Some(e),
        }
    }
}

impl From<ModelError> for CrawlError {
    fn from(e: ModelError) -> Self {
        CrawlError::Model(e)
    }
}
