use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::browser::driver::Viewport;
use crate::crawler::controller::CrawlOptions;
use crate::generator::writer::GeneratorOptions;

/// Config files tried, in order, when `--config` is not given.
pub const DEFAULT_CONFIG_LOCATIONS: &[&str] = &["./bot.yaml", "./bot.yml", "./config/bot.yaml"];

pub const SUPPORTED_BROWSERS: &[&str] = &["chromium", "firefox", "webkit"];

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "website-test-bot",
    version,
    about = "Crawl a website and generate a Playwright regression suite"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: bot.yaml, bot.yml or config/bot.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Browser backend used for crawling
    #[arg(long, value_enum, default_value_t = DriverKind::Playwright, global = true)]
    pub driver: DriverKind,

    /// Node.js browser server script for the playwright backend
    #[arg(long, default_value = "node/browser_server.js", global = true)]
    pub browser_script: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverKind {
    /// Real browser through the Node.js Playwright server
    Playwright,
    /// Plain HTTP fetches, no JavaScript, no screenshots
    Http,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl a website and save the crawl dataset
    Crawl {
        /// URL to start crawling from
        #[arg(long)]
        url: String,

        #[command(flatten)]
        overrides: CrawlOverrides,
    },

    /// Generate a test suite from a fresh crawl or a saved dataset
    Generate {
        /// URL to crawl first
        #[arg(long, required_unless_present = "dataset", conflicts_with = "dataset")]
        url: Option<String>,

        /// Previously saved crawl_data.json
        #[arg(long)]
        dataset: Option<String>,

        /// Output directory for the generated suite
        #[arg(short, long)]
        output_dir: Option<String>,

        /// Browsers the suite runs against (comma separated)
        #[arg(long, value_delimiter = ',')]
        browsers: Vec<String>,

        /// Run generated tests with a visible browser
        #[arg(long)]
        headed: bool,

        #[command(flatten)]
        overrides: CrawlOverrides,
    },
}

/// Crawl settings that can be overridden from the command line.
#[derive(Args, Debug, Clone, Default)]
pub struct CrawlOverrides {
    /// Maximum pages to record
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Maximum link depth
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Pages loaded in parallel
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Skip screenshots while crawling
    #[arg(long)]
    pub no_screenshots: bool,
}

impl CrawlOverrides {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(max_pages) = self.max_pages {
            config.crawler.max_pages = max_pages;
        }
        if let Some(max_depth) = self.max_depth {
            config.crawler.depth = max_depth;
        }
        if let Some(concurrency) = self.concurrency {
            config.crawler.concurrency = concurrency;
        }
        if self.no_screenshots {
            config.crawler.capture_screenshots = false;
        }
    }
}

// ============================================================================
// Config File Model (YAML)
// ============================================================================

/// YAML config file: `bot.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub test: TestConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlerConfig {
    #[serde(default = "default_depth")]
    pub depth: usize,

    #[serde(default = "default_max_pages")]
    pub max_pages: usize,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default = "default_page_timeout_ms")]
    pub page_timeout_ms: u64,

    #[serde(default = "default_wait_after_load_ms")]
    pub wait_after_load_ms: u64,

    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_true")]
    pub capture_screenshots: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            depth: default_depth(),
            max_pages: default_max_pages(),
            concurrency: default_concurrency(),
            page_timeout_ms: default_page_timeout_ms(),
            wait_after_load_ms: default_wait_after_load_ms(),
            exclude_patterns: Vec::new(),
            user_agent: default_user_agent(),
            capture_screenshots: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestConfig {
    #[serde(default = "default_browsers")]
    pub browsers: Vec<String>,

    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default)]
    pub viewport: Viewport,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            browsers: default_browsers(),
            headless: true,
            viewport: Viewport::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Root for crawl artifacts and generated suites
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

// Serde default helpers
fn default_depth() -> usize { 3 }
fn default_max_pages() -> usize { 100 }
fn default_concurrency() -> usize { 2 }
fn default_page_timeout_ms() -> u64 { 30_000 }
fn default_wait_after_load_ms() -> u64 { 1_000 }
fn default_user_agent() -> String { "Mozilla/5.0 Website-Test-Bot".to_string() }
fn default_true() -> bool { true }
fn default_browsers() -> Vec<String> { vec!["chromium".to_string()] }
fn default_output_dir() -> String { "./reports".to_string() }

#[derive(Debug)]
pub enum ConfigError {
    /// Config file exists but could not be read
    Io { path: String, source: std::io::Error },

    /// Config file is not valid YAML for [`AppConfig`]
    Parse { path: String, source: serde_yaml::Error },

    /// A value is out of range
    Invalid { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Failed to read config {}: {}", path, source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "Malformed config {}: {}", path, source)
            }
            ConfigError::Invalid { field, reason } => {
                write!(f, "Invalid config value {}: {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
            ConfigError::Invalid { .. } => None,
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| {
            Err(ConfigError::Invalid {
                field,
                reason: reason.to_string(),
            })
        };

        if self.crawler.max_pages < 1 {
            return invalid("crawler.max_pages", "must be at least 1");
        }
        if self.crawler.concurrency < 1 {
            return invalid("crawler.concurrency", "must be at least 1");
        }
        if self.crawler.page_timeout_ms < 1000 {
            return invalid("crawler.page_timeout_ms", "must be at least 1000");
        }
        if self.test.viewport.width < 320 || self.test.viewport.height < 240 {
            return invalid("test.viewport", "must be at least 320x240");
        }
        if self.test.browsers.is_empty() {
            return invalid("test.browsers", "must name at least one browser");
        }
        if let Some(unknown) = self
            .test
            .browsers
            .iter()
            .find(|b| !SUPPORTED_BROWSERS.contains(&b.as_str()))
        {
            return Err(ConfigError::Invalid {
                field: "test.browsers",
                reason: format!("unsupported browser '{}'", unknown),
            });
        }
        Ok(())
    }

    /// Directory holding crawl artifacts, the dataset and the event log.
    pub fn crawl_dir(&self) -> PathBuf {
        Path::new(&self.report.output_dir).join("crawl")
    }

    pub fn crawl_options(&self) -> CrawlOptions {
        CrawlOptions {
            max_depth: self.crawler.depth,
            max_pages: self.crawler.max_pages,
            concurrency: self.crawler.concurrency,
            page_timeout: Duration::from_millis(self.crawler.page_timeout_ms),
            settle_delay: Duration::from_millis(self.crawler.wait_after_load_ms),
            exclude_patterns: self.crawler.exclude_patterns.clone(),
            user_agent: self.crawler.user_agent.clone(),
            viewport: self.test.viewport,
            capture_screenshots: self.crawler.capture_screenshots,
            output_dir: self.crawl_dir(),
        }
    }

    pub fn generator_options(&self, output_root: PathBuf) -> GeneratorOptions {
        GeneratorOptions {
            output_root,
            browsers: self.test.browsers.clone(),
            viewport: self.test.viewport,
            headless: self.test.headless,
            artifact_dirs: true,
        }
    }
}

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from `path`, or from the first default location that
/// exists. A missing file yields defaults; a malformed one is an error.
pub fn load_config(path: Option<&str>) -> Result<AppConfig, ConfigError> {
    let found = match path {
        Some(p) => Some(p).filter(|p| Path::new(p).exists()),
        None => DEFAULT_CONFIG_LOCATIONS
            .iter()
            .copied()
            .find(|p| Path::new(p).exists()),
    };

    let Some(config_path) = found else {
        return Ok(AppConfig::default());
    };

    let content = std::fs::read_to_string(config_path).map_err(|e| ConfigError::Io {
        path: config_path.to_string(),
        source: e,
    })?;
    parse_config(&content).map_err(|e| ConfigError::Parse {
        path: config_path.to_string(),
        source: e,
    })
}

/// Parse YAML config text. An empty document yields defaults.
pub fn parse_config(content: &str) -> Result<AppConfig, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    serde_yaml::from_str(content)
}
