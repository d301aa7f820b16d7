use std::path::Path;
use std::time::Duration;

use website_test_bot::crawler::CrawlOptions;

pub const ROOT: &str = "https://shop.test/";

pub fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("missing fixture {}: {}", path.display(), e))
}

/// Crawl options suited to the in-process site: no settle delay,
/// artifacts under `output_dir`.
pub fn options(output_dir: &Path) -> CrawlOptions {
    CrawlOptions {
        settle_delay: Duration::ZERO,
        page_timeout: Duration::from_secs(5),
        output_dir: output_dir.to_path_buf(),
        ..CrawlOptions::default()
    }
}
