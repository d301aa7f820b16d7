use std::sync::Arc;
use std::time::Duration;

use website_test_bot::crawler::{CrawlError, CrawlOptions, Crawler, CrawlDataset};

use crate::common::{
    site::{BrokenLauncher, Counters, StaticSite},
    utils::{options, ROOT},
};

mod common;

async fn crawl(site: &StaticSite, options: CrawlOptions) -> CrawlDataset {
    Crawler::new(Arc::new(site.clone()), options)
        .crawl(ROOT)
        .await
        .expect("crawl succeeds")
}

// ============================================================================
// Traversal
// ============================================================================

#[tokio::test]
async fn root_with_one_link_yields_two_pages() {
    let dir = tempfile::tempdir().unwrap();
    let site = StaticSite::new()
        .page(ROOT, r#"<html><head><title>Root</title></head><body><a href="/next">Next</a></body></html>"#)
        .page(
            "https://shop.test/next",
            r#"<html><head><title>Next</title></head><body><a href="/deeper">Deeper</a></body></html>"#,
        );

    let dataset = crawl(
        &site,
        CrawlOptions {
            max_depth: 1,
            max_pages: 10,
            ..options(dir.path())
        },
    )
    .await;

    assert_eq!(dataset.page_count(), 2);
    assert_eq!(dataset.page(ROOT).unwrap().depth(), 0);
    let next = dataset.page("https://shop.test/next").unwrap();
    assert_eq!(next.depth(), 1);
    assert_eq!(next.parent_url(), Some(ROOT));
    assert!(!dataset.visited_urls.contains("https://shop.test/deeper"));
    assert_eq!(dataset.max_depth_reached, 1);
}

#[tokio::test]
async fn shop_crawl_follows_same_origin_html_links() {
    let dir = tempfile::tempdir().unwrap();
    let site = StaticSite::shop();

    let dataset = crawl(
        &site,
        CrawlOptions {
            exclude_patterns: vec!["/admin".into()],
            ..options(dir.path())
        },
    )
    .await;

    let urls: Vec<&str> = dataset.pages.keys().map(String::as_str).collect();
    assert_eq!(
        urls,
        vec![
            "https://shop.test/",
            "https://shop.test/about",
            "https://shop.test/contact",
            "https://shop.test/missing",
            "https://shop.test/team",
        ]
    );
    assert!(!dataset.visited_urls.contains("https://shop.test/admin/settings"));
    assert!(!dataset.visited_urls.contains("https://shop.test/files/catalog.pdf"));
    assert_eq!(dataset.max_depth_reached, 2);
    assert_eq!(dataset.page("https://shop.test/team").unwrap().depth(), 2);
    assert!(dataset.validate().is_ok());
}

#[tokio::test]
async fn every_child_is_one_deeper_than_its_parent() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = crawl(&StaticSite::shop(), options(dir.path())).await;

    for page in dataset.pages.values() {
        match page.parent_url() {
            None => assert_eq!(page.depth(), 0, "{} has no parent", page.url()),
            Some(parent) => {
                let parent = dataset.page(parent).expect("parent recorded");
                assert_eq!(page.depth(), parent.depth() + 1, "{}", page.url());
            }
        }
    }
}

#[tokio::test]
async fn page_budget_caps_recorded_pages() {
    let dir = tempfile::tempdir().unwrap();
    let links: String = (0..8).map(|i| format!(r#"<a href="/p{}">P{}</a>"#, i, i)).collect();
    let mut site = StaticSite::new().page(ROOT, &format!("<html><body>{}</body></html>", links));
    for i in 0..8 {
        site = site.page(&format!("https://shop.test/p{}", i), "<html><body></body></html>");
    }

    let dataset = crawl(
        &site,
        CrawlOptions {
            max_pages: 3,
            concurrency: 2,
            ..options(dir.path())
        },
    )
    .await;

    assert_eq!(dataset.page_count(), 3);
    assert_eq!(dataset.stats.pages, 3);
    assert_eq!(Counters::get(&site.counters().opened), 3);
}

#[tokio::test]
async fn fragments_and_repeats_are_crawled_once() {
    let dir = tempfile::tempdir().unwrap();
    let site = StaticSite::shop();

    let dataset = crawl(&site, options(dir.path())).await;

    // home links /contact twice, about and contact link back to visited pages
    assert_eq!(
        Counters::get(&site.counters().opened),
        dataset.visited_urls.len()
    );
    assert_eq!(dataset.visited_urls.len(), dataset.page_count());
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test]
async fn unreachable_page_is_recorded_as_failed_and_not_expanded() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = crawl(
        &StaticSite::shop(),
        CrawlOptions {
            exclude_patterns: vec!["/admin".into()],
            ..options(dir.path())
        },
    )
    .await;

    let missing = dataset.page("https://shop.test/missing").unwrap();
    assert!(missing.has_errors());
    assert!(missing.error_message().unwrap().contains("ERR_NAME_NOT_RESOLVED"));
    assert!(missing.links().is_empty());
    assert!(dataset.failed_urls.contains_key("https://shop.test/missing"));
    assert_eq!(dataset.stats.failed, 1);
}

#[tokio::test]
async fn page_over_its_deadline_is_failed_and_not_expanded() {
    let dir = tempfile::tempdir().unwrap();
    let site = StaticSite::new()
        .page(ROOT, r#"<html><body><a href="/next">Next</a></body></html>"#)
        .with_delay(Duration::from_millis(300));
    let counters = site.counters();

    // deadline is 2 * 20 ms, well under the navigation delay
    let dataset = crawl(
        &site,
        CrawlOptions {
            page_timeout: Duration::from_millis(20),
            ..options(dir.path())
        },
    )
    .await;

    let root = dataset.page(ROOT).unwrap();
    assert!(root.has_errors());
    assert!(root.error_message().unwrap().contains("deadline of 40 ms"));
    assert!(root.links().is_empty());
    assert!(dataset.failed_urls.contains_key(ROOT));
    assert!(!dataset.visited_urls.contains("https://shop.test/next"));
    assert_eq!(dataset.page_count(), 1);

    // the abandoned load still finishes and gives its session back
    for _ in 0..100 {
        if Counters::get(&counters.released) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(Counters::get(&counters.opened), 1);
    assert_eq!(Counters::get(&counters.released), 1);
}

#[tokio::test]
async fn panicking_task_fails_only_its_url() {
    let dir = tempfile::tempdir().unwrap();
    let site = StaticSite::shop().panic_on("https://shop.test/about");

    let dataset = crawl(&site, options(dir.path())).await;

    assert!(dataset.visited_urls.contains("https://shop.test/about"));
    assert!(dataset.failed_urls.contains_key("https://shop.test/about"));
    assert!(!dataset.has_page("https://shop.test/about"));
    // team is only reachable through about
    assert!(!dataset.has_page("https://shop.test/team"));
    assert!(dataset.has_page("https://shop.test/contact"));
}

#[tokio::test]
async fn launch_failure_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let result = Crawler::new(Arc::new(BrokenLauncher), options(dir.path()))
        .crawl(ROOT)
        .await;

    assert!(matches!(result, Err(CrawlError::Launch(_))));
}

#[tokio::test]
async fn bad_input_fails_before_launch() {
    let dir = tempfile::tempdir().unwrap();
    let site = StaticSite::shop();

    let bad_pattern = Crawler::new(
        Arc::new(site.clone()),
        CrawlOptions {
            exclude_patterns: vec!["([".into()],
            ..options(dir.path())
        },
    )
    .crawl(ROOT)
    .await;
    assert!(matches!(bad_pattern, Err(CrawlError::InvalidPattern { .. })));

    let bad_url = Crawler::new(Arc::new(site.clone()), options(dir.path()))
        .crawl("not a url")
        .await;
    assert!(matches!(bad_url, Err(CrawlError::InvalidUrl { .. })));

    assert_eq!(Counters::get(&site.counters().launches), 0);
}

// ============================================================================
// Resources
// ============================================================================

#[tokio::test]
async fn sessions_are_released_and_parallelism_is_bounded() {
    let dir = tempfile::tempdir().unwrap();
    let links: String = (0..6).map(|i| format!(r#"<a href="/p{}">P{}</a>"#, i, i)).collect();
    let mut site = StaticSite::new()
        .page(ROOT, &format!("<html><body>{}</body></html>", links))
        .with_delay(Duration::from_millis(30));
    for i in 0..6 {
        site = site.page(&format!("https://shop.test/p{}", i), "<html><body></body></html>");
    }

    let dataset = crawl(
        &site,
        CrawlOptions {
            concurrency: 3,
            ..options(dir.path())
        },
    )
    .await;

    let counters = site.counters();
    assert_eq!(dataset.page_count(), 7);
    assert_eq!(Counters::get(&counters.opened), 7);
    assert_eq!(Counters::get(&counters.released), 7);
    assert_eq!(Counters::get(&counters.active), 0);
    assert!(Counters::get(&counters.peak) <= 3);
    assert!(Counters::get(&counters.closed) >= 1);
}

#[tokio::test]
async fn page_source_is_saved_per_page() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = crawl(&StaticSite::shop(), options(dir.path())).await;

    let home = dataset.page(ROOT).unwrap();
    let html_path = home.html_path().expect("html saved");
    assert!(html_path.starts_with(dir.path()));
    assert!(std::fs::read_to_string(html_path).unwrap().contains("Shop Home"));
    // the static backend renders no pixels
    assert!(home.screenshot_path().is_none());
}

#[tokio::test]
async fn dataset_survives_save_and_load() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = crawl(&StaticSite::shop(), options(dir.path())).await;

    let path = dir.path().join("crawl_data.json");
    dataset.save(&path).unwrap();
    let loaded = CrawlDataset::load(&path).unwrap();

    assert_eq!(loaded.pages, dataset.pages);
    assert_eq!(loaded.visited_urls, dataset.visited_urls);
    assert_eq!(loaded.stats, dataset.stats);
    assert!(loaded.end_time_ms.is_some());
}
