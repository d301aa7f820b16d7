use url::Url;
use website_test_bot::crawler::url_filter::{
    canonicalize, is_admissible, is_same_origin, page_dir_key, UrlFilter,
};

const NO_PATTERNS: &[&str] = &[];

#[test]
fn canonicalize_is_idempotent() {
    for raw in [
        "https://shop.test",
        "https://shop.test/a/../b?q=1#top",
        "HTTPS://Shop.Test:443/x",
        "http://shop.test/path;params?x=y",
    ] {
        let once = canonicalize(raw, None).unwrap();
        assert_eq!(canonicalize(&once, None).unwrap(), once, "{}", raw);
    }
}

#[test]
fn urls_differing_only_by_fragment_are_equal() {
    let a = canonicalize("https://shop.test/about#team", None).unwrap();
    let b = canonicalize("https://shop.test/about#history", None).unwrap();
    let c = canonicalize("https://shop.test/about", None).unwrap();
    assert_eq!(a, b);
    assert_eq!(a, c);
}

#[test]
fn canonicalize_keeps_query_and_resolves_relative() {
    let base = Url::parse("https://shop.test/catalog/").unwrap();
    assert_eq!(
        canonicalize("item?id=3#reviews", Some(&base)).unwrap(),
        "https://shop.test/catalog/item?id=3"
    );
    assert_eq!(
        canonicalize("  /help  ", Some(&base)).unwrap(),
        "https://shop.test/help"
    );
    assert!(canonicalize("not a url", None).is_err());
}

#[test]
fn origin_includes_scheme_and_port() {
    let site = Url::parse("https://shop.test/").unwrap();
    assert!(is_same_origin(&site, &Url::parse("https://shop.test:443/x").unwrap()));
    assert!(!is_same_origin(&site, &Url::parse("http://shop.test/x").unwrap()));
    assert!(!is_same_origin(&site, &Url::parse("https://shop.test:8443/x").unwrap()));
    assert!(!is_same_origin(&site, &Url::parse("https://cdn.shop.test/x").unwrap()));
}

#[test]
fn asset_extensions_are_rejected() {
    for url in [
        "https://shop.test/brochure.pdf",
        "https://shop.test/img/logo.PNG",
        "https://shop.test/a.jpeg",
        "https://shop.test/icon.svg",
        "https://shop.test/site.css",
        "https://shop.test/app.js",
    ] {
        assert!(!is_admissible(url, NO_PATTERNS), "{}", url);
    }
    assert!(is_admissible("https://shop.test/docs.pdf.html", NO_PATTERNS));
    assert!(is_admissible("https://shop.test/download?file=a.pdf", NO_PATTERNS));
}

#[test]
fn only_http_schemes_are_admitted() {
    assert!(is_admissible("http://shop.test/", NO_PATTERNS));
    assert!(is_admissible("https://shop.test/", NO_PATTERNS));
    assert!(!is_admissible("mailto:hi@shop.test", NO_PATTERNS));
    assert!(!is_admissible("javascript:void(0)", NO_PATTERNS));
    assert!(!is_admissible("ftp://shop.test/file", NO_PATTERNS));
    assert!(!is_admissible("", NO_PATTERNS));
}

#[test]
fn exclude_patterns_match_anywhere() {
    let filter = UrlFilter::new(&["/admin", r"\?print=1$"]).unwrap();
    assert!(!filter.is_admissible("https://shop.test/admin/users"));
    assert!(!filter.is_admissible("https://shop.test/page?print=1"));
    assert!(filter.is_admissible("https://shop.test/page?print=10"));
    assert!(filter.is_admissible("https://shop.test/sysadmin"));
}

#[test]
fn invalid_pattern_rejects_everything() {
    assert!(UrlFilter::new(&["(["]).is_err());
    assert!(!is_admissible("https://shop.test/", &["(["]));
}

#[test]
fn page_dir_key_is_stable_sha1() {
    assert_eq!(
        page_dir_key("https://shop.test/"),
        page_dir_key("https://shop.test/")
    );
    assert_ne!(
        page_dir_key("https://shop.test/"),
        page_dir_key("https://shop.test/about")
    );
    assert_eq!(page_dir_key("").len(), 40);
    assert_eq!(page_dir_key(""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
}
