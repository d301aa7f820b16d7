use regex::Regex;
use sha1::{Digest, Sha1};
use url::Url;

/// Path suffixes that never lead to an HTML page.
const SKIPPED_EXTENSIONS: &[&str] = &[".pdf", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".css", ".js"];

/// Resolve `raw` against `base` (when given) and drop the fragment.
///
/// Everything else (scheme, host, path, params, query) is kept as the
/// WHATWG parser normalizes it, so canonicalizing twice is a no-op.
pub fn canonicalize(raw: &str, base: Option<&Url>) -> Result<String, url::ParseError> {
    let mut url = match base {
        Some(base) => base.join(raw.trim())?,
        None => Url::parse(raw.trim())?,
    };
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Scheme, host and effective port all match.
pub fn is_same_origin(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

/// Directory key for a page's artifacts: full SHA-1 hex of the URL.
pub fn page_dir_key(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Admission check for discovered links.
#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    excludes: Vec<Regex>,
}

impl UrlFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let excludes = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { excludes })
    }

    pub fn from_regexes(excludes: Vec<Regex>) -> Self {
        Self { excludes }
    }

    pub fn is_admissible(&self, url: &str) -> bool {
        if self.excludes.iter().any(|re| re.is_match(url)) {
            return false;
        }

        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        if !matches!(parsed.scheme(), "http" | "https") {
            return false;
        }

        let path = parsed.path().to_ascii_lowercase();
        !SKIPPED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    }
}

/// One-shot admission check. An invalid pattern rejects every URL.
pub fn is_admissible<S: AsRef<str>>(url: &str, patterns: &[S]) -> bool {
    match UrlFilter::new(patterns) {
        Ok(filter) => filter.is_admissible(url),
        Err(_) => false,
    }
}
