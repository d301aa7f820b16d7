use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use url::Url;
use website_test_bot::browser::html::HtmlDocument;
use website_test_bot::browser::{
    BrowserDriver, BrowserError, BrowserLauncher, Document, Navigation, PageSession,
    SessionOptions,
};

use super::utils::fixture;

/// Session bookkeeping shared by a site and every session it hands out.
#[derive(Debug, Default)]
pub struct Counters {
    pub launches: AtomicUsize,
    pub opened: AtomicUsize,
    pub released: AtomicUsize,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
    pub closed: AtomicUsize,
}

impl Counters {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// In-process website served through [`HtmlDocument`]. Unknown URLs fail
/// to load like an unreachable host.
#[derive(Clone, Default)]
pub struct StaticSite {
    pages: HashMap<String, String>,
    delay: Duration,
    panic_on: Option<String>,
    counters: Arc<Counters>,
}

impl StaticSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        let key = Url::parse(url).expect("valid test URL").to_string();
        self.pages.insert(key, html.to_string());
        self
    }

    pub fn fixture(self, url: &str, name: &str) -> Self {
        let html = fixture(name);
        self.page(url, &html)
    }

    /// Sleep this long inside every navigation.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Panic while loading `url`.
    pub fn panic_on(mut self, url: &str) -> Self {
        self.panic_on = Some(url.to_string());
        self
    }

    pub fn counters(&self) -> Arc<Counters> {
        Arc::clone(&self.counters)
    }

    /// The four-page shop used by most crawl tests.
    pub fn shop() -> Self {
        Self::new()
            .fixture("https://shop.test/", "home.html")
            .fixture("https://shop.test/about", "about.html")
            .fixture("https://shop.test/contact", "contact.html")
            .fixture("https://shop.test/team", "team.html")
    }
}

impl BrowserLauncher for StaticSite {
    fn launch(&self) -> Result<Arc<dyn BrowserDriver>, BrowserError> {
        self.counters.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StaticDriver {
            site: self.clone(),
        }))
    }
}

struct StaticDriver {
    site: StaticSite,
}

impl BrowserDriver for StaticDriver {
    fn new_session(&self, _options: &SessionOptions) -> Result<Box<dyn PageSession>, BrowserError> {
        let counters = &self.site.counters;
        counters.opened.fetch_add(1, Ordering::SeqCst);
        let active = counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak.fetch_max(active, Ordering::SeqCst);

        Ok(Box::new(StaticSession {
            site: self.site.clone(),
            markup: String::new(),
            document: HtmlDocument::empty(),
        }))
    }

    fn close(&self) -> Result<(), BrowserError> {
        self.site.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct StaticSession {
    site: StaticSite,
    markup: String,
    document: HtmlDocument,
}

impl PageSession for StaticSession {
    fn goto(&mut self, url: &str, _timeout: Duration) -> Result<Navigation, BrowserError> {
        if !self.site.delay.is_zero() {
            std::thread::sleep(self.site.delay);
        }
        if self.site.panic_on.as_deref() == Some(url) {
            panic!("renderer crashed on {}", url);
        }

        let html = self
            .site
            .pages
            .get(url)
            .ok_or_else(|| BrowserError::SessionProtocol {
                command: "goto".into(),
                error: format!("net::ERR_NAME_NOT_RESOLVED at {}", url),
            })?;

        self.markup = html.clone();
        self.document = HtmlDocument::parse(html);
        Ok(Navigation {
            status: 200,
            content_type: "text/html".into(),
        })
    }

    fn title(&mut self) -> Result<String, BrowserError> {
        Ok(self.document.title())
    }

    fn content(&mut self) -> Result<String, BrowserError> {
        Ok(self.markup.clone())
    }

    fn screenshot(&mut self, _path: &Path) -> Result<bool, BrowserError> {
        Ok(false)
    }

    fn document(&mut self) -> &mut dyn Document {
        &mut self.document
    }
}

impl Drop for StaticSession {
    fn drop(&mut self) {
        let counters = &self.site.counters;
        counters.active.fetch_sub(1, Ordering::SeqCst);
        counters.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// A launcher whose browser never starts.
pub struct BrokenLauncher;

impl BrowserLauncher for BrokenLauncher {
    fn launch(&self) -> Result<Arc<dyn BrowserDriver>, BrowserError> {
        Err(BrowserError::SessionIO("browser binary not found".into()))
    }
}
