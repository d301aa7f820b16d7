use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;

use crate::browser::driver::{
    BrowserDriver, BrowserLauncher, Document, Navigation, PageSession, SessionOptions,
};
use crate::browser::error::BrowserError;
use crate::browser::html::HtmlDocument;

// ============================================================================
// Static HTTP backend (no JavaScript, no pixels)
// ============================================================================

/// Launches the static backend. There is no engine process to start, so
/// launching never fails.
#[derive(Debug, Default, Clone)]
pub struct HttpLauncher;

impl BrowserLauncher for HttpLauncher {
    fn launch(&self) -> Result<Arc<dyn BrowserDriver>, BrowserError> {
        Ok(Arc::new(HttpDriver))
    }
}

#[derive(Debug, Default)]
pub struct HttpDriver;

impl BrowserDriver for HttpDriver {
    /// Each session gets its own `reqwest` client, so cookies and
    /// connection state never cross pages. Must be called off the async
    /// runtime (the blocking client owns an internal runtime).
    fn new_session(&self, options: &SessionOptions) -> Result<Box<dyn PageSession>, BrowserError> {
        let client = Client::builder()
            .user_agent(options.user_agent.clone())
            .build()
            .map_err(|e| BrowserError::Http {
                url: String::new(),
                source: e,
            })?;

        Ok(Box::new(HttpSession {
            client,
            markup: String::new(),
            document: HtmlDocument::empty(),
        }))
    }

    fn close(&self) -> Result<(), BrowserError> {
        Ok(())
    }
}

/// One page fetched over plain HTTP and parsed with `scraper`.
pub struct HttpSession {
    client: Client,
    markup: String,
    document: HtmlDocument,
}

impl PageSession for HttpSession {
    fn goto(&mut self, url: &str, timeout: Duration) -> Result<Navigation, BrowserError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    BrowserError::Timeout {
                        url: url.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    }
                } else {
                    BrowserError::Http {
                        url: url.to_string(),
                        source: e,
                    }
                }
            })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let markup = response.text().map_err(|e| BrowserError::Http {
            url: url.to_string(),
            source: e,
        })?;

        self.document = HtmlDocument::parse(&markup);
        self.markup = markup;

        Ok(Navigation {
            status,
            content_type,
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
