use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::browser::driver::{
    BrowserDriver, BrowserLauncher, Document, ElementHandle, Navigation, PageSession,
    SessionOptions,
};
use crate::browser::error::BrowserError;
use crate::browser::session::{BrowserRequest, Connection};

/// Round-trip budget for commands other than navigation.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra time granted on top of the navigation timeout for the server to
/// report back.
const NAVIGATION_GRACE: Duration = Duration::from_secs(5);

// ============================================================================
// Launcher / driver
// ============================================================================

/// Launches the Playwright-backed browser server (`node <script>`).
#[derive(Debug, Clone)]
pub struct PlaywrightLauncher {
    pub node: String,
    pub script: PathBuf,
    pub browser: String,
    pub headless: bool,
}

impl PlaywrightLauncher {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            node: "node".to_string(),
            script: script.into(),
            browser: "chromium".to_string(),
            headless: true,
        }
    }

    pub fn with_browser(mut self, browser: &str) -> Self {
        self.browser = browser.to_string();
        self
    }

    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Arguments passed to the server script.
    pub fn args(&self) -> Vec<String> {
        let mut args = vec!["--browser".to_string(), self.browser.clone()];
        if !self.headless {
            args.push("--headed".to_string());
        }
        args
    }
}

impl BrowserLauncher for PlaywrightLauncher {
    fn launch(&self) -> Result<Arc<dyn BrowserDriver>, BrowserError> {
        let script = self.script.to_string_lossy().into_owned();
        let connection = Connection::spawn(&self.node, &script, &self.args())?;
        Ok(Arc::new(PlaywrightDriver {
            connection: Arc::new(connection),
        }))
    }
}

/// One browser process; every session is a separate browser context in it.
pub struct PlaywrightDriver {
    connection: Arc<Connection>,
}

impl BrowserDriver for PlaywrightDriver {
    fn new_session(&self, options: &SessionOptions) -> Result<Box<dyn PageSession>, BrowserError> {
        let request = BrowserRequest::new_context(options.viewport, &options.user_agent);
        let response = self
            .connection
            .send_ok(&request, "new_context", COMMAND_TIMEOUT)?;

        let context = response.context.ok_or_else(|| BrowserError::SessionProtocol {
            command: "new_context".into(),
            error: "No context id in new_context response".into(),
        })?;

        Ok(Box::new(PlaywrightSession {
            connection: Arc::clone(&self.connection),
            context,
        }))
    }

    fn close(&self) -> Result<(), BrowserError> {
        self.connection.shutdown();
        Ok(())
    }
}

// ============================================================================
// Session
// ============================================================================

/// A browser context inside the shared server. Closed when dropped.
pub struct PlaywrightSession {
    connection: Arc<Connection>,
    context: u64,
}

impl PageSession for PlaywrightSession {
    fn goto(&mut self, url: &str, timeout: Duration) -> Result<Navigation, BrowserError> {
        let request = BrowserRequest::goto(self.context, url, timeout);
        let response = self
            .connection
            .send(&request, timeout + NAVIGATION_GRACE)?;

        if !response.ok {
            let error = response.error.unwrap_or_else(|| "Unknown error".into());
            if error.contains("Timeout") {
                return Err(BrowserError::Timeout {
                    url: url.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                });
            }
            return Err(BrowserError::SessionProtocol {
                command: "goto".into(),
                error,
            });
        }

        Ok(Navigation {
            status: response.status.unwrap_or(200),
            content_type: response.content_type.unwrap_or_default(),
        })
    }

    fn title(&mut self) -> Result<String, BrowserError> {
        let response = self.connection.send_ok(
            &BrowserRequest::title(self.context),
            "title",
            COMMAND_TIMEOUT,
        )?;
        Ok(response.text.unwrap_or_default())
    }

    fn content(&mut self) -> Result<String, BrowserError> {
        let response = self.connection.send_ok(
            &BrowserRequest::content(self.context),
            "content",
            COMMAND_TIMEOUT,
        )?;
        Ok(response.text.unwrap_or_default())
    }

    fn screenshot(&mut self, path: &Path) -> Result<bool, BrowserError> {
        let request = BrowserRequest::screenshot(self.context, &path.to_string_lossy());
        self.connection
            .send_ok(&request, "screenshot", COMMAND_TIMEOUT)?;
        Ok(true)
    }

    fn document(&mut self) -> &mut dyn Document {
        self
    }
}

impl Document for PlaywrightSession {
    fn query_all(
        &mut self,
        scope: Option<ElementHandle>,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        let request = BrowserRequest::query_all(self.context, scope.map(|h| h.0), selector);
        let response = self
            .connection
            .send_ok(&request, "query_all", COMMAND_TIMEOUT)?;
        Ok(response
            .handles
            .unwrap_or_default()
            .into_iter()
            .map(ElementHandle)
            .collect())
    }

    fn attribute(&mut self, element: ElementHandle, name: &str) -> Result<Option<String>, BrowserError> {
        let request = BrowserRequest::attribute(self.context, element.0, name);
        let response = self
            .connection
            .send_ok(&request, "attribute", COMMAND_TIMEOUT)?;
        Ok(response.text)
    }

    fn text_content(&mut self, element: ElementHandle) -> Result<Option<String>, BrowserError> {
        let request = BrowserRequest::text_content(self.context, element.0);
        let response = self
            .connection
            .send_ok(&request, "text_content", COMMAND_TIMEOUT)?;
        Ok(response.text)
    }

    fn is_visible(&mut self, element: ElementHandle) -> Result<bool, BrowserError> {
        let request = BrowserRequest::is_visible(self.context, element.0);
        let response = self
            .connection
            .send_ok(&request, "is_visible", COMMAND_TIMEOUT)?;
        Ok(response.visible.unwrap_or(false))
    }

    fn tag_name(&mut self, element: ElementHandle) -> Result<String, BrowserError> {
        let request = BrowserRequest::tag_name(self.context, element.0);
        let response = self
            .connection
            .send_ok(&request, "tag_name", COMMAND_TIMEOUT)?;
        Ok(response.text.unwrap_or_default().to_ascii_lowercase())
    }
}

impl Drop for PlaywrightSession {
    fn drop(&mut self) {
        // Best-effort: the whole server may already be shutting down
        let _ = self.connection.send(
            &BrowserRequest::close_context(self.context),
            COMMAND_TIMEOUT,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headed_flag_only_when_not_headless() {
        let launcher = PlaywrightLauncher::new("node/browser_server.js").with_browser("firefox");
        assert_eq!(launcher.args(), vec!["--browser", "firefox"]);
        assert_eq!(
            launcher.headless(false).args(),
            vec!["--browser", "firefox", "--headed"]
        );
    }

    #[test]
    fn missing_node_binary_is_a_spawn_error() {
        let mut launcher = PlaywrightLauncher::new("browser_server.js");
        launcher.node = "definitely-not-a-real-node-binary".into();
        assert!(matches!(
            launcher.launch(),
            Err(BrowserError::SubprocessSpawn { .. })
        ));
    }
}
