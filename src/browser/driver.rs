use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::browser::error::BrowserError;

// ============================================================================
// Session parameters
// ============================================================================

/// Browser viewport size in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Parameters for one isolated browser session (cookies and storage are
/// never shared between sessions).
#[derive(Debug, Clone, Serialize)]
pub struct SessionOptions {
    pub viewport: Viewport,
    pub user_agent: String,
}

/// What the server answered for the main document of a navigation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Navigation {
    pub status: u16,
    #[serde(default)]
    pub content_type: String,
}

/// Opaque reference to an element inside a `Document`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle(pub u64);

// ============================================================================
// Collaborator traits
// ============================================================================

/// Starts the automation engine. Called once per crawl; a failure here is
/// fatal for the crawl.
pub trait BrowserLauncher: Send + Sync {
    fn launch(&self) -> Result<Arc<dyn BrowserDriver>, BrowserError>;
}

/// A running automation engine shared by every page of a crawl.
pub trait BrowserDriver: Send + Sync {
    /// Open a fresh, isolated session. The session is released when dropped.
    fn new_session(&self, options: &SessionOptions) -> Result<Box<dyn PageSession>, BrowserError>;

    /// Shut the engine down. Must be safe to call more than once.
    fn close(&self) -> Result<(), BrowserError>;
}

/// One isolated browsing context holding at most one loaded page.
pub trait PageSession {
    /// Navigate and wait until the DOM is ready, bounded by `timeout`.
    fn goto(&mut self, url: &str, timeout: Duration) -> Result<Navigation, BrowserError>;

    fn title(&mut self) -> Result<String, BrowserError>;

    /// Full page markup as currently rendered.
    fn content(&mut self) -> Result<String, BrowserError>;

    /// Full-page screenshot. Returns `false` when the backend cannot render
    /// pixels.
    fn screenshot(&mut self, path: &Path) -> Result<bool, BrowserError>;

    /// DOM access for the loaded page.
    fn document(&mut self) -> &mut dyn Document;
}

/// Read-only DOM queries against one loaded page.
pub trait Document {
    /// All elements matching `selector` in document order, searched inside
    /// `scope` (exclusive) or the whole document.
    fn query_all(
        &mut self,
        scope: Option<ElementHandle>,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, BrowserError>;

    fn attribute(&mut self, element: ElementHandle, name: &str) -> Result<Option<String>, BrowserError>;

    fn text_content(&mut self, element: ElementHandle) -> Result<Option<String>, BrowserError>;

    fn is_visible(&mut self, element: ElementHandle) -> Result<bool, BrowserError>;

    /// Lowercase tag name.
    fn tag_name(&mut self, element: ElementHandle) -> Result<String, BrowserError>;

    /// First match in document order, if any.
    fn query_first(
        &mut self,
        scope: Option<ElementHandle>,
        selector: &str,
    ) -> Result<Option<ElementHandle>, BrowserError> {
        Ok(self.query_all(scope, selector)?.into_iter().next())
    }
}
