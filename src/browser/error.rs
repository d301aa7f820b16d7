use std::fmt;

#[derive(Debug)]
pub enum BrowserError {
    /// Node.js browser server failed to spawn
    SubprocessSpawn { script: String, source: std::io::Error },

    /// JSON parsing failed (browser server output)
    JsonParse { context: String, source: serde_json::Error },

    /// JSON serialization failed (request to the browser server)
    JsonSerialize { context: String, source: serde_json::Error },

    /// Pipe to or from the browser server broke
    SessionIO(String),

    /// Browser server answered a command with `ok: false` or a malformed reply
    SessionProtocol { command: String, error: String },

    /// Navigation did not finish within the page timeout
    Timeout { url: String, timeout_ms: u64 },

    /// HTTP transport failure in the static backend
    Http { url: String, source: reqwest::Error },

    /// CSS selector could not be parsed
    InvalidSelector { selector: String, reason: String },

    /// Element handle does not belong to the current document
    StaleHandle(u64),

    /// Local file I/O (artifacts)
    Io { path: String, source: std::io::Error },
}

impl fmt::Display for BrowserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrowserError::SubprocessSpawn { script, source } => {
                write!(f, "Failed to spawn {} (is Node.js installed?): {}", script, source)
            }
            BrowserError::JsonParse { context, source } => {
                write!(f, "JSON parse error ({}): {}", context, source)
            }
            BrowserError::JsonSerialize { context, source } => {
                write!(f, "JSON serialize error ({}): {}", context, source)
            }
            BrowserError::SessionIO(msg) => write!(f, "Browser session I/O: {}", msg),
            BrowserError::SessionProtocol { command, error } => {
                write!(f, "Browser command '{}' failed: {}", command, error)
            }
            BrowserError::Timeout { url, timeout_ms } => {
                write!(f, "Timed out after {}ms loading {}", timeout_ms, url)
            }
            BrowserError::Http { url, source } => {
                write!(f, "HTTP request to {} failed: {}", url, source)
            }
            BrowserError::InvalidSelector { selector, reason } => {
                write!(f, "Invalid selector '{}': {}", selector, reason)
            }
            BrowserError::StaleHandle(handle) => {
                write!(f, "Element handle {} is not attached to this document", handle)
            }
            BrowserError::Io { path, source } => write!(f, "I/O error on {}: {}", path, source),
        }
    }
}

impl std::error::Error for BrowserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BrowserError::SubprocessSpawn { source, .. } => Some(source),
            BrowserError::JsonParse { source, .. } => Some(source),
            BrowserError::JsonSerialize { source, .. } => Some(source),
            BrowserError::Http { source, .. } => Some(source),
            BrowserError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}
