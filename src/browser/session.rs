use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::browser::driver::Viewport;
use crate::browser::error::BrowserError;

const QUIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Request sent to the browser server over stdin (one JSON line, wrapped in
/// an [`Envelope`] carrying the request id).
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BrowserRequest {
    NewContext {
        cmd: &'static str,
        viewport: Viewport,
        user_agent: String,
    },
    Goto {
        cmd: &'static str,
        context: u64,
        url: String,
        timeout_ms: u64,
        wait_until: &'static str,
    },
    Screenshot {
        cmd: &'static str,
        context: u64,
        path: String,
        full_page: bool,
    },
    QueryAll {
        cmd: &'static str,
        context: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        scope: Option<u64>,
        selector: String,
    },
    Attribute {
        cmd: &'static str,
        context: u64,
        handle: u64,
        name: String,
    },
    Element {
        cmd: &'static str,
        context: u64,
        handle: u64,
    },
    Context {
        cmd: &'static str,
        context: u64,
    },
    Quit {
        cmd: &'static str,
    },
}

impl BrowserRequest {
    pub fn new_context(viewport: Viewport, user_agent: &str) -> Self {
        BrowserRequest::NewContext {
            cmd: "new_context",
            viewport,
            user_agent: user_agent.to_string(),
        }
    }

    pub fn goto(context: u64, url: &str, timeout: Duration) -> Self {
        BrowserRequest::Goto {
            cmd: "goto",
            context,
            url: url.to_string(),
            timeout_ms: timeout.as_millis() as u64,
            wait_until: "domcontentloaded",
        }
    }

    pub fn title(context: u64) -> Self {
        BrowserRequest::Context {
            cmd: "title",
            context,
        }
    }

    pub fn content(context: u64) -> Self {
        BrowserRequest::Context {
            cmd: "content",
            context,
        }
    }

    pub fn screenshot(context: u64, path: &str) -> Self {
        BrowserRequest::Screenshot {
            cmd: "screenshot",
            context,
            path: path.to_string(),
            full_page: true,
        }
    }

    pub fn query_all(context: u64, scope: Option<u64>, selector: &str) -> Self {
        BrowserRequest::QueryAll {
            cmd: "query_all",
            context,
            scope,
            selector: selector.to_string(),
        }
    }

    pub fn attribute(context: u64, handle: u64, name: &str) -> Self {
        BrowserRequest::Attribute {
            cmd: "attribute",
            context,
            handle,
            name: name.to_string(),
        }
    }

    pub fn text_content(context: u64, handle: u64) -> Self {
        BrowserRequest::Element {
            cmd: "text_content",
            context,
            handle,
        }
    }

    pub fn is_visible(context: u64, handle: u64) -> Self {
        BrowserRequest::Element {
            cmd: "is_visible",
            context,
            handle,
        }
    }

    pub fn tag_name(context: u64, handle: u64) -> Self {
        BrowserRequest::Element {
            cmd: "tag_name",
            context,
            handle,
        }
    }

    pub fn close_context(context: u64) -> Self {
        BrowserRequest::Context {
            cmd: "close_context",
            context,
        }
    }

    pub fn quit() -> Self {
        BrowserRequest::Quit { cmd: "quit" }
    }
}

/// Wire form of a request: `{"id": N, "cmd": ..., ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub id: u64,
    #[serde(flatten)]
    pub request: &'a BrowserRequest,
}

/// Response received from the browser server over stdout (one JSON line).
#[derive(Debug, Default, Deserialize)]
pub struct BrowserResponse {
    #[serde(default)]
    pub id: Option<u64>,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub ready: Option<bool>,
    #[serde(default)]
    pub context: Option<u64>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub handles: Option<Vec<u64>>,
    #[serde(default)]
    pub visible: Option<bool>,
}

type Waiters = Arc<Mutex<HashMap<u64, Sender<BrowserResponse>>>>;

/// A long-lived browser server process shared by many sessions.
///
/// Requests are written as NDJSON over stdin. A reader thread routes each
/// response line to the waiting caller by `id`, so independent sessions can
/// have requests in flight at the same time.
pub struct Connection {
    script: String,
    child: Mutex<Child>,
    stdin: Mutex<ChildStdin>,
    waiters: Waiters,
    next_id: AtomicU64,
    exited: Arc<AtomicBool>,
    closed: AtomicBool,
    reader: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Spawn `program script args...` and wait for its ready signal.
    pub fn spawn(program: &str, script: &str, args: &[String]) -> Result<Self, BrowserError> {
        let mut child = Command::new(program)
            .arg(script)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BrowserError::SubprocessSpawn {
                script: script.to_string(),
                source: e,
            })?;

        let (stdin, reader) = match handshake(&mut child, script) {
            Ok(pipes) => pipes,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };

        let waiters: Waiters = Arc::new(Mutex::new(HashMap::new()));
        let exited = Arc::new(AtomicBool::new(false));
        let handle = {
            let waiters = Arc::clone(&waiters);
            let exited = Arc::clone(&exited);
            std::thread::spawn(move || route_responses(reader, waiters, exited))
        };

        Ok(Connection {
            script: script.to_string(),
            child: Mutex::new(child),
            stdin: Mutex::new(stdin),
            waiters,
            next_id: AtomicU64::new(1),
            exited,
            closed: AtomicBool::new(false),
            reader: Mutex::new(Some(handle)),
        })
    }

    /// Send a request and wait up to `timeout` for its response.
    pub fn send(
        &self,
        request: &BrowserRequest,
        timeout: Duration,
    ) -> Result<BrowserResponse, BrowserError> {
        if self.exited.load(Ordering::SeqCst) {
            return Err(BrowserError::SessionIO(format!("{} has exited", self.script)));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let json = serde_json::to_string(&Envelope { id, request }).map_err(|e| {
            BrowserError::JsonSerialize {
                context: "BrowserRequest".into(),
                source: e,
            }
        })?;

        let (tx, rx) = mpsc::channel();
        self.waiters
            .lock()
            .map_err(|_| BrowserError::SessionIO("waiter table lock poisoned".into()))?
            .insert(id, tx);

        let written = self.write_line(&json);
        if let Err(e) = written {
            self.forget(id);
            return Err(e);
        }

        match rx.recv_timeout(timeout) {
            Ok(response) => Ok(response),
            Err(RecvTimeoutError::Timeout) => {
                self.forget(id);
                Err(BrowserError::SessionIO(format!(
                    "No response from {} within {}ms",
                    self.script,
                    timeout.as_millis()
                )))
            }
            Err(RecvTimeoutError::Disconnected) => Err(BrowserError::SessionIO(format!(
                "Empty response from {} (process may have died)",
                self.script
            ))),
        }
    }

    /// Send a request and verify it succeeded.
    pub fn send_ok(
        &self,
        request: &BrowserRequest,
        command_name: &str,
        timeout: Duration,
    ) -> Result<BrowserResponse, BrowserError> {
        let response = self.send(request, timeout)?;
        if !response.ok {
            return Err(BrowserError::SessionProtocol {
                command: command_name.into(),
                error: response.error.unwrap_or_else(|| "Unknown error".into()),
            });
        }
        Ok(response)
    }

    /// Ask the server to quit, then reap the process. Idempotent.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        // Best-effort quit, the process may already be gone
        let _ = self.send(&BrowserRequest::quit(), QUIT_TIMEOUT);

        if let Ok(mut child) = self.child.lock() {
            if !matches!(child.try_wait(), Ok(Some(_))) {
                let _ = child.kill();
            }
            let _ = child.wait();
        }

        if let Some(handle) = self.reader.lock().ok().and_then(|mut r| r.take()) {
            let _ = handle.join();
        }
    }

    fn write_line(&self, json: &str) -> Result<(), BrowserError> {
        let mut stdin = self
            .stdin
            .lock()
            .map_err(|_| BrowserError::SessionIO("stdin lock poisoned".into()))?;

        writeln!(stdin, "{}", json).map_err(|e| {
            BrowserError::SessionIO(format!("Failed to write to {} stdin: {}", self.script, e))
        })?;

        stdin.flush().map_err(|e| {
            BrowserError::SessionIO(format!("Failed to flush {} stdin: {}", self.script, e))
        })
    }

    fn forget(&self, id: u64) {
        if let Ok(mut waiters) = self.waiters.lock() {
            waiters.remove(&id);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Best-effort cleanup
        self.shutdown();
    }
}

/// Take the child's pipes and wait for its ready signal.
fn handshake(
    child: &mut Child,
    script: &str,
) -> Result<(ChildStdin, BufReader<ChildStdout>), BrowserError> {
    let stdin = child.stdin.take().ok_or_else(|| {
        BrowserError::SessionIO(format!("Failed to capture stdin of {}", script))
    })?;

    let stdout = child.stdout.take().ok_or_else(|| {
        BrowserError::SessionIO(format!("Failed to capture stdout of {}", script))
    })?;

    if let Some(stderr) = child.stderr.take() {
        let name = script.to_string();
        std::thread::spawn(move || {
            for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                debug!(script = %name, "{}", line.trim());
            }
        });
    }

    let mut reader = BufReader::new(stdout);

    // Wait for the ready signal
    let mut line = String::new();
    reader.read_line(&mut line).map_err(|e| {
        BrowserError::SessionIO(format!("Failed to read ready signal: {}", e))
    })?;

    let response: BrowserResponse =
        serde_json::from_str(line.trim()).map_err(|e| BrowserError::JsonParse {
            context: format!("{} ready signal", script),
            source: e,
        })?;

    if !response.ok || response.ready != Some(true) {
        return Err(BrowserError::SessionProtocol {
            command: "launch".into(),
            error: format!("Did not receive ready signal from {}", script),
        });
    }

    Ok((stdin, reader))
}

/// Reader loop: dispatch each response line to its waiter. On EOF every
/// outstanding waiter is dropped, which fails its `recv` immediately.
fn route_responses(reader: BufReader<ChildStdout>, waiters: Waiters, exited: Arc<AtomicBool>) {
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("browser server stdout closed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let response: BrowserResponse = match serde_json::from_str(line.trim()) {
            Ok(r) => r,
            Err(e) => {
                warn!("unparseable browser server line ({}): {}", e, line.trim());
                continue;
            }
        };

        let Some(id) = response.id else {
            warn!("browser server response without id: {}", line.trim());
            continue;
        };

        let waiter = waiters.lock().ok().and_then(|mut w| w.remove(&id));
        if let Some(tx) = waiter {
            let _ = tx.send(response);
        }
    }

    exited.store(true, Ordering::SeqCst);
    if let Ok(mut w) = waiters.lock() {
        w.clear();
    }
}
