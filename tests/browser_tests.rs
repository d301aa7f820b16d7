use std::time::Duration;

use serde_json::json;
use website_test_bot::browser::http::HttpLauncher;
use website_test_bot::browser::playwright::PlaywrightLauncher;
use website_test_bot::browser::session::{BrowserRequest, BrowserResponse, Connection, Envelope};
use website_test_bot::browser::{
    BrowserDriver, BrowserError, BrowserLauncher, PageSession, SessionOptions, Viewport,
};

fn wire(id: u64, request: &BrowserRequest) -> serde_json::Value {
    serde_json::to_value(Envelope { id, request }).unwrap()
}

// =========================================================================
// Wire format
// =========================================================================

#[test]
fn new_context_carries_viewport_and_user_agent() {
    let request = BrowserRequest::new_context(Viewport { width: 800, height: 600 }, "Bot/1.0");
    assert_eq!(
        wire(1, &request),
        json!({
            "id": 1,
            "cmd": "new_context",
            "viewport": {"width": 800, "height": 600},
            "user_agent": "Bot/1.0",
        })
    );
}

#[test]
fn goto_waits_for_domcontentloaded() {
    let request = BrowserRequest::goto(3, "https://shop.test/", Duration::from_secs(30));
    assert_eq!(
        wire(7, &request),
        json!({
            "id": 7,
            "cmd": "goto",
            "context": 3,
            "url": "https://shop.test/",
            "timeout_ms": 30000,
            "wait_until": "domcontentloaded",
        })
    );
}

#[test]
fn query_all_omits_missing_scope() {
    assert_eq!(
        wire(2, &BrowserRequest::query_all(1, None, "form")),
        json!({"id": 2, "cmd": "query_all", "context": 1, "selector": "form"})
    );
    assert_eq!(
        wire(3, &BrowserRequest::query_all(1, Some(9), "input")),
        json!({"id": 3, "cmd": "query_all", "context": 1, "scope": 9, "selector": "input"})
    );
}

#[test]
fn element_commands_share_one_shape() {
    assert_eq!(
        wire(4, &BrowserRequest::tag_name(1, 5)),
        json!({"id": 4, "cmd": "tag_name", "context": 1, "handle": 5})
    );
    assert_eq!(
        wire(5, &BrowserRequest::attribute(1, 5, "href")),
        json!({"id": 5, "cmd": "attribute", "context": 1, "handle": 5, "name": "href"})
    );
    assert_eq!(
        wire(6, &BrowserRequest::screenshot(1, "/tmp/shot.png")),
        json!({"id": 6, "cmd": "screenshot", "context": 1, "path": "/tmp/shot.png", "full_page": true})
    );
    assert_eq!(wire(8, &BrowserRequest::quit()), json!({"id": 8, "cmd": "quit"}));
}

#[test]
fn responses_tolerate_missing_fields() {
    let ready: BrowserResponse = serde_json::from_str(r#"{"ok": true, "ready": true}"#).unwrap();
    assert!(ready.ok);
    assert_eq!(ready.ready, Some(true));
    assert_eq!(ready.id, None);

    let handles: BrowserResponse =
        serde_json::from_str(r#"{"id": 4, "ok": true, "handles": [1, 2, 3]}"#).unwrap();
    assert_eq!(handles.id, Some(4));
    assert_eq!(handles.handles, Some(vec![1, 2, 3]));

    let failed: BrowserResponse =
        serde_json::from_str(r#"{"id": 5, "ok": false, "error": "net::ERR_ABORTED"}"#).unwrap();
    assert!(!failed.ok);
    assert_eq!(failed.error.as_deref(), Some("net::ERR_ABORTED"));
}

// =========================================================================
// Launchers
// =========================================================================

#[test]
fn playwright_args_name_browser_and_mode() {
    let launcher = PlaywrightLauncher::new("node/browser_server.js").with_browser("firefox");
    assert_eq!(launcher.args(), vec!["--browser", "firefox"]);
    assert_eq!(
        launcher.headless(false).args(),
        vec!["--browser", "firefox", "--headed"]
    );
}

#[test]
fn missing_node_binary_is_a_spawn_error() {
    let launcher = PlaywrightLauncher {
        node: "website-test-bot-no-such-binary".into(),
        ..PlaywrightLauncher::new("node/browser_server.js")
    };
    assert!(matches!(
        launcher.launch(),
        Err(BrowserError::SubprocessSpawn { .. })
    ));
}

#[cfg(unix)]
#[test]
fn server_without_ready_signal_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("server.sh");
    std::fs::write(&script, "echo '{\"ok\": false, \"error\": \"no browser\"}'\n").unwrap();

    let result = Connection::spawn("sh", script.to_str().unwrap(), &[]);
    assert!(matches!(
        result,
        Err(BrowserError::SessionProtocol { ref command, .. }) if command == "launch"
    ));
}

#[cfg(target_os = "linux")]
#[test]
fn garbled_ready_signal_kills_the_server() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("server.pid");
    let script = dir.path().join("server.sh");
    std::fs::write(
        &script,
        format!("echo $$ > {}\necho 'not json'\nexec sleep 30\n", pid_file.display()),
    )
    .unwrap();

    let result = Connection::spawn("sh", script.to_str().unwrap(), &[]);
    assert!(matches!(result, Err(BrowserError::JsonParse { .. })));

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    let proc_dir = std::path::Path::new("/proc").join(pid.trim());
    assert!(!proc_dir.exists(), "server process {} still alive", pid.trim());
}

#[test]
fn http_backend_reports_transport_errors() {
    let driver = HttpLauncher.launch().unwrap();
    let mut session = driver
        .new_session(&SessionOptions {
            viewport: Viewport::default(),
            user_agent: "Bot/1.0".into(),
        })
        .unwrap();

    // nothing listens on port 1
    let result = session.goto("http://127.0.0.1:1/", Duration::from_secs(2));
    assert!(matches!(
        result,
        Err(BrowserError::Http { .. }) | Err(BrowserError::Timeout { .. })
    ));
    assert!(!session.screenshot(std::path::Path::new("unused.png")).unwrap());
    driver.close().unwrap();
}
