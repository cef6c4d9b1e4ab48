//! Browser session management.
//!
//! Manages isolated browser sessions, each with its own browser process, CDP
//! connection, mock registry, and paused-request interceptor task. Sessions
//! persist between tool calls (daemon model); their mocks and extra headers
//! live for the lifetime of the session unless explicitly cleared.

use super::cdp::CdpClient;
use super::rules::MockRegistry;
use pagemock_core::{Error, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::{Child, Command};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Supported browser engines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BrowserEngine {
    Chrome,
    Edge,
    Firefox,
}

impl BrowserEngine {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "firefox" | "ff" => Self::Firefox,
            "edge" | "msedge" => Self::Edge,
            _ => Self::Chrome,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Chrome => "chrome",
            Self::Edge => "edge",
            Self::Firefox => "firefox",
        }
    }
}

/// A single browser session: one process, one page target, one rule table.
pub struct BrowserSession {
    /// Session name (e.g. "default").
    pub name: String,
    pub browser_engine: BrowserEngine,
    /// Remote debugging port used for target discovery.
    pub debug_port: u16,
    /// Browser child process.
    process: Child,
    /// CDP WebSocket client, shared with the interceptor task.
    pub cdp: Arc<CdpClient>,
    pub user_data_dir: PathBuf,
    pub headed: bool,
    /// Interception rules for this page.
    pub mocks: Arc<RwLock<MockRegistry>>,
    /// Mirror of the page's extra-header set, replaced wholesale on each
    /// set_headers call (matching the driver's replace-not-merge contract).
    pub extra_headers: HashMap<String, String>,
    /// Paused-request interceptor task, started on first registration.
    interceptor: Option<tokio::task::JoinHandle<()>>,
    fetch_enabled: bool,
}

impl BrowserSession {
    /// Re-derive the CDP Fetch state from the mock registry: enable with the
    /// current pattern set while rules exist, disable once the table empties.
    pub async fn sync_interception(&mut self) -> Result<()> {
        if self.mocks.read().await.is_empty() {
            if self.fetch_enabled {
                self.cdp.disable_fetch().await?;
                self.fetch_enabled = false;
                debug!(session = %self.name, "Fetch interception disabled (no rules)");
            }
            return Ok(());
        }

        if self.interceptor.is_none() {
            self.interceptor = Some(spawn_interceptor(self.cdp.clone(), self.mocks.clone()).await);
        }

        // Fetch.enable replaces any previous pattern set, so re-registering a
        // pattern never stacks interceptors.
        self.cdp.enable_fetch(MockRegistry::fetch_patterns()).await?;
        self.fetch_enabled = true;
        Ok(())
    }

    /// Replace the page's extra-header set wholesale. An empty map clears it.
    pub async fn set_extra_headers(&mut self, headers: HashMap<String, String>) -> Result<()> {
        let value = Value::Object(
            headers
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        );
        self.cdp.set_extra_headers(value).await?;
        self.extra_headers = headers;
        Ok(())
    }

    /// Close the browser session.
    pub async fn close(&mut self) {
        if let Some(task) = self.interceptor.take() {
            task.abort();
        }
        // Try graceful close via CDP first
        if let Err(e) = self.cdp.send_command("Browser.close", json!({})).await {
            debug!("CDP Browser.close failed (may already be closed): {}", e);
        }
        let _ = self.process.kill().await;
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(task) = self.interceptor.take() {
            task.abort();
        }
        // Best-effort kill on drop
        let _ = self.process.start_kill();
    }
}

/// Service Fetch.requestPaused events against the rule table: fulfill when a
/// rule matches, continue unmodified otherwise.
async fn spawn_interceptor(
    cdp: Arc<CdpClient>,
    mocks: Arc<RwLock<MockRegistry>>,
) -> tokio::task::JoinHandle<()> {
    let mut events = cdp.subscribe_event("Fetch.requestPaused").await;
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let request_id = match event.get("requestId").and_then(|v| v.as_str()) {
                Some(id) => id.to_string(),
                None => continue,
            };
            let url = event
                .pointer("/request/url")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let method = event
                .pointer("/request/method")
                .and_then(|v| v.as_str())
                .unwrap_or("GET")
                .to_string();

            let matched = {
                let registry = mocks.read().await;
                registry.match_request(&url, &method).cloned()
            };

            match matched {
                Some(rule) => {
                    debug!(
                        url = %url,
                        method = %method,
                        pattern = %rule.url_pattern,
                        status = rule.status,
                        "Fulfilling intercepted request"
                    );
                    if let Err(e) = cdp
                        .fetch_fulfill(&request_id, rule.status, rule.response_headers(), &rule.body)
                        .await
                    {
                        warn!(url = %url, error = %e, "Failed to fulfill intercepted request");
                    }
                }
                None => {
                    if let Err(e) = cdp.fetch_continue(&request_id).await {
                        warn!(url = %url, error = %e, "Failed to continue paused request");
                    }
                }
            }
        }
    })
}

/// Manages multiple browser sessions.
pub struct SessionManager {
    sessions: HashMap<String, BrowserSession>,
    /// Base directory for session data (user data dirs, profiles).
    base_dir: PathBuf,
}

impl SessionManager {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            sessions: HashMap::new(),
            base_dir,
        }
    }

    /// Get or create a session by name, launching a browser if needed.
    pub async fn get_or_create(
        &mut self,
        session_name: &str,
        headed: bool,
        profile_path: Option<&str>,
        engine: BrowserEngine,
    ) -> Result<&mut BrowserSession> {
        if self.sessions.contains_key(session_name) {
            return Ok(self.sessions.get_mut(session_name).unwrap());
        }

        let session = self
            .launch_browser(session_name, headed, profile_path, engine)
            .await?;
        self.sessions.insert(session_name.to_string(), session);
        Ok(self.sessions.get_mut(session_name).unwrap())
    }

    pub fn get_session(&mut self, name: &str) -> Option<&mut BrowserSession> {
        self.sessions.get_mut(name)
    }

    pub fn list_sessions(&self) -> Vec<&str> {
        self.sessions.keys().map(|s| s.as_str()).collect()
    }

    pub async fn close_session(&mut self, name: &str) -> Result<()> {
        if let Some(mut session) = self.sessions.remove(name) {
            session.close().await;
            Ok(())
        } else {
            Err(Error::NotFound(format!("Session '{}' not found", name)))
        }
    }

    pub async fn close_all(&mut self) {
        let names: Vec<String> = self.sessions.keys().cloned().collect();
        for name in names {
            if let Some(mut session) = self.sessions.remove(&name) {
                session.close().await;
            }
        }
    }

    /// Launch a browser instance and connect via CDP.
    async fn launch_browser(
        &self,
        session_name: &str,
        headed: bool,
        profile_path: Option<&str>,
        engine: BrowserEngine,
    ) -> Result<BrowserSession> {
        let browser_path = find_browser_binary(engine).ok_or_else(|| {
            Error::Session(format!("{} not found. Please install it.", engine.name()))
        })?;

        let user_data_dir = if let Some(profile) = profile_path {
            PathBuf::from(profile)
        } else {
            self.base_dir.join("sessions").join(session_name)
        };

        std::fs::create_dir_all(&user_data_dir)
            .map_err(|e| Error::Session(format!("Failed to create user data dir: {}", e)))?;

        let debug_port = find_free_port().await?;

        let args = build_browser_args(engine, debug_port, &user_data_dir, headed);

        info!(
            session = session_name,
            port = debug_port,
            headed = headed,
            browser = engine.name(),
            "Launching browser for session"
        );

        let child = Command::new(&browser_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Session(format!("Failed to launch {}: {}", engine.name(), e)))?;

        // Wait for CDP to be ready (browser-level), then attach to the page
        // target so Page/Network domain commands work.
        wait_for_cdp_ready(debug_port, 15).await?;
        let page_ws_url = get_page_ws_url(debug_port).await?;

        let cdp = Arc::new(CdpClient::connect(&page_ws_url).await?);

        cdp.enable_domain("Page").await?;
        cdp.enable_domain("Network").await?;

        info!(
            session = session_name,
            ws_url = %page_ws_url,
            "CDP connection established (page target)"
        );

        Ok(BrowserSession {
            name: session_name.to_string(),
            browser_engine: engine,
            debug_port,
            process: child,
            cdp,
            user_data_dir,
            headed,
            mocks: Arc::new(RwLock::new(MockRegistry::new())),
            extra_headers: HashMap::new(),
            interceptor: None,
            fetch_enabled: false,
        })
    }
}

/// Build browser-specific command line arguments.
fn build_browser_args(
    engine: BrowserEngine,
    debug_port: u16,
    user_data_dir: &std::path::Path,
    headed: bool,
) -> Vec<String> {
    match engine {
        BrowserEngine::Firefox => {
            let mut args = vec![
                "--remote-debugging-port".to_string(),
                debug_port.to_string(),
                "--profile".to_string(),
                user_data_dir.display().to_string(),
                "--no-remote".to_string(),
            ];
            if !headed {
                args.push("--headless".to_string());
            }
            args.push("about:blank".to_string());
            args
        }
        BrowserEngine::Chrome | BrowserEngine::Edge => {
            let mut args = vec![
                format!("--remote-debugging-port={}", debug_port),
                format!("--user-data-dir={}", user_data_dir.display()),
                "--no-first-run".to_string(),
                "--no-default-browser-check".to_string(),
                "--disable-background-networking".to_string(),
                "--disable-extensions".to_string(),
                "--disable-sync".to_string(),
                "--disable-translate".to_string(),
                "--metrics-recording-only".to_string(),
                "--password-store=basic".to_string(),
            ];
            if !headed {
                args.push("--headless=new".to_string());
            }
            args.push("--window-size=1280,720".to_string());
            args.push("about:blank".to_string());
            args
        }
    }
}

/// Find a browser binary on the system for the given engine.
pub fn find_browser_binary(engine: BrowserEngine) -> Option<String> {
    let candidates = match engine {
        BrowserEngine::Chrome => {
            if cfg!(target_os = "macos") {
                vec![
                    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
                    "/Applications/Chromium.app/Contents/MacOS/Chromium",
                ]
            } else if cfg!(target_os = "linux") {
                vec![
                    "google-chrome",
                    "google-chrome-stable",
                    "chromium",
                    "chromium-browser",
                    "/usr/bin/google-chrome",
                    "/usr/bin/chromium",
                ]
            } else {
                vec![
                    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
                    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
                ]
            }
        }
        BrowserEngine::Edge => {
            if cfg!(target_os = "macos") {
                vec!["/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge"]
            } else if cfg!(target_os = "linux") {
                vec![
                    "microsoft-edge",
                    "microsoft-edge-stable",
                    "/usr/bin/microsoft-edge",
                ]
            } else {
                vec![
                    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
                    r"C:\Program Files\Microsoft\Edge\Application\msedge.exe",
                ]
            }
        }
        BrowserEngine::Firefox => {
            if cfg!(target_os = "macos") {
                vec!["/Applications/Firefox.app/Contents/MacOS/firefox"]
            } else if cfg!(target_os = "linux") {
                vec!["firefox", "/usr/bin/firefox"]
            } else {
                vec![
                    r"C:\Program Files\Mozilla Firefox\firefox.exe",
                    r"C:\Program Files (x86)\Mozilla Firefox\firefox.exe",
                ]
            }
        }
    };

    for candidate in candidates {
        if std::path::Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
        if !candidate.contains('/') && !candidate.contains('\\') && which::which(candidate).is_ok()
        {
            return Some(candidate.to_string());
        }
    }
    None
}

/// Find a free TCP port.
async fn find_free_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| Error::Session(format!("Failed to bind to find free port: {}", e)))?;
    let port = listener
        .local_addr()
        .map_err(|e| Error::Session(format!("Failed to get local addr: {}", e)))?
        .port();
    drop(listener);
    Ok(port)
}

/// Wait for the browser's CDP endpoint to become available.
/// Polls /json/version until it responds, up to `timeout_secs`.
async fn wait_for_cdp_ready(port: u16, timeout_secs: u64) -> Result<String> {
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_secs(timeout_secs);
    let url = format!("http://127.0.0.1:{}/json/version", port);

    loop {
        if start.elapsed() > timeout {
            return Err(Error::Session(format!(
                "Browser CDP not ready after {}s on port {}",
                timeout_secs, port
            )));
        }

        if let Ok(resp) = reqwest::get(&url).await {
            if let Ok(body) = resp.json::<Value>().await {
                if let Some(ws_url) = body.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                    return Ok(ws_url.to_string());
                }
            }
        }

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}

/// Resolve the first page target's WebSocket URL via /json/list.
/// Retries a few times since the page target may not appear immediately.
async fn get_page_ws_url(port: u16) -> Result<String> {
    let url = format!("http://127.0.0.1:{}/json/list", port);

    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
        }

        let resp = match reqwest::get(&url).await {
            Ok(r) => r,
            Err(_) => continue,
        };
        let targets: Vec<Value> = match resp.json().await {
            Ok(t) => t,
            Err(_) => continue,
        };

        for target in &targets {
            if target.get("type").and_then(|v| v.as_str()) == Some("page") {
                if let Some(ws_url) = target.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                    return Ok(ws_url.to_string());
                }
            }
        }
    }

    Err(Error::Session(
        "No page target found after retries".to_string(),
    ))
}
