//! Chrome process launching and DevTools endpoint discovery.
//!
//! The bot owns its browser: Chrome is spawned with remote debugging bound
//! to an ephemeral localhost port and a throwaway profile directory, then
//! the HTTP `/json` target list is polled until the first page target shows
//! up. Attaching to an externally-managed Chrome instead is just a matter
//! of passing its page WebSocket URL straight to the driver.

use std::net::TcpListener;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use serde_json::Value;

use crate::error::BrowserError;

/// How long to wait for the freshly-spawned browser to expose a page target.
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Poll interval against the `/json` target list.
const DISCOVERY_POLL: Duration = Duration::from_millis(100);

/// A spawned Chrome child. Killed when dropped.
pub struct ChromeHandle {
    child: Child,
    /// WebSocket URL of the first page target.
    pub ws_url: String,
}

impl Drop for ChromeHandle {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Spawn Chrome and wait for its DevTools page target.
///
/// `binary_override` is tried first; otherwise the platform's well-known
/// install locations are walked in order. `initial_url` is opened as the
/// first tab when given.
pub async fn launch(
    binary_override: Option<&str>,
    initial_url: Option<&str>,
    headless: bool,
) -> Result<ChromeHandle, BrowserError> {
    let port = pick_ephemeral_port()?;
    let data_dir = std::env::temp_dir().join(format!("cookiebot-profile-{port}"));
    std::fs::create_dir_all(&data_dir).map_err(|e| BrowserError::LaunchFailed {
        reason: format!("cannot create profile dir {}: {e}", data_dir.display()),
    })?;

    let args = build_chrome_args(port, &data_dir, headless, initial_url);

    let mut last_error = None;
    let mut child = None;
    for candidate in binary_candidates(binary_override) {
        let mut cmd = Command::new(&candidate);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        match cmd.spawn() {
            Ok(proc) => {
                tracing::info!(binary = %candidate, port, "browser spawned");
                child = Some(proc);
                break;
            }
            Err(e) => last_error = Some(format!("{candidate}: {e}")),
        }
    }
    let mut child = child.ok_or_else(|| BrowserError::LaunchFailed {
        reason: last_error.unwrap_or_else(|| "no browser binary candidates".to_string()),
    })?;

    match wait_for_page_ws(port, DISCOVERY_TIMEOUT).await {
        Ok(ws_url) => Ok(ChromeHandle { child, ws_url }),
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(e)
        }
    }
}

/// Poll the DevTools HTTP endpoint until a page target appears.
async fn wait_for_page_ws(port: u16, timeout: Duration) -> Result<String, BrowserError> {
    let endpoint = format!("http://127.0.0.1:{port}/json");
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(resp) = reqwest::get(&endpoint).await {
            if let Ok(targets) = resp.json::<Value>().await {
                if let Some(ws) = first_page_ws(&targets) {
                    return Ok(ws);
                }
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(BrowserError::ConnectionFailed {
                url: endpoint,
                reason: format!("no page target within {timeout:?}"),
            });
        }
        tokio::time::sleep(DISCOVERY_POLL).await;
    }
}

/// Extract the WebSocket URL of the first `"type": "page"` entry from a
/// `/json` target list.
pub fn first_page_ws(targets: &Value) -> Option<String> {
    targets.as_array()?.iter().find_map(|t| {
        if t.get("type").and_then(Value::as_str) == Some("page") {
            t.get("webSocketDebuggerUrl")
                .and_then(Value::as_str)
                .map(str::to_string)
        } else {
            None
        }
    })
}

/// The argument list Chrome is spawned with.
pub fn build_chrome_args(
    port: u16,
    data_dir: &Path,
    headless: bool,
    initial_url: Option<&str>,
) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={port}"),
        "--remote-debugging-address=127.0.0.1".to_string(),
        format!("--user-data-dir={}", data_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-popup-blocking".to_string(),
    ];
    if headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
    }
    if let Some(url) = initial_url.filter(|u| !u.trim().is_empty()) {
        args.push(url.to_string());
    }
    args
}

/// Candidate binaries, configured override first.
pub fn binary_candidates(configured: Option<&str>) -> Vec<String> {
    let mut candidates = Vec::new();
    if let Some(path) = configured.filter(|p| !p.trim().is_empty()) {
        candidates.push(path.to_string());
    }
    for path in platform_candidate_paths() {
        candidates.push((*path).to_string());
    }
    candidates
}

/// Well-known Chrome/Chromium install locations per platform.
fn platform_candidate_paths() -> &'static [&'static str] {
    #[cfg(target_os = "macos")]
    {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    }

    #[cfg(target_os = "linux")]
    {
        &[
            "/usr/bin/google-chrome-stable",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium-browser",
            "/usr/bin/chromium",
            "/snap/bin/chromium",
        ]
    }

    #[cfg(target_os = "windows")]
    {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        &[]
    }
}

/// Ask the OS for a free localhost port.
fn pick_ephemeral_port() -> Result<u16, BrowserError> {
    let listener =
        TcpListener::bind("127.0.0.1:0").map_err(|e| BrowserError::LaunchFailed {
            reason: format!("cannot pick ephemeral port: {e}"),
        })?;
    let port = listener
        .local_addr()
        .map_err(|e| BrowserError::LaunchFailed {
            reason: format!("cannot read ephemeral port: {e}"),
        })?
        .port();
    Ok(port)
}
