//! Headless browser sessions for pages that render their counts client-side.
//!
//! Each session is one child process that loads a page, lets its scripts run
//! for a bounded virtual-time budget, and prints the resulting DOM. The child
//! is killed when the session is closed or dropped, so a cancelled or timed-out
//! fetch never leaves a browser behind.

use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};

use crate::error::SourceError;

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Executable to launch (`chromium`, `google-chrome`, ...).
    pub bin: String,
    pub user_agent: String,
    /// Virtual time the page may spend running scripts before the DOM is dumped.
    pub render_budget_ms: u64,
}

impl BrowserConfig {
    fn args(&self, url: &str) -> Vec<String> {
        vec![
            "--headless=new".to_string(),
            "--no-sandbox".to_string(),
            "--disable-gpu".to_string(),
            "--disable-dev-shm-usage".to_string(),
            format!("--user-agent={}", self.user_agent),
            format!("--virtual-time-budget={}", self.render_budget_ms),
            "--dump-dom".to_string(),
            url.to_string(),
        ]
    }
}

/// A running browser process rendering one page.
pub struct BrowserSession {
    child: Option<Child>,
    url: String,
}

impl BrowserSession {
    /// Starts the browser on `url`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Browser`] if the executable cannot be spawned.
    pub fn launch(config: &BrowserConfig, url: &str) -> Result<Self, SourceError> {
        let child = Command::new(&config.bin)
            .args(config.args(url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SourceError::Browser(format!("failed to launch {}: {e}", config.bin)))?;
        tracing::debug!(bin = config.bin.as_str(), url, "browser session started");
        Ok(Self {
            child: Some(child),
            url: url.to_string(),
        })
    }

    /// Waits for the page to finish rendering and returns the serialized DOM.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Browser`] if the output cannot be read or the
    /// process exits unsuccessfully.
    pub async fn read_dom(&mut self) -> Result<String, SourceError> {
        let child = self
            .child
            .as_mut()
            .ok_or_else(|| SourceError::Browser("session already closed".to_string()))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| SourceError::Browser("browser stdout unavailable".to_string()))?;

        let mut dom = String::new();
        stdout
            .read_to_string(&mut dom)
            .await
            .map_err(|e| SourceError::Browser(format!("reading DOM of {}: {e}", self.url)))?;
        let status = child
            .wait()
            .await
            .map_err(|e| SourceError::Browser(format!("waiting for browser: {e}")))?;
        if !status.success() {
            return Err(SourceError::Browser(format!(
                "browser exited with {status} rendering {}",
                self.url
            )));
        }
        Ok(dom)
    }

    /// Terminates the process if it is still running and reaps it.
    pub async fn close(mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill().await {
                tracing::debug!(url = self.url.as_str(), error = %e, "browser already exited");
            }
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(child) = self.child.as_mut() {
            let _ = child.start_kill();
        }
    }
}

/// Renders `url` and returns its DOM, always closing the session.
///
/// # Errors
///
/// Propagates [`SourceError::Browser`] from launch or render.
pub async fn render_page(config: &BrowserConfig, url: &str) -> Result<String, SourceError> {
    let mut session = BrowserSession::launch(config, url)?;
    let dom = session.read_dom().await;
    session.close().await;
    dom
}
