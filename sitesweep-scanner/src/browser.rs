//! Browser session management.
//!
//! The pipeline talks to the browser through the [`SessionLauncher`],
//! [`BrowserSession`] and [`BrowserPage`] traits. The production
//! implementation drives Chrome over CDP with chromiumoxide; tests plug in
//! in-memory sessions.
//!
//! One session is launched per top-level operation and shared by every page
//! opened during it. Callers own the session and must close it on every exit
//! path; dropping a [`ChromeSession`] without closing it still kills the
//! Chrome process.

use crate::auth::{BasicAuth, usable};
use crate::config::AuditConfig;
use crate::error::{AuditError, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EventLoadingFailed, EventRequestWillBeSent, Headers, RequestId, SetExtraHttpHeadersParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{
    ConsoleApiCalledType, EventConsoleApiCalled, EventExceptionThrown,
};
use chromiumoxide::page::Page;
use futures::StreamExt;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

/// Flags every audit browser is launched with.
pub const HARDENED_FLAGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-extensions",
    "--disable-background-networking",
    "--disable-default-apps",
    "--disable-sync",
    "--no-first-run",
    "--no-default-browser-check",
    "--mute-audio",
];

/// A runtime event observed on a live page.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    ConsoleError {
        text: String,
        location: Option<String>,
    },
    Exception {
        message: String,
        stack: Option<String>,
        location: Option<String>,
    },
    RequestFailed {
        url: String,
        reason: String,
    },
}

#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>>;
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>>;

    /// Remote debugging port other tools can attach to.
    fn debug_port(&self) -> Option<u16>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Attaches Basic credentials to every request the page makes.
    async fn authenticate(&self, auth: &BasicAuth) -> Result<()>;

    /// Navigates and waits until the network has been quiet, within `timeout`.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    async fn content(&self) -> Result<String>;

    async fn evaluate(&self, script: &str) -> Result<Value>;

    /// Subscribes to console errors, uncaught exceptions and failed requests.
    /// Must be called before navigation to observe load-time events.
    async fn runtime_events(&self) -> Result<mpsc::UnboundedReceiver<RuntimeEvent>>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Opens a page, applies credentials when usable, and navigates.
///
/// The page is closed again if navigation fails.
pub async fn open_page(
    session: &dyn BrowserSession,
    url: &str,
    auth: Option<&BasicAuth>,
    timeout: Duration,
) -> Result<Box<dyn BrowserPage>> {
    let page = session.new_page().await?;

    if let Some(auth) = usable(auth)
        && let Err(e) = page.authenticate(auth).await
    {
        close_page(page).await;
        return Err(e);
    }

    match page.goto(url, timeout).await {
        Ok(()) => Ok(page),
        Err(e) => {
            close_page(page).await;
            Err(e)
        }
    }
}

/// Closes a page, logging instead of failing.
pub async fn close_page(page: Box<dyn BrowserPage>) {
    if let Err(e) = page.close().await {
        debug!("Failed to close page: {}", e);
    }
}

/// Launches headless Chrome through chromiumoxide.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    headless: bool,
    chrome_path: Option<String>,
    window_size: (u32, u32),
}

impl ChromeLauncher {
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            headless: config.headless,
            chrome_path: config.chrome_path.clone(),
            window_size: (1350, 940),
        }
    }

    fn browser_config(&self, profile_dir: &Path) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder();
        if !self.headless {
            builder = builder.with_head();
        }

        builder = builder.window_size(self.window_size.0, self.window_size.1);

        builder = builder.user_data_dir(profile_dir);

        for flag in HARDENED_FLAGS {
            builder = builder.arg(*flag);
        }

        if let Some(path) = &self.chrome_path {
            builder = builder.chrome_executable(path.clone());
        }

        builder
            .build()
            .map_err(|e| AuditError::LaunchFailed(format!("invalid browser configuration: {}", e)))
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>> {
        let profile_dir = profile_dir()?;
        let config = self.browser_config(profile_dir.path())?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AuditError::LaunchFailed(e.to_string()))?;

        // chromiumoxide only makes progress while its handler is polled.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler error: {}", e);
                }
            }
        });

        let debug_port = debug_port_from_ws(browser.websocket_address());
        debug!("Browser launched (debug port {:?})", debug_port);

        Ok(Arc::new(ChromeSession {
            browser: Mutex::new(Some(browser)),
            handler_task,
            debug_port,
            _profile_dir: profile_dir,
        }))
    }
}

/// A private Chrome profile per launch keeps concurrent sessions apart. The
/// directory is deleted when the returned guard drops.
fn profile_dir() -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix("sitesweep-chrome-")
        .tempdir()
        .map_err(|e| AuditError::LaunchFailed(format!("cannot create profile dir: {}", e)))
}

fn debug_port_from_ws(ws_address: &str) -> Option<u16> {
    Url::parse(ws_address).ok().and_then(|u| u.port())
}

pub struct ChromeSession {
    browser: Mutex<Option<Browser>>,
    handler_task: JoinHandle<()>,
    debug_port: Option<u16>,
    // Removed on drop, after the browser field has killed Chrome.
    _profile_dir: TempDir,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>> {
        let guard = self.browser.lock().await;
        let browser = guard
            .as_ref()
            .ok_or_else(|| AuditError::Other("browser session is closed".to_string()))?;

        let page = browser.new_page("about:blank").await?;
        page.execute(SetLifecycleEventsEnabledParams::new(true)).await?;
        Ok(Box::new(ChromePage {
            page,
            listeners: std::sync::Mutex::new(Vec::new()),
        }))
    }

    fn debug_port(&self) -> Option<u16> {
        self.debug_port
    }

    async fn close(&self) -> Result<()> {
        let taken = self.browser.lock().await.take();
        if let Some(mut browser) = taken {
            debug!("Closing browser session");
            browser.close().await?;
            if let Err(e) = browser.wait().await {
                debug!("Browser process did not exit cleanly: {}", e);
            }
        }
        self.handler_task.abort();
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // chromiumoxide's Browser kills the process on drop if close() was skipped.
        self.handler_task.abort();
    }
}

pub struct ChromePage {
    page: Page,
    listeners: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl ChromePage {
    fn track(&self, handle: JoinHandle<()>) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(handle);
        }
    }
}

#[async_trait]
impl BrowserPage for ChromePage {
    async fn authenticate(&self, auth: &BasicAuth) -> Result<()> {
        let headers = Headers::new(serde_json::json!({ "Authorization": auth.header_value() }));
        self.page
            .execute(SetExtraHttpHeadersParams::new(headers))
            .await?;
        Ok(())
    }

    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut lifecycle = self.page.event_listener::<EventLifecycleEvent>().await?;

        match tokio::time::timeout(timeout, self.page.goto(url)).await {
            Err(_) => {
                return Err(AuditError::NavigationTimeout {
                    url: url.to_string(),
                    timeout,
                });
            }
            Ok(Err(e)) => {
                return Err(AuditError::NavigationFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                });
            }
            Ok(Ok(_)) => {}
        }

        let network_idle = async {
            while let Some(event) = lifecycle.next().await {
                if event.name == "networkIdle" {
                    break;
                }
            }
        };

        tokio::time::timeout_at(deadline, network_idle)
            .await
            .map_err(|_| AuditError::NavigationTimeout {
                url: url.to_string(),
                timeout,
            })
    }

    async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| AuditError::ScriptFailed(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(Value::Null))
    }

    async fn runtime_events(&self) -> Result<mpsc::UnboundedReceiver<RuntimeEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut console = self.page.event_listener::<EventConsoleApiCalled>().await?;
        let console_tx = tx.clone();
        self.track(tokio::spawn(async move {
            while let Some(event) = console.next().await {
                if !matches!(event.r#type, ConsoleApiCalledType::Error) {
                    continue;
                }
                let _ = console_tx.send(console_error_event(&event));
            }
        }));

        let mut exceptions = self.page.event_listener::<EventExceptionThrown>().await?;
        let exception_tx = tx.clone();
        self.track(tokio::spawn(async move {
            while let Some(event) = exceptions.next().await {
                let _ = exception_tx.send(exception_event(&event));
            }
        }));

        // Failed-request events only carry the request id; remember the URLs.
        let mut requests = self.page.event_listener::<EventRequestWillBeSent>().await?;
        let mut failures = self.page.event_listener::<EventLoadingFailed>().await?;
        self.track(tokio::spawn(async move {
            let mut urls: HashMap<RequestId, String> = HashMap::new();
            loop {
                tokio::select! {
                    Some(sent) = requests.next() => {
                        urls.insert(sent.request_id.clone(), sent.request.url.clone());
                    }
                    Some(failed) = failures.next() => {
                        let url = urls
                            .get(&failed.request_id)
                            .cloned()
                            .unwrap_or_default();
                        let _ = tx.send(RuntimeEvent::RequestFailed {
                            url,
                            reason: failed.error_text.clone(),
                        });
                    }
                    else => break,
                }
            }
        }));

        Ok(rx)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        if let Ok(mut listeners) = self.listeners.lock() {
            for handle in listeners.drain(..) {
                handle.abort();
            }
        }
        if let Err(e) = self.page.close().await {
            warn!("Failed to close page: {}", e);
        }
        Ok(())
    }
}

fn console_error_event(event: &EventConsoleApiCalled) -> RuntimeEvent {
    let text = event
        .args
        .iter()
        .map(|arg| match arg.value.as_ref() {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => arg.description.clone().unwrap_or_else(|| "<object>".to_string()),
        })
        .collect::<Vec<_>>()
        .join(" ");

    let location = event
        .stack_trace
        .as_ref()
        .and_then(|trace| trace.call_frames.first())
        .map(|frame| format!("{}:{}:{}", frame.url, frame.line_number, frame.column_number));

    RuntimeEvent::ConsoleError { text, location }
}

fn exception_event(event: &EventExceptionThrown) -> RuntimeEvent {
    let details = &event.exception_details;
    let message = details
        .exception
        .as_ref()
        .and_then(|ex| ex.description.clone())
        .unwrap_or_else(|| details.text.clone());

    let stack = details.stack_trace.as_ref().map(|trace| {
        trace
            .call_frames
            .iter()
            .map(|frame| {
                format!(
                    "    at {} ({}:{}:{})",
                    if frame.function_name.is_empty() {
                        "<anonymous>"
                    } else {
                        frame.function_name.as_str()
                    },
                    frame.url,
                    frame.line_number,
                    frame.column_number
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    });

    let location = details
        .url
        .as_ref()
        .map(|url| format!("{}:{}:{}", url, details.line_number, details.column_number));

    RuntimeEvent::Exception {
        message,
        stack,
        location,
    }
}
