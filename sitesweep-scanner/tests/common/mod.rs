#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{Value, json};
use sitesweep_scanner::AuditConfig;
use sitesweep_scanner::auth::BasicAuth;
use sitesweep_scanner::browser::{BrowserPage, BrowserSession, RuntimeEvent, SessionLauncher};
use sitesweep_scanner::error::{AuditError, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const EXAMPLE_HTML: &str = r#"<!doctype html>
<html>
<head>
    <title>Example Domain</title>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
</head>
<body>
<div>
    <h1>Example Domain</h1>
    <p>This domain is for use in illustrative examples in documents.</p>
    <p><a href="https://www.iana.org/domains/example">More information...</a></p>
</div>
</body>
</html>"#;

/// One page of an in-memory site.
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    pub html: String,
    /// Absolute hrefs as the browser would report them.
    pub links: Vec<String>,
    pub events: Vec<RuntimeEvent>,
    pub fail_navigation: bool,
}

impl MockPage {
    pub fn html(html: &str) -> Self {
        Self {
            html: html.to_string(),
            ..Self::default()
        }
    }

    pub fn linking_to(links: &[&str]) -> Self {
        let anchors: String = links
            .iter()
            .map(|l| format!("<a href=\"{}\">{}</a>", l, l))
            .collect();
        Self {
            html: format!(
                "<html><head><title>Page</title></head><body><h1>Page</h1>{}</body></html>",
                anchors
            ),
            links: links.iter().map(|l| l.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_navigation: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionStats {
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    pub pages_opened: AtomicUsize,
    pub pages_closed: AtomicUsize,
    pub authenticated: AtomicUsize,
    pub navigations: Mutex<Vec<String>>,
}

#[derive(Clone)]
pub struct MockLauncher {
    pub site: Arc<HashMap<String, MockPage>>,
    pub stats: Arc<SessionStats>,
    pub debug_port: Option<u16>,
    pub fail_launch: bool,
}

impl MockLauncher {
    pub fn new(pages: Vec<(&str, MockPage)>) -> Self {
        Self {
            site: Arc::new(
                pages
                    .into_iter()
                    .map(|(url, page)| (url.to_string(), page))
                    .collect(),
            ),
            stats: Arc::new(SessionStats::default()),
            debug_port: None,
            fail_launch: false,
        }
    }

    pub fn with_debug_port(mut self, port: u16) -> Self {
        self.debug_port = Some(port);
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }
}

#[async_trait]
impl SessionLauncher for MockLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>> {
        if self.fail_launch {
            return Err(AuditError::LaunchFailed("no chrome here".to_string()));
        }
        self.stats.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockSession {
            site: self.site.clone(),
            stats: self.stats.clone(),
            debug_port: self.debug_port,
        }))
    }
}

pub struct MockSession {
    site: Arc<HashMap<String, MockPage>>,
    stats: Arc<SessionStats>,
    debug_port: Option<u16>,
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>> {
        self.stats.pages_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockTab {
            site: self.site.clone(),
            stats: self.stats.clone(),
            current: Mutex::new(None),
            events: Mutex::new(None),
        }))
    }

    fn debug_port(&self) -> Option<u16> {
        self.debug_port
    }

    async fn close(&self) -> Result<()> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct MockTab {
    site: Arc<HashMap<String, MockPage>>,
    stats: Arc<SessionStats>,
    current: Mutex<Option<MockPage>>,
    events: Mutex<Option<mpsc::UnboundedSender<RuntimeEvent>>>,
}

impl MockTab {
    fn current(&self) -> Result<MockPage> {
        self.current
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| AuditError::Other("page not navigated".to_string()))
    }
}

#[async_trait]
impl BrowserPage for MockTab {
    async fn authenticate(&self, _auth: &BasicAuth) -> Result<()> {
        self.stats.authenticated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn goto(&self, url: &str, _timeout: Duration) -> Result<()> {
        self.stats.navigations.lock().unwrap().push(url.to_string());
        let page = match self.site.get(url) {
            Some(page) if !page.fail_navigation => page.clone(),
            _ => {
                return Err(AuditError::NavigationFailed {
                    url: url.to_string(),
                    reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
                });
            }
        };

        // Deliver load-time events, then hang up so collectors finish early.
        if let Some(tx) = self.events.lock().unwrap().take() {
            for event in &page.events {
                let _ = tx.send(event.clone());
            }
        }
        *self.current.lock().unwrap() = Some(page);
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        Ok(self.current()?.html)
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let page = self.current()?;
        if script.contains("a[href]") {
            return Ok(json!(page.links));
        }
        if script.contains("resourceCount") {
            return Ok(json!({
                "hasTitle": page.html.contains("<title>"),
                "hasDescription": page.html.contains("name=\"description\""),
                "hasH1": page.html.contains("<h1"),
                "imagesWithoutAlt": 0,
                "totalImages": 0,
                "resourceCount": 3
            }));
        }
        Ok(Value::Null)
    }

    async fn runtime_events(&self) -> Result<mpsc::UnboundedReceiver<RuntimeEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.events.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.stats.pages_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Offline config: no external engines, no image size checks, short settle window.
pub fn offline_config() -> AuditConfig {
    AuditConfig {
        axe_enabled: false,
        lighthouse_enabled: false,
        check_image_sizes: false,
        settle_window_ms: 50,
        ..AuditConfig::default()
    }
}
