//! Top-level operations.
//!
//! Each operation launches one browser session, shares it across every page
//! it opens, and closes it on every exit path.

use crate::accessibility::{AccessibilityAuditor, AccessibilityEngine, AxeCoreEngine};
use crate::auth::BasicAuth;
use crate::browser::{BrowserSession, ChromeLauncher, SessionLauncher};
use crate::config::AuditConfig;
use crate::crawler::{Crawler, ProgressCallback};
use crate::discovery::LinkDiscoverer;
use crate::error::Result;
use crate::page::{PageAnalysis, PageAnalyzer};
use crate::performance::{LighthouseCli, PerformanceAuditor, PerformanceEngine};
use crate::result::{CrawlPlan, CrawlResult, PageResult};
use reqwest::Client;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const USER_AGENT: &str = "Sitesweep/0.1 (https://github.com/trapdoorsec/sitesweep)";

pub struct Auditor {
    config: AuditConfig,
    launcher: Arc<dyn SessionLauncher>,
    accessibility_engine: Arc<dyn AccessibilityEngine>,
    performance_engine: Arc<dyn PerformanceEngine>,
    http: Client,
}

impl Auditor {
    /// Wires up Chrome, axe-core and Lighthouse from `config`.
    pub fn new(config: AuditConfig) -> Result<Self> {
        let config = config.sanitized();
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(15))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        // Lighthouse loads the page itself, on top of its own analysis.
        let lighthouse_timeout = config.navigation_timeout() * 4;

        Ok(Self {
            launcher: Arc::new(ChromeLauncher::new(&config)),
            accessibility_engine: Arc::new(AxeCoreEngine::new(
                http.clone(),
                config.axe_script.clone(),
            )),
            performance_engine: Arc::new(LighthouseCli::new(
                config.lighthouse_binary.clone(),
                lighthouse_timeout,
            )),
            http,
            config,
        })
    }

    pub fn with_launcher(mut self, launcher: Arc<dyn SessionLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn with_accessibility_engine(mut self, engine: Arc<dyn AccessibilityEngine>) -> Self {
        self.accessibility_engine = engine;
        self
    }

    pub fn with_performance_engine(mut self, engine: Arc<dyn PerformanceEngine>) -> Self {
        self.performance_engine = engine;
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    /// Full analysis of one page. Any failure of the page itself is returned
    /// as an error.
    pub async fn analyze_single_page(
        &self,
        url: &str,
        auth: Option<&BasicAuth>,
    ) -> Result<PageResult> {
        self.with_session(|session| async move {
            let analyzer = self.page_analyzer(session);
            let mut result = analyzer.analyze_page(url, auth).await?;
            result.auth = auth.cloned();
            Ok(result)
        })
        .await
    }

    /// The URL set a crawl from `start_url` would visit.
    pub async fn plan_crawl(&self, start_url: &str, auth: Option<&BasicAuth>) -> Result<CrawlPlan> {
        self.with_session(|session| async move {
            LinkDiscoverer::new(session.as_ref(), self.config.navigation_timeout())
                .with_max_pages(self.config.max_pages)
                .plan_pages(start_url, auth)
                .await
        })
        .await
    }

    /// Analyzes `urls`, or every page discovered from `start_url` when `urls`
    /// is `None`.
    pub async fn crawl_site(
        &self,
        start_url: &str,
        urls: Option<Vec<String>>,
        auth: Option<&BasicAuth>,
    ) -> Result<CrawlResult> {
        self.crawl_site_with_progress(start_url, urls, auth, None)
            .await
    }

    pub async fn crawl_site_with_progress(
        &self,
        start_url: &str,
        urls: Option<Vec<String>>,
        auth: Option<&BasicAuth>,
        progress: Option<ProgressCallback>,
    ) -> Result<CrawlResult> {
        self.with_session(|session| async move {
            let urls = match urls {
                Some(urls) => urls,
                None => {
                    LinkDiscoverer::new(session.as_ref(), self.config.navigation_timeout())
                        .with_max_pages(self.config.max_pages)
                        .discover(start_url, auth)
                        .await?
                }
            };

            let analyzer = self.page_analyzer(session);
            let mut crawler =
                Crawler::new(&analyzer).with_concurrency(self.config.crawl_concurrency);
            if let Some(progress) = progress {
                crawler = crawler.with_progress_callback(progress);
            }
            Ok(crawler.crawl(start_url, &urls, auth).await)
        })
        .await
    }

    fn page_analyzer(&self, session: Arc<dyn BrowserSession>) -> PageAnalyzer {
        let performance_engine = self
            .config
            .lighthouse_enabled
            .then(|| self.performance_engine.clone());

        PageAnalyzer::new(
            session,
            AccessibilityAuditor::new(self.accessibility_engine.clone(), self.config.axe_enabled),
            PerformanceAuditor::new(performance_engine, self.config.navigation_timeout()),
            self.http.clone(),
            self.config.clone(),
        )
    }

    async fn with_session<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(Arc<dyn BrowserSession>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let session = self.launcher.launch().await?;
        info!("Browser session started");

        let outcome = operation(session.clone()).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {}", e);
        }
        outcome
    }
}
