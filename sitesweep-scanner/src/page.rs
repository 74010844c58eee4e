//! Single-page analysis.

use crate::accessibility::AccessibilityAuditor;
use crate::analyzers::console::collect_console_errors;
use crate::analyzers::image::check_image_sizes;
use crate::analyzers::{MarkupFindings, analyze_markup};
use crate::auth::BasicAuth;
use crate::browser::{BrowserSession, close_page, open_page};
use crate::config::AuditConfig;
use crate::discovery::collect_site_links;
use crate::error::{AuditError, Result};
use crate::performance::PerformanceAuditor;
use crate::result::{AccessibilityFindings, PageIssues, PageReport, PageResult};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

/// Produces a [`PageResult`] for one URL. The crawl orchestrator only needs
/// this, which keeps it testable without a browser.
#[async_trait]
pub trait PageAnalysis: Send + Sync {
    async fn analyze_page(&self, url: &str, auth: Option<&BasicAuth>) -> Result<PageResult>;
}

/// Runs every analyzer and auditor against one page of a shared session.
pub struct PageAnalyzer {
    session: Arc<dyn BrowserSession>,
    accessibility: AccessibilityAuditor,
    performance: PerformanceAuditor,
    http: Client,
    config: AuditConfig,
}

impl PageAnalyzer {
    pub fn new(
        session: Arc<dyn BrowserSession>,
        accessibility: AccessibilityAuditor,
        performance: PerformanceAuditor,
        http: Client,
        config: AuditConfig,
    ) -> Self {
        Self {
            session,
            accessibility,
            performance,
            http,
            config,
        }
    }

    async fn analyze_snapshot(
        &self,
        html: &str,
        base: &Url,
        auth: Option<&BasicAuth>,
    ) -> MarkupFindings {
        let mut findings = analyze_markup(html, base);
        if self.config.check_image_sizes {
            let large = check_image_sizes(
                &self.http,
                &findings.images.images,
                auth,
                self.config.image_size_threshold_bytes,
            )
            .await;
            findings.images.issues.extend(large);
        }
        findings
    }
}

#[async_trait]
impl PageAnalysis for PageAnalyzer {
    async fn analyze_page(&self, url: &str, auth: Option<&BasicAuth>) -> Result<PageResult> {
        let base =
            Url::parse(url).map_err(|e| AuditError::InvalidUrl(format!("{}: {}", url, e)))?;
        let timeout = self.config.navigation_timeout();
        info!("Analyzing {}", url);

        let page = open_page(self.session.as_ref(), url, auth, timeout).await?;
        let html = match page.content().await {
            Ok(html) => html,
            Err(e) => {
                close_page(page).await;
                return Err(e);
            }
        };

        let (markup, console_errors, violations, performance) = tokio::join!(
            self.analyze_snapshot(&html, &base, auth),
            collect_console_errors(
                self.session.as_ref(),
                url,
                auth,
                timeout,
                self.config.settle_window(),
            ),
            self.accessibility.audit(page.as_ref()),
            self.performance.audit(url, auth, self.session.as_ref()),
        );
        close_page(page).await;

        let site_links = collect_site_links(&base, &markup.hrefs, self.config.max_site_links);
        let issues = PageIssues {
            headings: markup.headings.issues,
            headings_structure: markup.headings.structure,
            images: markup.images.issues,
            all_images: markup.images.images,
            links: markup.links,
            meta: markup.meta,
            all_meta: markup.all_meta,
            html_structure: markup.html_structure,
            accessibility: AccessibilityFindings {
                audit_issues: performance.audit_issues,
                violations,
            },
            console_errors,
        };

        let counts = issues.counts();
        debug!(
            "{}: {} errors, {} warnings, {} info",
            url, counts.errors, counts.warnings, counts.info
        );

        Ok(PageResult::analyzed(
            url.to_string(),
            PageReport {
                scores: performance.scores,
                issues,
                site_links,
            },
            None,
        ))
    }
}
