//! Category scoring.
//!
//! Lighthouse runs against the shared browser over its remote-debugging port.
//! When it is disabled, unavailable, or fails, the scores come from a timed
//! load of the page plus a handful of DOM heuristics instead, so a page never
//! ends up without scores.

use crate::auth::{BasicAuth, usable};
use crate::browser::{BrowserSession, close_page, open_page};
use crate::error::{AuditError, Result};
use crate::result::{AuditFinding, Scores};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, warn};

const CATEGORIES: &str = "performance,accessibility,best-practices,seo";

/// Fixed desktop profile: no mobile emulation, a fast wired connection and
/// no CPU slowdown.
const DESKTOP_PROFILE: &[&str] = &[
    "--form-factor=desktop",
    "--screenEmulation.mobile=false",
    "--screenEmulation.width=1350",
    "--screenEmulation.height=940",
    "--screenEmulation.deviceScaleFactor=1",
    "--screenEmulation.disabled=false",
    "--throttling-method=simulate",
    "--throttling.rttMs=40",
    "--throttling.throughputKbps=10240",
    "--throttling.cpuSlowdownMultiplier=1",
    "--throttling.requestLatencyMs=0",
    "--throttling.downloadThroughputKbps=0",
    "--throttling.uploadThroughputKbps=0",
];

const METRICS_SCRIPT: &str = r#"(() => ({
  hasTitle: !!(document.title && document.title.trim().length > 0),
  hasDescription: !!document.querySelector('meta[name="description"]'),
  hasH1: !!document.querySelector('h1'),
  imagesWithoutAlt: document.querySelectorAll('img:not([alt])').length,
  totalImages: document.images.length,
  resourceCount: performance.getEntriesByType('resource').length
}))()"#;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LighthouseReport {
    #[serde(default)]
    pub categories: HashMap<String, LighthouseCategory>,
    #[serde(default)]
    pub audits: HashMap<String, LighthouseAudit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LighthouseCategory {
    pub score: Option<f64>,
    #[serde(default)]
    pub audit_refs: Vec<AuditRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuditRef {
    pub id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LighthouseAudit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub score: Option<f64>,
    pub display_value: Option<String>,
}

impl LighthouseReport {
    pub fn scores(&self) -> Scores {
        Scores {
            performance: self.category_score("performance"),
            accessibility: self.category_score("accessibility"),
            best_practices: self.category_score("best-practices"),
            seo: self.category_score("seo"),
        }
    }

    fn category_score(&self, id: &str) -> u8 {
        self.categories
            .get(id)
            .and_then(|c| c.score)
            .map(|s| (s * 100.0).round().clamp(0.0, 100.0) as u8)
            .unwrap_or(0)
    }

    /// Accessibility-category audits scoring below 1, in category order.
    pub fn accessibility_findings(&self) -> Vec<AuditFinding> {
        let Some(category) = self.categories.get("accessibility") else {
            return Vec::new();
        };
        category
            .audit_refs
            .iter()
            .filter_map(|r| {
                let audit = self.audits.get(&r.id)?;
                let score = audit.score?;
                (score < 1.0).then(|| AuditFinding {
                    id: r.id.clone(),
                    title: audit.title.clone(),
                    description: audit.description.clone(),
                    score,
                    display_value: audit.display_value.clone(),
                })
            })
            .collect()
    }
}

/// Produces a Lighthouse-style report for `url` using the browser listening
/// on `debug_port`.
#[async_trait]
pub trait PerformanceEngine: Send + Sync {
    async fn run(
        &self,
        url: &str,
        auth: Option<&BasicAuth>,
        debug_port: u16,
    ) -> Result<LighthouseReport>;
}

/// Shells out to the `lighthouse` CLI.
#[derive(Debug, Clone)]
pub struct LighthouseCli {
    binary: String,
    timeout: Duration,
}

impl LighthouseCli {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    fn args(&self, url: &str, headers: Option<&Path>, debug_port: u16) -> Vec<String> {
        let mut args = vec![
            url.to_string(),
            format!("--port={}", debug_port),
            "--output=json".to_string(),
            "--output-path=stdout".to_string(),
            "--quiet".to_string(),
            format!("--only-categories={}", CATEGORIES),
        ];
        args.extend(DESKTOP_PROFILE.iter().map(|s| s.to_string()));

        if let Some(path) = headers {
            args.push(format!("--extra-headers={}", path.display()));
        }
        args
    }
}

/// Writes the Authorization header to a private temp file, so credentials
/// stay out of the process list. Lighthouse reads `--extra-headers` from a
/// path as well as inline JSON.
fn headers_file(auth: Option<&BasicAuth>) -> Result<Option<NamedTempFile>> {
    let Some(auth) = usable(auth) else {
        return Ok(None);
    };
    let mut file = tempfile::Builder::new()
        .prefix("sitesweep-headers-")
        .suffix(".json")
        .tempfile()?;
    serde_json::to_writer(&mut file, &json!({ "Authorization": auth.header_value() }))?;
    file.flush()?;
    Ok(Some(file))
}

#[async_trait]
impl PerformanceEngine for LighthouseCli {
    async fn run(
        &self,
        url: &str,
        auth: Option<&BasicAuth>,
        debug_port: u16,
    ) -> Result<LighthouseReport> {
        // Must outlive the child process.
        let headers = headers_file(auth)?;
        let args = self.args(url, headers.as_ref().map(NamedTempFile::path), debug_port);
        debug!("Running {} against {} on port {}", self.binary, url, debug_port);

        let mut command = Command::new(&self.binary);
        command.args(&args).kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                AuditError::engine("lighthouse", format!("timed out after {:?}", self.timeout))
            })?
            .map_err(|e| AuditError::engine("lighthouse", e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AuditError::engine(
                "lighthouse",
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| AuditError::engine("lighthouse", format!("unreadable report: {}", e)))
    }
}

/// DOM facts gathered for fallback scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageMetrics {
    pub has_title: bool,
    pub has_description: bool,
    pub has_h1: bool,
    pub images_without_alt: u32,
    pub total_images: u32,
    pub resource_count: u32,
}

/// Heuristic scores from a timed load.
///
/// - performance: 100 minus one point per 50 ms of load time
/// - accessibility: 100 minus 10 per image without alt
/// - seo: 40 for a title, 40 for a description, 20 for an h1
/// - best practices: 100 minus one point per resource beyond 50
pub fn fallback_scores(load_time: Duration, metrics: &PageMetrics) -> Scores {
    let load_ms = load_time.as_millis() as f64;
    let performance = (100.0 - load_ms / 50.0).max(0.0).round() as u8;
    let accessibility =
        100u32.saturating_sub(10u32.saturating_mul(metrics.images_without_alt)) as u8;
    let seo = 40 * u8::from(metrics.has_title)
        + 40 * u8::from(metrics.has_description)
        + 20 * u8::from(metrics.has_h1);
    let best_practices = 100u32.saturating_sub(metrics.resource_count.saturating_sub(50)) as u8;

    Scores {
        performance,
        accessibility,
        best_practices,
        seo,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceOutcome {
    pub scores: Scores,
    /// Only populated when the full engine produced the scores.
    pub audit_issues: Vec<AuditFinding>,
}

#[derive(Clone)]
pub struct PerformanceAuditor {
    engine: Option<Arc<dyn PerformanceEngine>>,
    navigation_timeout: Duration,
}

impl PerformanceAuditor {
    /// `engine` is `None` when the full engine is disabled.
    pub fn new(engine: Option<Arc<dyn PerformanceEngine>>, navigation_timeout: Duration) -> Self {
        Self {
            engine,
            navigation_timeout,
        }
    }

    pub async fn audit(
        &self,
        url: &str,
        auth: Option<&BasicAuth>,
        session: &dyn BrowserSession,
    ) -> PerformanceOutcome {
        match (&self.engine, session.debug_port()) {
            (Some(engine), Some(port)) => match engine.run(url, auth, port).await {
                Ok(report) => {
                    return PerformanceOutcome {
                        scores: report.scores(),
                        audit_issues: report.accessibility_findings(),
                    };
                }
                Err(e) => warn!("Performance engine failed for {}, using fallback: {}", url, e),
            },
            (Some(_), None) => debug!("No debug endpoint; scoring {} with the fallback", url),
            (None, _) => debug!("Performance engine disabled; scoring {} with the fallback", url),
        }

        match self.fallback(url, auth, session).await {
            Ok(scores) => PerformanceOutcome {
                scores,
                audit_issues: Vec::new(),
            },
            Err(e) => {
                warn!("Fallback scoring failed for {}: {}", url, e);
                PerformanceOutcome::default()
            }
        }
    }

    async fn fallback(
        &self,
        url: &str,
        auth: Option<&BasicAuth>,
        session: &dyn BrowserSession,
    ) -> Result<Scores> {
        let started = Instant::now();
        let page = open_page(session, url, auth, self.navigation_timeout).await?;
        let load_time = started.elapsed();

        let metrics = page.evaluate(METRICS_SCRIPT).await;
        close_page(page).await;
        let metrics: PageMetrics = serde_json::from_value(metrics?)?;

        debug!("Fallback metrics for {} after {:?}: {:?}", url, load_time, metrics);
        Ok(fallback_scores(load_time, &metrics))
    }
}
