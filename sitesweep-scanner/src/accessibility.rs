//! WCAG rule auditing with axe-core.

use crate::browser::BrowserPage;
use crate::error::{AuditError, Result};
use crate::result::{AccessibilityViolation, Impact};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Rule tags the audit is restricted to.
pub const WCAG_TAGS: &[&str] = &["wcag2a", "wcag2aa"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AxeResults {
    #[serde(default)]
    pub violations: Vec<AxeViolation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AxeViolation {
    pub id: String,
    #[serde(default)]
    pub impact: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub help_url: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<AxeNode>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AxeNode {
    /// Selector path; nested arrays appear for shadow-DOM and iframe targets.
    #[serde(default)]
    pub target: Vec<Value>,
}

/// Runs an accessibility rule engine against a loaded page.
#[async_trait]
pub trait AccessibilityEngine: Send + Sync {
    async fn run(&self, page: &dyn BrowserPage, tags: &[&str]) -> Result<AxeResults>;
}

/// Injects axe-core into the page and calls `axe.run`.
///
/// The script source is either an `http(s)` URL or a local path, loaded once
/// and reused for every page.
pub struct AxeCoreEngine {
    client: Client,
    source: String,
    script: OnceCell<String>,
}

impl AxeCoreEngine {
    pub fn new(client: Client, source: impl Into<String>) -> Self {
        Self {
            client,
            source: source.into(),
            script: OnceCell::new(),
        }
    }

    async fn script(&self) -> Result<&str> {
        let script = self.script.get_or_try_init(|| self.load_script()).await?;
        Ok(script.as_str())
    }

    async fn load_script(&self) -> Result<String> {
        if self.source.starts_with("http://") || self.source.starts_with("https://") {
            debug!("Fetching axe-core from {}", self.source);
            let response = self.client.get(&self.source).send().await?;
            if !response.status().is_success() {
                return Err(AuditError::engine(
                    "axe",
                    format!("fetching {} returned {}", self.source, response.status()),
                ));
            }
            Ok(response.text().await?)
        } else {
            let path = shellexpand::tilde(&self.source).into_owned();
            Ok(tokio::fs::read_to_string(path).await?)
        }
    }
}

#[async_trait]
impl AccessibilityEngine for AxeCoreEngine {
    async fn run(&self, page: &dyn BrowserPage, tags: &[&str]) -> Result<AxeResults> {
        let script = self.script().await?;
        page.evaluate(script).await?;

        let values = serde_json::to_string(tags)?;
        let call = format!(
            "axe.run(document, {{ runOnly: {{ type: 'tag', values: {} }}, resultTypes: ['violations'] }})\
             .then(r => ({{ violations: r.violations }}))",
            values
        );
        let raw = page.evaluate(&call).await?;
        serde_json::from_value(raw).map_err(|e| AuditError::engine("axe", e.to_string()))
    }
}

/// Wraps an [`AccessibilityEngine`]; never fails the page.
#[derive(Clone)]
pub struct AccessibilityAuditor {
    engine: Arc<dyn AccessibilityEngine>,
    enabled: bool,
}

impl AccessibilityAuditor {
    pub fn new(engine: Arc<dyn AccessibilityEngine>, enabled: bool) -> Self {
        Self { engine, enabled }
    }

    pub async fn audit(&self, page: &dyn BrowserPage) -> Vec<AccessibilityViolation> {
        if !self.enabled {
            return Vec::new();
        }
        match self.engine.run(page, WCAG_TAGS).await {
            Ok(results) => results.violations.into_iter().map(to_violation).collect(),
            Err(e) => {
                warn!("Accessibility audit failed: {}", e);
                Vec::new()
            }
        }
    }
}

fn to_violation(violation: AxeViolation) -> AccessibilityViolation {
    let target_selectors = violation
        .nodes
        .first()
        .map(|node| flatten_selectors(&node.target))
        .unwrap_or_default();

    AccessibilityViolation {
        impact: parse_impact(violation.impact.as_deref()),
        affected_node_count: violation.nodes.len(),
        rule_id: violation.id,
        description: violation.description,
        help: violation.help,
        help_url: violation.help_url,
        tags: violation.tags,
        target_selectors,
    }
}

fn parse_impact(impact: Option<&str>) -> Impact {
    match impact {
        Some("critical") => Impact::Critical,
        Some("serious") => Impact::Serious,
        Some("moderate") => Impact::Moderate,
        _ => Impact::Minor,
    }
}

fn flatten_selectors(target: &[Value]) -> Vec<String> {
    target
        .iter()
        .flat_map(|entry| match entry {
            Value::String(s) => vec![s.clone()],
            Value::Array(nested) => flatten_selectors(nested),
            _ => Vec::new(),
        })
        .collect()
}
