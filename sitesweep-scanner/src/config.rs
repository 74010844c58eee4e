use crate::error::{AuditError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_AXE_SCRIPT: &str =
    "https://cdnjs.cloudflare.com/ajax/libs/axe-core/4.10.2/axe.min.js";

/// Tunables for a single audit run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub axe_enabled: bool,
    /// URL or local path of the axe-core bundle injected into audited pages.
    pub axe_script: String,
    pub lighthouse_enabled: bool,
    pub lighthouse_binary: String,
    pub navigation_timeout_secs: u64,
    /// How long the console collector listens after navigation.
    pub settle_window_ms: u64,
    pub crawl_concurrency: usize,
    pub max_site_links: usize,
    pub max_pages: Option<usize>,
    pub check_image_sizes: bool,
    pub image_size_threshold_bytes: u64,
    pub chrome_path: Option<String>,
    pub headless: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            axe_enabled: true,
            axe_script: DEFAULT_AXE_SCRIPT.to_string(),
            lighthouse_enabled: true,
            lighthouse_binary: "lighthouse".to_string(),
            navigation_timeout_secs: 30,
            settle_window_ms: 2000,
            crawl_concurrency: 3,
            max_site_links: 20,
            max_pages: None,
            check_image_sizes: true,
            image_size_threshold_bytes: 1024 * 1024,
            chrome_path: None,
            headless: true,
        }
    }
}

impl AuditConfig {
    /// Loads a JSON config file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: AuditConfig = serde_json::from_str(&content).map_err(|e| {
            AuditError::Other(format!("invalid config {}: {}", path.display(), e))
        })?;
        Ok(config.sanitized())
    }

    /// Loads from a path that may start with `~`.
    pub fn load_from(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path);
        Self::load(Path::new(expanded.as_ref()))
    }

    pub fn sanitized(mut self) -> Self {
        self.crawl_concurrency = self.crawl_concurrency.max(1);
        self.navigation_timeout_secs = self.navigation_timeout_secs.max(1);
        self
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn settle_window(&self) -> Duration {
        Duration::from_millis(self.settle_window_ms)
    }
}
