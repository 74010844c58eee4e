use indicatif::{ProgressBar, ProgressStyle};
use sitesweep_scanner::crawler::{CrawlProgress, ProgressCallback};
use sitesweep_scanner::{AuditConfig, Auditor, BasicAuth, CrawlPlan, CrawlResult, PageResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Options for configuring a crawl operation
pub struct CrawlOptions {
    pub start_url: String,
    /// Explicit URL set; discovered from `start_url` when `None`.
    pub urls: Option<Vec<String>>,
    pub auth: Option<BasicAuth>,
    pub config: AuditConfig,
    pub show_progress_bars: bool,
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Extract the path component from a URL
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() || path == "/" {
                "/".to_string()
            } else {
                path
            }
        })
        .unwrap_or_else(|| url.to_string())
}

/// Reads a URL list: one per line, blank lines and `#` comments ignored.
pub fn parse_url_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    pb
}

fn progress_line(progress: &CrawlProgress) -> String {
    let marker = if progress.failed { "✗" } else { "✓" };
    format!(
        "[{}/{}] {} {}",
        progress.completed,
        progress.total,
        marker,
        extract_url_path(&progress.url)
    )
}

/// Analyze a single page
pub async fn execute_check(
    url: &str,
    auth: Option<&BasicAuth>,
    config: AuditConfig,
    show_progress_bars: bool,
) -> Result<PageResult, String> {
    let auditor = Auditor::new(config).map_err(|e| e.to_string())?;
    let pb = show_progress_bars.then(|| spinner(&format!("Analyzing {}...", url)));

    let result = auditor.analyze_single_page(url, auth).await;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    result.map_err(|e| e.to_string())
}

/// Discover the pages a crawl would visit
pub async fn execute_plan(
    url: &str,
    auth: Option<&BasicAuth>,
    config: AuditConfig,
    show_progress_bars: bool,
) -> Result<CrawlPlan, String> {
    let auditor = Auditor::new(config).map_err(|e| e.to_string())?;
    let pb = show_progress_bars.then(|| spinner(&format!("Discovering pages under {}...", url)));

    let plan = auditor.plan_crawl(url, auth).await;

    if let Some(pb) = pb {
        match &plan {
            Ok(plan) => pb.finish_with_message(format!("Found {} pages", plan.total_pages)),
            Err(_) => pb.finish_and_clear(),
        }
    }
    plan.map_err(|e| e.to_string())
}

/// Execute a crawl with the given options
/// Returns the crawl result
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<CrawlResult, String> {
    let CrawlOptions {
        start_url,
        urls,
        auth,
        config,
        show_progress_bars,
    } = options;

    let auditor = Auditor::new(config).map_err(|e| e.to_string())?;

    let progress_bar = show_progress_bars.then(|| {
        let message = if urls.is_some() {
            "Starting crawl..."
        } else {
            "Discovering pages..."
        };
        Arc::new(spinner(message))
    });

    let bar = progress_bar.clone();
    let callback = progress_callback.clone();
    let internal_progress_callback: ProgressCallback = Arc::new(move |progress: CrawlProgress| {
        debug!("{}", progress_line(&progress));
        if let Some(ref pb) = bar {
            if pb.length() != Some(progress.total as u64) {
                pb.set_length(progress.total as u64);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{spinner:.cyan} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                {
                    pb.set_style(style.progress_chars("=> "));
                }
            }
            pb.set_position(progress.completed as u64);
            pb.set_message(extract_url_path(&progress.url));
        }
        if let Some(ref cb) = callback {
            cb(progress_line(&progress));
        }
    });

    let result = auditor
        .crawl_site_with_progress(
            &start_url,
            urls,
            auth.as_ref(),
            Some(internal_progress_callback),
        )
        .await;

    if let Some(ref pb) = progress_bar {
        match &result {
            Ok(crawl) => pb.finish_with_message(format!(
                "Crawl complete! {} pages analyzed, {} failed",
                crawl.total_pages,
                crawl.failed_pages().count()
            )),
            Err(_) => pb.finish_and_clear(),
        }
    }

    result.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_url_path() {
        assert_eq!(extract_url_path("https://example.com"), "/");
        assert_eq!(extract_url_path("https://example.com/blog/post"), "/blog/post");
        assert_eq!(extract_url_path("not a url"), "not a url");
    }

    #[test]
    fn test_parse_url_list_skips_blanks_and_comments() {
        let content = "https://example.com/\n\n# staging only\n  https://example.com/about  \n";
        assert_eq!(
            parse_url_list(content),
            vec![
                "https://example.com/".to_string(),
                "https://example.com/about".to_string()
            ]
        );
    }

    #[test]
    fn test_progress_line() {
        let line = progress_line(&CrawlProgress {
            url: "https://example.com/team".to_string(),
            completed: 2,
            total: 5,
            failed: true,
        });
        assert_eq!(line, "[2/5] ✗ /team");
    }
}
