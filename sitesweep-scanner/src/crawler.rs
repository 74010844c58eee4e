use crate::auth::BasicAuth;
use crate::page::PageAnalysis;
use crate::result::{CrawlResult, PageResult};
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

pub const DEFAULT_CONCURRENCY: usize = 3;

/// Reported after each page finishes, in completion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlProgress {
    pub url: String,
    pub completed: usize,
    pub total: usize,
    pub failed: bool,
}

pub type ProgressCallback = Arc<dyn Fn(CrawlProgress) + Send + Sync>;

/// Analyzes a fixed URL set with bounded concurrency.
///
/// A new page starts as soon as any in-flight page finishes. Failures are
/// recorded per page and never abort the crawl; results come back in the
/// order the URLs were given.
pub struct Crawler<'a> {
    analyzer: &'a dyn PageAnalysis,
    concurrency: usize,
    progress_callback: Option<ProgressCallback>,
}

impl<'a> Crawler<'a> {
    pub fn new(analyzer: &'a dyn PageAnalysis) -> Self {
        Self {
            analyzer,
            concurrency: DEFAULT_CONCURRENCY,
            progress_callback: None,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub async fn crawl(
        &self,
        start_url: &str,
        urls: &[String],
        auth: Option<&BasicAuth>,
    ) -> CrawlResult {
        info!(
            "Crawling {} pages from {} ({} at a time)",
            urls.len(),
            start_url,
            self.concurrency
        );
        let started = Instant::now();
        let semaphore = Semaphore::new(self.concurrency);
        let completed = AtomicUsize::new(0);
        let total = urls.len();

        let tasks = urls.iter().map(|url| {
            let semaphore = &semaphore;
            let completed = &completed;
            async move {
                let result = match semaphore.acquire().await {
                    Ok(_permit) => self.analyze_one(url, auth).await,
                    Err(e) => PageResult::with_error(url.clone(), e.to_string()),
                };

                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                if let Some(ref callback) = self.progress_callback {
                    callback(CrawlProgress {
                        url: url.clone(),
                        completed: done,
                        total,
                        failed: result.is_error(),
                    });
                }
                result
            }
        });

        let results = join_all(tasks).await;
        let crawl = CrawlResult::new(start_url.to_string(), results, auth.cloned());
        info!(
            "Crawl complete: {} pages, {} failed, in {:.1?}",
            crawl.total_pages,
            crawl.failed_pages().count(),
            started.elapsed()
        );
        crawl
    }

    async fn analyze_one(&self, url: &str, auth: Option<&BasicAuth>) -> PageResult {
        debug!("Starting {}", url);
        match self.analyzer.analyze_page(url, auth).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Analysis failed for {}: {}", url, e);
                PageResult::with_error(url.to_string(), e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuditError, Result};
    use crate::result::{PageIssues, PageReport, Scores};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    struct FakeAnalyzer {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        failing: Option<String>,
        delay: Duration,
    }

    impl FakeAnalyzer {
        fn new(failing: Option<&str>) -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                failing: failing.map(str::to_string),
                delay: Duration::from_millis(100),
            }
        }
    }

    #[async_trait]
    impl PageAnalysis for FakeAnalyzer {
        async fn analyze_page(&self, url: &str, _auth: Option<&BasicAuth>) -> Result<PageResult> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.failing.as_deref() == Some(url) {
                return Err(AuditError::NavigationTimeout {
                    url: url.to_string(),
                    timeout: Duration::from_secs(30),
                });
            }
            Ok(PageResult::analyzed(
                url.to_string(),
                PageReport {
                    scores: Scores::default(),
                    issues: PageIssues::default(),
                    site_links: Vec::new(),
                },
                None,
            ))
        }
    }

    fn urls(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("https://example.com/page-{}", i))
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_three_in_flight() {
        let analyzer = FakeAnalyzer::new(None);
        let crawler = Crawler::new(&analyzer);

        let result = crawler.crawl("https://example.com", &urls(10), None).await;

        assert_eq!(result.total_pages, 10);
        assert_eq!(analyzer.peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_concurrency_is_respected() {
        let analyzer = FakeAnalyzer::new(None);
        let crawler = Crawler::new(&analyzer).with_concurrency(5);
        crawler.crawl("https://example.com", &urls(12), None).await;
        assert_eq!(analyzer.peak.load(Ordering::SeqCst), 5);

        let analyzer = FakeAnalyzer::new(None);
        let crawler = Crawler::new(&analyzer).with_concurrency(0);
        crawler.crawl("https://example.com", &urls(3), None).await;
        assert_eq!(analyzer.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_isolated_and_order_preserved() {
        let urls = urls(5);
        let analyzer = FakeAnalyzer::new(Some(&urls[2]));
        let crawler = Crawler::new(&analyzer);

        let result = crawler.crawl("https://example.com", &urls, None).await;

        assert_eq!(result.results.len(), urls.len());
        let returned: Vec<_> = result.results.iter().map(|r| r.url.clone()).collect();
        assert_eq!(returned, urls);
        let failed: Vec<_> = result.failed_pages().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].url, urls[2]);
        assert!(failed[0].error().unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_reports_every_page() {
        let analyzer = FakeAnalyzer::new(Some("https://example.com/page-1"));
        let seen: Arc<Mutex<Vec<CrawlProgress>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let crawler = Crawler::new(&analyzer).with_progress_callback(Arc::new(move |p| {
            sink.lock().unwrap().push(p);
        }));

        crawler.crawl("https://example.com", &urls(4), None).await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|p| p.total == 4));
        assert_eq!(seen.iter().map(|p| p.completed).max(), Some(4));
        assert_eq!(seen.iter().filter(|p| p.failed).count(), 1);
    }

    #[tokio::test]
    async fn test_empty_url_set() {
        let analyzer = FakeAnalyzer::new(None);
        let result = Crawler::new(&analyzer)
            .crawl("https://example.com", &[], None)
            .await;
        assert_eq!(result.total_pages, 0);
        assert!(result.results.is_empty());
    }

    #[tokio::test]
    async fn test_auth_is_carried_on_result() {
        let analyzer = FakeAnalyzer::new(None);
        let auth = BasicAuth::new("user", "pass");
        let result = Crawler::new(&analyzer)
            .crawl("https://example.com", &urls(1), Some(&auth))
            .await;
        assert_eq!(result.auth, Some(auth));
    }
}
