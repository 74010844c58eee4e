//! Same-site link discovery.
//!
//! Breadth-first traversal from a start URL. Every candidate link goes
//! through [`crawl_candidate`]: same hostname, HTML-like path, not an
//! admin/utility page, not a CMS archive listing, and an allowed target.

use crate::auth::BasicAuth;
use crate::browser::{BrowserSession, close_page, open_page};
use crate::error::{AuditError, Result};
use crate::result::CrawlPlan;
use crate::validation::is_allowed_target;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

const LINKS_SCRIPT: &str = "Array.from(document.querySelectorAll('a[href]'))\
    .map(a => a.href)\
    .filter(h => h.startsWith('http://') || h.startsWith('https://'))";

const NON_HTML_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "avif", "svg", "ico", "bmp", "tif", "tiff", "css", "js",
    "mjs", "map", "json", "xml", "txt", "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "csv",
    "zip", "rar", "7z", "gz", "tgz", "tar", "bz2", "mp3", "mp4", "m4a", "avi", "mov", "wmv",
    "webm", "ogg", "wav", "woff", "woff2", "ttf", "eot", "otf", "exe", "dmg", "apk", "rss",
    "atom",
];

/// Admin and utility pages, matched against whole path segments.
const EXCLUDED_SEGMENTS: &[&str] = &[
    "wp-admin",
    "wp-login",
    "wp-login.php",
    "wp-json",
    "xmlrpc.php",
    "admin",
    "administrator",
    "login",
    "logout",
    "signin",
    "signup",
    "register",
    "cart",
    "checkout",
    "my-account",
    "search",
    "feed",
    "api",
    "cgi-bin",
];

const ARCHIVE_SEGMENTS: &[&str] = &["category", "tag", "author", "attachment"];

const ARCHIVE_TERMINAL_SEGMENTS: &[&str] = &["trackback", "embed"];

const CMS_ASSET_PREFIXES: &[&str] = &["/wp-content/", "/wp-includes/"];

const EXCLUDED_QUERY_PARAMS: &[&str] = &[
    "page",
    "paged",
    "p",
    "s",
    "cat",
    "tag",
    "author",
    "m",
    "year",
    "monthnum",
    "day",
    "attachment_id",
    "replytocom",
    "orderby",
    "order",
    "filter",
    "sort",
];

/// Which exclusion rules apply to a candidate link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPolicy {
    /// Everything, including CMS archive listings.
    Crawl,
    /// Crawl rules minus the CMS archive patterns.
    SiteLinks,
}

/// `scheme://host[:port]/path` with query and fragment dropped and trailing
/// slashes stripped, except for the bare root.
pub fn normalize_url(url: &Url) -> Option<String> {
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?;
    let mut normalized = format!("{}://{}", url.scheme(), host);
    if let Some(port) = url.port() {
        normalized.push_str(&format!(":{}", port));
    }

    let path = url.path();
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        normalized.push('/');
    } else {
        normalized.push_str(trimmed);
    }
    Some(normalized)
}

/// Normalizes `raw` (already absolute) if it is a page worth visiting on
/// `host`.
pub fn crawl_candidate(raw: &str, host: &str, policy: LinkPolicy) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    if !url.host_str()?.eq_ignore_ascii_case(host) {
        return None;
    }
    if has_excluded_query(&url) {
        return None;
    }

    let path = url.path().to_ascii_lowercase();
    if has_non_html_extension(&path)
        || has_utility_segment(&path)
        || has_suspicious_encoding(url.path())
    {
        return None;
    }
    if policy == LinkPolicy::Crawl && is_archive_path(&path) {
        return None;
    }

    let normalized = normalize_url(&url)?;
    is_allowed_target(&normalized).then_some(normalized)
}

fn has_excluded_query(url: &Url) -> bool {
    url.query_pairs()
        .any(|(key, _)| EXCLUDED_QUERY_PARAMS.contains(&key.to_ascii_lowercase().as_str()))
}

fn has_utility_segment(path: &str) -> bool {
    path.split('/').any(|segment| EXCLUDED_SEGMENTS.contains(&segment))
}

fn has_non_html_extension(path: &str) -> bool {
    let last = path.rsplit('/').next().unwrap_or_default();
    match last.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => NON_HTML_EXTENSIONS.contains(&ext),
        _ => false,
    }
}

/// More than two percent-encoded octets, or octets that decode to text
/// outside the Latin ranges.
fn has_suspicious_encoding(path: &str) -> bool {
    let encoded_octets = path.matches('%').count();
    if encoded_octets == 0 {
        return false;
    }
    if encoded_octets > 2 {
        return true;
    }
    let decoded = urlencoding::decode_binary(path.as_bytes());
    match std::str::from_utf8(&decoded) {
        Ok(text) => text.chars().any(|c| c as u32 > 0x024F),
        Err(_) => true,
    }
}

fn is_archive_path(path: &str) -> bool {
    if CMS_ASSET_PREFIXES.iter().any(|p| path.contains(p)) {
        return true;
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if segments.iter().any(|s| ARCHIVE_SEGMENTS.contains(s)) {
        return true;
    }
    if segments
        .last()
        .is_some_and(|s| ARCHIVE_TERMINAL_SEGMENTS.contains(s))
    {
        return true;
    }
    // Paginated listings: .../page/2
    if segments
        .windows(2)
        .any(|w| w[0] == "page" && is_number(w[1]))
    {
        return true;
    }
    is_date_archive(&segments)
}

/// `/2024`, `/2024/05` or `/2024/05/17` with nothing after.
fn is_date_archive(segments: &[&str]) -> bool {
    match segments {
        [year, rest @ ..] if rest.len() <= 2 => {
            year.len() == 4
                && is_number(year)
                && (year.starts_with("19") || year.starts_with("20"))
                && rest.iter().all(|s| s.len() <= 2 && is_number(s))
        }
        _ => false,
    }
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Up to `limit` distinct same-site page links from `hrefs`, resolved against
/// `base`, excluding `base` itself.
pub fn collect_site_links(base: &Url, hrefs: &[String], limit: usize) -> Vec<String> {
    let Some(host) = base.host_str() else {
        return Vec::new();
    };
    let current = normalize_url(base);
    let mut seen = HashSet::new();

    hrefs
        .iter()
        .filter_map(|href| base.join(href).ok())
        .filter_map(|url| crawl_candidate(url.as_str(), host, LinkPolicy::SiteLinks))
        .filter(|link| Some(link) != current.as_ref())
        .filter(|link| seen.insert(link.clone()))
        .take(limit)
        .collect()
}

/// Breadth-first same-site discovery over a shared browser session.
pub struct LinkDiscoverer<'a> {
    session: &'a dyn BrowserSession,
    navigation_timeout: Duration,
    max_pages: Option<usize>,
}

impl<'a> LinkDiscoverer<'a> {
    pub fn new(session: &'a dyn BrowserSession, navigation_timeout: Duration) -> Self {
        Self {
            session,
            navigation_timeout,
            max_pages: None,
        }
    }

    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Every reachable page, start URL first, in discovery order.
    pub async fn discover(&self, start_url: &str, auth: Option<&BasicAuth>) -> Result<Vec<String>> {
        let start = Url::parse(start_url)
            .map_err(|e| AuditError::InvalidUrl(format!("{}: {}", start_url, e)))?;
        let host = start
            .host_str()
            .ok_or_else(|| AuditError::InvalidUrl(format!("{}: no host", start_url)))?
            .to_string();
        let start = normalize_url(&start)
            .ok_or_else(|| AuditError::InvalidUrl(start_url.to_string()))?;

        let mut queue = VecDeque::from([start.clone()]);
        let mut queued = HashSet::from([start]);
        let mut discovered = Vec::new();

        while let Some(url) = queue.pop_front() {
            if self.max_pages.is_some_and(|max| discovered.len() >= max) {
                debug!("Reached page cap of {}", discovered.len());
                break;
            }
            discovered.push(url.clone());

            let links = match self.extract_links(&url, auth).await {
                Ok(links) => links,
                Err(e) => {
                    warn!("Could not extract links from {}: {}", url, e);
                    continue;
                }
            };

            for link in links {
                if let Some(candidate) = crawl_candidate(&link, &host, LinkPolicy::Crawl)
                    && queued.insert(candidate.clone())
                {
                    queue.push_back(candidate);
                }
            }
            debug!(
                "Visited {} ({} discovered, {} queued)",
                url,
                discovered.len(),
                queue.len()
            );
        }

        info!("Discovered {} pages under {}", discovered.len(), host);
        Ok(discovered)
    }

    pub async fn plan_pages(&self, start_url: &str, auth: Option<&BasicAuth>) -> Result<CrawlPlan> {
        let urls = self.discover(start_url, auth).await?;
        Ok(CrawlPlan::new(start_url.to_string(), urls))
    }

    async fn extract_links(&self, url: &str, auth: Option<&BasicAuth>) -> Result<Vec<String>> {
        let page = open_page(self.session, url, auth, self.navigation_timeout).await?;
        let value = page.evaluate(LINKS_SCRIPT).await;
        close_page(page).await;
        Ok(serde_json::from_value(value?)?)
    }
}
