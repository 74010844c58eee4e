use crate::auth::BasicAuth;
use crate::issue::{
    ConsoleErrorRecord, HeadingIssue, ImageIssue, Issue, LinkIssue, MetaIssue, Severity,
    StructureIssue,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category scores on a 0-100 scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scores {
    pub performance: u8,
    pub accessibility: u8,
    pub best_practices: u8,
    pub seo: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadingImage {
    pub src: String,
    pub alt: String,
    pub title: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadingNode {
    pub level: u8,
    pub tag: String,
    pub text: String,
    pub index: usize,
    pub images: Vec<HeadingImage>,
    pub has_image: bool,
    /// No text and no contained images.
    pub is_empty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Img,
    Svg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageLocation {
    Header,
    Nav,
    Footer,
    Content,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRecord {
    pub index: usize,
    pub src: String,
    pub original_src: String,
    pub alt: String,
    pub title: String,
    pub width: String,
    pub height: String,
    /// For SVG this reflects aria-label/title presence.
    pub has_alt: bool,
    pub has_dimensions: bool,
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: ImageKind,
    pub location: ImageLocation,
    pub is_in_picture: bool,
    pub has_webp_alternative: bool,
    pub has_lazy_loading: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaEntry {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Minor,
    Moderate,
    Serious,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityViolation {
    pub rule_id: String,
    pub impact: Impact,
    pub description: String,
    pub help: String,
    pub help_url: String,
    pub tags: Vec<String>,
    pub affected_node_count: usize,
    /// Selectors of the first affected node.
    pub target_selectors: Vec<String>,
}

/// A performance-engine audit that scored below perfect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditFinding {
    pub id: String,
    pub title: String,
    pub description: String,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessibilityFindings {
    pub audit_issues: Vec<AuditFinding>,
    pub violations: Vec<AccessibilityViolation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageIssues {
    pub headings: Vec<HeadingIssue>,
    pub headings_structure: Vec<HeadingNode>,
    pub images: Vec<ImageIssue>,
    pub all_images: Vec<ImageRecord>,
    pub links: Vec<LinkIssue>,
    pub meta: Vec<MetaIssue>,
    pub all_meta: Vec<MetaEntry>,
    pub html_structure: Vec<StructureIssue>,
    pub accessibility: AccessibilityFindings,
    pub console_errors: Vec<ConsoleErrorRecord>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueCounts {
    pub errors: usize,
    pub warnings: usize,
    pub info: usize,
}

impl IssueCounts {
    pub fn total(&self) -> usize {
        self.errors + self.warnings + self.info
    }

    pub fn add(&mut self, other: IssueCounts) {
        self.errors += other.errors;
        self.warnings += other.warnings;
        self.info += other.info;
    }
}

impl PageIssues {
    /// Every analyzer finding as a tagged [`Issue`], in analyzer order.
    pub fn all(&self) -> Vec<Issue> {
        let mut all: Vec<Issue> = Vec::new();
        all.extend(self.headings.iter().cloned().map(Issue::from));
        all.extend(self.images.iter().cloned().map(Issue::from));
        all.extend(self.links.iter().cloned().map(Issue::from));
        all.extend(self.meta.iter().cloned().map(Issue::from));
        all.extend(self.html_structure.iter().cloned().map(Issue::from));
        all.extend(self.console_errors.iter().cloned().map(Issue::from));
        all
    }

    /// Problem counts. Success entries are excluded; accessibility
    /// violations count as errors.
    pub fn counts(&self) -> IssueCounts {
        let mut counts = IssueCounts::default();
        for issue in self.all() {
            match issue.severity() {
                Severity::Error => counts.errors += 1,
                Severity::Warning => counts.warnings += 1,
                Severity::Info => counts.info += 1,
                Severity::Success => {}
            }
        }
        counts.errors += self.accessibility.violations.len();
        counts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageReport {
    pub scores: Scores,
    pub issues: PageIssues,
    pub site_links: Vec<String>,
}

impl PageReport {
    pub fn issue_counts(&self) -> IssueCounts {
        self.issues.counts()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PageOutcome {
    Analyzed(Box<PageReport>),
    Failed { error: String },
}

/// The assembled result for one page. Failed pages carry only `error`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub url: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: PageOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<BasicAuth>,
}

impl PageResult {
    pub fn analyzed(url: String, report: PageReport, auth: Option<BasicAuth>) -> Self {
        Self {
            url,
            timestamp: Utc::now(),
            outcome: PageOutcome::Analyzed(Box::new(report)),
            auth,
        }
    }

    pub fn with_error(url: String, error: String) -> Self {
        Self {
            url,
            timestamp: Utc::now(),
            outcome: PageOutcome::Failed { error },
            auth: None,
        }
    }

    pub fn report(&self) -> Option<&PageReport> {
        match &self.outcome {
            PageOutcome::Analyzed(report) => Some(report),
            PageOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            PageOutcome::Analyzed(_) => None,
            PageOutcome::Failed { error } => Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlResult {
    pub start_url: String,
    pub total_pages: usize,
    pub timestamp: DateTime<Utc>,
    pub results: Vec<PageResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<BasicAuth>,
}

impl CrawlResult {
    pub fn new(start_url: String, results: Vec<PageResult>, auth: Option<BasicAuth>) -> Self {
        Self {
            start_url,
            total_pages: results.len(),
            timestamp: Utc::now(),
            results,
            auth,
        }
    }

    pub fn failed_pages(&self) -> impl Iterator<Item = &PageResult> {
        self.results.iter().filter(|r| r.is_error())
    }
}

/// The deduplicated, normalized URL set a crawl will visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlPlan {
    pub start_url: String,
    pub total_pages: usize,
    pub urls: Vec<String>,
}

impl CrawlPlan {
    pub fn new(start_url: String, urls: Vec<String>) -> Self {
        Self {
            start_url,
            total_pages: urls.len(),
            urls,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{HeadingIssueKind, StructureIssueKind};

    #[test]
    fn test_failed_result_serializes_error_only() {
        let result = PageResult::with_error(
            "https://example.com/broken".to_string(),
            "navigation failed".to_string(),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["url"], "https://example.com/broken");
        assert_eq!(json["error"], "navigation failed");
        assert!(json.get("scores").is_none());
        assert!(json.get("issues").is_none());
        assert!(json.get("timestamp").is_some());
    }

    #[test]
    fn test_analyzed_result_flattens_report() {
        let result = PageResult::analyzed(
            "https://example.com/".to_string(),
            PageReport {
                scores: Scores {
                    performance: 90,
                    accessibility: 80,
                    best_practices: 70,
                    seo: 100,
                },
                issues: PageIssues::default(),
                site_links: vec!["https://example.com/about".to_string()],
            },
            None,
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["scores"]["bestPractices"], 70);
        assert_eq!(json["siteLinks"][0], "https://example.com/about");
        assert!(json["issues"]["headingsStructure"].is_array());
        assert!(json.get("error").is_none());
        assert!(json.get("auth").is_none());

        let back: PageResult = serde_json::from_value(json).unwrap();
        assert!(back.report().is_some());
    }

    #[test]
    fn test_counts_skip_success_entries() {
        let mut issues = PageIssues::default();
        issues.headings.push(HeadingIssue {
            kind: HeadingIssueKind::MissingH1,
            severity: Severity::Error,
            message: "Page has no h1 heading".to_string(),
            element: None,
            position: None,
        });
        issues.html_structure.push(StructureIssue {
            kind: StructureIssueKind::TagsBalanced,
            severity: Severity::Success,
            message: "All tags are properly closed".to_string(),
            element: None,
            line: None,
            suggestion: None,
        });

        let counts = issues.counts();
        assert_eq!(counts.errors, 1);
        assert_eq!(counts.total(), 1);
    }

    #[test]
    fn test_crawl_result_counts_pages() {
        let results = vec![
            PageResult::with_error("https://example.com/a".to_string(), "boom".to_string()),
            PageResult::analyzed(
                "https://example.com/b".to_string(),
                PageReport {
                    scores: Scores::default(),
                    issues: PageIssues::default(),
                    site_links: Vec::new(),
                },
                None,
            ),
        ];
        let crawl = CrawlResult::new("https://example.com".to_string(), results, None);
        assert_eq!(crawl.total_pages, 2);
        assert_eq!(crawl.failed_pages().count(), 1);
    }
}
