// Tests for report rendering

use sitesweep_core::report::{
    ReportFormat, generate_csv_report, render_crawl, render_page, render_plan, save_report,
    summarize,
};
use sitesweep_scanner::issue::{
    HeadingIssue, HeadingIssueKind, LinkIssue, LinkIssueKind, MetaIssue, MetaIssueKind, Severity,
    StructureIssue, StructureIssueKind,
};
use sitesweep_scanner::result::{
    AccessibilityViolation, Impact, PageIssues, PageReport, Scores,
};
use sitesweep_scanner::{BasicAuth, CrawlPlan, CrawlResult, PageResult};
use std::fs;

fn analyzed_page(url: &str, scores: Scores) -> PageResult {
    let mut issues = PageIssues::default();
    issues.headings.push(HeadingIssue {
        kind: HeadingIssueKind::MissingH1,
        severity: Severity::Error,
        message: "Page has no h1 heading".to_string(),
        element: None,
        position: None,
    });
    issues.links.push(LinkIssue {
        kind: LinkIssueKind::UnsafeTargetBlank,
        severity: Severity::Warning,
        message: "Link opens a new tab without rel=\"noopener\", exposing window.opener".to_string(),
        href: "https://other.com/".to_string(),
        link_text: "Partner".to_string(),
        link_html: "<a href=\"https://other.com/\" target=\"_blank\">Partner</a>".to_string(),
    });
    issues.meta.push(MetaIssue {
        kind: MetaIssueKind::MissingOpenGraph,
        severity: Severity::Info,
        message: "Missing Open Graph tags: og:image".to_string(),
        element: "meta[property^=\"og:\"]".to_string(),
    });
    issues.html_structure.push(StructureIssue {
        kind: StructureIssueKind::TagsBalanced,
        severity: Severity::Success,
        message: "All tags are properly closed".to_string(),
        element: None,
        line: None,
        suggestion: None,
    });
    issues.accessibility.violations.push(AccessibilityViolation {
        rule_id: "color-contrast".to_string(),
        impact: Impact::Serious,
        description: "Ensures the contrast between foreground and background colors meets WCAG 2 AA".to_string(),
        help: "Elements must have sufficient color contrast".to_string(),
        help_url: "https://dequeuniversity.com/rules/axe/4.8/color-contrast".to_string(),
        tags: vec!["wcag2aa".to_string()],
        affected_node_count: 2,
        target_selectors: vec![".hero p".to_string()],
    });

    PageResult::analyzed(
        url.to_string(),
        PageReport {
            scores,
            issues,
            site_links: vec!["https://example.com/about".to_string()],
        },
        Some(BasicAuth::new("staging", "hunter2")),
    )
}

fn scores(performance: u8) -> Scores {
    Scores {
        performance,
        accessibility: 80,
        best_practices: 100,
        seo: 60,
    }
}

fn crawl() -> CrawlResult {
    CrawlResult::new(
        "https://example.com".to_string(),
        vec![
            analyzed_page("https://example.com/", scores(90)),
            PageResult::with_error(
                "https://example.com/broken".to_string(),
                "navigation failed".to_string(),
            ),
            analyzed_page("https://example.com/about", scores(81)),
        ],
        Some(BasicAuth::new("staging", "hunter2")),
    )
}

// ============================================================================
// Report Format Tests
// ============================================================================

#[test]
fn test_report_format_from_str() {
    assert!(matches!(ReportFormat::from_str("text"), Some(ReportFormat::Text)));
    assert!(matches!(ReportFormat::from_str("Json"), Some(ReportFormat::Json)));
    assert!(matches!(ReportFormat::from_str("markdown"), Some(ReportFormat::Markdown)));
    assert!(matches!(ReportFormat::from_str("CSV"), Some(ReportFormat::Csv)));
    assert!(ReportFormat::from_str("pdf").is_none());
}

// ============================================================================
// Summary Tests
// ============================================================================

#[test]
fn test_summary_counts_problems_and_failures() {
    let summary = summarize(&crawl().results);

    assert_eq!(summary.total_pages, 3);
    assert_eq!(summary.analyzed_pages, 2);
    assert_eq!(summary.failed_pages, 1);
    // One missing h1 plus one axe violation per page.
    assert_eq!(summary.issues.errors, 4);
    assert_eq!(summary.issues.warnings, 2);
    assert_eq!(summary.issues.info, 2);
    assert_eq!(summary.accessibility_violations, 2);
}

#[test]
fn test_summary_averages_analyzed_pages_only() {
    let averages = summarize(&crawl().results).average_scores.unwrap();
    assert_eq!(averages.performance, 86);
    assert_eq!(averages.accessibility, 80);
    assert_eq!(averages.seo, 60);
}

// ============================================================================
// JSON Tests
// ============================================================================

#[test]
fn test_json_report_never_contains_credentials() {
    let json = render_crawl(&crawl(), ReportFormat::Json).unwrap();
    assert!(!json.contains("hunter2"));
    assert!(!json.contains("\"auth\""));

    let page = render_page(&analyzed_page("https://example.com/", scores(90)), ReportFormat::Json)
        .unwrap();
    assert!(!page.contains("hunter2"));
}

#[test]
fn test_json_crawl_report_structure() {
    let json = render_crawl(&crawl(), ReportFormat::Json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["metadata"]["generator"], "Sitesweep");
    assert!(value["metadata"]["generated_at"].is_string());
    assert_eq!(value["summary"]["failedPages"], 1);
    assert_eq!(value["crawl"]["totalPages"], 3);
    assert_eq!(value["crawl"]["results"][1]["error"], "navigation failed");
    assert_eq!(value["crawl"]["results"][0]["scores"]["bestPractices"], 100);
}

// ============================================================================
// Text / Markdown Tests
// ============================================================================

#[test]
fn test_text_crawl_report() {
    let text = render_crawl(&crawl(), ReportFormat::Text).unwrap();

    assert!(text.contains("SITESWEEP CRAWL REPORT"));
    assert!(text.contains("Pages:        3 (2 analyzed, 1 failed)"));
    assert!(text.contains("✗ navigation failed"));
    assert!(text.contains("Page has no h1 heading"));
    assert!(text.contains("color-contrast"));
    // Success entries are not problems.
    assert!(!text.contains("All tags are properly closed"));
}

#[test]
fn test_text_page_report_for_failed_page() {
    let failed = PageResult::with_error(
        "https://example.com/broken".to_string(),
        "Navigation timed out".to_string(),
    );
    let text = render_page(&failed, ReportFormat::Text).unwrap();
    assert!(text.contains("SITESWEEP PAGE REPORT"));
    assert!(text.contains("✗ Analysis failed: Navigation timed out"));
}

#[test]
fn test_markdown_report_lists_pages() {
    let md = render_crawl(&crawl(), ReportFormat::Markdown).unwrap();

    assert!(md.starts_with("# Sitesweep Report: https://example.com\n"));
    assert!(md.contains("| https://example.com/ | 90 | 80 | 100 | 60 | 2 | 1 |"));
    assert!(md.contains("| https://example.com/broken | - | - | - | - | failed | - |"));
    assert!(md.contains("**Failed:** navigation failed"));
    assert!(md.contains("`axe:color-contrast`"));
}

#[test]
fn test_plan_report_text() {
    let plan = CrawlPlan::new(
        "https://example.com".to_string(),
        vec![
            "https://example.com/".to_string(),
            "https://example.com/about".to_string(),
        ],
    );
    let text = render_plan(&plan, ReportFormat::Text).unwrap();
    assert!(text.contains("Pages Found:  2"));
    assert!(text.contains("    2. https://example.com/about"));

    let csv = render_plan(&plan, ReportFormat::Csv).unwrap();
    assert_eq!(csv, "url\nhttps://example.com/\nhttps://example.com/about\n");
}

// ============================================================================
// CSV Tests
// ============================================================================

#[test]
fn test_csv_rows() {
    let csv = generate_csv_report(&crawl().results).unwrap();
    let lines: Vec<&str> = csv.lines().collect();

    assert_eq!(lines[0], "url,category,severity,message");
    // 4 problem rows per analyzed page plus one row for the failed page.
    assert_eq!(lines.len(), 1 + 4 + 1 + 4);
    assert!(lines.contains(&"https://example.com/,heading,error,Page has no h1 heading"));
    assert!(lines.contains(&"https://example.com/broken,page,error,navigation failed"));
    assert!(lines.contains(
        &"https://example.com/,accessibility,error,color-contrast: Elements must have sufficient color contrast"
    ));
}

#[test]
fn test_csv_quotes_fields_with_commas_and_quotes() {
    let csv = generate_csv_report(&crawl().results).unwrap();
    assert!(csv.contains(
        "https://example.com/,link,warning,\"Link opens a new tab without rel=\"\"noopener\"\", exposing window.opener\""
    ));
}

// ============================================================================
// Save Tests
// ============================================================================

#[test]
fn test_save_report_writes_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.md");

    let content = render_crawl(&crawl(), ReportFormat::Markdown).unwrap();
    save_report(&content, &path).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), content);
}

#[test]
fn test_save_report_missing_directory_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("report.txt");
    assert!(save_report("content", &path).is_err());
}
