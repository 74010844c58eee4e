// Report rendering for page, crawl and plan results

use chrono::Utc;
use serde::Serialize;
use sitesweep_scanner::issue::{Issue, Severity};
use sitesweep_scanner::result::{IssueCounts, PageReport, Scores};
use sitesweep_scanner::{CrawlPlan, CrawlResult, PageResult};
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
    Markdown,
    Csv,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            "markdown" | "md" => Some(ReportFormat::Markdown),
            "csv" => Some(ReportFormat::Csv),
            _ => None,
        }
    }
}

/// Aggregate view over a set of page results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_pages: usize,
    pub analyzed_pages: usize,
    pub failed_pages: usize,
    pub issues: IssueCounts,
    pub accessibility_violations: usize,
    /// Mean of each category over analyzed pages; `None` when nothing was analyzed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_scores: Option<Scores>,
}

pub fn summarize(results: &[PageResult]) -> Summary {
    let reports: Vec<&PageReport> = results.iter().filter_map(|r| r.report()).collect();
    let mut summary = Summary {
        total_pages: results.len(),
        analyzed_pages: reports.len(),
        failed_pages: results.len() - reports.len(),
        ..Summary::default()
    };

    for report in &reports {
        summary.issues.add(report.issue_counts());
        summary.accessibility_violations += report.issues.accessibility.violations.len();
    }

    if !reports.is_empty() {
        summary.average_scores = Some(Scores {
            performance: mean_score(&reports, |s| s.performance),
            accessibility: mean_score(&reports, |s| s.accessibility),
            best_practices: mean_score(&reports, |s| s.best_practices),
            seo: mean_score(&reports, |s| s.seo),
        });
    }

    summary
}

fn mean_score(reports: &[&PageReport], pick: impl Fn(&Scores) -> u8) -> u8 {
    let sum: f64 = reports.iter().map(|r| pick(&r.scores) as f64).sum();
    (sum / reports.len() as f64).round() as u8
}

fn redacted_page(result: &PageResult) -> PageResult {
    let mut page = result.clone();
    page.auth = None;
    page
}

fn redacted_crawl(result: &CrawlResult) -> CrawlResult {
    let mut crawl = result.clone();
    crawl.auth = None;
    for page in &mut crawl.results {
        page.auth = None;
    }
    crawl
}

fn metadata() -> serde_json::Value {
    serde_json::json!({
        "generator": "Sitesweep",
        "version": env!("CARGO_PKG_VERSION"),
        "generated_at": Utc::now().to_rfc3339(),
    })
}

pub fn render_page(result: &PageResult, format: ReportFormat) -> Result<String, String> {
    match format {
        ReportFormat::Text => Ok(generate_page_text_report(result)),
        ReportFormat::Json => generate_page_json_report(result).map_err(|e| e.to_string()),
        ReportFormat::Markdown => Ok(generate_markdown_report(
            &result.url,
            std::slice::from_ref(result),
        )),
        ReportFormat::Csv => generate_csv_report(std::slice::from_ref(result)),
    }
}

pub fn render_crawl(result: &CrawlResult, format: ReportFormat) -> Result<String, String> {
    match format {
        ReportFormat::Text => Ok(generate_crawl_text_report(result)),
        ReportFormat::Json => generate_crawl_json_report(result).map_err(|e| e.to_string()),
        ReportFormat::Markdown => Ok(generate_markdown_report(&result.start_url, &result.results)),
        ReportFormat::Csv => generate_csv_report(&result.results),
    }
}

pub fn render_plan(plan: &CrawlPlan, format: ReportFormat) -> Result<String, String> {
    match format {
        ReportFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
            "metadata": metadata(),
            "plan": plan,
        }))
        .map_err(|e| e.to_string()),
        ReportFormat::Csv => generate_plan_csv(plan),
        ReportFormat::Markdown => {
            let mut out = format!("# Crawl Plan: {}\n\n", plan.start_url);
            out.push_str(&format!("{} pages discovered.\n\n", plan.total_pages));
            for url in &plan.urls {
                out.push_str(&format!("- <{}>\n", url));
            }
            Ok(out)
        }
        ReportFormat::Text => {
            let mut out = String::new();
            out.push_str(RULE);
            out.push_str("                           SITESWEEP CRAWL PLAN\n");
            out.push_str(RULE);
            out.push('\n');
            out.push_str(&format!("Start URL:    {}\n", plan.start_url));
            out.push_str(&format!("Pages Found:  {}\n\n", plan.total_pages));
            for (i, url) in plan.urls.iter().enumerate() {
                out.push_str(&format!("  {:>3}. {}\n", i + 1, url));
            }
            Ok(out)
        }
    }
}

pub fn generate_page_json_report(result: &PageResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&serde_json::json!({
        "metadata": metadata(),
        "page": redacted_page(result),
    }))
}

pub fn generate_crawl_json_report(result: &CrawlResult) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&serde_json::json!({
        "metadata": metadata(),
        "summary": summarize(&result.results),
        "crawl": redacted_crawl(result),
    }))
}

fn section(report: &mut String, title: &str) {
    report.push_str(RULE);
    report.push_str(title);
    report.push('\n');
    report.push_str(RULE);
    report.push('\n');
}

fn severity_marker(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "[ERROR]",
        Severity::Warning => "[WARN] ",
        Severity::Info => "[INFO] ",
        Severity::Success => "[OK]   ",
    }
}

fn push_scores(report: &mut String, scores: &Scores) {
    report.push_str(&format!("  Performance:     {:>3}\n", scores.performance));
    report.push_str(&format!("  Accessibility:   {:>3}\n", scores.accessibility));
    report.push_str(&format!("  Best Practices:  {:>3}\n", scores.best_practices));
    report.push_str(&format!("  SEO:             {:>3}\n", scores.seo));
}

fn push_page_body(report: &mut String, page_report: &PageReport) {
    report.push_str("Scores:\n");
    push_scores(report, &page_report.scores);

    let counts = page_report.issue_counts();
    report.push_str(&format!(
        "\nIssues: {} errors, {} warnings, {} info\n\n",
        counts.errors, counts.warnings, counts.info
    ));

    for issue in page_report.issues.all() {
        let severity = issue.severity();
        if !severity.is_problem() {
            continue;
        }
        let prefix = format!("  {} {:<14}", severity_marker(severity), issue.category());
        let wrapped = wrap_text(issue.message(), 78, "                          ");
        report.push_str(&prefix);
        report.push_str(wrapped.trim_start());
        if wrapped.is_empty() {
            report.push('\n');
        }
        if let Issue::HtmlStructure(structure) = &issue
            && let Some(ref suggestion) = structure.suggestion
        {
            report.push_str(&wrap_text(
                &format!("Suggestion: {}", suggestion),
                78,
                "                          ",
            ));
        }
    }

    let violations = &page_report.issues.accessibility.violations;
    if !violations.is_empty() {
        report.push_str(&format!("\nAccessibility violations ({}):\n", violations.len()));
        for v in violations {
            report.push_str(&format!(
                "  [{}] {} ({} nodes)\n",
                format!("{:?}", v.impact).to_uppercase(),
                v.rule_id,
                v.affected_node_count
            ));
            report.push_str(&wrap_text(&v.help, 78, "      "));
            if !v.target_selectors.is_empty() {
                report.push_str(&format!("      Target: {}\n", v.target_selectors.join(" ")));
            }
        }
    }

    let audits = &page_report.issues.accessibility.audit_issues;
    if !audits.is_empty() {
        report.push_str("\nAccessibility audits below perfect:\n");
        for audit in audits {
            report.push_str(&format!("  {} ({:.2})\n", audit.title, audit.score));
        }
    }
    report.push('\n');
}

pub fn generate_page_text_report(result: &PageResult) -> String {
    let mut report = String::new();
    section(&mut report, "                          SITESWEEP PAGE REPORT");
    report.push_str(&format!("URL:          {}\n", result.url));
    report.push_str(&format!(
        "Analyzed:     {}\n\n",
        result.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    match (result.report(), result.error()) {
        (Some(page_report), _) => push_page_body(&mut report, page_report),
        (None, Some(error)) => report.push_str(&format!("✗ Analysis failed: {}\n", error)),
        (None, None) => {}
    }
    report
}

pub fn generate_crawl_text_report(result: &CrawlResult) -> String {
    let summary = summarize(&result.results);
    let mut report = String::new();

    section(&mut report, "                          SITESWEEP CRAWL REPORT");
    report.push_str(&format!("Start URL:    {}\n", result.start_url));
    report.push_str(&format!(
        "Crawl Date:   {}\n",
        result.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!(
        "Pages:        {} ({} analyzed, {} failed)\n\n",
        summary.total_pages, summary.analyzed_pages, summary.failed_pages
    ));

    section(&mut report, "SUMMARY");
    report.push_str(&format!("Total Issues: {}\n\n", summary.issues.total()));
    report.push_str(&format!("  Errors:     {}\n", summary.issues.errors));
    report.push_str(&format!("  Warnings:   {}\n", summary.issues.warnings));
    report.push_str(&format!("  Info:       {}\n", summary.issues.info));
    report.push_str(&format!(
        "  Accessibility violations: {}\n\n",
        summary.accessibility_violations
    ));
    if let Some(ref scores) = summary.average_scores {
        report.push_str("Average scores:\n");
        push_scores(&mut report, scores);
        report.push('\n');
    }

    section(&mut report, "PAGES");
    for page in &result.results {
        report.push_str(&format!("▸ {}\n", page.url));
        match (page.report(), page.error()) {
            (Some(page_report), _) => push_page_body(&mut report, page_report),
            (None, Some(error)) => report.push_str(&format!("  ✗ {}\n\n", error)),
            (None, None) => {}
        }
    }

    report
}

fn md_escape(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

pub fn generate_markdown_report(title_url: &str, results: &[PageResult]) -> String {
    let summary = summarize(results);
    let mut out = format!("# Sitesweep Report: {}\n\n", title_url);
    out.push_str(&format!("_Generated {}_\n\n", Utc::now().format("%Y-%m-%d %H:%M:%S UTC")));

    out.push_str("## Summary\n\n");
    out.push_str("| Pages | Failed | Errors | Warnings | Info | A11y violations |\n");
    out.push_str("|------:|-------:|-------:|---------:|-----:|----------------:|\n");
    out.push_str(&format!(
        "| {} | {} | {} | {} | {} | {} |\n\n",
        summary.total_pages,
        summary.failed_pages,
        summary.issues.errors,
        summary.issues.warnings,
        summary.issues.info,
        summary.accessibility_violations
    ));

    out.push_str("## Pages\n\n");
    out.push_str("| URL | Perf | A11y | Best Practices | SEO | Errors | Warnings |\n");
    out.push_str("|-----|-----:|-----:|---------------:|----:|-------:|---------:|\n");
    for page in results {
        match page.report() {
            Some(r) => {
                let counts = r.issue_counts();
                out.push_str(&format!(
                    "| {} | {} | {} | {} | {} | {} | {} |\n",
                    md_escape(&page.url),
                    r.scores.performance,
                    r.scores.accessibility,
                    r.scores.best_practices,
                    r.scores.seo,
                    counts.errors,
                    counts.warnings
                ));
            }
            None => out.push_str(&format!(
                "| {} | - | - | - | - | failed | - |\n",
                md_escape(&page.url)
            )),
        }
    }
    out.push('\n');

    for page in results {
        out.push_str(&format!("### {}\n\n", page.url));
        if let Some(error) = page.error() {
            out.push_str(&format!("**Failed:** {}\n\n", md_escape(error)));
            continue;
        }
        let Some(r) = page.report() else { continue };
        let issues: Vec<Issue> = r
            .issues
            .all()
            .into_iter()
            .filter(|i| i.severity().is_problem())
            .collect();
        if issues.is_empty() && r.issues.accessibility.violations.is_empty() {
            out.push_str("No issues found.\n\n");
            continue;
        }
        for issue in &issues {
            out.push_str(&format!(
                "- **{}** `{}`: {}\n",
                issue.severity().as_str(),
                issue.category(),
                md_escape(issue.message())
            ));
        }
        for v in &r.issues.accessibility.violations {
            out.push_str(&format!(
                "- **{:?}** `axe:{}`: {} ([details]({}))\n",
                v.impact,
                v.rule_id,
                md_escape(&v.help),
                v.help_url
            ));
        }
        out.push('\n');
    }

    out
}

const CSV_HEADERS: [&str; 4] = ["url", "category", "severity", "message"];

#[derive(Serialize)]
struct CsvRow<'a> {
    url: &'a str,
    category: &'a str,
    severity: &'a str,
    message: String,
}

fn csv_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn finish_csv(writer: csv::Writer<Vec<u8>>) -> Result<String, String> {
    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

fn csv_rows(page: &PageResult) -> Vec<CsvRow<'_>> {
    if let Some(error) = page.error() {
        return vec![CsvRow {
            url: &page.url,
            category: "page",
            severity: "error",
            message: error.to_string(),
        }];
    }
    let Some(r) = page.report() else {
        return Vec::new();
    };

    let mut rows: Vec<CsvRow<'_>> = r
        .issues
        .all()
        .into_iter()
        .filter(|issue| issue.severity().is_problem())
        .map(|issue| CsvRow {
            url: &page.url,
            category: issue.category(),
            severity: issue.severity().as_str(),
            message: issue.message().to_string(),
        })
        .collect();
    rows.extend(r.issues.accessibility.violations.iter().map(|v| CsvRow {
        url: &page.url,
        category: "accessibility",
        severity: "error",
        message: format!("{}: {}", v.rule_id, v.help),
    }));
    rows
}

/// One row per problem: `url,category,severity,message`. Failed pages emit a
/// single `page` row.
pub fn generate_csv_report(results: &[PageResult]) -> Result<String, String> {
    let mut writer = csv_writer();
    writer.write_record(CSV_HEADERS).map_err(|e| e.to_string())?;

    for page in results {
        for row in csv_rows(page) {
            writer.serialize(row).map_err(|e| e.to_string())?;
        }
    }
    finish_csv(writer)
}

fn generate_plan_csv(plan: &CrawlPlan) -> Result<String, String> {
    let mut writer = csv_writer();
    writer.write_record(["url"]).map_err(|e| e.to_string())?;
    for url in &plan.urls {
        writer.write_record([url]).map_err(|e| e.to_string())?;
    }
    finish_csv(writer)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

pub fn wrap_text(text: &str, width: usize, indent: &str) -> String {
    let mut result = String::new();
    let mut current_line = String::new();
    let available = width.saturating_sub(indent.len()).max(1);

    for word in text.split_whitespace() {
        if !current_line.is_empty() && current_line.len() + word.len() + 1 > available {
            result.push_str(indent);
            result.push_str(&current_line);
            result.push('\n');
            current_line.clear();
        }

        if !current_line.is_empty() {
            current_line.push(' ');
        }
        current_line.push_str(word);
    }

    if !current_line.is_empty() {
        result.push_str(indent);
        result.push_str(&current_line);
        result.push('\n');
    }

    result
}
