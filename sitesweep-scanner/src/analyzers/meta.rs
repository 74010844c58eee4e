use super::{element_text, select};
use crate::issue::{MetaIssue, MetaIssueKind, Severity};
use crate::result::MetaEntry;
use scraper::Html;
use url::Url;

const OPEN_GRAPH_TAGS: &[&str] = &["og:title", "og:description", "og:image", "og:url"];

/// Meta names and properties surfaced in `allMeta`, in output order.
const REPORTED_META: &[&str] = &[
    "description",
    "keywords",
    "author",
    "robots",
    "viewport",
    "og:title",
    "og:description",
    "og:image",
    "og:url",
    "og:type",
    "og:site_name",
    "twitter:card",
    "twitter:title",
    "twitter:description",
    "twitter:image",
];

pub fn analyze_meta(document: &Html) -> Vec<MetaIssue> {
    let mut issues = Vec::new();

    if page_title(document).is_none() {
        issues.push(MetaIssue {
            kind: MetaIssueKind::MissingTitle,
            severity: Severity::Error,
            message: "Page is missing a <title> tag".to_string(),
            element: "title".to_string(),
        });
    }

    if meta_content(document, "description").is_none() {
        issues.push(MetaIssue {
            kind: MetaIssueKind::MissingDescription,
            severity: Severity::Error,
            message: "Page is missing a meta description".to_string(),
            element: "meta[name=\"description\"]".to_string(),
        });
    }

    if meta_content(document, "viewport").is_none() {
        issues.push(MetaIssue {
            kind: MetaIssueKind::MissingViewport,
            severity: Severity::Error,
            message: "Page is missing a viewport meta tag".to_string(),
            element: "meta[name=\"viewport\"]".to_string(),
        });
    }

    let missing_og: Vec<&str> = OPEN_GRAPH_TAGS
        .iter()
        .copied()
        .filter(|tag| meta_content(document, tag).is_none())
        .collect();
    if !missing_og.is_empty() {
        issues.push(MetaIssue {
            kind: MetaIssueKind::MissingOpenGraph,
            severity: Severity::Info,
            message: format!("Missing Open Graph tags: {}", missing_og.join(", ")),
            element: "meta[property^=\"og:\"]".to_string(),
        });
    }

    issues
}

/// Title, canonical link and the well-known meta tags that are present.
pub fn extract_all_meta(document: &Html, base: &Url) -> Vec<MetaEntry> {
    let mut entries = Vec::new();

    if let Some(title) = page_title(document) {
        entries.push(MetaEntry {
            name: "title".to_string(),
            content: title,
        });
    }

    for name in REPORTED_META {
        if let Some(content) = meta_content(document, name) {
            entries.push(MetaEntry {
                name: name.to_string(),
                content,
            });
        }
    }

    let canonical = select(document, "link[rel][href]").into_iter().find(|link| {
        link.value()
            .attr("rel")
            .is_some_and(|rel| rel.eq_ignore_ascii_case("canonical"))
    });
    if let Some(link) = canonical {
        let href = link.value().attr("href").unwrap_or_default();
        let content = base
            .join(href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string());
        entries.push(MetaEntry {
            name: "canonical".to_string(),
            content,
        });
    }

    entries
}

fn page_title(document: &Html) -> Option<String> {
    select(document, "head > title")
        .first()
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Content of the first `<meta>` whose `name` or `property` matches `key`,
/// ignoring case.
fn meta_content(document: &Html, key: &str) -> Option<String> {
    select(document, "meta[content]").into_iter().find_map(|meta| {
        let attrs = meta.value();
        let matches = [attrs.attr("name"), attrs.attr("property")]
            .into_iter()
            .flatten()
            .any(|k| k.trim().eq_ignore_ascii_case(key));
        matches
            .then(|| attrs.attr("content").unwrap_or_default().trim().to_string())
            .filter(|c| !c.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETE_HEAD: &str = r#"<html><head>
        <title>Example Domain</title>
        <meta name="description" content="An example page">
        <meta name="viewport" content="width=device-width, initial-scale=1">
        <meta property="og:title" content="Example">
        <meta property="og:description" content="Example page">
        <meta property="og:image" content="https://example.com/og.png">
        <meta property="og:url" content="https://example.com/">
        <link rel="canonical" href="/">
    </head><body></body></html>"#;

    fn base() -> Url {
        Url::parse("https://example.com/page").unwrap()
    }

    #[test]
    fn test_complete_head_has_no_issues() {
        assert!(analyze_meta(&Html::parse_document(COMPLETE_HEAD)).is_empty());
    }

    #[test]
    fn test_missing_tags_are_errors_and_og_is_info() {
        let issues = analyze_meta(&Html::parse_document("<html><head></head></html>"));
        let kinds: Vec<_> = issues.iter().map(|i| (i.kind, i.severity)).collect();
        assert_eq!(
            kinds,
            vec![
                (MetaIssueKind::MissingTitle, Severity::Error),
                (MetaIssueKind::MissingDescription, Severity::Error),
                (MetaIssueKind::MissingViewport, Severity::Error),
                (MetaIssueKind::MissingOpenGraph, Severity::Info),
            ]
        );
        assert!(issues[3].message.contains("og:title"));
        assert!(issues[3].message.contains("og:url"));
    }

    #[test]
    fn test_single_og_issue_lists_only_missing_tags() {
        let html = r#"<head><title>T</title>
            <meta name="Description" content="d">
            <meta name="viewport" content="width=device-width">
            <meta property="og:title" content="T"></head>"#;
        let issues = analyze_meta(&Html::parse_document(html));
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].message,
            "Missing Open Graph tags: og:description, og:image, og:url"
        );
    }

    #[test]
    fn test_extract_all_meta() {
        let entries = extract_all_meta(&Html::parse_document(COMPLETE_HEAD), &base());
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names.first(), Some(&"title"));
        assert!(names.contains(&"og:image"));
        let canonical = entries.iter().find(|e| e.name == "canonical").unwrap();
        assert_eq!(canonical.content, "https://example.com/");
    }
}
