use super::{element_text, select, select_within, truncate};
use crate::issue::{LinkIssue, LinkIssueKind, Severity};
use scraper::Html;

pub fn analyze_links(document: &Html) -> Vec<LinkIssue> {
    let mut issues = Vec::new();

    for anchor in select(document, "a") {
        let attrs = anchor.value();
        let href = attrs.attr("href").unwrap_or_default().trim().to_string();
        let text = element_text(&anchor);
        let link_html = truncate(&anchor.html(), 200);

        let has_image_alt = select_within(&anchor, "img")
            .iter()
            .any(|img| img.value().attr("alt").is_some_and(|a| !a.trim().is_empty()));
        let has_aria_label = attrs
            .attr("aria-label")
            .is_some_and(|l| !l.trim().is_empty());

        if text.is_empty() && !has_image_alt && !has_aria_label {
            issues.push(LinkIssue {
                kind: LinkIssueKind::EmptyLinkText,
                severity: Severity::Error,
                message: format!("Link has no accessible text: {}", display_href(&href)),
                href: href.clone(),
                link_text: String::new(),
                link_html: link_html.clone(),
            });
        }

        let opens_new_tab = attrs
            .attr("target")
            .is_some_and(|t| t.trim().eq_ignore_ascii_case("_blank"));
        let has_noopener = attrs
            .attr("rel")
            .map(|rel| {
                rel.split_whitespace()
                    .any(|token| token.eq_ignore_ascii_case("noopener"))
            })
            .unwrap_or(false);

        if opens_new_tab && !has_noopener {
            issues.push(LinkIssue {
                kind: LinkIssueKind::UnsafeTargetBlank,
                severity: Severity::Warning,
                message: format!(
                    "Link opens a new tab without rel=\"noopener\": {}",
                    display_href(&href)
                ),
                href,
                link_text: text,
                link_html,
            });
        }
    }

    issues
}

fn display_href(href: &str) -> &str {
    if href.is_empty() { "(no href)" } else { href }
}
