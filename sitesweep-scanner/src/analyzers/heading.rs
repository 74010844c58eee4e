use super::{element_text, filename_from_src, resolve_src, select, select_within};
use crate::issue::{HeadingIssue, HeadingIssueKind, Severity};
use crate::result::{HeadingImage, HeadingNode};
use scraper::Html;
use url::Url;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeadingAnalysis {
    pub issues: Vec<HeadingIssue>,
    /// Every h1-h6 in document order.
    pub structure: Vec<HeadingNode>,
}

pub fn analyze_headings(document: &Html, base: &Url) -> HeadingAnalysis {
    let mut analysis = HeadingAnalysis::default();
    let mut previous_level: Option<u8> = None;
    let mut h1_count = 0;

    for (index, heading) in select(document, "h1, h2, h3, h4, h5, h6")
        .into_iter()
        .enumerate()
    {
        let tag = heading.value().name().to_ascii_lowercase();
        let level = tag[1..].parse::<u8>().unwrap_or(1);
        let text = element_text(&heading);

        let images: Vec<HeadingImage> = select_within(&heading, "img")
            .into_iter()
            .map(|img| {
                let raw_src = img.value().attr("src").unwrap_or_default();
                let src = resolve_src(base, raw_src);
                HeadingImage {
                    filename: filename_from_src(&src),
                    src,
                    alt: img.value().attr("alt").unwrap_or_default().trim().to_string(),
                    title: img.value().attr("title").unwrap_or_default().trim().to_string(),
                }
            })
            .collect();

        let is_empty = text.is_empty() && images.is_empty();
        let display_text = if text.is_empty() {
            images
                .iter()
                .find_map(image_label)
                .unwrap_or_default()
        } else {
            text
        };

        if level == 1 {
            h1_count += 1;
        }

        if is_empty {
            analysis.issues.push(HeadingIssue {
                kind: HeadingIssueKind::EmptyHeading,
                severity: Severity::Error,
                message: format!("Empty <{}> heading", tag),
                element: Some(tag.clone()),
                position: Some(index),
            });
        }

        match previous_level {
            Some(previous) if level > previous + 1 => {
                analysis.issues.push(HeadingIssue {
                    kind: HeadingIssueKind::SkippedLevel,
                    severity: Severity::Warning,
                    message: format!(
                        "Heading level skipped: h{} followed by h{}",
                        previous, level
                    ),
                    element: Some(tag.clone()),
                    position: Some(index),
                });
            }
            _ => {}
        }
        previous_level = Some(level);

        analysis.structure.push(HeadingNode {
            level,
            has_image: !images.is_empty(),
            tag,
            text: display_text,
            index,
            images,
            is_empty,
        });
    }

    match h1_count {
        0 => analysis.issues.push(HeadingIssue {
            kind: HeadingIssueKind::MissingH1,
            severity: Severity::Error,
            message: "Page has no h1 heading".to_string(),
            element: None,
            position: None,
        }),
        1 => {}
        n => analysis.issues.push(HeadingIssue {
            kind: HeadingIssueKind::MultipleH1,
            severity: Severity::Warning,
            message: format!("Page has {} h1 headings; use exactly one", n),
            element: Some("h1".to_string()),
            position: None,
        }),
    }

    analysis
}

fn image_label(image: &HeadingImage) -> Option<String> {
    [&image.alt, &image.title, &image.filename]
        .into_iter()
        .find(|s| !s.is_empty())
        .cloned()
}
