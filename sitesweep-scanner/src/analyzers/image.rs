use super::{element_text, filename_from_src, resolve_src, select, select_within, truncate};
use crate::auth::{BasicAuth, usable};
use crate::issue::{ImageIssue, ImageIssueKind, Severity};
use crate::result::{ImageKind, ImageLocation, ImageRecord};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use reqwest::header::CONTENT_LENGTH;
use scraper::{ElementRef, Html};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

const HEAD_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageAnalysis {
    pub issues: Vec<ImageIssue>,
    /// Every `<img>` and top-level inline `<svg>` in document order.
    pub images: Vec<ImageRecord>,
}

pub fn analyze_images(document: &Html, base: &Url) -> ImageAnalysis {
    let mut analysis = ImageAnalysis::default();

    for element in select(document, "img, svg") {
        // Nested svg fragments and images inside svg belong to their root svg.
        if has_ancestor(&element, "svg") {
            continue;
        }
        let index = analysis.images.len();
        match element.value().name() {
            "svg" => analyze_svg(&element, index, &mut analysis),
            _ => analyze_img(&element, index, base, &mut analysis),
        }
    }

    analysis
}

fn analyze_img(element: &ElementRef<'_>, index: usize, base: &Url, analysis: &mut ImageAnalysis) {
    let attrs = element.value();
    let original_src = attrs.attr("src").unwrap_or_default().trim().to_string();
    let src = resolve_src(base, &original_src);
    let width = attrs.attr("width").unwrap_or_default().to_string();
    let height = attrs.attr("height").unwrap_or_default().to_string();
    let has_alt = attrs.attr("alt").is_some();
    let has_dimensions = attrs.attr("width").is_some() && attrs.attr("height").is_some();
    let is_in_picture = parent_name(element).as_deref() == Some("picture");
    let class_name = attrs.attr("class").map(str::to_string);
    let snippet = truncate(&element.html(), 200);

    if !has_alt {
        analysis.issues.push(ImageIssue {
            kind: ImageIssueKind::MissingAlt,
            severity: Severity::Error,
            message: format!("Image is missing an alt attribute: {}", src),
            src: src.clone(),
            element: Some(snippet.clone()),
            class_name: class_name.clone(),
            suggestion: Some(
                "Add descriptive alt text, or alt=\"\" if the image is decorative".to_string(),
            ),
            file_size: None,
        });
    }

    if !has_dimensions {
        analysis.issues.push(ImageIssue {
            kind: ImageIssueKind::MissingDimensions,
            severity: Severity::Warning,
            message: format!("Image has no explicit width/height: {}", src),
            src: src.clone(),
            element: Some(snippet),
            class_name,
            suggestion: Some(
                "Set width and height attributes to prevent layout shift".to_string(),
            ),
            file_size: None,
        });
    }

    analysis.images.push(ImageRecord {
        index,
        filename: filename_from_src(&src),
        has_webp_alternative: has_webp_alternative(element, is_in_picture, &src),
        has_lazy_loading: attrs
            .attr("loading")
            .is_some_and(|l| l.eq_ignore_ascii_case("lazy")),
        src,
        original_src,
        alt: attrs.attr("alt").unwrap_or_default().to_string(),
        title: attrs.attr("title").unwrap_or_default().to_string(),
        width,
        height,
        has_alt,
        has_dimensions,
        kind: ImageKind::Img,
        location: image_location(element),
        is_in_picture,
    });
}

fn analyze_svg(element: &ElementRef<'_>, index: usize, analysis: &mut ImageAnalysis) {
    let attrs = element.value();
    let role = attrs.attr("role").unwrap_or_default().trim().to_ascii_lowercase();
    let aria_label = attrs.attr("aria-label").unwrap_or_default().trim().to_string();
    let title = select_within(element, "title")
        .first()
        .map(element_text)
        .unwrap_or_default();
    let labelled_by = attrs
        .attr("aria-labelledby")
        .is_some_and(|ids| !ids.trim().is_empty());
    let hidden = attrs.attr("aria-hidden") == Some("true");

    let has_name = !aria_label.is_empty() || !title.is_empty() || labelled_by;
    let decorative = role == "presentation" || role == "none" || hidden;
    let accessible = decorative || has_name;

    if !accessible {
        analysis.issues.push(ImageIssue {
            kind: ImageIssueKind::InaccessibleSvg,
            severity: Severity::Warning,
            message: "Inline SVG has no accessible name".to_string(),
            src: String::new(),
            element: Some(truncate(&element.html(), 200)),
            class_name: attrs.attr("class").map(str::to_string),
            suggestion: Some(
                "Add role=\"img\" with aria-label or a <title>, or role=\"presentation\" if decorative"
                    .to_string(),
            ),
            file_size: None,
        });
    }

    let width = attrs.attr("width").unwrap_or_default().to_string();
    let height = attrs.attr("height").unwrap_or_default().to_string();
    analysis.images.push(ImageRecord {
        index,
        src: String::new(),
        original_src: String::new(),
        alt: if aria_label.is_empty() {
            title.clone()
        } else {
            aria_label
        },
        title,
        has_dimensions: !width.is_empty() && !height.is_empty(),
        width,
        height,
        has_alt: has_name,
        filename: "inline-svg".to_string(),
        kind: ImageKind::Svg,
        location: image_location(element),
        is_in_picture: false,
        has_webp_alternative: false,
        has_lazy_loading: false,
    });
}

fn parent_name(element: &ElementRef<'_>) -> Option<String> {
    element
        .parent()
        .and_then(ElementRef::wrap)
        .map(|p| p.value().name().to_string())
}

fn has_ancestor(element: &ElementRef<'_>, name: &str) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == name)
}

/// Nearest landmark ancestor wins.
fn image_location(element: &ElementRef<'_>) -> ImageLocation {
    for ancestor in element.ancestors().filter_map(ElementRef::wrap) {
        let role = ancestor.value().attr("role").unwrap_or_default();
        match (ancestor.value().name(), role) {
            ("header", _) | (_, "banner") => return ImageLocation::Header,
            ("nav", _) | (_, "navigation") => return ImageLocation::Nav,
            ("footer", _) | (_, "contentinfo") => return ImageLocation::Footer,
            _ => {}
        }
    }
    ImageLocation::Content
}

fn has_webp_alternative(element: &ElementRef<'_>, in_picture: bool, src: &str) -> bool {
    if src.to_ascii_lowercase().ends_with(".webp") {
        return true;
    }
    if !in_picture {
        return false;
    }
    element
        .parent()
        .and_then(ElementRef::wrap)
        .map(|picture| {
            select_within(&picture, "source").iter().any(|source| {
                source.value().attr("type") == Some("image/webp")
                    || source
                        .value()
                        .attr("srcset")
                        .is_some_and(|s| s.to_ascii_lowercase().contains(".webp"))
            })
        })
        .unwrap_or(false)
}

/// Issues a HEAD request per distinct `http(s)` image and reports files whose
/// declared size is at least `threshold` bytes. Failed lookups are ignored.
pub async fn check_image_sizes(
    client: &Client,
    images: &[ImageRecord],
    auth: Option<&BasicAuth>,
    threshold: u64,
) -> Vec<ImageIssue> {
    let mut seen = HashSet::new();
    let targets: Vec<&ImageRecord> = images
        .iter()
        .filter(|img| img.kind == ImageKind::Img && img.src.starts_with("http"))
        .filter(|img| seen.insert(img.src.clone()))
        .collect();

    // The stream must not own a closure for the page future to stay `Send`.
    let lookups: Vec<_> = targets
        .into_iter()
        .map(|img| fetch_size(client, img, auth))
        .collect();
    let sizes: Vec<(&ImageRecord, Option<u64>)> = stream::iter(lookups)
        .buffered(HEAD_CONCURRENCY)
        .collect()
        .await;

    sizes
        .into_iter()
        .filter_map(|(img, size)| size.filter(|s| *s >= threshold).map(|s| (img, s)))
        .map(|(img, size)| ImageIssue {
            kind: ImageIssueKind::LargeFile,
            severity: Severity::Warning,
            message: format!("Image is {} ({}): {}", format_size(size), size, img.src),
            src: img.src.clone(),
            element: None,
            class_name: None,
            suggestion: Some(
                "Compress the image or serve a modern format such as WebP or AVIF".to_string(),
            ),
            file_size: Some(size),
        })
        .collect()
}

async fn fetch_size<'a>(
    client: &Client,
    img: &'a ImageRecord,
    auth: Option<&BasicAuth>,
) -> (&'a ImageRecord, Option<u64>) {
    (img, head_content_length(client, &img.src, auth).await)
}

async fn head_content_length(client: &Client, src: &str, auth: Option<&BasicAuth>) -> Option<u64> {
    let mut request = client.head(src);
    if let Some(auth) = usable(auth) {
        request = request.basic_auth(&auth.username, Some(&auth.password));
    }

    match request.send().await {
        Ok(response) if response.status().is_success() => response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok()),
        Ok(response) => {
            debug!("HEAD {} returned {}", src, response.status());
            None
        }
        Err(e) => {
            debug!("HEAD {} failed: {}", src, e);
            None
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.0} KB", bytes as f64 / 1024.0)
    }
}
