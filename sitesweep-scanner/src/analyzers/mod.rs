//! Markup analyzers.
//!
//! Every analyzer here is a pure function of the page snapshot (and the page
//! URL, passed explicitly for resolving relative references), so they can run
//! side by side against the same snapshot. The console collector is the
//! exception: it drives its own live page.

pub mod console;
pub mod heading;
pub mod image;
pub mod link;
pub mod meta;
pub mod structure;

use crate::issue::{LinkIssue, MetaIssue, StructureIssue};
use crate::result::MetaEntry;
use scraper::{ElementRef, Html, Selector};
use url::Url;

pub use heading::HeadingAnalysis;
pub use image::ImageAnalysis;

/// Everything derived from one rendered-markup snapshot.
#[derive(Debug, Clone)]
pub struct MarkupFindings {
    pub headings: HeadingAnalysis,
    pub images: ImageAnalysis,
    pub links: Vec<LinkIssue>,
    pub meta: Vec<MetaIssue>,
    pub all_meta: Vec<MetaEntry>,
    pub html_structure: Vec<StructureIssue>,
    /// Raw `href` values of every anchor, in document order.
    pub hrefs: Vec<String>,
}

/// Runs every markup analyzer over `html`.
///
/// The parsed document never leaves this function, so callers can hold the
/// result across await points.
pub fn analyze_markup(html: &str, base: &Url) -> MarkupFindings {
    let document = Html::parse_document(html);

    let hrefs = select(&document, "a[href]")
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .map(|href| href.trim().to_string())
        .collect();

    MarkupFindings {
        headings: heading::analyze_headings(&document, base),
        images: image::analyze_images(&document, base),
        links: link::analyze_links(&document),
        meta: meta::analyze_meta(&document),
        all_meta: meta::extract_all_meta(&document, base),
        html_structure: structure::analyze_structure(html),
        hrefs,
    }
}

pub(crate) fn select<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

pub(crate) fn select_within<'a>(element: &ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => element.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

/// Whitespace-collapsed text content.
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    normalize_text(&element.text().collect::<Vec<_>>().join(" "))
}

pub(crate) fn normalize_text(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn truncate(input: &str, max_chars: usize) -> String {
    if input.chars().count() <= max_chars {
        return input.to_string();
    }
    let mut out: String = input.chars().take(max_chars).collect();
    out.push('…');
    out
}

/// Resolves an image-like `src` against the page.
///
/// Protocol-relative sources get `https:`; root-relative and relative
/// sources resolve against the page origin. Absolute and `data:` sources
/// are returned unchanged.
pub fn resolve_src(base: &Url, src: &str) -> String {
    let src = src.trim();
    if src.is_empty()
        || src.starts_with("http://")
        || src.starts_with("https://")
        || src.starts_with("data:")
    {
        return src.to_string();
    }
    if let Some(rest) = src.strip_prefix("//") {
        return format!("https://{}", rest);
    }

    let origin = base.origin().ascii_serialization();
    match Url::parse(&format!("{}/", origin)).and_then(|root| root.join(src)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => src.to_string(),
    }
}

/// Last path segment of a source, without query or fragment.
pub(crate) fn filename_from_src(src: &str) -> String {
    let without_query = src.split(['?', '#']).next().unwrap_or(src);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}
