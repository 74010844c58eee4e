//! Tag balance and nesting checks over the raw markup.
//!
//! This works on the serialized snapshot rather than the parsed tree because
//! an HTML parser silently repairs exactly the mistakes we want to report.
//! The tokenizer understands quoted attribute values, comments, CDATA,
//! doctype declarations and raw-text elements, so `<` inside a script or an
//! attribute never opens a tag.

use crate::issue::{Severity, StructureIssue, StructureIssueKind};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose content is never markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Elements whose end tag HTML allows to be omitted. They are closed
/// implicitly and never reported as unclosed.
const OPTIONAL_END_TAG: &[&str] = &[
    "html", "head", "body", "p", "li", "dt", "dd", "rt", "rp", "optgroup", "option",
    "colgroup", "caption", "thead", "tbody", "tfoot", "tr", "td", "th",
];

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];

/// (ancestor, forbidden descendants)
const NESTING_RULES: &[(&str, &[&str])] = &[
    ("p", &["div", "p"]),
    ("a", &["a"]),
    ("button", &["button", "a"]),
    ("h1", HEADINGS),
    ("h2", HEADINGS),
    ("h3", HEADINGS),
    ("h4", HEADINGS),
    ("h5", HEADINGS),
    ("h6", HEADINGS),
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum TagKind {
    Start { self_closing: bool },
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Tag {
    name: String,
    kind: TagKind,
    line: usize,
}

pub fn analyze_structure(markup: &str) -> Vec<StructureIssue> {
    let mut issues = Vec::new();
    let mut open: Vec<(String, usize)> = Vec::new();

    for tag in tokenize(markup) {
        let is_void = VOID_ELEMENTS.contains(&tag.name.as_str());
        match tag.kind {
            TagKind::Start { self_closing } => {
                if let Some(issue) = nesting_violation(&open, &tag) {
                    issues.push(issue);
                }
                if !is_void && !self_closing {
                    open.push((tag.name, tag.line));
                }
            }
            TagKind::End if is_void => {}
            TagKind::End => match open.iter().rposition(|(name, _)| *name == tag.name) {
                Some(position) => {
                    // The matched element itself is the first drained entry.
                    for (name, line) in open.drain(position..).skip(1) {
                        if let Some(issue) = unclosed(&name, line) {
                            issues.push(issue);
                        }
                    }
                }
                None => issues.push(StructureIssue {
                    kind: StructureIssueKind::UnmatchedClosingTag,
                    severity: Severity::Error,
                    message: format!(
                        "Closing tag </{}> on line {} has no matching opening tag",
                        tag.name, tag.line
                    ),
                    element: Some(tag.name.clone()),
                    line: Some(tag.line),
                    suggestion: Some(format!(
                        "Remove </{}> or add the missing <{}>",
                        tag.name, tag.name
                    )),
                }),
            },
        }
    }

    for (name, line) in open {
        if let Some(issue) = unclosed(&name, line) {
            issues.push(issue);
        }
    }

    if issues.is_empty() {
        issues.push(StructureIssue {
            kind: StructureIssueKind::TagsBalanced,
            severity: Severity::Success,
            message: "All tags are properly opened and closed".to_string(),
            element: None,
            line: None,
            suggestion: None,
        });
        issues.push(StructureIssue {
            kind: StructureIssueKind::NestingValid,
            severity: Severity::Success,
            message: "No invalid element nesting found".to_string(),
            element: None,
            line: None,
            suggestion: None,
        });
    }

    issues
}

fn unclosed(name: &str, line: usize) -> Option<StructureIssue> {
    if OPTIONAL_END_TAG.contains(&name) {
        return None;
    }
    Some(StructureIssue {
        kind: StructureIssueKind::UnclosedTag,
        severity: Severity::Error,
        message: format!("<{}> opened on line {} is never closed", name, line),
        element: Some(name.to_string()),
        line: Some(line),
        suggestion: Some(format!("Add a closing </{}> tag", name)),
    })
}

fn nesting_violation(open: &[(String, usize)], tag: &Tag) -> Option<StructureIssue> {
    let ancestor = open.iter().rev().find_map(|(name, _)| {
        NESTING_RULES
            .iter()
            .find(|(parent, forbidden)| parent == name && forbidden.contains(&tag.name.as_str()))
            .map(|(parent, _)| *parent)
    })?;

    Some(StructureIssue {
        kind: StructureIssueKind::InvalidNesting,
        severity: Severity::Error,
        message: format!(
            "<{}> on line {} is nested inside <{}>",
            tag.name, tag.line, ancestor
        ),
        element: Some(format!("{} > {}", ancestor, tag.name)),
        line: Some(tag.line),
        suggestion: Some(format!("Close the <{}> before opening <{}>", ancestor, tag.name)),
    })
}

/// Maps byte offsets to 1-based line numbers.
struct LineIndex {
    newlines: Vec<usize>,
}

impl LineIndex {
    fn new(markup: &str) -> Self {
        Self {
            newlines: markup
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i)
                .collect(),
        }
    }

    fn line_at(&self, offset: usize) -> usize {
        self.newlines.partition_point(|&n| n < offset) + 1
    }
}

fn tokenize(markup: &str) -> Vec<Tag> {
    let bytes = markup.as_bytes();
    let lines = LineIndex::new(markup);
    let mut tags = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }
        let rest = &bytes[i..];

        if rest.starts_with(b"<!--") {
            i = skip_past(bytes, i + 4, b"-->");
        } else if starts_with_ignore_case(rest, b"<![CDATA[") {
            i = skip_past(bytes, i + 9, b"]]>");
        } else if rest.starts_with(b"<!") || rest.starts_with(b"<?") {
            i = skip_past(bytes, i + 2, b">");
        } else if rest.starts_with(b"</") && rest.get(2).is_some_and(u8::is_ascii_alphabetic) {
            let (name, name_end) = read_name(bytes, i + 2);
            tags.push(Tag {
                name,
                kind: TagKind::End,
                line: lines.line_at(i),
            });
            i = skip_past(bytes, name_end, b">");
        } else if rest.get(1).is_some_and(u8::is_ascii_alphabetic) {
            let line = lines.line_at(i);
            let (name, name_end) = read_name(bytes, i + 1);
            let (tag_end, self_closing) = scan_attributes(bytes, name_end);
            let raw_text = !self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str());
            tags.push(Tag {
                name: name.clone(),
                kind: TagKind::Start { self_closing },
                line,
            });
            i = tag_end;
            if raw_text {
                i = find_end_tag(bytes, i, &name);
            }
        } else {
            i += 1;
        }
    }

    tags
}

fn read_name(bytes: &[u8], start: usize) -> (String, usize) {
    let mut end = start;
    while end < bytes.len()
        && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'-' || bytes[end] == b':')
    {
        end += 1;
    }
    (
        String::from_utf8_lossy(&bytes[start..end]).to_ascii_lowercase(),
        end,
    )
}

/// Scans from just after a start-tag name to just past its `>`, honoring
/// quoted attribute values. Returns the next offset and whether the tag
/// ended with `/>`.
fn scan_attributes(bytes: &[u8], start: usize) -> (usize, bool) {
    let mut i = start;
    let mut quote: Option<u8> = None;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => {
                let self_closing = i > start && bytes[i - 1] == b'/';
                return (i + 1, self_closing);
            }
            None => {}
        }
        i += 1;
    }
    (bytes.len(), false)
}

fn skip_past(bytes: &[u8], start: usize, terminator: &[u8]) -> usize {
    find(bytes, start, terminator)
        .map(|pos| pos + terminator.len())
        .unwrap_or(bytes.len())
}

/// Offset of the `</name` that ends a raw-text element, or end of input.
fn find_end_tag(bytes: &[u8], start: usize, name: &str) -> usize {
    let mut needle = Vec::with_capacity(name.len() + 2);
    needle.extend_from_slice(b"</");
    needle.extend_from_slice(name.as_bytes());

    let mut i = start;
    while let Some(pos) = find(bytes, i, b"</") {
        if starts_with_ignore_case(&bytes[pos..], &needle) {
            let after = bytes.get(pos + needle.len()).copied();
            if after.is_none_or(|b| !b.is_ascii_alphanumeric()) {
                return pos;
            }
        }
        i = pos + 2;
    }
    bytes.len()
}

fn find(bytes: &[u8], start: usize, needle: &[u8]) -> Option<usize> {
    if start >= bytes.len() {
        return None;
    }
    bytes[start..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + start)
}

fn starts_with_ignore_case(haystack: &[u8], prefix: &[u8]) -> bool {
    haystack.len() >= prefix.len() && haystack[..prefix.len()].eq_ignore_ascii_case(prefix)
}
