//! Findings produced by the page analyzers.
//!
//! Each analyzer has its own issue type carrying only the fields relevant to
//! it. [`Issue`] unifies them for reporting and aggregation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    /// Clean-structure confirmation. Never counted as a problem.
    Success,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
            Severity::Success => "success",
        }
    }

    pub fn is_problem(&self) -> bool {
        !matches!(self, Severity::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HeadingIssueKind {
    EmptyHeading,
    SkippedLevel,
    MissingH1,
    MultipleH1,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadingIssue {
    #[serde(rename = "type")]
    pub kind: HeadingIssueKind,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    /// Index of the heading in document order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ImageIssueKind {
    MissingAlt,
    MissingDimensions,
    InaccessibleSvg,
    LargeFile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIssue {
    #[serde(rename = "type")]
    pub kind: ImageIssueKind,
    pub severity: Severity,
    pub message: String,
    /// Resolved, absolute source. Empty for inline SVG.
    pub src: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LinkIssueKind {
    EmptyLinkText,
    UnsafeTargetBlank,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkIssue {
    #[serde(rename = "type")]
    pub kind: LinkIssueKind,
    pub severity: Severity,
    pub message: String,
    pub href: String,
    pub link_text: String,
    pub link_html: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MetaIssueKind {
    MissingTitle,
    MissingDescription,
    MissingViewport,
    MissingOpenGraph,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaIssue {
    #[serde(rename = "type")]
    pub kind: MetaIssueKind,
    pub severity: Severity,
    pub message: String,
    pub element: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StructureIssueKind {
    UnmatchedClosingTag,
    UnclosedTag,
    InvalidNesting,
    TagsBalanced,
    NestingValid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureIssue {
    #[serde(rename = "type")]
    pub kind: StructureIssueKind,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    /// 1-based line in the raw markup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConsoleErrorKind {
    ConsoleError,
    JsError,
    RequestFailed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleErrorRecord {
    #[serde(rename = "type")]
    pub kind: ConsoleErrorKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// Any finding, tagged by the analyzer that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", rename_all = "camelCase")]
pub enum Issue {
    Heading(HeadingIssue),
    Image(ImageIssue),
    Link(LinkIssue),
    Meta(MetaIssue),
    HtmlStructure(StructureIssue),
    Console(ConsoleErrorRecord),
}

impl Issue {
    pub fn severity(&self) -> Severity {
        match self {
            Issue::Heading(i) => i.severity,
            Issue::Image(i) => i.severity,
            Issue::Link(i) => i.severity,
            Issue::Meta(i) => i.severity,
            Issue::HtmlStructure(i) => i.severity,
            Issue::Console(i) => i.severity,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Issue::Heading(i) => &i.message,
            Issue::Image(i) => &i.message,
            Issue::Link(i) => &i.message,
            Issue::Meta(i) => &i.message,
            Issue::HtmlStructure(i) => &i.message,
            Issue::Console(i) => &i.message,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Issue::Heading(_) => "heading",
            Issue::Image(_) => "image",
            Issue::Link(_) => "link",
            Issue::Meta(_) => "meta",
            Issue::HtmlStructure(_) => "htmlStructure",
            Issue::Console(_) => "console",
        }
    }
}

macro_rules! impl_from_issue {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(impl From<$ty> for Issue {
            fn from(issue: $ty) -> Self {
                Issue::$variant(issue)
            }
        })*
    };
}

impl_from_issue! {
    Heading => HeadingIssue,
    Image => ImageIssue,
    Link => LinkIssue,
    Meta => MetaIssue,
    HtmlStructure => StructureIssue,
    Console => ConsoleErrorRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_is_not_a_problem() {
        assert!(Severity::Error.is_problem());
        assert!(Severity::Info.is_problem());
        assert!(!Severity::Success.is_problem());
    }

    #[test]
    fn test_issue_serializes_with_category_and_type() {
        let issue = Issue::from(MetaIssue {
            kind: MetaIssueKind::MissingTitle,
            severity: Severity::Error,
            message: "Missing title tag".to_string(),
            element: "title".to_string(),
        });
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["category"], "meta");
        assert_eq!(json["type"], "missingTitle");
        assert_eq!(json["severity"], "error");
        assert_eq!(issue.category(), "meta");
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let issue = HeadingIssue {
            kind: HeadingIssueKind::MissingH1,
            severity: Severity::Error,
            message: "Page has no h1 heading".to_string(),
            element: None,
            position: None,
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert!(json.get("element").is_none());
        assert!(json.get("position").is_none());
    }
}
