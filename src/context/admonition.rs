//! Admonition markers: `!!! note`, `??? tip` (collapsed) and `???+ warning`
//! (collapsible, open by default).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::syntax::{char_column, text_before};

static PARTIAL_ADMONITION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?<marker>\?{3}\+?|!!!)(?:\s+(?<kind>\w*))?$").unwrap());

static ADMONITION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?<marker>\?{3}\+?|!!!)\s+(?<kind>\w+)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmonitionKind {
    Note,
    Abstract,
    Info,
    Tip,
    Success,
    Question,
    Warning,
    Failure,
    Danger,
    Bug,
    Example,
    Quote,
}

impl AdmonitionKind {
    pub fn all() -> Vec<Self> {
        vec![
            Self::Note,
            Self::Abstract,
            Self::Info,
            Self::Tip,
            Self::Success,
            Self::Question,
            Self::Warning,
            Self::Failure,
            Self::Danger,
            Self::Bug,
            Self::Example,
            Self::Quote,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Abstract => "abstract",
            Self::Info => "info",
            Self::Tip => "tip",
            Self::Success => "success",
            Self::Question => "question",
            Self::Warning => "warning",
            Self::Failure => "failure",
            Self::Danger => "danger",
            Self::Bug => "bug",
            Self::Example => "example",
            Self::Quote => "quote",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Note => "General information the reader should notice",
            Self::Abstract => "Summary or TL;DR of the section",
            Self::Info => "Neutral background information",
            Self::Tip => "Helpful suggestion or shortcut",
            Self::Success => "A completed step or positive outcome",
            Self::Question => "Open question or FAQ entry",
            Self::Warning => "Something that needs care",
            Self::Failure => "A failed step or known problem",
            Self::Danger => "Risk of data loss or breakage",
            Self::Bug => "Known bug",
            Self::Example => "Worked example",
            Self::Quote => "Quotation or citation",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }
}

/// An admonition marker being typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmonitionContext {
    /// `!!!`, `???` or `???+`.
    pub marker: String,
    /// Partially typed type name, possibly empty.
    pub prefix: String,
    /// Column where the type name starts.
    pub start: usize,
}

pub fn admonition_context(line: &str, column: usize) -> Option<AdmonitionContext> {
    let before = text_before(line, column);
    let leading = before.len() - before.trim_start().len();
    let captures = PARTIAL_ADMONITION_RE.captures(before.trim())?;

    let marker = captures.name("marker")?.as_str().to_string();
    let (prefix, start) = match captures.name("kind") {
        Some(kind) => (
            kind.as_str().to_string(),
            char_column(before, leading + kind.start()),
        ),
        None => (String::new(), column.min(before.chars().count())),
    };

    Some(AdmonitionContext {
        marker,
        prefix,
        start,
    })
}

/// A complete admonition marker line. Columns span from the marker to the
/// end of the type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmonitionSpan {
    pub marker: String,
    pub kind: String,
    pub start: usize,
    pub end: usize,
}

pub fn admonition_at(line: &str, column: usize) -> Option<AdmonitionSpan> {
    let captures = ADMONITION_RE.captures(line)?;
    let marker = captures.name("marker")?;
    let kind = captures.name("kind")?;

    let span = AdmonitionSpan {
        marker: marker.as_str().to_string(),
        kind: kind.as_str().to_string(),
        start: char_column(line, marker.start()),
        end: char_column(line, kind.end()),
    };

    (span.start <= column && column < span.end).then_some(span)
}
