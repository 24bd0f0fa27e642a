//! Content checks run on every open document.
//!
//! Rules only need two questions answered about the rest of the site, which
//! [`Resolver`] abstracts so the checks run without a live index.

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::context::frontmatter::declared_fields;
use crate::context::{find_mentions, find_wikilinks};
use crate::syntax::{char_column, content_lines, locate_frontmatter};

pub trait Resolver {
    fn resolve_slug(&self, slug: &str) -> bool;
    fn resolve_handle(&self, handle: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Char columns on a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Span {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub range: Span,
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    /// Whether an automatic fix exists.
    pub fixable: bool,
}

pub const UNCLOSED_FRONTMATTER: &str = "unclosed-frontmatter";
pub const DUPLICATE_KEY: &str = "duplicate-key";
pub const INVALID_DATE: &str = "invalid-date";
pub const BROKEN_WIKILINK: &str = "broken-wikilink";
pub const UNKNOWN_MENTION: &str = "unknown-mention";

const DATE_FIELDS: &[&str] = &["date", "published_date", "updated"];

/// Runs every rule over `content`. Issues come back ordered by position.
pub fn check(path: &Path, content: &str, resolver: &dyn Resolver) -> Vec<Issue> {
    let mut issues = Vec::new();

    unclosed_frontmatter(content, &mut issues);
    frontmatter_fields(content, &mut issues);
    references(content, resolver, &mut issues);

    issues.sort_by(|a, b| a.range.cmp(&b.range).then(a.code.cmp(b.code)));

    tracing::debug!(path = %path.display(), issues = issues.len(), "lint finished");
    issues
}

fn unclosed_frontmatter(content: &str, issues: &mut Vec<Issue>) {
    let Some(block) = locate_frontmatter(content) else {
        return;
    };
    if block.end.is_some() {
        return;
    }

    let first_line = content.lines().next().unwrap_or_default();
    issues.push(Issue {
        range: Span {
            line: block.start,
            start: 0,
            end: first_line.chars().count(),
        },
        code: UNCLOSED_FRONTMATTER,
        severity: Severity::Error,
        message: "Frontmatter is never closed with `---`".to_string(),
        fixable: false,
    });
}

fn frontmatter_fields(content: &str, issues: &mut Vec<Issue>) {
    let lines: Vec<&str> = content.lines().collect();
    let mut seen: Vec<String> = Vec::new();

    for (line_nr, name) in declared_fields(content) {
        let line = lines.get(line_nr).copied().unwrap_or_default();
        let name_start = char_column(line, line.find(name.as_str()).unwrap_or(0));

        if seen.contains(&name) {
            issues.push(Issue {
                range: Span {
                    line: line_nr,
                    start: name_start,
                    end: name_start + name.chars().count(),
                },
                code: DUPLICATE_KEY,
                severity: Severity::Error,
                message: format!("Duplicate frontmatter key `{name}`"),
                fixable: true,
            });
        } else {
            seen.push(name.clone());
        }

        if DATE_FIELDS.contains(&name.as_str()) {
            invalid_date(line_nr, line, &name, issues);
        }
    }
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
}

/// `YYYY-MM-DD`, `YYYY-MM-DD HH:MM[:SS]` or RFC 3339.
pub fn is_valid_date(value: &str) -> bool {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M").is_ok()
        || DateTime::parse_from_rfc3339(value).is_ok()
}

fn invalid_date(line_nr: usize, line: &str, name: &str, issues: &mut Vec<Issue>) {
    let Some((_, raw)) = line.split_once(':') else {
        return;
    };
    let value = unquote(raw.trim());
    if value.is_empty() || is_valid_date(value) {
        return;
    }

    let value_start = line.len() - raw.trim_start().len();
    let start = char_column(line, value_start);
    issues.push(Issue {
        range: Span {
            line: line_nr,
            start,
            end: char_column(line, value_start + raw.trim().len()),
        },
        code: INVALID_DATE,
        severity: Severity::Warning,
        message: format!("`{name}` is not a valid date: `{value}`"),
        fixable: false,
    });
}

fn references(content: &str, resolver: &dyn Resolver, issues: &mut Vec<Issue>) {
    for (line_nr, line) in content_lines(content) {
        for link in find_wikilinks(line) {
            if resolver.resolve_slug(link.slug()) {
                continue;
            }
            issues.push(Issue {
                range: Span {
                    line: line_nr,
                    start: link.start,
                    end: link.end,
                },
                code: BROKEN_WIKILINK,
                severity: Severity::Warning,
                message: format!("No post matches `[[{}]]`", link.target),
                fixable: false,
            });
        }

        for mention in find_mentions(line) {
            if resolver.resolve_handle(&mention.handle) {
                continue;
            }
            issues.push(Issue {
                range: Span {
                    line: line_nr,
                    start: mention.start,
                    end: mention.end,
                },
                code: UNKNOWN_MENTION,
                severity: Severity::Warning,
                message: format!("Unknown mention `@{}`", mention.handle),
                fixable: false,
            });
        }
    }
}
