//! `[[target]]` and `[[target|display]]` syntax.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::syntax::{char_column, text_before};

/// A complete wikilink. The target stops at the first `|`; neither part may
/// contain brackets.
static WIKILINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[(?<target>[^\[\]|]*)(?:\|(?<display>[^\[\]]*))?\]\]").unwrap());

/// An unclosed `[[` directly before the cursor, not yet past a `|`.
static PARTIAL_WIKILINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[(?<prefix>[^\]|]*)$").unwrap());

/// A wikilink being typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikilinkContext {
    /// Text typed after `[[`.
    pub prefix: String,
    /// Column where the prefix starts, just after `[[`.
    pub start: usize,
}

pub fn wikilink_context(line: &str, column: usize) -> Option<WikilinkContext> {
    let before = text_before(line, column);
    let prefix = PARTIAL_WIKILINK_RE.captures(before)?.name("prefix")?;

    Some(WikilinkContext {
        prefix: prefix.as_str().to_string(),
        start: char_column(before, prefix.start()),
    })
}

/// A wikilink found in a line. Columns cover the whole `[[...]]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikilinkSpan {
    pub target: String,
    pub display: Option<String>,
    pub start: usize,
    pub end: usize,
}

impl WikilinkSpan {
    /// The target without any `#fragment`.
    pub fn slug(&self) -> &str {
        target_slug(&self.target)
    }
}

pub fn target_slug(target: &str) -> &str {
    target.split('#').next().unwrap_or(target).trim()
}

/// All wikilinks on `line` with a non-empty target.
pub fn find_wikilinks(line: &str) -> Vec<WikilinkSpan> {
    WIKILINK_RE
        .captures_iter(line)
        .filter_map(|captures| {
            let full = captures.get(0)?;
            let target = captures.name("target")?.as_str().trim();
            if target.is_empty() {
                return None;
            }

            let display = captures
                .name("display")
                .map(|display| display.as_str().trim().to_string())
                .filter(|display| !display.is_empty());

            Some(WikilinkSpan {
                target: target.to_string(),
                display,
                start: char_column(line, full.start()),
                end: char_column(line, full.end()),
            })
        })
        .collect()
}

/// The wikilink whose span contains `column`.
pub fn wikilink_at(line: &str, column: usize) -> Option<WikilinkSpan> {
    find_wikilinks(line)
        .into_iter()
        .find(|span| span.start <= column && column < span.end)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("See [[my-po", 11, "my-po", 6)]
    #[case("[[", 2, "", 2)]
    #[case("a [[x]] and [[ne", 16, "ne", 14)]
    #[case("[[some post", 11, "some post", 2)]
    fn test_partial_wikilink(
        #[case] line: &str,
        #[case] column: usize,
        #[case] prefix: &str,
        #[case] start: usize,
    ) {
        let context = wikilink_context(line, column).expect("should be in a wikilink");
        assert_eq!(context.prefix, prefix);
        assert_eq!(context.start, start);
    }

    #[rstest]
    #[case("See [[x]] then", 14)]
    #[case("[[x]]", 5)]
    #[case("[[target|disp", 13)]
    #[case("no link here", 5)]
    #[case("[single", 7)]
    fn test_not_a_partial_wikilink(#[case] line: &str, #[case] column: usize) {
        assert_eq!(wikilink_context(line, column), None);
    }

    #[test]
    fn test_column_past_end_is_clamped() {
        let context = wikilink_context("[[ab", 40).unwrap();
        assert_eq!(context.prefix, "ab");
    }

    #[test]
    fn test_find_wikilinks() {
        let links = find_wikilinks("A [[ first ]] and [[second| Shown ]] and [[ ]].");

        assert_eq!(
            links,
            vec![
                WikilinkSpan {
                    target: "first".into(),
                    display: None,
                    start: 2,
                    end: 13,
                },
                WikilinkSpan {
                    target: "second".into(),
                    display: Some("Shown".into()),
                    start: 18,
                    end: 36,
                },
            ]
        );
    }

    #[test]
    fn test_find_wikilinks_unicode_columns() {
        let links = find_wikilinks("café [[menu]]");
        assert_eq!(links[0].start, 5);
        assert_eq!(links[0].end, 13);
    }

    #[test]
    fn test_wikilink_at() {
        let line = "read [[guide#setup|the guide]] now";

        let span = wikilink_at(line, 10).unwrap();
        assert_eq!(span.target, "guide#setup");
        assert_eq!(span.slug(), "guide");
        assert_eq!(span.display.as_deref(), Some("the guide"));

        assert!(wikilink_at(line, 5).is_some());
        assert!(wikilink_at(line, 4).is_none());
        assert!(wikilink_at(line, span.end).is_none());
    }
}
