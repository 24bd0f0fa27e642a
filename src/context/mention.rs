//! `@handle` syntax.
//!
//! An `@` only starts a mention when the character before it is not
//! alphanumeric, `_` or another `@`. That keeps `user@example.com` and the
//! `@@handle` escape out.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::syntax::{char_column, text_before};

static HANDLE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_.\-]*$").unwrap());

static MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@(?<handle>[a-zA-Z][a-zA-Z0-9_.\-]*)").unwrap());

/// Whether `handle` is valid mention syntax (without the `@`).
pub fn is_valid_handle(handle: &str) -> bool {
    HANDLE_RE.is_match(handle)
}

fn can_precede_mention(previous: Option<char>) -> bool {
    !previous.is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '@')
}

/// A mention being typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionContext {
    /// Handle text typed after `@`, possibly empty.
    pub prefix: String,
    /// Column just after the `@`.
    pub start: usize,
}

pub fn mention_context(line: &str, column: usize) -> Option<MentionContext> {
    let before = text_before(line, column);
    let at = before.rfind('@')?;

    if !can_precede_mention(before[..at].chars().next_back()) {
        return None;
    }

    let typed = &before[at + 1..];
    if !typed.is_empty() && !is_valid_handle(typed) {
        return None;
    }

    Some(MentionContext {
        prefix: typed.to_string(),
        start: char_column(before, at + 1),
    })
}

/// A mention found in a line. `start` is the column of the `@`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionSpan {
    pub handle: String,
    pub start: usize,
    pub end: usize,
}

/// All mentions on `line`. Trailing `.` and `-` are treated as punctuation,
/// so `thanks @dave.` mentions `dave`.
pub fn find_mentions(line: &str) -> Vec<MentionSpan> {
    MENTION_RE
        .captures_iter(line)
        .filter_map(|captures| {
            let full = captures.get(0)?;
            if !can_precede_mention(line[..full.start()].chars().next_back()) {
                return None;
            }

            let handle = captures
                .name("handle")?
                .as_str()
                .trim_end_matches(['.', '-']);
            let end = full.start() + 1 + handle.len();

            Some(MentionSpan {
                handle: handle.to_string(),
                start: char_column(line, full.start()),
                end: char_column(line, end),
            })
        })
        .collect()
}

/// The mention whose span (including the `@`) contains `column`.
pub fn mention_at(line: &str, column: usize) -> Option<MentionSpan> {
    find_mentions(line)
        .into_iter()
        .find(|span| span.start <= column && column < span.end)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("Hello @dave", 11, "dave", 7)]
    #[case("@", 1, "", 1)]
    #[case("(@ali", 5, "ali", 2)]
    #[case("cc @a.b-c_d", 11, "a.b-c_d", 4)]
    #[case("first @one then @tw", 19, "tw", 17)]
    fn test_mention_context(
        #[case] line: &str,
        #[case] column: usize,
        #[case] prefix: &str,
        #[case] start: usize,
    ) {
        let context = mention_context(line, column).expect("should be in a mention");
        assert_eq!(context.prefix, prefix);
        assert_eq!(context.start, start);
    }

    #[rstest]
    #[case::email("test@example.com", 5)]
    #[case::email_end("test@example.com", 16)]
    #[case::escaped("@@dave", 6)]
    #[case::underscore("snake_@x", 8)]
    #[case::digit_first("@1abc", 5)]
    #[case::space_after("@dave is", 8)]
    #[case::no_at("plain", 3)]
    fn test_not_a_mention(#[case] line: &str, #[case] column: usize) {
        assert_eq!(mention_context(line, column), None);
    }

    #[test]
    fn test_find_mentions() {
        let mentions = find_mentions("thanks @dave. and @sarah-k, not me@mail.org or @@esc");

        assert_eq!(
            mentions,
            vec![
                MentionSpan {
                    handle: "dave".into(),
                    start: 7,
                    end: 12,
                },
                MentionSpan {
                    handle: "sarah-k".into(),
                    start: 18,
                    end: 26,
                },
            ]
        );
    }

    #[test]
    fn test_mention_at() {
        let line = "ask @simon.example about it";

        let span = mention_at(line, 4).unwrap();
        assert_eq!(span.handle, "simon.example");
        assert!(mention_at(line, 10).is_some());
        assert!(mention_at(line, 3).is_none());
        assert!(mention_at(line, span.end).is_none());
    }
}
