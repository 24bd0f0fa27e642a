//! Cursor-context analyzers.
//!
//! Pure functions from a line of text and a char column to a description of
//! what the user is typing (completion) or pointing at (hover, definition).
//! Completion checks them in a fixed order so overlapping syntax resolves the
//! same way every time:
//!
//! 1. frontmatter field name / value
//! 2. admonition marker
//! 3. `@mention`
//! 4. `[[wikilink]]`

pub mod admonition;
pub mod frontmatter;
pub mod mention;
pub mod wikilink;

pub use admonition::{admonition_at, admonition_context, AdmonitionContext, AdmonitionKind};
pub use frontmatter::{
    frontmatter_context, frontmatter_field_at, frontmatter_line_context, in_frontmatter,
    FrontmatterContext,
};
pub use mention::{find_mentions, mention_at, mention_context, MentionContext, MentionSpan};
pub use wikilink::{find_wikilinks, wikilink_at, wikilink_context, WikilinkContext, WikilinkSpan};

/// The first analyzer that applies at a cursor position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorContext {
    Frontmatter(FrontmatterContext),
    Admonition(AdmonitionContext),
    Mention(MentionContext),
    Wikilink(WikilinkContext),
}

/// Runs the analyzers in priority order for `line_nr`/`column` of `text`.
pub fn cursor_context(text: &str, line_nr: usize, column: usize) -> Option<CursorContext> {
    if let Some(context) = frontmatter_context(text, line_nr, column) {
        return Some(CursorContext::Frontmatter(context));
    }

    let line = text.lines().nth(line_nr).unwrap_or("");

    admonition_context(line, column)
        .map(CursorContext::Admonition)
        .or_else(|| mention_context(line, column).map(CursorContext::Mention))
        .or_else(|| wikilink_context(line, column).map(CursorContext::Wikilink))
}
