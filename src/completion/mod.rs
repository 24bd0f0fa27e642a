//! `textDocument/completion`.
//!
//! The cursor context decides which completer runs; exactly one does, or the
//! list is empty.
//!
//! | Context | Completer | Items |
//! |---------|-----------|-------|
//! | frontmatter field name / value | [`FrontmatterCompleter`] | known fields, enum values |
//! | `!!!` / `???` / `???+` | [`AdmonitionCompleter`] | admonition types |
//! | `@han` | [`MentionCompleter`] | handles and their aliases |
//! | `[[sl` | [`WikilinkCompleter`] | slugs and aliases |

use lsp_types::{CompletionItem, CompletionList, CompletionResponse, Position, Range};

use crate::context::{cursor_context, CursorContext};
use crate::index::Index;

use self::admonition_completer::AdmonitionCompleter;
use self::frontmatter_completer::FrontmatterCompleter;
use self::mention_completer::MentionCompleter;
use self::wikilink_completer::WikilinkCompleter;

mod admonition_completer;
mod frontmatter_completer;
mod matcher;
mod mention_completer;
mod wikilink_completer;

#[derive(Clone, Copy)]
pub struct Context<'a> {
    index: &'a Index,
    text: &'a str,
}

pub trait Completer<'a>: Sized {
    /// What the cursor analyzer found.
    type Found;

    fn construct(context: Context<'a>, line: usize, character: usize, found: Self::Found) -> Self;

    fn completions(&self) -> Vec<impl Completable<'a, Self>>;
}

pub trait Completable<'a, T: Completer<'a>>: Sized {
    fn completions(&self, completer: &T) -> Option<CompletionItem>;
}

/// Sort key that puts canonical entries (slugs, handles) before aliases.
fn sort_text(is_alias: bool, key: &str) -> String {
    format!("{}{}", u8::from(is_alias), key)
}

fn line_range(line: usize, start: usize, end: usize) -> Range {
    Range {
        start: Position {
            line: line as u32,
            character: start as u32,
        },
        end: Position {
            line: line as u32,
            character: end as u32,
        },
    }
}

pub fn get_completions(index: &Index, text: &str, position: Position) -> CompletionResponse {
    let context = Context { index, text };
    let line = position.line as usize;
    let character = position.character as usize;

    let items = match cursor_context(text, line, character) {
        Some(CursorContext::Frontmatter(found)) => {
            run_completer::<FrontmatterCompleter>(context, line, character, found)
        }
        Some(CursorContext::Admonition(found)) => {
            run_completer::<AdmonitionCompleter>(context, line, character, found)
        }
        Some(CursorContext::Mention(found)) => {
            run_completer::<MentionCompleter>(context, line, character, found)
        }
        Some(CursorContext::Wikilink(found)) => {
            run_completer::<WikilinkCompleter>(context, line, character, found)
        }
        None => Vec::new(),
    };

    CompletionResponse::List(CompletionList {
        is_incomplete: true,
        items,
    })
}

fn run_completer<'a, T: Completer<'a>>(
    context: Context<'a>,
    line: usize,
    character: usize,
    found: T::Found,
) -> Vec<CompletionItem> {
    let completer = T::construct(context, line, character, found);

    completer
        .completions()
        .into_iter()
        .filter_map(|completable| completable.completions(&completer))
        .collect()
}
