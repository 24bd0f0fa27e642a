use std::sync::Arc;

use itertools::Itertools;
use lsp_types::{
    CompletionItem, CompletionItemKind, CompletionTextEdit, Documentation, MarkupContent,
    MarkupKind, TextEdit,
};

use super::matcher::fuzzy_filter;
use super::{line_range, sort_text, Completable, Completer, Context};
use crate::context::WikilinkContext;
use crate::index::PostInfo;
use crate::syntax::byte_offset;

/// Completes `[[` with slugs and aliases.
pub struct WikilinkCompleter {
    posts: Vec<Arc<PostInfo>>,
    prefix: String,
    line: usize,
    /// Column where the target starts, just after `[[`.
    start: usize,
    character: usize,
    /// Whether `]]` already follows the cursor.
    closed: bool,
}

/// One key a post can be linked by.
pub struct PostKey {
    key: String,
    post: Arc<PostInfo>,
    is_alias: bool,
}

impl PostKey {
    fn filter_text(&self) -> String {
        std::iter::once(self.key.as_str())
            .chain(std::iter::once(self.post.title.as_str()))
            .chain(self.post.aliases.iter().map(String::as_str))
            .unique()
            .join(" ")
    }
}

impl<'a> Completer<'a> for WikilinkCompleter {
    type Found = WikilinkContext;

    fn construct(context: Context<'a>, line: usize, character: usize, found: WikilinkContext) -> Self {
        let line_text = context.text.lines().nth(line).unwrap_or_default();
        let after_cursor = &line_text[byte_offset(line_text, character)..];

        WikilinkCompleter {
            posts: context.index.all_posts(),
            prefix: found.prefix,
            line,
            start: found.start,
            character,
            closed: after_cursor.starts_with("]]"),
        }
    }

    fn completions(&self) -> Vec<impl Completable<'a, Self>> {
        let keys = self
            .posts
            .iter()
            .flat_map(|post| {
                post.keys().enumerate().map(move |(i, key)| PostKey {
                    key: key.to_string(),
                    post: post.clone(),
                    is_alias: i > 0,
                })
            })
            .filter(|candidate| !candidate.key.is_empty())
            .sorted_by(|a, b| (a.is_alias, &a.key).cmp(&(b.is_alias, &b.key)))
            .collect_vec();

        fuzzy_filter(&self.prefix, keys, PostKey::filter_text)
    }
}

impl<'a> Completable<'a, WikilinkCompleter> for PostKey {
    fn completions(&self, completer: &WikilinkCompleter) -> Option<CompletionItem> {
        let new_text = if completer.closed {
            self.key.clone()
        } else {
            format!("{}]]", self.key)
        };

        let detail = if self.is_alias {
            format!("{} (alias of {})", self.post.title, self.post.slug)
        } else {
            self.post.title.clone()
        };

        Some(CompletionItem {
            label: self.key.clone(),
            kind: Some(if self.is_alias {
                CompletionItemKind::REFERENCE
            } else {
                CompletionItemKind::FILE
            }),
            detail: Some(detail),
            documentation: (!self.post.description.is_empty()).then(|| {
                Documentation::MarkupContent(MarkupContent {
                    kind: MarkupKind::Markdown,
                    value: self.post.description.clone(),
                })
            }),
            sort_text: Some(sort_text(self.is_alias, &self.key)),
            filter_text: Some(self.filter_text()),
            text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                range: line_range(completer.line, completer.start, completer.character),
                new_text,
            })),
            ..Default::default()
        })
    }
}
