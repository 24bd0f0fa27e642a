use std::sync::Arc;

use itertools::Itertools;
use lsp_types::{
    CompletionItem, CompletionItemKind, CompletionTextEdit, Documentation, MarkupContent,
    MarkupKind, TextEdit,
};

use super::matcher::fuzzy_filter;
use super::{line_range, sort_text, Completable, Completer, Context};
use crate::context::MentionContext;
use crate::index::MentionInfo;

/// Completes `@` with blogroll handles, internal mentions and their aliases.
pub struct MentionCompleter {
    mentions: Vec<Arc<MentionInfo>>,
    prefix: String,
    line: usize,
    /// Column just after the `@`.
    start: usize,
    character: usize,
}

pub struct HandleKey {
    key: String,
    mention: Arc<MentionInfo>,
    is_alias: bool,
}

impl HandleKey {
    fn filter_text(&self) -> String {
        std::iter::once(self.key.as_str())
            .chain(std::iter::once(self.mention.title.as_str()))
            .chain(self.mention.aliases.iter().map(String::as_str))
            .unique()
            .join(" ")
    }

    fn documentation(&self) -> String {
        let mention = &self.mention;
        let mut lines = Vec::new();
        if let Some(description) = &mention.description {
            lines.push(description.clone());
        }
        if let Some(site_url) = &mention.site_url {
            lines.push(format!("<{site_url}>"));
        }
        if let Some(slug) = mention.slug.as_ref().filter(|_| mention.is_internal) {
            lines.push(format!("Internal post `{slug}`"));
        }
        lines.join("\n\n")
    }
}

impl<'a> Completer<'a> for MentionCompleter {
    type Found = MentionContext;

    fn construct(context: Context<'a>, line: usize, character: usize, found: MentionContext) -> Self {
        MentionCompleter {
            mentions: context.index.all_mentions(),
            prefix: found.prefix,
            line,
            start: found.start,
            character,
        }
    }

    fn completions(&self) -> Vec<impl Completable<'a, Self>> {
        let keys = self
            .mentions
            .iter()
            .flat_map(|mention| {
                mention.keys().enumerate().map(move |(i, key)| HandleKey {
                    key: key.to_string(),
                    mention: mention.clone(),
                    is_alias: i > 0,
                })
            })
            .sorted_by(|a, b| (a.is_alias, &a.key).cmp(&(b.is_alias, &b.key)))
            .collect_vec();

        fuzzy_filter(&self.prefix, keys, HandleKey::filter_text)
    }
}

impl<'a> Completable<'a, MentionCompleter> for HandleKey {
    fn completions(&self, completer: &MentionCompleter) -> Option<CompletionItem> {
        let detail = if self.is_alias {
            format!("{} (alias of @{})", self.mention.title, self.mention.handle)
        } else {
            self.mention.title.clone()
        };
        let documentation = self.documentation();

        Some(CompletionItem {
            label: format!("@{}", self.key),
            kind: Some(if self.mention.is_internal {
                CompletionItemKind::REFERENCE
            } else {
                CompletionItemKind::VALUE
            }),
            detail: Some(detail),
            documentation: (!documentation.is_empty()).then(|| {
                Documentation::MarkupContent(MarkupContent {
                    kind: MarkupKind::Markdown,
                    value: documentation,
                })
            }),
            sort_text: Some(sort_text(self.is_alias, &self.key)),
            filter_text: Some(self.filter_text()),
            text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                range: line_range(completer.line, completer.start, completer.character),
                new_text: self.key.clone(),
            })),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use lsp_types::{CompletionResponse, Position};
    use tempfile::TempDir;

    use crate::completion::get_completions;
    use crate::config::{BlogrollEntry, Settings};
    use crate::index::Index;

    use super::*;

    fn index() -> (TempDir, Index) {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("post.md"), "# Post").unwrap();

        let settings = Settings {
            blogroll: vec![
                BlogrollEntry {
                    handle: Some("simon".into()),
                    title: Some("Simon Willison".into()),
                    site_url: Some("https://simonwillison.net".into()),
                    aliases: vec!["simonw".into()],
                    ..Default::default()
                },
                BlogrollEntry {
                    site_url: Some("https://jvns.ca".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let index = Index::new();
        index.build(temp_dir.path(), &settings);
        (temp_dir, index)
    }

    fn items(text: &str, character: u32) -> Vec<CompletionItem> {
        let (_temp_dir, index) = index();
        match get_completions(&index, text, Position { line: 0, character }) {
            CompletionResponse::List(list) => list.items,
            CompletionResponse::Array(items) => items,
        }
    }

    #[test]
    fn test_all_handles_for_bare_at() {
        let labels = items("thanks @", 8)
            .into_iter()
            .map(|item| item.label)
            .collect_vec();

        assert_eq!(labels, vec!["@jvns.ca", "@simon", "@simonw"]);
    }

    #[test]
    fn test_prefix_and_title_matching() {
        let items = items("hi @willi", 9);

        assert_eq!(items.len(), 2);
        let simon = &items[0];
        assert_eq!(simon.label, "@simon");
        assert_eq!(simon.sort_text.as_deref(), Some("0simon"));
        assert_eq!(items[1].sort_text.as_deref(), Some("1simonw"));

        let Some(CompletionTextEdit::Edit(edit)) = &simon.text_edit else {
            panic!("expected a text edit");
        };
        assert_eq!(edit.new_text, "simon");
        assert_eq!(edit.range, line_range(0, 4, 9));
    }

    #[test]
    fn test_email_is_not_a_mention() {
        assert!(items("me@sim", 6).is_empty());
    }
}
