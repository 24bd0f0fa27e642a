use lsp_types::{CompletionItem, CompletionItemKind, CompletionTextEdit, TextEdit};

use super::{line_range, Completable, Completer, Context};
use crate::context::{AdmonitionContext, AdmonitionKind};
use crate::syntax::text_before;

/// Completes the type after `!!!`, `???` and `???+`.
pub struct AdmonitionCompleter {
    found: AdmonitionContext,
    line: usize,
    character: usize,
    /// The cursor sits right after the marker, so a space must be inserted.
    needs_space: bool,
}

impl<'a> Completer<'a> for AdmonitionCompleter {
    type Found = AdmonitionContext;

    fn construct(context: Context<'a>, line: usize, character: usize, found: AdmonitionContext) -> Self {
        let line_text = context.text.lines().nth(line).unwrap_or_default();
        let needs_space = !text_before(line_text, character).ends_with(char::is_whitespace)
            && found.prefix.is_empty();

        AdmonitionCompleter {
            found,
            line,
            character,
            needs_space,
        }
    }

    fn completions(&self) -> Vec<impl Completable<'a, Self>> {
        let prefix = self.found.prefix.to_lowercase();

        AdmonitionKind::all()
            .into_iter()
            .filter(|kind| kind.name().starts_with(&prefix))
            .collect()
    }
}

impl<'a> Completable<'a, AdmonitionCompleter> for AdmonitionKind {
    fn completions(&self, completer: &AdmonitionCompleter) -> Option<CompletionItem> {
        let new_text = if completer.needs_space {
            format!(" {}", self.name())
        } else {
            self.name().to_string()
        };

        Some(CompletionItem {
            label: self.name().to_string(),
            kind: Some(CompletionItemKind::ENUM_MEMBER),
            detail: Some(self.description().to_string()),
            filter_text: Some(self.name().to_string()),
            text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                range: line_range(completer.line, completer.found.start, completer.character),
                new_text,
            })),
            ..Default::default()
        })
    }
}
