use lsp_types::{
    CompletionItem, CompletionItemKind, CompletionTextEdit, Documentation, MarkupContent,
    MarkupKind, TextEdit,
};

use super::{line_range, Completable, Completer, Context};
use crate::context::frontmatter::{field_spec, FieldSpec, FIELDS};
use crate::context::FrontmatterContext;

/// Completes field names, and values of fields with a fixed set of values.
pub struct FrontmatterCompleter {
    found: FrontmatterContext,
    line: usize,
    character: usize,
}

pub enum FrontmatterItem {
    Field(&'static FieldSpec),
    Value(&'static str),
}

fn starts_with_ignore_case(candidate: &str, prefix: &str) -> bool {
    candidate
        .to_lowercase()
        .starts_with(&prefix.trim().to_lowercase())
}

impl<'a> Completer<'a> for FrontmatterCompleter {
    type Found = FrontmatterContext;

    fn construct(_context: Context<'a>, line: usize, character: usize, found: FrontmatterContext) -> Self {
        FrontmatterCompleter {
            found,
            line,
            character,
        }
    }

    fn completions(&self) -> Vec<impl Completable<'a, Self>> {
        let found = &self.found;

        if found.is_field_value {
            return found
                .current_field
                .as_deref()
                .and_then(field_spec)
                .map(|spec| spec.values)
                .unwrap_or_default()
                .iter()
                .filter(|value| starts_with_ignore_case(value, &found.prefix))
                .map(|value| FrontmatterItem::Value(*value))
                .collect();
        }

        FIELDS
            .iter()
            .filter(|spec| !found.existing_fields.iter().any(|name| name == spec.name))
            .filter(|spec| starts_with_ignore_case(spec.name, &found.prefix))
            .map(FrontmatterItem::Field)
            .collect()
    }
}

impl<'a> Completable<'a, FrontmatterCompleter> for FrontmatterItem {
    fn completions(&self, completer: &FrontmatterCompleter) -> Option<CompletionItem> {
        let range = line_range(completer.line, completer.found.start, completer.character);

        let item = match self {
            FrontmatterItem::Field(spec) => CompletionItem {
                label: spec.name.to_string(),
                kind: Some(CompletionItemKind::FIELD),
                documentation: Some(Documentation::MarkupContent(MarkupContent {
                    kind: MarkupKind::Markdown,
                    value: spec.description.to_string(),
                })),
                text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                    range,
                    new_text: format!("{}: ", spec.name),
                })),
                ..Default::default()
            },
            FrontmatterItem::Value(value) => CompletionItem {
                label: value.to_string(),
                kind: Some(CompletionItemKind::VALUE),
                text_edit: Some(CompletionTextEdit::Edit(TextEdit {
                    range,
                    new_text: value.to_string(),
                })),
                ..Default::default()
            },
        };

        Some(item)
    }
}
