//! Cursor context inside the YAML frontmatter block, plus the table of
//! known fields offered for completion and hover.

use crate::syntax::{byte_offset, char_column, locate_frontmatter, text_before};

/// A frontmatter field the site understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// Allowed values, empty when the value is free-form.
    pub values: &'static [&'static str],
}

const BOOLEAN: &[&str] = &["true", "false"];

pub static FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "title",
        description: "Post title, used in listings and as the page heading.",
        values: &[],
    },
    FieldSpec {
        name: "slug",
        description: "URL path of the post. Derived from the file name when absent.",
        values: &[],
    },
    FieldSpec {
        name: "description",
        description: "Summary used in listings and meta tags. Defaults to an excerpt of the body.",
        values: &[],
    },
    FieldSpec {
        name: "date",
        description: "Publication date, `YYYY-MM-DD`.",
        values: &[],
    },
    FieldSpec {
        name: "updated",
        description: "Date of the last significant change, `YYYY-MM-DD`.",
        values: &[],
    },
    FieldSpec {
        name: "published",
        description: "Whether the post is listed in feeds.",
        values: BOOLEAN,
    },
    FieldSpec {
        name: "draft",
        description: "Drafts are rendered but never listed.",
        values: BOOLEAN,
    },
    FieldSpec {
        name: "skip",
        description: "Exclude the file from the build entirely.",
        values: BOOLEAN,
    },
    FieldSpec {
        name: "tags",
        description: "List of tags.",
        values: &[],
    },
    FieldSpec {
        name: "aliases",
        description: "Other slugs that resolve to this post in `[[wikilinks]]`.",
        values: &[],
    },
    FieldSpec {
        name: "template",
        description: "Template used to render the post.",
        values: &[],
    },
    FieldSpec {
        name: "handle",
        description: "Mention handle when the post describes a person or site.",
        values: &[],
    },
];

pub fn field_spec(name: &str) -> Option<&'static FieldSpec> {
    FIELDS.iter().find(|field| field.name == name)
}

/// Where the cursor sits on a frontmatter line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrontmatterContext {
    pub is_field_name: bool,
    pub is_field_value: bool,
    /// Field whose value is being typed.
    pub current_field: Option<String>,
    pub prefix: String,
    /// Column where the prefix starts.
    pub start: usize,
    /// Fields declared on other lines of the block.
    pub existing_fields: Vec<String>,
}

fn is_list_item(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed == "-" || trimmed.starts_with("- ")
}

/// Classifies the cursor on a single frontmatter line. `existing_fields` is
/// left empty; see [`frontmatter_context`].
pub fn frontmatter_line_context(line: &str, column: usize) -> Option<FrontmatterContext> {
    if is_list_item(line) {
        return None;
    }

    let cursor = byte_offset(line, column);

    match line.find(':') {
        Some(colon) if cursor > colon => {
            let mut value_start = colon + 1;
            if line[value_start..].starts_with(' ') && cursor > value_start {
                value_start += 1;
            }

            Some(FrontmatterContext {
                is_field_value: true,
                current_field: Some(line[..colon].trim().to_string()),
                prefix: line[value_start..cursor].to_string(),
                start: char_column(line, value_start),
                ..Default::default()
            })
        }
        _ => {
            let before = text_before(line, column);
            let prefix = before.trim();
            let leading = before.len() - before.trim_start().len();

            Some(FrontmatterContext {
                is_field_name: true,
                prefix: prefix.to_string(),
                start: char_column(line, leading),
                ..Default::default()
            })
        }
    }
}

/// Field names declared at the top level of the block, in order.
pub fn declared_fields(text: &str) -> Vec<(usize, String)> {
    let Some(block) = locate_frontmatter(text) else {
        return Vec::new();
    };

    text.lines()
        .enumerate()
        .filter(|(line_nr, _)| block.contains_line(*line_nr))
        .filter(|(_, line)| !line.starts_with([' ', '\t', '#']) && !is_list_item(line))
        .filter_map(|(line_nr, line)| {
            let (name, _) = line.split_once(':')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (line_nr, name.to_string()))
        })
        .collect()
}

/// Whether `line_nr` lies strictly between the frontmatter delimiters.
pub fn in_frontmatter(text: &str, line_nr: usize) -> bool {
    locate_frontmatter(text).is_some_and(|block| block.contains_line(line_nr))
}

/// Frontmatter context for a cursor in a whole document, or `None` when the
/// cursor is not strictly between the delimiter lines.
pub fn frontmatter_context(
    text: &str,
    line_nr: usize,
    column: usize,
) -> Option<FrontmatterContext> {
    if !in_frontmatter(text, line_nr) {
        return None;
    }

    let line = text.lines().nth(line_nr).unwrap_or("");
    let mut context = frontmatter_line_context(line, column)?;

    context.existing_fields = declared_fields(text)
        .into_iter()
        .filter(|(declared_on, _)| *declared_on != line_nr)
        .map(|(_, name)| name)
        .collect();

    Some(context)
}

/// The known field whose name is under the cursor.
pub fn frontmatter_field_at(
    text: &str,
    line_nr: usize,
    column: usize,
) -> Option<&'static FieldSpec> {
    let block = locate_frontmatter(text)?;
    if !block.contains_line(line_nr) {
        return None;
    }

    let line = text.lines().nth(line_nr)?;
    let (name, _) = line.split_once(':')?;
    if byte_offset(line, column) > name.len() {
        return None;
    }

    field_spec(name.trim())
}
