//! Hover provider.
//!
//! | Target | Shows |
//! |--------|-------|
//! | `[[wikilink]]` | Post title, slug, description and aliases |
//! | `@mention` | Handle card: title, description, site, feed |
//! | Frontmatter field name | Field documentation |
//! | Admonition marker | Type documentation |
//!
//! Unresolved wikilinks and mentions still get a hover saying so. Hover can
//! be disabled with [`Settings::hover`].

use lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position, Range};

use crate::config::Settings;
use crate::context::{
    admonition_at, frontmatter_field_at, in_frontmatter, mention_at, wikilink_at, AdmonitionKind,
};
use crate::index::{Index, MentionInfo, PostInfo};

fn markdown(value: String, range: Option<Range>) -> Hover {
    Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range,
    }
}

fn span_range(line: u32, start: usize, end: usize) -> Range {
    Range {
        start: Position {
            line,
            character: start as u32,
        },
        end: Position {
            line,
            character: end as u32,
        },
    }
}

fn post_card(post: &PostInfo) -> String {
    let mut sections = vec![format!("**{}**\n\n`[[{}]]`", post.title, post.slug)];
    if !post.description.is_empty() {
        sections.push(post.description.clone());
    }
    if !post.aliases.is_empty() {
        sections.push(format!("Aliases: {}", post.aliases.join(", ")));
    }
    sections.join("\n\n")
}

fn mention_card(mention: &MentionInfo) -> String {
    let mut sections = vec![format!("**{}** `@{}`", mention.title, mention.handle)];
    if let Some(description) = &mention.description {
        sections.push(description.clone());
    }

    let mut links = Vec::new();
    if let Some(site_url) = &mention.site_url {
        links.push(format!("Site: <{site_url}>"));
    }
    if let Some(feed_url) = &mention.feed_url {
        links.push(format!("Feed: <{feed_url}>"));
    }
    if !links.is_empty() {
        sections.push(links.join("  \n"));
    }

    sections.push(match (&mention.slug, mention.is_internal) {
        (Some(slug), true) => format!("Internal post `{slug}`"),
        _ => "External site".to_string(),
    });
    sections.join("\n\n")
}

fn admonition_card(marker: &str, kind: &str) -> String {
    let folding = match marker {
        "???" => "collapsible, closed by default",
        "???+" => "collapsible, open by default",
        _ => "always open",
    };

    match AdmonitionKind::from_name(kind) {
        Some(kind) => format!(
            "**{}** admonition ({folding})\n\n{}",
            kind.name(),
            kind.description()
        ),
        None => format!("Unknown admonition type `{kind}` ({folding})"),
    }
}

pub fn hover(index: &Index, text: &str, position: Position, settings: &Settings) -> Option<Hover> {
    if !settings.hover {
        return None;
    }

    let line_nr = position.line as usize;
    let column = position.character as usize;

    if in_frontmatter(text, line_nr) {
        let field = frontmatter_field_at(text, line_nr, column)?;
        let mut value = format!("**{}**\n\n{}", field.name, field.description);
        if !field.values.is_empty() {
            let values: Vec<String> = field.values.iter().map(|v| format!("`{v}`")).collect();
            value.push_str(&format!("\n\nValues: {}", values.join(", ")));
        }
        return Some(markdown(value, None));
    }

    let line = text.lines().nth(line_nr)?;

    if let Some(span) = admonition_at(line, column) {
        return Some(markdown(
            admonition_card(&span.marker, &span.kind),
            Some(span_range(position.line, span.start, span.end)),
        ));
    }

    if let Some(span) = mention_at(line, column) {
        let value = match index.get_by_handle(&span.handle) {
            Some(mention) => mention_card(&mention),
            None => format!("Mention `@{}` not found", span.handle),
        };
        return Some(markdown(
            value,
            Some(span_range(position.line, span.start, span.end)),
        ));
    }

    let span = wikilink_at(line, column)?;
    let value = match index.get_by_slug(&span.target) {
        Some(post) => post_card(&post),
        None => format!("Post `{}` not found", span.slug()),
    };
    Some(markdown(
        value,
        Some(span_range(position.line, span.start, span.end)),
    ))
}

#[cfg(test)]
mod tests {
    use lsp_types::Url;

    use super::*;

    fn index() -> Index {
        let index = Index::new();
        index.update(
            &Url::parse("file:///site/guide.md").unwrap(),
            "---\ntitle: The Guide\naliases: [manual]\n---\nRead this first.",
        );
        index
    }

    fn hover_text(text: &str, line: u32, character: u32) -> Option<String> {
        let hover = hover(&index(), text, Position { line, character }, &Settings::default())?;
        match hover.contents {
            HoverContents::Markup(markup) => Some(markup.value),
            _ => None,
        }
    }

    #[test]
    fn test_wikilink_hover() {
        let value = hover_text("See [[manual|the manual]].", 0, 8).unwrap();

        assert!(value.contains("**The Guide**"));
        assert!(value.contains("`[[guide]]`"));
        assert!(value.contains("Read this first."));
        assert!(value.contains("Aliases: manual"));
    }

    #[test]
    fn test_unresolved_wikilink_hover() {
        assert_eq!(
            hover_text("[[missing#part]]", 0, 3).as_deref(),
            Some("Post `missing` not found")
        );
    }

    #[test]
    fn test_hover_range_covers_span() {
        let result = hover(&index(), "x [[guide]] y", Position { line: 0, character: 4 }, &Settings::default()).unwrap();
        assert_eq!(result.range, Some(span_range(0, 2, 11)));
        assert!(hover_text("x [[guide]] y", 0, 12).is_none());
    }

    #[test]
    fn test_mention_not_found() {
        assert_eq!(
            hover_text("hi @ghost", 0, 5).as_deref(),
            Some("Mention `@ghost` not found")
        );
    }

    #[test]
    fn test_frontmatter_field_hover() {
        let value = hover_text("---\ndraft: true\n---\n", 1, 2).unwrap();
        assert!(value.starts_with("**draft**"));
        assert!(value.contains("Values: `true`, `false`"));

        assert!(hover_text("---\ndraft: true\n---\n", 1, 9).is_none());
    }

    #[test]
    fn test_admonition_hover() {
        let value = hover_text("???+ tip \"Title\"", 0, 1).unwrap();
        assert!(value.starts_with("**tip** admonition (collapsible, open by default)"));

        let unknown = hover_text("!!! custom", 0, 5).unwrap();
        assert_eq!(unknown, "Unknown admonition type `custom` (always open)");
    }

    #[test]
    fn test_disabled() {
        let settings = Settings {
            hover: false,
            ..Default::default()
        };
        assert!(hover(&index(), "[[guide]]", Position { line: 0, character: 3 }, &settings).is_none());
    }
}
