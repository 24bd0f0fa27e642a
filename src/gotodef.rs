use lsp_types::{Location, Position, Range, Url};

use crate::context::{mention_at, wikilink_at};
use crate::index::{Index, PostInfo};

fn file_start(post: &PostInfo) -> Location {
    Location {
        uri: post.uri.clone(),
        range: Range::default(),
    }
}

/// Where the wikilink or mention under the cursor points.
///
/// Wikilinks go to the top of the linked post. Mentions go to their backing
/// post when internal, otherwise to the site URL. `None` when nothing
/// resolves.
pub fn goto_definition(index: &Index, text: &str, position: Position) -> Option<Location> {
    let line = text.lines().nth(position.line as usize)?;
    let column = position.character as usize;

    if let Some(span) = mention_at(line, column) {
        let mention = index.get_by_handle(&span.handle)?;

        let internal = mention
            .slug
            .as_deref()
            .filter(|_| mention.is_internal)
            .and_then(|slug| index.get_by_slug(slug));
        if let Some(post) = internal {
            return Some(file_start(&post));
        }

        let site_url = Url::parse(mention.site_url.as_deref()?).ok()?;
        return Some(Location {
            uri: site_url,
            range: Range::default(),
        });
    }

    let span = wikilink_at(line, column)?;
    index.get_by_slug(&span.target).map(|post| file_start(&post))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::config::{BlogrollEntry, FromPostsRule, MentionsConfig, Settings};

    fn fixture() -> (TempDir, Index) {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("dave.md"),
            "---\ntitle: Dave\ntags: [contact]\n---\n",
        )
        .unwrap();
        fs::write(temp_dir.path().join("target.md"), "# Target").unwrap();

        let settings = Settings {
            blogroll: vec![
                BlogrollEntry {
                    handle: Some("simon".into()),
                    site_url: Some("https://simonwillison.net/".into()),
                    ..Default::default()
                },
                BlogrollEntry {
                    handle: Some("nosite".into()),
                    ..Default::default()
                },
            ],
            mentions: MentionsConfig {
                from_posts: vec![FromPostsRule {
                    filter: "'contact' in tags".into(),
                    handle_field: "slug".into(),
                    aliases_field: None,
                }],
            },
            ..Default::default()
        };

        let index = Index::new();
        index.build(temp_dir.path(), &settings);
        (temp_dir, index)
    }

    fn at(character: u32) -> Position {
        Position { line: 0, character }
    }

    #[test]
    fn test_wikilink_goes_to_file_start() {
        let (temp_dir, index) = fixture();
        let location = goto_definition(&index, "See [[target#intro]]", at(8)).unwrap();

        let target = Url::from_file_path(temp_dir.path().join("target.md")).unwrap();
        assert_eq!(location.uri, target);
        assert_eq!(location.range, Range::default());
    }

    #[test]
    fn test_internal_mention_goes_to_post() {
        let (temp_dir, index) = fixture();
        let location = goto_definition(&index, "hi @dave", at(5)).unwrap();

        assert_eq!(
            location.uri,
            Url::from_file_path(temp_dir.path().join("dave.md")).unwrap()
        );
    }

    #[test]
    fn test_external_mention_goes_to_site() {
        let (_temp_dir, index) = fixture();
        let location = goto_definition(&index, "hi @simon", at(5)).unwrap();

        assert_eq!(location.uri.as_str(), "https://simonwillison.net/");
    }

    #[test]
    fn test_unresolved_is_none() {
        let (_temp_dir, index) = fixture();

        assert_eq!(goto_definition(&index, "[[missing]]", at(3)), None);
        assert_eq!(goto_definition(&index, "hi @nosite", at(5)), None);
        assert_eq!(goto_definition(&index, "hi @ghost", at(5)), None);
        assert_eq!(goto_definition(&index, "plain", at(2)), None);
        assert_eq!(goto_definition(&index, "plain", Position { line: 4, character: 0 }), None);
    }
}
