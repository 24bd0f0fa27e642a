//! Per-file indexing: slug, title, description, aliases and wikilinks.

use std::path::{Path, PathBuf};

use lsp_types::Url;
use once_cell::sync::Lazy;
use regex::Regex;

use super::frontmatter::{self, Metadata};
use crate::context::find_wikilinks;
use crate::syntax::content_lines;

/// One `[[target]]` / `[[target|display]]` occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WikilinkInfo {
    pub target: String,
    pub display: Option<String>,
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

/// An indexed content file.
#[derive(Debug, Clone, PartialEq)]
pub struct PostInfo {
    pub uri: Url,
    pub path: PathBuf,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub aliases: Vec<String>,
    pub metadata: Metadata,
    pub wikilinks: Vec<WikilinkInfo>,
}

impl PostInfo {
    /// Builds the post for `path` from `content`. Frontmatter errors are
    /// logged and the file is indexed without metadata.
    pub fn new(root: Option<&Path>, path: &Path, uri: Url, content: &str, excerpt_length: usize) -> PostInfo {
        let (metadata, body) = match frontmatter::parse(path, content) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::debug!(error = %err, "indexing without frontmatter");
                (Metadata::default(), content.to_string())
            }
        };

        let relative = relative_path(root, path);

        let slug = match metadata.get_str("slug") {
            Some(slug) => slug.trim().trim_matches('/').to_string(),
            None => generate_slug(&relative),
        };

        let title = metadata
            .get_str("title")
            .unwrap_or_else(|| title_from_path(&relative));

        let description = metadata
            .get_str("description")
            .unwrap_or_else(|| excerpt(&body, excerpt_length));

        let aliases = metadata
            .get_list("aliases")
            .into_iter()
            .map(|alias| alias.trim().to_string())
            .filter(|alias| !alias.is_empty() && *alias != slug)
            .collect();

        PostInfo {
            uri,
            path: path.to_path_buf(),
            wikilinks: extract_wikilinks(content),
            slug,
            title,
            description,
            aliases,
            metadata,
        }
    }

    /// Every key this post answers to: its slug first, then its aliases.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.slug.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Path of `path` relative to `root`, or just the file name when there is no
/// root or the file lies outside it.
pub fn relative_path(root: Option<&Path>, path: &Path) -> PathBuf {
    root.and_then(|root| pathdiff::diff_paths(path, root))
        .filter(|relative| !relative.starts_with(".."))
        .or_else(|| path.file_name().map(PathBuf::from))
        .unwrap_or_else(|| path.to_path_buf())
}

static DISALLOWED_SLUG_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\-_]").unwrap());
static REPEATED_HYPHENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").unwrap());

/// Lowercases, turns spaces into hyphens, drops characters outside
/// `[a-z0-9-_]`, collapses hyphen runs and trims hyphens from both ends.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase().replace(' ', "-");
    let stripped = DISALLOWED_SLUG_CHARS.replace_all(&lowered, "");
    let collapsed = REPEATED_HYPHENS.replace_all(&stripped, "-");
    collapsed.trim_matches('-').to_string()
}

fn is_index_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.eq_ignore_ascii_case("index.md"))
}

fn forward_slashes(path: &Path) -> String {
    path.components()
        .filter_map(|component| component.as_os_str().to_str())
        .collect::<Vec<_>>()
        .join("/")
}

/// Slug for a root-relative path.
///
/// `index.md` takes the slug of its directory, so the root `index.md` is the
/// home page with an empty slug. Other files use their slugified stem.
pub fn generate_slug(relative: &Path) -> String {
    if is_index_file(relative) {
        return relative
            .parent()
            .map(forward_slashes)
            .unwrap_or_default()
            .to_lowercase();
    }

    relative
        .file_stem()
        .and_then(|stem| stem.to_str())
        .map(slugify)
        .unwrap_or_default()
}

fn title_from_path(relative: &Path) -> String {
    let name = if is_index_file(relative) {
        relative
            .parent()
            .and_then(|parent| parent.file_name())
            .or_else(|| relative.file_stem())
    } else {
        relative.file_stem()
    };

    name.and_then(|name| name.to_str())
        .unwrap_or_default()
        .replace(['-', '_'], " ")
        .trim()
        .to_string()
}

fn is_heading(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// The first paragraph of `body` that is not a heading, joined into one
/// line and cut to `max_length` chars with a trailing `...`.
pub fn excerpt(body: &str, max_length: usize) -> String {
    let paragraph = body
        .lines()
        .map(str::trim)
        .skip_while(|line| line.is_empty() || is_heading(line))
        .take_while(|line| !line.is_empty() && !is_heading(line))
        .collect::<Vec<_>>()
        .join(" ");

    if paragraph.chars().count() <= max_length {
        return paragraph;
    }

    let cut: String = paragraph.chars().take(max_length).collect();
    format!("{}...", cut.trim_end())
}

/// Wikilinks in prose lines, skipping frontmatter and fenced code.
pub fn extract_wikilinks(content: &str) -> Vec<WikilinkInfo> {
    content_lines(content)
        .flat_map(|(line_nr, line)| {
            find_wikilinks(line)
                .into_iter()
                .map(move |span| WikilinkInfo {
                    target: span.target,
                    display: span.display,
                    line: line_nr,
                    start: span.start,
                    end: span.end,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("index.md", "")]
    #[case("INDEX.md", "")]
    #[case("blog/2024/index.md", "blog/2024")]
    #[case("Docs/Guide/index.md", "docs/guide")]
    #[case("My Post!!!.md", "my-post")]
    #[case("blog/Hello World.md", "hello-world")]
    #[case("a -- b.md", "a-b")]
    #[case("-lead_trail-.md", "lead_trail")]
    #[case("Ünïcode.md", "ncode")]
    fn test_generate_slug(#[case] path: &str, #[case] slug: &str) {
        assert_eq!(generate_slug(Path::new(path)), slug);
    }

    #[test]
    fn test_title_from_path() {
        assert_eq!(title_from_path(Path::new("my-first_post.md")), "my first post");
        assert_eq!(title_from_path(Path::new("guides/index.md")), "guides");
    }

    #[test]
    fn test_excerpt_skips_headings_and_blank_lines() {
        let body = "\n# Title\n\n## Sub\nFirst line\nsecond line\n\nNext paragraph";
        assert_eq!(excerpt(body, 160), "First line second line");
    }

    #[test]
    fn test_excerpt_truncates() {
        let body = "one two three four five";
        assert_eq!(excerpt(body, 9), "one two t...");
        assert_eq!(excerpt(body, 100), body);
        assert_eq!(excerpt("# only heading", 10), "");
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/site");
        assert_eq!(
            relative_path(Some(root), Path::new("/site/blog/a.md")),
            PathBuf::from("blog/a.md")
        );
        assert_eq!(
            relative_path(Some(root), Path::new("/elsewhere/b.md")),
            PathBuf::from("b.md")
        );
        assert_eq!(relative_path(None, Path::new("/x/c.md")), PathBuf::from("c.md"));
    }

    #[test]
    fn test_post_from_frontmatter() {
        let content = "---\ntitle: Doing Things\nslug: doing\naliases: [did, do-it]\ndescription: How\n---\nSee [[other]].\n";
        let post = PostInfo::new(
            Some(Path::new("/site")),
            Path::new("/site/posts/doing-things.md"),
            Url::parse("file:///site/posts/doing-things.md").unwrap(),
            content,
            160,
        );

        assert_eq!(post.slug, "doing");
        assert_eq!(post.title, "Doing Things");
        assert_eq!(post.description, "How");
        assert_eq!(post.aliases, vec!["did", "do-it"]);
        assert_eq!(post.keys().collect::<Vec<_>>(), vec!["doing", "did", "do-it"]);
        assert_eq!(
            post.wikilinks,
            vec![WikilinkInfo {
                target: "other".into(),
                display: None,
                line: 6,
                start: 4,
                end: 13,
            }]
        );
    }

    #[test]
    fn test_post_with_broken_frontmatter_uses_defaults() {
        let content = "---\ntitle: [oops\n---\nBody text";
        let post = PostInfo::new(
            None,
            Path::new("/site/broken-post.md"),
            Url::parse("file:///site/broken-post.md").unwrap(),
            content,
            160,
        );

        assert_eq!(post.slug, "broken-post");
        assert_eq!(post.title, "broken post");
        assert!(post.metadata.is_empty());
    }
}
