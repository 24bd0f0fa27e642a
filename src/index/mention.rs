//! `@handle` targets built from the blogroll and from posts matched by
//! `from_posts` rules.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::filter::Filter;
use super::post::PostInfo;
use crate::config::{BlogrollEntry, FromPostsRule, Settings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionInfo {
    pub handle: String,
    pub title: String,
    pub description: Option<String>,
    pub site_url: Option<String>,
    pub feed_url: Option<String>,
    pub aliases: Vec<String>,
    /// Backed by a post in this site rather than an external blog.
    pub is_internal: bool,
    pub slug: Option<String>,
}

impl MentionInfo {
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.handle.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// `https://www.Example.org/blog` -> `example.org`.
pub fn handle_from_url(url: &str) -> Option<String> {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()?
        .rsplit('@')
        .next()?
        .split(':')
        .next()?
        .to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    (!host.is_empty()).then(|| host.to_string())
}

fn clean_aliases(aliases: impl IntoIterator<Item = String>, handle: &str) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::new();
    for alias in aliases {
        let alias = alias.trim().trim_start_matches('@').to_string();
        if !alias.is_empty() && alias != handle && !cleaned.contains(&alias) {
            cleaned.push(alias);
        }
    }
    cleaned
}

pub fn from_blogroll(entry: &BlogrollEntry) -> Option<MentionInfo> {
    let handle = entry
        .handle
        .as_deref()
        .map(|handle| handle.trim().trim_start_matches('@').to_string())
        .filter(|handle| !handle.is_empty())
        .or_else(|| entry.site_url.as_deref().and_then(handle_from_url))?;

    Some(MentionInfo {
        title: entry.title.clone().unwrap_or_else(|| handle.clone()),
        description: entry.description.clone(),
        site_url: entry.site_url.clone(),
        feed_url: entry.feed_url.clone(),
        aliases: clean_aliases(entry.aliases.iter().cloned(), &handle),
        is_internal: false,
        slug: None,
        handle,
    })
}

fn from_post(post: &PostInfo, rule: &FromPostsRule) -> Option<MentionInfo> {
    let handle = match rule.handle_field.as_str() {
        "slug" => Some(post.slug.clone()),
        field => post.metadata.get_str(field),
    }
    .map(|handle| handle.trim().trim_start_matches('@').to_string())
    .filter(|handle| !handle.is_empty())?;

    let aliases = rule
        .aliases_field
        .as_deref()
        .map(|field| post.metadata.get_list(field))
        .unwrap_or_default();

    Some(MentionInfo {
        title: post.title.clone(),
        description: Some(post.description.clone()).filter(|d| !d.is_empty()),
        site_url: None,
        feed_url: None,
        aliases: clean_aliases(aliases, &handle),
        is_internal: true,
        slug: Some(post.slug.clone()),
        handle,
    })
}

/// Every mention the settings define over `posts`, keyed by handle and alias.
///
/// Blogroll entries are inserted first and never overwritten by internal
/// mentions. Within each group a handle beats another mention's alias.
pub fn build_mentions(
    settings: &Settings,
    posts: &[Arc<PostInfo>],
) -> HashMap<String, Arc<MentionInfo>> {
    let mut mentions: Vec<MentionInfo> = Vec::new();

    for entry in &settings.blogroll {
        match from_blogroll(entry) {
            Some(mention) => mentions.push(mention),
            None => tracing::warn!(?entry, "blogroll entry has neither handle nor site_url"),
        }
    }

    for rule in &settings.mentions.from_posts {
        let filter = match Filter::parse(&rule.filter) {
            Ok(filter) => filter,
            Err(err) => {
                tracing::warn!(filter = %rule.filter, error = %err, "skipping from_posts rule");
                continue;
            }
        };

        mentions.extend(
            posts
                .iter()
                .filter(|post| filter.matches(&post.metadata, &post.slug))
                .filter_map(|post| from_post(post, rule)),
        );
    }

    let mut map: HashMap<String, Arc<MentionInfo>> = HashMap::new();
    let mut handles: HashSet<String> = HashSet::new();

    for mention in mentions.into_iter().map(Arc::new) {
        if !handles.insert(mention.handle.clone()) {
            tracing::debug!(handle = %mention.handle, "duplicate mention handle ignored");
            continue;
        }

        map.insert(mention.handle.clone(), mention.clone());
        for alias in &mention.aliases {
            map.entry(alias.clone()).or_insert_with(|| mention.clone());
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use lsp_types::Url;
    use rstest::rstest;

    use super::*;
    use crate::config::MentionsConfig;

    fn post(name: &str, content: &str) -> Arc<PostInfo> {
        let path = Path::new("/site").join(name);
        Arc::new(PostInfo::new(
            Some(Path::new("/site")),
            &path,
            Url::from_file_path(&path).unwrap(),
            content,
            160,
        ))
    }

    fn blogroll(handle: Option<&str>, site_url: Option<&str>, aliases: &[&str]) -> BlogrollEntry {
        BlogrollEntry {
            handle: handle.map(String::from),
            site_url: site_url.map(String::from),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }
    }

    #[rstest]
    #[case("https://www.Example.org/blog", Some("example.org"))]
    #[case("http://simonwillison.net", Some("simonwillison.net"))]
    #[case("https://blog.example.com:8080/feed?x=1", Some("blog.example.com"))]
    #[case("example.net/path", Some("example.net"))]
    #[case("https://", None)]
    fn test_handle_from_url(#[case] url: &str, #[case] handle: Option<&str>) {
        assert_eq!(handle_from_url(url).as_deref(), handle);
    }

    #[test]
    fn test_blogroll_handles() {
        let explicit = from_blogroll(&blogroll(Some("@simon"), None, &["simonw", "simon"])).unwrap();
        assert_eq!(explicit.handle, "simon");
        assert_eq!(explicit.title, "simon");
        assert_eq!(explicit.aliases, vec!["simonw"]);
        assert!(!explicit.is_internal);

        let derived = from_blogroll(&blogroll(None, Some("https://www.jvns.ca/"), &[])).unwrap();
        assert_eq!(derived.handle, "jvns.ca");

        assert_eq!(from_blogroll(&blogroll(None, None, &["x"])), None);
    }

    #[test]
    fn test_from_posts_rule() {
        let settings = Settings {
            mentions: MentionsConfig {
                from_posts: vec![FromPostsRule {
                    filter: "'contact' in tags".into(),
                    handle_field: "handle".into(),
                    aliases_field: Some("nicknames".into()),
                }],
            },
            ..Default::default()
        };
        let posts = vec![
            post(
                "dave.md",
                "---\ntitle: Dave\nhandle: dave\nnicknames: [davey]\ntags: [contact]\n---\nDave writes.",
            ),
            post("other.md", "---\ntitle: Other\nhandle: other\n---\n"),
        ];

        let mentions = build_mentions(&settings, &posts);

        let dave = mentions.get("dave").unwrap();
        assert!(dave.is_internal);
        assert_eq!(dave.slug.as_deref(), Some("dave"));
        assert_eq!(dave.title, "Dave");
        assert_eq!(dave.description.as_deref(), Some("Dave writes."));
        assert!(Arc::ptr_eq(dave, mentions.get("davey").unwrap()));
        assert!(!mentions.contains_key("other"));
    }

    #[test]
    fn test_blogroll_wins_handle_conflicts() {
        let settings = Settings {
            blogroll: vec![blogroll(Some("dave"), Some("https://dave.example"), &[])],
            mentions: MentionsConfig {
                from_posts: vec![FromPostsRule {
                    filter: "True".into(),
                    handle_field: "slug".into(),
                    aliases_field: None,
                }],
            },
            ..Default::default()
        };
        let posts = vec![post("dave.md", "# Dave")];

        let mentions = build_mentions(&settings, &posts);

        assert_eq!(mentions.len(), 1);
        assert!(!mentions["dave"].is_internal);
    }

    #[test]
    fn test_invalid_rule_is_skipped() {
        let settings = Settings {
            blogroll: vec![blogroll(Some("simon"), None, &[])],
            mentions: MentionsConfig {
                from_posts: vec![FromPostsRule {
                    filter: "tags contains 'x'".into(),
                    handle_field: "slug".into(),
                    aliases_field: None,
                }],
            },
            ..Default::default()
        };

        let mentions = build_mentions(&settings, &[post("a.md", "")]);
        assert_eq!(mentions.keys().collect::<Vec<_>>(), vec!["simon"]);
    }

    #[test]
    fn test_handle_beats_alias_of_another_mention() {
        let settings = Settings {
            blogroll: vec![
                blogroll(Some("first"), None, &["second"]),
                blogroll(Some("second"), None, &[]),
            ],
            ..Default::default()
        };

        let mentions = build_mentions(&settings, &[]);
        assert_eq!(mentions["second"].handle, "second");
        assert_eq!(mentions["first"].handle, "first");
    }
}
