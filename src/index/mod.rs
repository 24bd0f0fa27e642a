//! The workspace index: posts by slug and alias, mentions by handle and
//! alias, and the URI of every indexed file.
//!
//! All state sits behind one `RwLock`. [`Index::build`] parses files in
//! parallel and swaps the result in with a single write, so readers see
//! either the old index or the new one.

pub mod filter;
pub mod frontmatter;
pub mod mention;
pub mod post;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use itertools::Itertools;
use lsp_types::Url;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use walkdir::{DirEntry, WalkDir};

pub use mention::MentionInfo;
pub use post::{generate_slug, PostInfo, WikilinkInfo};

use crate::config::Settings;
use crate::context::wikilink::target_slug;
use crate::lint::Resolver;

const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", "output"];

#[derive(Debug, Default)]
struct IndexData {
    root: Option<PathBuf>,
    settings: Settings,
    /// Slug and alias keys. Several keys share one `Arc`.
    posts: HashMap<String, Arc<PostInfo>>,
    /// URI of every indexed post to the slug it owns.
    uri_to_slug: HashMap<Url, String>,
    /// Posts pushed out of their slug by a later claim, oldest first.
    displaced: HashMap<String, Vec<Arc<PostInfo>>>,
    /// Handle and alias keys.
    mentions: HashMap<String, Arc<MentionInfo>>,
}

#[derive(Debug, Default)]
pub struct Index {
    data: RwLock<IndexData>,
}

static DISALLOWED_LOOKUP_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\-_/.]").unwrap());
static REPEATED_HYPHENS: Lazy<Regex> = Lazy::new(|| Regex::new(r"-{2,}").unwrap());

/// Lookup key normalization for the case-insensitive fallback.
fn normalize_key(key: &str) -> String {
    let lowered = key.trim().to_lowercase().replace(' ', "-");
    let stripped = DISALLOWED_LOOKUP_CHARS.replace_all(&lowered, "");
    REPEATED_HYPHENS.replace_all(&stripped, "-").into_owned()
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("md"))
}

fn path_of(uri: &Url) -> PathBuf {
    uri.to_file_path()
        .unwrap_or_else(|_| PathBuf::from(uri.path()))
}

impl IndexData {
    fn post_for_uri(&self, uri: &Url) -> Option<&Arc<PostInfo>> {
        let slug = self.uri_to_slug.get(uri)?;
        self.posts.get(slug).filter(|post| post.uri == *uri)
    }

    fn distinct_posts(&self) -> impl Iterator<Item = &Arc<PostInfo>> {
        self.uri_to_slug
            .keys()
            .filter_map(|uri| self.post_for_uri(uri))
    }

    /// Removes the post at `uri`. Keys it shadowed go back to the posts that
    /// declare them as aliases, and a post it pushed out of its slug is
    /// reinstated.
    fn retract(&mut self, uri: &Url) -> Option<Arc<PostInfo>> {
        self.displaced.retain(|_, waiting| {
            waiting.retain(|post| post.uri != *uri);
            !waiting.is_empty()
        });

        let post = self.detach(uri)?;

        let slug_free = !self
            .posts
            .get(&post.slug)
            .is_some_and(|holder| holder.slug == post.slug);
        if slug_free {
            let previous = self.displaced.get_mut(&post.slug).and_then(Vec::pop);
            if let Some(previous) = previous {
                tracing::debug!(slug = %post.slug, uri = %previous.uri, "reinstating displaced post");
                self.displaced.retain(|_, waiting| !waiting.is_empty());
                self.insert(previous);
            }
        }

        Some(post)
    }

    /// Drops every key owned by the post at `uri` and hands shadowed alias
    /// keys to their heirs.
    fn detach(&mut self, uri: &Url) -> Option<Arc<PostInfo>> {
        let post = self.post_for_uri(uri).cloned();
        self.uri_to_slug.remove(uri);
        let post = post?;

        self.posts.retain(|_, held| !Arc::ptr_eq(held, &post));

        for key in post.keys() {
            if self.posts.contains_key(key) {
                continue;
            }

            let heir = self
                .distinct_posts()
                .filter(|candidate| candidate.aliases.iter().any(|alias| alias == key))
                .min_by(|a, b| a.slug.cmp(&b.slug))
                .cloned();

            if let Some(heir) = heir {
                self.posts.insert(key.to_string(), heir);
            }
        }

        Some(post)
    }

    fn insert(&mut self, post: Arc<PostInfo>) {
        let displaced = self
            .posts
            .get(&post.slug)
            .filter(|holder| holder.slug == post.slug && holder.uri != post.uri)
            .map(|holder| holder.uri.clone());

        if let Some(displaced) = displaced {
            tracing::warn!(
                slug = %post.slug,
                %displaced,
                by = %post.uri,
                "slug claimed by another file"
            );
            if let Some(previous) = self.detach(&displaced) {
                self.displaced
                    .entry(previous.slug.clone())
                    .or_default()
                    .push(previous);
            }
        }

        self.posts.insert(post.slug.clone(), post.clone());
        self.uri_to_slug.insert(post.uri.clone(), post.slug.clone());

        for alias in &post.aliases {
            match self.posts.get(alias) {
                Some(holder) if holder.slug == *alias => {
                    tracing::debug!(%alias, slug = %holder.slug, "alias shadowed by slug");
                }
                Some(_) => {}
                None => {
                    self.posts.insert(alias.clone(), post.clone());
                }
            }
        }
    }
}

impl Index {
    pub fn new() -> Index {
        Index::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn root(&self) -> Option<PathBuf> {
        self.read().root.clone()
    }

    pub fn settings(&self) -> Settings {
        self.read().settings.clone()
    }

    /// Walks `root` and replaces the whole index, mentions included.
    pub fn build(&self, root: &Path, settings: &Settings) {
        let started = Instant::now();
        let cache_dir = root.join(&settings.cache_dir);

        let skip = |entry: &DirEntry| {
            entry.depth() > 0
                && entry.file_type().is_dir()
                && (entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRS.contains(&name))
                    || entry.path() == cache_dir)
        };

        let md_file_paths = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| !skip(entry))
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable entry");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_markdown(entry.path()))
            .map(DirEntry::into_path)
            .collect_vec();

        let posts = md_file_paths
            .par_iter()
            .filter_map(|path| {
                let content = match std::fs::read_to_string(path) {
                    Ok(content) => content,
                    Err(err) => {
                        tracing::warn!(path = %path.display(), error = %err, "skipping file");
                        return None;
                    }
                };
                let uri = Url::from_file_path(path).ok()?;

                Some(Arc::new(PostInfo::new(
                    Some(root),
                    path,
                    uri,
                    &content,
                    settings.excerpt_length,
                )))
            })
            .collect::<Vec<_>>();

        let mut data = IndexData {
            root: Some(root.to_path_buf()),
            settings: settings.clone(),
            ..Default::default()
        };
        for post in posts.iter().sorted_by(|a, b| a.path.cmp(&b.path)) {
            data.insert(post.clone());
        }

        let indexed = data.distinct_posts().cloned().collect_vec();
        data.mentions = mention::build_mentions(settings, &indexed);

        tracing::info!(
            root = %root.display(),
            posts = indexed.len(),
            mentions = data.mentions.values().map(|m| &m.handle).unique().count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "index built"
        );

        *self.write() = data;
    }

    /// Re-indexes one file from `content`.
    pub fn update(&self, uri: &Url, content: &str) {
        let path = path_of(uri);
        let (root, excerpt_length) = {
            let data = self.read();
            (data.root.clone(), data.settings.excerpt_length)
        };

        let post = Arc::new(PostInfo::new(
            root.as_deref(),
            &path,
            uri.clone(),
            content,
            excerpt_length,
        ));

        let mut data = self.write();
        data.retract(uri);
        data.insert(post);
    }

    /// Drops the post at `uri`. Returns whether anything was indexed there.
    pub fn remove(&self, uri: &Url) -> bool {
        self.write().retract(uri).is_some()
    }

    /// Reads `path` from disk and re-indexes it.
    pub fn index_file(&self, path: &Path) -> std::io::Result<()> {
        let content = std::fs::read_to_string(path)?;
        let uri = Url::from_file_path(path).map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not an absolute path: {}", path.display()),
            )
        })?;

        self.update(&uri, &content);
        Ok(())
    }

    /// Post by slug or alias. A `#fragment` is ignored. Falls back to a
    /// case-insensitive scan when there is no exact key.
    pub fn get_by_slug(&self, slug: &str) -> Option<Arc<PostInfo>> {
        let slug = target_slug(slug);
        let data = self.read();

        if let Some(post) = data.posts.get(slug) {
            return Some(post.clone());
        }

        let wanted = normalize_key(slug);
        if wanted.is_empty() {
            return None;
        }

        data.posts
            .iter()
            .filter(|(key, _)| normalize_key(key) == wanted)
            .min_by_key(|(key, post)| (post.slug != **key, (*key).clone()))
            .map(|(_, post)| post.clone())
    }

    /// Mention by handle or alias, with or without the leading `@`.
    pub fn get_by_handle(&self, handle: &str) -> Option<Arc<MentionInfo>> {
        let handle = handle.trim().trim_start_matches('@');
        let data = self.read();

        if let Some(mention) = data.mentions.get(handle) {
            return Some(mention.clone());
        }

        let wanted = normalize_key(handle);
        if wanted.is_empty() {
            return None;
        }

        data.mentions
            .iter()
            .filter(|(key, _)| normalize_key(key) == wanted)
            .min_by_key(|(key, mention)| (mention.handle != **key, (*key).clone()))
            .map(|(_, mention)| mention.clone())
    }

    pub fn post_by_uri(&self, uri: &Url) -> Option<Arc<PostInfo>> {
        self.read().post_for_uri(uri).cloned()
    }

    /// Every post once, sorted by slug.
    pub fn all_posts(&self) -> Vec<Arc<PostInfo>> {
        self.read()
            .distinct_posts()
            .cloned()
            .sorted_by(|a, b| a.slug.cmp(&b.slug))
            .collect()
    }

    /// Every mention once, sorted by handle.
    pub fn all_mentions(&self) -> Vec<Arc<MentionInfo>> {
        self.read()
            .mentions
            .values()
            .unique_by(|mention| mention.handle.clone())
            .cloned()
            .sorted_by(|a, b| a.handle.cmp(&b.handle))
            .collect()
    }
}

/// Answers lint lookups from an [`Index`].
pub struct IndexResolver<'a>(pub &'a Index);

impl Resolver for IndexResolver<'_> {
    fn resolve_slug(&self, slug: &str) -> bool {
        self.0.get_by_slug(slug).is_some()
    }

    fn resolve_handle(&self, handle: &str) -> bool {
        self.0.get_by_handle(handle).is_some()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::config::BlogrollEntry;

    fn uri(path: &str) -> Url {
        Url::parse(&format!("file:///site/{path}")).unwrap()
    }

    fn index_with(files: &[(&str, &str)]) -> Index {
        let index = Index::new();
        for (path, content) in files {
            index.update(&uri(path), content);
        }
        index
    }

    fn slugs(index: &Index) -> Vec<String> {
        index.all_posts().iter().map(|post| post.slug.clone()).collect()
    }

    #[test]
    fn test_slug_and_aliases_resolve_to_same_post() {
        let index = index_with(&[(
            "guide.md",
            "---\ntitle: Guide\naliases: [manual, handbook]\n---\n",
        )]);

        let by_slug = index.get_by_slug("guide").unwrap();
        for key in ["manual", "handbook", "guide#setup"] {
            assert!(Arc::ptr_eq(&by_slug, &index.get_by_slug(key).unwrap()));
        }
        assert_eq!(index.all_posts().len(), 1);
    }

    #[test]
    fn test_case_insensitive_fallback() {
        let index = index_with(&[("hello-world.md", "")]);

        assert_eq!(index.get_by_slug("Hello World").unwrap().slug, "hello-world");
        assert_eq!(index.get_by_slug("HELLO--WORLD").unwrap().slug, "hello-world");
        assert!(index.get_by_slug("hello").is_none());
        assert!(index.get_by_slug("!!!").is_none());
    }

    #[test]
    fn test_slug_beats_colliding_alias() {
        let index = index_with(&[
            ("a.md", "---\nslug: a\naliases: [b]\n---\n"),
            ("b.md", "---\nslug: b\n---\n"),
        ]);
        assert_eq!(index.get_by_slug("b").unwrap().uri, uri("b.md"));

        // the alias never overwrites an existing slug
        let index = index_with(&[
            ("b.md", "---\nslug: b\n---\n"),
            ("a.md", "---\nslug: a\naliases: [b]\n---\n"),
        ]);
        assert_eq!(index.get_by_slug("b").unwrap().uri, uri("b.md"));
    }

    #[test]
    fn test_shadowed_alias_restored_after_remove() {
        let index = index_with(&[
            ("a.md", "---\nslug: a\naliases: [b]\n---\n"),
            ("b.md", "---\nslug: b\n---\n"),
        ]);

        assert!(index.remove(&uri("b.md")));
        assert_eq!(index.get_by_slug("b").unwrap().slug, "a");
        assert!(!index.remove(&uri("b.md")));
    }

    #[test]
    fn test_update_retracts_previous_slug() {
        let index = index_with(&[("post.md", "---\nslug: old\naliases: [legacy]\n---\n")]);
        index.update(&uri("post.md"), "---\nslug: new\n---\n");

        assert!(index.get_by_slug("old").is_none());
        assert!(index.get_by_slug("legacy").is_none());
        assert_eq!(slugs(&index), vec!["new"]);
        assert_eq!(index.post_by_uri(&uri("post.md")).unwrap().slug, "new");
    }

    #[test]
    fn test_slug_claimed_by_another_file_displaces_it() {
        let index = index_with(&[
            ("first.md", "---\nslug: same\n---\n"),
            ("second.md", "---\nslug: same\n---\n"),
        ]);

        assert_eq!(index.get_by_slug("same").unwrap().uri, uri("second.md"));
        assert!(index.post_by_uri(&uri("first.md")).is_none());
        assert_eq!(index.all_posts().len(), 1);
    }

    #[test]
    fn test_displaced_post_reinstated_when_claim_withdrawn() {
        let index = index_with(&[
            ("a.md", "---\nslug: a\n---\n"),
            ("b.md", "---\nslug: b\n---\n"),
        ]);

        index.update(&uri("b.md"), "---\nslug: a\n---\n");
        assert_eq!(index.get_by_slug("a").unwrap().uri, uri("b.md"));
        assert_eq!(slugs(&index), vec!["a"]);

        index.update(&uri("b.md"), "---\nslug: b\n---\n");
        assert_eq!(index.get_by_slug("a").unwrap().uri, uri("a.md"));
        assert_eq!(slugs(&index), vec!["a", "b"]);
    }

    #[test]
    fn test_displaced_post_reinstated_after_remove() {
        let index = index_with(&[
            ("first.md", "---\nslug: same\naliases: [one]\n---\n"),
            ("second.md", "---\nslug: same\n---\n"),
        ]);

        assert!(index.remove(&uri("second.md")));
        assert_eq!(index.get_by_slug("same").unwrap().uri, uri("first.md"));
        assert_eq!(index.get_by_slug("one").unwrap().uri, uri("first.md"));

        // a removed file never comes back as a displaced post
        let index = index_with(&[
            ("first.md", "---\nslug: same\n---\n"),
            ("second.md", "---\nslug: same\n---\n"),
        ]);
        assert!(!index.remove(&uri("first.md")));
        assert!(index.remove(&uri("second.md")));
        assert!(index.get_by_slug("same").is_none());
        assert!(index.all_posts().is_empty());
    }

    #[test]
    fn test_all_posts_sorted_and_distinct() {
        let index = index_with(&[
            ("zeta.md", "---\naliases: [z, last]\n---\n"),
            ("alpha.md", ""),
            ("mid.md", "---\naliases: [m]\n---\n"),
        ]);

        assert_eq!(slugs(&index), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_build_walks_tree_and_skips_ignored_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        for dir in ["blog/2024", ".git", "node_modules/pkg", "output", ".mdsite-cache"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        fs::write(root.join("index.md"), "# Home").unwrap();
        fs::write(root.join("About Me.MD"), "---\ntitle: About\n---\n").unwrap();
        fs::write(root.join("blog/2024/index.md"), "Year in review").unwrap();
        fs::write(root.join("blog/notes.txt"), "not markdown").unwrap();
        fs::write(root.join(".git/HEAD.md"), "").unwrap();
        fs::write(root.join("node_modules/pkg/readme.md"), "").unwrap();
        fs::write(root.join("output/built.md"), "").unwrap();
        fs::write(root.join(".mdsite-cache/cached.md"), "").unwrap();

        let index = Index::new();
        index.build(root, &Settings::default());

        assert_eq!(slugs(&index), vec!["", "about-me", "blog/2024"]);
        assert_eq!(index.get_by_slug("about-me").unwrap().title, "About");
        assert_eq!(index.root().as_deref(), Some(root));
    }

    #[test]
    fn test_build_collects_mentions() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings {
            blogroll: vec![BlogrollEntry {
                site_url: Some("https://www.jvns.ca".into()),
                aliases: vec!["julia".into()],
                ..Default::default()
            }],
            ..Default::default()
        };

        let index = Index::new();
        index.build(temp_dir.path(), &settings);

        assert_eq!(index.get_by_handle("@jvns.ca").unwrap().handle, "jvns.ca");
        assert_eq!(index.get_by_handle("Julia").unwrap().handle, "jvns.ca");
        assert!(index.get_by_handle("nobody").is_none());
        assert_eq!(index.all_mentions().len(), 1);
    }

    #[test]
    fn test_index_file_reads_from_disk() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("note.md");
        fs::write(&path, "---\ntitle: Note\n---\n").unwrap();

        let index = Index::new();
        index.build(temp_dir.path(), &Settings::default());
        fs::write(&path, "---\ntitle: Changed\n---\n").unwrap();
        index.index_file(&path).unwrap();

        assert_eq!(index.get_by_slug("note").unwrap().title, "Changed");
        assert!(index.index_file(&temp_dir.path().join("missing.md")).is_err());
    }

    #[test]
    fn test_resolver() {
        let index = index_with(&[("post.md", "")]);
        let resolver = IndexResolver(&index);

        assert!(resolver.resolve_slug("post"));
        assert!(resolver.resolve_slug("post#intro"));
        assert!(!resolver.resolve_slug("missing"));
        assert!(!resolver.resolve_handle("someone"));
    }
}
