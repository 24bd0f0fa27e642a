use std::path::Path;

use anyhow::anyhow;
use config::{Config, File};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Build cache directory, skipped when indexing
    pub cache_dir: String,
    /// Maximum length of a description derived from the post body
    pub excerpt_length: usize,
    pub hover: bool,
    pub diagnostics: bool,
    pub blogroll: Vec<BlogrollEntry>,
    pub mentions: MentionsConfig,
}

/// An external site that can be `@mentioned`.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BlogrollEntry {
    /// Explicit handle; derived from the `site_url` host when absent
    pub handle: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub site_url: Option<String>,
    pub feed_url: Option<String>,
    pub aliases: Vec<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct MentionsConfig {
    pub from_posts: Vec<FromPostsRule>,
}

/// Turns every post matching `filter` into an internal mention.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct FromPostsRule {
    pub filter: String,
    /// Frontmatter field holding the handle (`slug` uses the post slug)
    #[serde(default = "default_handle_field")]
    pub handle_field: String,
    /// Frontmatter field holding extra handles
    #[serde(default)]
    pub aliases_field: Option<String>,
}

fn default_handle_field() -> String {
    "slug".to_string()
}

impl Settings {
    pub fn new(root_dir: &Path) -> anyhow::Result<Settings> {
        let expanded = shellexpand::tilde("~/.config/mdsite/settings");
        let settings = Config::builder()
            .add_source(File::with_name(&expanded).required(false))
            .add_source(
                File::with_name(&format!(
                    "{}/mdsite",
                    root_dir
                        .to_str()
                        .ok_or(anyhow!("Can't convert root_dir to str"))?
                ))
                .required(false),
            )
            .build()
            .map_err(|err| anyhow!("Build err: {err}"))?;

        let settings = settings.try_deserialize::<Settings>()?;

        anyhow::Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            cache_dir: ".mdsite-cache".to_string(),
            excerpt_length: 160,
            hover: true,
            diagnostics: true,
            blogroll: Vec::new(),
            mentions: MentionsConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_defaults_without_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings::new(temp_dir.path()).unwrap();

        assert_eq!(settings.cache_dir, ".mdsite-cache");
        assert_eq!(settings.excerpt_length, 160);
        assert!(settings.blogroll.is_empty());
    }

    #[test]
    fn test_workspace_config_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("mdsite.toml"),
            r#"
excerpt_length = 80
hover = false

[[blogroll]]
handle = "simon"
title = "Simon Willison"
site_url = "https://simonwillison.net"
aliases = ["simonw"]

[[blogroll]]
site_url = "https://www.example.org/blog"

[[mentions.from_posts]]
filter = "'contact' in tags"
"#,
        )
        .unwrap();

        let settings = Settings::new(temp_dir.path()).unwrap();

        assert_eq!(settings.excerpt_length, 80);
        assert!(!settings.hover);
        assert!(settings.diagnostics);
        assert_eq!(settings.blogroll.len(), 2);
        assert_eq!(settings.blogroll[0].handle.as_deref(), Some("simon"));
        assert_eq!(settings.blogroll[0].aliases, vec!["simonw"]);
        assert_eq!(settings.blogroll[1].handle, None);
        assert_eq!(settings.mentions.from_posts.len(), 1);
        assert_eq!(settings.mentions.from_posts[0].handle_field, "slug");
    }
}
