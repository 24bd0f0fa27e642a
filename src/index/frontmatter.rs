//! Tolerant YAML frontmatter parsing.
//!
//! Callers that index content treat any error here as "no metadata" and keep
//! the whole file as body; the lint rules report the problems instead.

use std::collections::BTreeMap;
use std::path::Path;

use serde_yaml::Value;
use thiserror::Error;

use crate::syntax::locate_frontmatter;

#[derive(Debug, Error)]
pub enum FrontmatterError {
    #[error("frontmatter in {path} is never closed")]
    Unclosed { path: String },

    #[error("invalid frontmatter in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Frontmatter key/value pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata(BTreeMap<String, Value>);

impl Metadata {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Scalar value rendered as a string. Strings, numbers and booleans
    /// qualify; empty strings do not.
    pub fn get_str(&self, key: &str) -> Option<String> {
        scalar_to_string(self.get(key)?).filter(|s| !s.trim().is_empty())
    }

    /// A list of scalars. A lone scalar counts as a one element list.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Sequence(items)) => items.iter().filter_map(scalar_to_string).collect(),
            Some(other) => scalar_to_string(other).into_iter().collect(),
            None => Vec::new(),
        }
    }
}

impl From<BTreeMap<String, Value>> for Metadata {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Metadata(value)
    }
}

pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Splits `content` into its metadata and body.
///
/// Without a frontmatter block the metadata is empty and the body is the
/// whole content.
pub fn parse(path: &Path, content: &str) -> Result<(Metadata, String), FrontmatterError> {
    let Some(block) = locate_frontmatter(content) else {
        return Ok((Metadata::default(), content.to_string()));
    };

    let Some(end) = block.end else {
        return Err(FrontmatterError::Unclosed {
            path: path.display().to_string(),
        });
    };

    let mut yaml = String::new();
    let mut body_offset = content.len();
    let mut offset = 0;
    for (line_nr, line) in content.split_inclusive('\n').enumerate() {
        if line_nr > block.start && line_nr < end {
            yaml.push_str(line);
        }
        offset += line.len();
        if line_nr == end {
            body_offset = offset;
            break;
        }
    }

    let body = content[body_offset..].to_string();

    if yaml.trim().is_empty() {
        return Ok((Metadata::default(), body));
    }

    let map: Option<BTreeMap<String, Value>> =
        serde_yaml::from_str(&yaml).map_err(|source| FrontmatterError::Yaml {
            path: path.display().to_string(),
            source,
        })?;

    Ok((map.map(Metadata::from).unwrap_or_default(), body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(content: &str) -> Result<(Metadata, String), FrontmatterError> {
        parse(Path::new("post.md"), content)
    }

    #[test]
    fn test_parse_metadata_and_body() {
        let (metadata, body) =
            parse_str("---\ntitle: Hello\ncount: 3\ndraft: false\n---\n# Body\n").unwrap();

        assert_eq!(metadata.get_str("title").as_deref(), Some("Hello"));
        assert_eq!(metadata.get_str("count").as_deref(), Some("3"));
        assert_eq!(metadata.get_str("draft").as_deref(), Some("false"));
        assert_eq!(body, "# Body\n");
    }

    #[test]
    fn test_no_frontmatter() {
        let (metadata, body) = parse_str("just text").unwrap();
        assert!(metadata.is_empty());
        assert_eq!(body, "just text");
    }

    #[test]
    fn test_empty_frontmatter() {
        let (metadata, body) = parse_str("---\n---\nbody").unwrap();
        assert!(metadata.is_empty());
        assert_eq!(body, "body");
    }

    #[test]
    fn test_lists() {
        let (metadata, _) =
            parse_str("---\naliases:\n  - one\n  - two\ntags: solo\n---\n").unwrap();

        assert_eq!(metadata.get_list("aliases"), vec!["one", "two"]);
        assert_eq!(metadata.get_list("tags"), vec!["solo"]);
        assert!(metadata.get_list("missing").is_empty());
    }

    #[test]
    fn test_unclosed_is_an_error() {
        assert!(matches!(
            parse_str("---\ntitle: x\n"),
            Err(FrontmatterError::Unclosed { .. })
        ));
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        assert!(matches!(
            parse_str("---\ntitle: [unclosed\n---\n"),
            Err(FrontmatterError::Yaml { .. })
        ));
    }
}
