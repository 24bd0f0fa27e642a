//! Post filter expressions used by `from_posts` mention rules.
//!
//! This is the small subset of the site's filter language that mention rules
//! need: clauses joined with `and`.
//!
//! | Clause | Matches when |
//! |--------|--------------|
//! | `field == 'v'` | the field's value equals `v` |
//! | `field != 'v'` | the field is absent or differs from `v` |
//! | `'v' in field` | the list contains `v`, or the string contains it |
//! | `field` | the field is present and truthy |
//! | `True` / `False` | always / never |

use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::Value;
use thiserror::Error;

use super::frontmatter::{scalar_to_string, Metadata};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("empty filter expression")]
    Empty,
    #[error("cannot parse filter clause `{0}`")]
    InvalidClause(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Clause {
    Equals(String, String),
    NotEquals(String, String),
    Contains(String, String),
    Truthy(String),
    Constant(bool),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    clauses: Vec<Clause>,
}

static AND_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+and\s+").unwrap());

static COMPARISON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?<field>[A-Za-z_][A-Za-z0-9_]*)\s*(?<op>==|!=)\s*(?<value>.+)$").unwrap()
});

static MEMBERSHIP_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?<value>.+?)\s+in\s+(?<field>[A-Za-z_][A-Za-z0-9_]*)$").unwrap()
});

static FIELD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

fn unquote(value: &str) -> String {
    let value = value.trim();
    let quoted = value.len() >= 2
        && ((value.starts_with('\'') && value.ends_with('\''))
            || (value.starts_with('"') && value.ends_with('"')));

    if quoted {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

fn parse_clause(clause: &str) -> Result<Clause, FilterError> {
    let clause = clause.trim();

    if clause.eq_ignore_ascii_case("true") {
        return Ok(Clause::Constant(true));
    }
    if clause.eq_ignore_ascii_case("false") {
        return Ok(Clause::Constant(false));
    }

    if let Some(captures) = COMPARISON_RE.captures(clause) {
        let field = captures["field"].to_string();
        let value = unquote(&captures["value"]);
        return Ok(match &captures["op"] {
            "==" => Clause::Equals(field, value),
            _ => Clause::NotEquals(field, value),
        });
    }

    if let Some(captures) = MEMBERSHIP_RE.captures(clause) {
        return Ok(Clause::Contains(
            captures["field"].to_string(),
            unquote(&captures["value"]),
        ));
    }

    if FIELD_RE.is_match(clause) {
        return Ok(Clause::Truthy(clause.to_string()));
    }

    Err(FilterError::InvalidClause(clause.to_string()))
}

fn values_equal(actual: &str, expected: &str) -> bool {
    let is_bool = |s: &str| s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false");
    if is_bool(actual) && is_bool(expected) {
        actual.eq_ignore_ascii_case(expected)
    } else {
        actual == expected
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty() && !s.eq_ignore_ascii_case("false"),
        Value::Sequence(items) => !items.is_empty(),
        Value::Mapping(map) => !map.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Tagged(tagged) => is_truthy(&tagged.value),
    }
}

impl Filter {
    pub fn parse(expression: &str) -> Result<Filter, FilterError> {
        if expression.trim().is_empty() {
            return Err(FilterError::Empty);
        }

        let clauses = AND_RE
            .split(expression.trim())
            .map(parse_clause)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Filter { clauses })
    }

    /// Evaluates the filter against a post. `slug` stands in for a missing
    /// `slug` field so rules can match on derived slugs.
    pub fn matches(&self, metadata: &Metadata, slug: &str) -> bool {
        let field_str = |field: &str| match (field, metadata.get_str(field)) {
            (_, Some(value)) => Some(value),
            ("slug", None) => Some(slug.to_string()),
            _ => None,
        };

        self.clauses.iter().all(|clause| match clause {
            Clause::Constant(value) => *value,
            Clause::Equals(field, expected) => {
                field_str(field).is_some_and(|actual| values_equal(&actual, expected))
            }
            Clause::NotEquals(field, expected) => {
                !field_str(field).is_some_and(|actual| values_equal(&actual, expected))
            }
            Clause::Contains(field, needle) => match metadata.get(field) {
                Some(Value::Sequence(items)) => items
                    .iter()
                    .filter_map(scalar_to_string)
                    .any(|item| item == *needle),
                Some(_) | None => field_str(field).is_some_and(|value| value.contains(needle.as_str())),
            },
            Clause::Truthy(field) => match metadata.get(field) {
                Some(value) => is_truthy(value),
                None => field == "slug" && !slug.is_empty(),
            },
        })
    }
}
