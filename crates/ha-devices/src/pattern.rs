//! Wildcard patterns for device filters
//!
//! A leading and/or trailing `*` matches anything:
//!
//! | pattern  | matches when the value      |
//! |----------|-----------------------------|
//! | `*lamp*` | contains `lamp`             |
//! | `*lamp`  | ends with `lamp`            |
//! | `lamp*`  | starts with `lamp`          |
//! | `lamp`   | equals `lamp`               |

use std::fmt;

/// A parsed wildcard pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pattern {
    Contains(String),
    Suffix(String),
    Prefix(String),
    Exact(String),
}

impl Pattern {
    pub fn parse(raw: &str) -> Self {
        if raw.len() >= 2 && raw.starts_with('*') && raw.ends_with('*') {
            Pattern::Contains(raw[1..raw.len() - 1].to_string())
        } else if let Some(rest) = raw.strip_prefix('*') {
            Pattern::Suffix(rest.to_string())
        } else if let Some(rest) = raw.strip_suffix('*') {
            Pattern::Prefix(rest.to_string())
        } else {
            Pattern::Exact(raw.to_string())
        }
    }

    /// Check a field value; an absent or empty value never matches
    pub fn matches(&self, value: Option<&str>) -> bool {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            return false;
        };

        match self {
            Pattern::Contains(needle) => value.contains(needle.as_str()),
            Pattern::Suffix(suffix) => value.ends_with(suffix.as_str()),
            Pattern::Prefix(prefix) => value.starts_with(prefix.as_str()),
            Pattern::Exact(exact) => value == exact,
        }
    }
}

impl From<&str> for Pattern {
    fn from(raw: &str) -> Self {
        Pattern::parse(raw)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Contains(s) => write!(f, "*{}*", s),
            Pattern::Suffix(s) => write!(f, "*{}", s),
            Pattern::Prefix(s) => write!(f, "{}*", s),
            Pattern::Exact(s) => write!(f, "{}", s),
        }
    }
}
