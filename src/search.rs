//! Recursive key/value search.

use std::fmt;
use std::str::FromStr;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::DEFAULT_MAX_DEPTH;
use crate::traverse::lookup;
use crate::types::{JqpathError, PathToken, Result};
use crate::value::{kind_name, values_equal};

/// How a candidate is compared against the search pattern.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Same kind and value.
    #[default]
    Exact,
    /// Substring of a string, or member of an array.
    Contains,
    /// The pattern is a regular expression matched against strings.
    Regex,
}

impl FromStr for SearchMode {
    type Err = JqpathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "exact" => Ok(SearchMode::Exact),
            "contains" => Ok(SearchMode::Contains),
            "regex" => Ok(SearchMode::Regex),
            other => Err(JqpathError::ValueError(format!(
                "unsupported search mode '{other}'"
            ))),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchMode::Exact => "exact",
            SearchMode::Contains => "contains",
            SearchMode::Regex => "regex",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchOptions {
    pub mode: SearchMode,
    pub case_sensitive: bool,
    /// Match object keys.
    pub search_keys: bool,
    /// Match values at every depth.
    pub search_values: bool,
    pub max_depth: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            mode: SearchMode::Exact,
            case_sensitive: true,
            search_keys: true,
            search_values: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl SearchOptions {
    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Match keys only.
    pub fn keys_only(mut self) -> Self {
        self.search_keys = true;
        self.search_values = false;
        self
    }

    /// Match values only.
    pub fn values_only(mut self) -> Self {
        self.search_keys = false;
        self.search_values = true;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

enum Matcher<'p> {
    Exact(&'p Value),
    Contains(&'p Value),
    Regex(Regex),
}

struct Frame<'a> {
    path: Vec<PathToken>,
    value: &'a Value,
}

/// Lazily yields the path of every key or value below the root that matches
/// a pattern, depth-first in pre-order. Each path is reported once, and a
/// matching key does not stop the search from descending into its value.
///
/// ## Example
///
/// ```rust
/// use jqpath::{PathToken, Search, SearchOptions};
/// use serde_json::json;
///
/// let doc = json!({"id": 1, "nested": {"id": 2}});
/// let pattern = json!("id");
/// let paths: Vec<_> = Search::new(&doc, &pattern, SearchOptions::default().keys_only())
///     .unwrap()
///     .collect::<Result<_, _>>()
///     .unwrap();
///
/// assert_eq!(
///     paths,
///     vec![
///         vec![PathToken::from("id")],
///         vec![PathToken::from("nested"), PathToken::from("id")],
///     ]
/// );
/// ```
pub struct Search<'a, 'p> {
    matcher: Matcher<'p>,
    options: SearchOptions,
    stack: Vec<Frame<'a>>,
    finished: bool,
}

impl<'a, 'p> Search<'a, 'p> {
    /// Prepares a search. In regex mode the pattern must be a string holding a
    /// valid expression, otherwise this fails with `ValueError`.
    pub fn new(root: &'a Value, pattern: &'p Value, options: SearchOptions) -> Result<Self> {
        let matcher = match options.mode {
            SearchMode::Exact => Matcher::Exact(pattern),
            SearchMode::Contains => Matcher::Contains(pattern),
            SearchMode::Regex => {
                let Value::String(source) = pattern else {
                    return Err(JqpathError::ValueError(format!(
                        "regex search needs a string pattern, got {}",
                        kind_name(pattern)
                    )));
                };
                let regex = RegexBuilder::new(source)
                    .case_insensitive(!options.case_sensitive)
                    .build()?;
                Matcher::Regex(regex)
            }
        };
        debug!(
            mode = %options.mode,
            case_sensitive = options.case_sensitive,
            keys = options.search_keys,
            values = options.search_values,
            "starting search"
        );
        Ok(Self {
            matcher,
            options,
            stack: vec![Frame {
                path: Vec::new(),
                value: root,
            }],
            finished: false,
        })
    }

    fn is_match(&self, candidate: &Value) -> bool {
        let case_sensitive = self.options.case_sensitive;
        match &self.matcher {
            Matcher::Exact(pattern) => equal(candidate, pattern, case_sensitive),
            Matcher::Contains(pattern) => match (candidate, pattern) {
                (Value::String(haystack), Value::String(needle)) if case_sensitive => {
                    haystack.contains(needle.as_str())
                }
                (Value::String(haystack), Value::String(needle)) => haystack
                    .to_lowercase()
                    .contains(&needle.to_lowercase()),
                (Value::Array(items), pattern) => {
                    items.iter().any(|item| equal(item, pattern, case_sensitive))
                }
                _ => false,
            },
            Matcher::Regex(regex) => candidate.as_str().is_some_and(|s| regex.is_match(s)),
        }
    }

    fn visit(&self, frame: &Frame<'a>) -> bool {
        let key_match = self.options.search_keys
            && match frame.path.last() {
                Some(PathToken::Key(key)) => self.is_match(&Value::String(key.clone())),
                _ => false,
            };
        key_match || (self.options.search_values && self.is_match(frame.value))
    }
}

fn equal(candidate: &Value, pattern: &Value, case_sensitive: bool) -> bool {
    match (candidate, pattern) {
        (Value::String(a), Value::String(b)) if !case_sensitive => {
            a.to_lowercase() == b.to_lowercase()
        }
        _ => values_equal(candidate, pattern),
    }
}

impl<'a> Iterator for Search<'a, '_> {
    type Item = Result<Vec<PathToken>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        while let Some(frame) = self.stack.pop() {
            if frame.path.len() > self.options.max_depth {
                self.finished = true;
                self.stack.clear();
                return Some(Err(JqpathError::DepthExceeded(self.options.max_depth)));
            }
            let tokens: Vec<PathToken> = match frame.value {
                Value::Object(map) => map.keys().cloned().map(PathToken::Key).collect(),
                Value::Array(items) => (0..items.len()).map(PathToken::Index).collect(),
                _ => Vec::new(),
            };
            for token in tokens.into_iter().rev() {
                if let Some(child) = lookup(frame.value, &token) {
                    let mut path = frame.path.clone();
                    path.push(token);
                    self.stack.push(Frame { path, value: child });
                }
            }
            if !frame.path.is_empty() && self.visit(&frame) {
                return Some(Ok(frame.path));
            }
        }
        self.finished = true;
        None
    }
}

/// Collects every matching path.
pub fn find_paths(
    root: &Value,
    pattern: &Value,
    options: SearchOptions,
) -> Result<Vec<Vec<PathToken>>> {
    Search::new(root, pattern, options)?.collect()
}

/// Collects every matching path together with the value found there.
pub fn find_values(
    root: &Value,
    pattern: &Value,
    options: SearchOptions,
) -> Result<Vec<(Vec<PathToken>, Value)>> {
    Search::new(root, pattern, options)?
        .map(|found| {
            let path = found?;
            let value = path
                .iter()
                .try_fold(root, |node, token| lookup(node, token))
                .cloned()
                .unwrap_or(Value::Null);
            Ok((path, value))
        })
        .collect()
}
