//! # jqpath
//!
//! A small path and query language for `serde_json` values, borrowing its syntax from
//! [jq](https://jqlang.github.io/jq/) and JSONPath.
//!
//! Expressions are parsed once into components and can then be used to read, search
//! and rewrite JSON trees.
//!
//! ## Features
//!
//! - **Paths:** keys and indices (`users.alice.age`, `items[0]`, `items.-1`), quoted keys
//!   (`["a.b"]`), wildcards (`*`, `[*]`, `[]`) and slices (`[1:3]`, `[-2:]`).
//! - **Optional components:** a trailing `?` (`a?`, `[5]?`) swallows missing entries.
//! - **Selectors:** `[?(@.price > 10)]` comparisons and `[?{"status": "active"}]` matching.
//! - **Functions:** `keys`, `length`, `map(.name)`, `join(", ")`, `sort`, `unique` and more.
//! - **Construction:** `{name, total: .price}` builds new objects.
//! - **Mutation:** copy-on-write `set`, `delete`, `merge` and friends, with missing
//!   intermediate containers created on demand.
//! - **Search and reshape:** `find_paths` over keys and values; `flatten`/`unflatten`.
//!
//! ## Examples
//!
//! ### Reading values
//!
//! ```rust
//! use serde_json::json;
//!
//! let doc = json!({"users": {"alice": {"age": 30}, "bob": {"age": 25}}});
//!
//! assert_eq!(jqpath::get(&doc, "users.*.age").unwrap(), vec![json!(30), json!(25)]);
//! assert_eq!(jqpath::get(&doc, "users.keys").unwrap(), vec![json!(["alice", "bob"])]);
//! assert_eq!(
//!     jqpath::get_first(&doc, "users[?(@.age > 26)].age").unwrap(),
//!     Some(json!(30))
//! );
//! ```
//!
//! ### Setting values
//!
//! The input is never modified; every mutation returns a new root.
//!
//! ```rust
//! use serde_json::json;
//!
//! let doc = json!({});
//! let updated = jqpath::set(&doc, "items[2]", json!("v")).unwrap();
//!
//! assert_eq!(updated, json!({"items": [null, null, "v"]}));
//! assert_eq!(doc, json!({}));
//! ```
//!
//! ### Appending and deleting
//!
//! ```rust
//! use jqpath::Operation;
//! use serde_json::json;
//!
//! let doc = json!({"tags": ["a"], "items": [1, 2, 3, 4]});
//! let doc = jqpath::set_with(&doc, "tags", json!("b"), true, Operation::Append).unwrap();
//! let doc = jqpath::delete(&doc, "items[1:3]").unwrap();
//!
//! assert_eq!(doc, json!({"tags": ["a", "b"], "items": [1, 4]}));
//! ```
//!
//! ### Reusing a parsed query
//!
//! ```rust
//! use jqpath::{Options, Query};
//! use serde_json::json;
//!
//! let query: Query = "orders[?(@.total >= 100)].id".parse().unwrap();
//! let query = query.with_options(Options::default().with_only_first(true));
//!
//! let doc = json!({"orders": [
//!     {"id": 1, "total": 50},
//!     {"id": 2, "total": 150},
//!     {"id": 3, "total": 300}
//! ]});
//! assert_eq!(query.get(&doc).unwrap(), vec![json!(2)]);
//! ```
//!
//! ### Flattening
//!
//! ```rust
//! use serde_json::json;
//!
//! let doc = json!({"a": {"b": [1, 2]}});
//! let flat = jqpath::flatten(&doc);
//!
//! assert_eq!(serde_json::Value::Object(flat.clone()), json!({"a.b.0": 1, "a.b.1": 2}));
//! assert_eq!(jqpath::unflatten(&flat).unwrap(), doc);
//! ```

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

mod config;
mod functions;
mod manipulators;
mod parse;
mod reshape;
mod search;
mod selector;
mod traverse;
mod types;
mod value;

pub use config::{Options, Separator, DEFAULT_MAX_DEPTH, DEFAULT_MAX_PADDING};
pub use search::{Search, SearchMode, SearchOptions};
pub use selector::matches;
pub use traverse::Traversal;
pub use types::{
    render_path, to_pointer, ArithOp, CompareOp, CustomPredicate, Function, JqpathError, MapExpr,
    Match, Operation, PathComponent, PathToken, PathsFilter, Predicate, Result, SelectorKey,
    SliceSpec,
};

/// A parsed path expression together with the options it is evaluated with.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    components: Vec<PathComponent>,
    options: Options,
}

impl Query {
    pub fn new(expression: &str) -> Result<Self> {
        Ok(Self::from_components(parse::parse_path(expression)?))
    }

    /// Builds a query from components assembled in code, e.g. with a
    /// [`Predicate::Custom`] selector or a stepped [`SliceSpec`].
    pub fn from_components(components: Vec<PathComponent>) -> Self {
        Self {
            components,
            options: Options::default(),
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn components(&self) -> &[PathComponent] {
        &self.components
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Lazily evaluates the query against `value`.
    pub fn traverse<'a>(&'a self, value: &'a Value) -> Traversal<'a> {
        Traversal::new(value, &self.components, self.options)
    }

    /// Every matching value, or just the first one when `only_first` is set.
    pub fn get(&self, value: &Value) -> Result<Vec<Value>> {
        self.traverse(value)
            .map(|found| found.map(Match::into_value))
            .collect()
    }

    pub fn first(&self, value: &Value) -> Result<Option<Value>> {
        Traversal::new(value, &self.components, self.options.with_only_first(true))
            .next()
            .transpose()
            .map(|found| found.map(Match::into_value))
    }

    pub fn get_or(&self, value: &Value, default: Value) -> Result<Value> {
        Ok(self.first(value)?.unwrap_or(default))
    }

    /// Whether the query matches anything in `value`.
    pub fn has(&self, value: &Value) -> Result<bool> {
        Ok(self.first(value)?.is_some())
    }

    /// Replaces every match with `new_value`, creating the path when
    /// `options.create_missing` allows it.
    pub fn set(&self, value: &Value, new_value: Value) -> Result<Value> {
        self.set_with(value, new_value, Operation::Set)
    }

    pub fn set_with(&self, value: &Value, new_value: Value, operation: Operation) -> Result<Value> {
        manipulators::set(
            value,
            &self.components,
            new_value,
            self.options.create_missing,
            operation,
            &self.options,
        )
    }

    /// Removes every match; a missing concrete path is an error unless
    /// `options.tolerant_delete` is set.
    pub fn delete(&self, value: &Value) -> Result<Value> {
        manipulators::delete(
            value,
            &self.components,
            self.options.tolerant_delete,
            &self.options,
        )
    }
}

impl FromStr for Query {
    type Err = JqpathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_path(&self.components))
    }
}

/// Parses a path expression into its components.
pub fn parse(expression: &str) -> Result<Vec<PathComponent>> {
    parse::parse_path(expression)
}

/// Every value `path` matches in `value`, in document order.
pub fn get(value: &Value, path: &str) -> Result<Vec<Value>> {
    Query::new(path)?.get(value)
}

pub fn get_first(value: &Value, path: &str) -> Result<Option<Value>> {
    Query::new(path)?.first(value)
}

pub fn get_or(value: &Value, path: &str, default: Value) -> Result<Value> {
    Query::new(path)?.get_or(value, default)
}

pub fn has(value: &Value, path: &str) -> Result<bool> {
    Query::new(path)?.has(value)
}

/// Returns a copy of `value` with `new_value` written at `path`, creating
/// missing intermediate containers.
pub fn set(value: &Value, path: &str, new_value: Value) -> Result<Value> {
    Query::new(path)?.set(value, new_value)
}

pub fn set_with(
    value: &Value,
    path: &str,
    new_value: Value,
    create_missing: bool,
    operation: Operation,
) -> Result<Value> {
    let options = Options::default().with_create_missing(create_missing);
    Query::new(path)?
        .with_options(options)
        .set_with(value, new_value, operation)
}

/// Returns a copy of `value` without the entries `path` matches. A concrete
/// path that does not exist is a `KeyError` or `IndexError`.
pub fn delete(value: &Value, path: &str) -> Result<Value> {
    Query::new(path)?.delete(value)
}

/// Like [`delete`], but a missing path leaves the value unchanged.
pub fn delete_tolerant(value: &Value, path: &str) -> Result<Value> {
    Query::new(path)?
        .with_options(Options::default().with_tolerant_delete(true))
        .delete(value)
}

/// Applies `(path, value)` assignments in order, stopping at the first error.
pub fn batch_set<I, P>(value: &Value, assignments: I) -> Result<Value>
where
    I: IntoIterator<Item = (P, Value)>,
    P: AsRef<str>,
{
    let assignments = assignments
        .into_iter()
        .map(|(path, new_value)| Ok((parse::parse_path(path.as_ref())?, new_value)))
        .collect::<Result<Vec<_>>>()?;
    manipulators::batch_set(value, assignments, &Options::default())
}

/// Copies the first match of `source_path` in `source` to `target_path` in
/// `target`. Falls back to `default`; without one, `target` is returned as is.
pub fn copy_path(
    source: &Value,
    target: &Value,
    source_path: &str,
    target_path: &str,
    default: Option<Value>,
) -> Result<Value> {
    manipulators::copy_path(
        source,
        target,
        &parse::parse_path(source_path)?,
        &parse::parse_path(target_path)?,
        default,
        &Options::default(),
    )
}

/// Deep-merges `overlay` into a copy of `base`; arrays and scalars in
/// `overlay` replace those in `base`.
pub fn merge(base: &Value, overlay: &Value) -> Result<Value> {
    manipulators::merge(base, overlay, &Options::default())
}

/// Paths of every key or value below the root matching `pattern`.
pub fn find_paths(
    value: &Value,
    pattern: &Value,
    options: SearchOptions,
) -> Result<Vec<Vec<PathToken>>> {
    search::find_paths(value, pattern, options)
}

/// Like [`find_paths`], paired with the value at each path.
pub fn find_values(
    value: &Value,
    pattern: &Value,
    options: SearchOptions,
) -> Result<Vec<(Vec<PathToken>, Value)>> {
    search::find_values(value, pattern, options)
}

/// Flattens `value` into `.`-joined compound keys.
pub fn flatten(value: &Value) -> Map<String, Value> {
    reshape::flatten_with(value, &Options::default())
}

pub fn flatten_with(value: &Value, options: &Options) -> Map<String, Value> {
    reshape::flatten_with(value, options)
}

/// Rebuilds a nested value from `.`-joined compound keys.
pub fn unflatten(flat: &Map<String, Value>) -> Result<Value> {
    reshape::unflatten_with(flat, &Options::default())
}

pub fn unflatten_with(flat: &Map<String, Value>, options: &Options) -> Result<Value> {
    reshape::unflatten_with(flat, options)
}
