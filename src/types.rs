use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use jsonptr::{PointerBuf, Token};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A concrete step in a resolved path: an object key or an array index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathToken {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathToken::Key(key) => f.write_str(key),
            PathToken::Index(index) => write!(f, "{index}"),
        }
    }
}

impl From<&str> for PathToken {
    fn from(value: &str) -> Self {
        PathToken::Key(value.to_string())
    }
}

impl From<String> for PathToken {
    fn from(value: String) -> Self {
        PathToken::Key(value)
    }
}

impl From<usize> for PathToken {
    fn from(value: usize) -> Self {
        PathToken::Index(value)
    }
}

impl From<&PathToken> for Value {
    fn from(token: &PathToken) -> Self {
        match token {
            PathToken::Key(key) => Value::String(key.clone()),
            PathToken::Index(index) => Value::from(*index),
        }
    }
}

/// Converts a concrete path into a JSON Pointer (RFC 6901).
pub fn to_pointer(path: &[PathToken]) -> PointerBuf {
    PointerBuf::from_tokens(path.iter().map(|token| match token {
        PathToken::Key(key) => Token::new(key.clone()),
        PathToken::Index(index) => Token::new(index.to_string()),
    }))
}

/// Comparison operators usable in `?(@.key OP value)` selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
        }
    }
}

impl FromStr for CompareOp {
    type Err = JqpathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" => Ok(CompareOp::Eq),
            "!=" => Ok(CompareOp::Ne),
            ">" => Ok(CompareOp::Gt),
            "<" => Ok(CompareOp::Lt),
            ">=" => Ok(CompareOp::Ge),
            "<=" => Ok(CompareOp::Le),
            other => Err(JqpathError::ValueError(format!(
                "unsupported comparison operator '{other}'"
            ))),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A half-open, negative-aware array slice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceSpec {
    pub start: Option<i64>,
    pub stop: Option<i64>,
    pub step: Option<i64>,
}

impl SliceSpec {
    pub fn new(start: Option<i64>, stop: Option<i64>) -> Self {
        Self {
            start,
            stop,
            step: None,
        }
    }

    pub fn with_step(mut self, step: i64) -> Self {
        self.step = Some(step);
        self
    }

    /// Resolves the slice against an array of length `len`, returning the
    /// selected indices in iteration order. A zero step selects nothing.
    pub fn indices(&self, len: usize) -> Vec<usize> {
        let step = self.step.unwrap_or(1);
        if step == 0 || len == 0 {
            return Vec::new();
        }
        let len = len as i64;
        let (lower, upper) = if step > 0 { (0, len) } else { (-1, len - 1) };
        let clamp = |bound: i64| {
            if bound < 0 {
                (bound + len).max(lower)
            } else {
                bound.min(upper)
            }
        };
        let start = self
            .start
            .map(clamp)
            .unwrap_or(if step > 0 { lower } else { upper });
        let stop = self
            .stop
            .map(clamp)
            .unwrap_or(if step > 0 { upper } else { lower });

        let mut indices = Vec::new();
        let mut i = start;
        while (step > 0 && i < stop) || (step < 0 && i > stop) {
            indices.push(i as usize);
            i += step;
        }
        indices
    }

    /// Whether `index` is selected by this slice over an array of length `len`.
    pub fn contains(&self, index: usize, len: usize) -> bool {
        self.indices(len).contains(&index)
    }
}

impl fmt::Display for SliceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(start) = self.start {
            write!(f, "{start}")?;
        }
        f.write_str(":")?;
        if let Some(stop) = self.stop {
            write!(f, "{stop}")?;
        }
        if let Some(step) = self.step {
            write!(f, ":{step}")?;
        }
        Ok(())
    }
}

/// The key a selector is being evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorKey<'a> {
    /// A key of an object.
    Name(&'a str),
    /// An index into an array of `len` elements.
    Index { index: usize, len: usize },
}

type PredicateFn = dyn Fn(SelectorKey<'_>, &Value) -> bool + Send + Sync;

/// An opaque, caller-supplied predicate.
#[derive(Clone)]
pub struct CustomPredicate(Arc<PredicateFn>);

impl CustomPredicate {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(SelectorKey<'_>, &Value) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    pub fn call(&self, key: SelectorKey<'_>, value: &Value) -> bool {
        (self.0)(key, value)
    }
}

impl fmt::Debug for CustomPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CustomPredicate(..)")
    }
}

impl PartialEq for CustomPredicate {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// What a `Selector` component filters on.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `?(@.key OP literal)`
    Compare {
        key: String,
        op: CompareOp,
        literal: Value,
    },
    /// `?{"k": v, ...}`: every pair must be present and equal.
    DictMatch(Map<String, Value>),
    /// Accepts everything.
    Any,
    /// Index membership; only meaningful for arrays.
    Slice(SliceSpec),
    Custom(CustomPredicate),
}

impl Predicate {
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(SelectorKey<'_>, &Value) -> bool + Send + Sync + 'static,
    {
        Predicate::Custom(CustomPredicate::new(predicate))
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Compare { key, op, literal } => write!(f, "?(@.{key} {op} {literal})"),
            Predicate::DictMatch(map) => write!(f, "?{}", Value::Object(map.clone())),
            Predicate::Any => f.write_str("*"),
            Predicate::Slice(slice) => write!(f, "{slice}"),
            Predicate::Custom(_) => f.write_str("?(<custom>)"),
        }
    }
}

/// Arithmetic applied element-wise by `map(. * N)` and `map(. + N)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Mul,
    Add,
}

/// The argument of `map(...)`, parsed once.
#[derive(Debug, Clone, PartialEq)]
pub enum MapExpr {
    Path(Vec<PathComponent>),
    Arithmetic { op: ArithOp, operand: f64 },
}

/// Descendant kinds accepted by `paths(...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathsFilter {
    Objects,
    Arrays,
    Scalars,
}

/// Built-in functions with their arguments already parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    Keys,
    Length,
    Type,
    Has(Value),
    Map(MapExpr),
    Paths(Option<PathsFilter>),
    Split(String),
    Join(String),
    Lowercase,
    Uppercase,
    Trim,
    StartsWith(String),
    EndsWith(String),
    Contains(Value),
    Add,
    Min,
    Max,
    Sort,
    Reverse,
    Unique,
    Flatten(Option<usize>),
}

impl Function {
    /// Every name (including aliases) the parser recognizes as a function.
    pub fn names() -> &'static [&'static str] {
        &[
            "keys",
            "length",
            "type",
            "has",
            "map",
            "paths",
            "split",
            "join",
            "lowercase",
            "lower",
            "ascii_downcase",
            "uppercase",
            "upper",
            "ascii_upcase",
            "trim",
            "startswith",
            "endswith",
            "contains",
            "add",
            "min",
            "max",
            "sort",
            "reverse",
            "unique",
            "flatten",
        ]
    }

    pub fn is_function_name(name: &str) -> bool {
        Self::names().contains(&name)
    }

    /// Canonical name of the function.
    pub fn name(&self) -> &'static str {
        match self {
            Function::Keys => "keys",
            Function::Length => "length",
            Function::Type => "type",
            Function::Has(_) => "has",
            Function::Map(_) => "map",
            Function::Paths(_) => "paths",
            Function::Split(_) => "split",
            Function::Join(_) => "join",
            Function::Lowercase => "lowercase",
            Function::Uppercase => "uppercase",
            Function::Trim => "trim",
            Function::StartsWith(_) => "startswith",
            Function::EndsWith(_) => "endswith",
            Function::Contains(_) => "contains",
            Function::Add => "add",
            Function::Min => "min",
            Function::Max => "max",
            Function::Sort => "sort",
            Function::Reverse => "reverse",
            Function::Unique => "unique",
            Function::Flatten(_) => "flatten",
        }
    }
}

/// One parsed component of a path expression.
#[derive(Debug, Clone, PartialEq)]
pub enum PathComponent {
    Key(String),
    /// May be negative, counting from the end.
    Index(i64),
    Wildcard,
    /// `[]`: iterates arrays only.
    ArrayWildcard,
    OptionalKey(String),
    OptionalIndex(i64),
    OptionalWildcard,
    /// `[]?`
    OptionalArrayWildcard,
    Slice(SliceSpec),
    Selector {
        predicate: Predicate,
        raw: String,
    },
    Function {
        function: Function,
        raw: String,
    },
    Literal(Value),
    /// `{name: subpath, ...}`
    Construct(Vec<(String, Vec<PathComponent>)>),
}

impl PathComponent {
    pub fn key(name: impl Into<String>) -> Self {
        PathComponent::Key(name.into())
    }

    pub fn selector(predicate: Predicate) -> Self {
        let raw = predicate.to_string();
        PathComponent::Selector { predicate, raw }
    }

    pub fn function(function: Function) -> Self {
        let raw = function.name().to_string();
        PathComponent::Function { function, raw }
    }

    /// Key or index components (required or optional) that name exactly one location.
    pub fn is_concrete(&self) -> bool {
        matches!(
            self,
            PathComponent::Key(_)
                | PathComponent::Index(_)
                | PathComponent::OptionalKey(_)
                | PathComponent::OptionalIndex(_)
        )
    }

    pub fn is_optional(&self) -> bool {
        matches!(
            self,
            PathComponent::OptionalKey(_)
                | PathComponent::OptionalIndex(_)
                | PathComponent::OptionalWildcard
                | PathComponent::OptionalArrayWildcard
        )
    }

    /// Components that resolve to locations in the tree rather than computed values.
    pub fn is_addressable(&self) -> bool {
        !matches!(
            self,
            PathComponent::Function { .. } | PathComponent::Literal(_) | PathComponent::Construct(_)
        )
    }

    fn is_bracketed(&self) -> bool {
        match self {
            PathComponent::Key(key) | PathComponent::OptionalKey(key) => !is_plain_key(key),
            PathComponent::Index(_)
            | PathComponent::ArrayWildcard
            | PathComponent::OptionalIndex(_)
            | PathComponent::OptionalWildcard
            | PathComponent::OptionalArrayWildcard
            | PathComponent::Slice(_)
            | PathComponent::Selector { .. } => true,
            _ => false,
        }
    }
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '$' || c == '@')
        && key.parse::<i64>().is_err()
        && !Function::is_function_name(key)
}

fn quoted(key: &str) -> String {
    Value::String(key.to_string()).to_string()
}

impl fmt::Display for PathComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathComponent::Key(key) if is_plain_key(key) => f.write_str(key),
            PathComponent::Key(key) => write!(f, "[{}]", quoted(key)),
            PathComponent::Index(index) => write!(f, "[{index}]"),
            PathComponent::Wildcard => f.write_str("*"),
            PathComponent::ArrayWildcard => f.write_str("[]"),
            PathComponent::OptionalKey(key) if is_plain_key(key) => write!(f, "{key}?"),
            PathComponent::OptionalKey(key) => write!(f, "[{}]?", quoted(key)),
            PathComponent::OptionalIndex(index) => write!(f, "[{index}]?"),
            PathComponent::OptionalWildcard => f.write_str("[*]?"),
            PathComponent::OptionalArrayWildcard => f.write_str("[]?"),
            PathComponent::Slice(slice) => write!(f, "[{slice}]"),
            PathComponent::Selector { raw, .. } => write!(f, "[{raw}]"),
            PathComponent::Function { raw, .. } => f.write_str(raw),
            PathComponent::Literal(value) => write!(f, "{value}"),
            PathComponent::Construct(fields) => {
                f.write_str("{")?;
                for (i, (name, path)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", quoted(name), render_path(path))?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Renders components back into expression text that parses to the same components.
pub fn render_path(components: &[PathComponent]) -> String {
    if components.is_empty() {
        return ".".to_string();
    }
    let mut out = String::new();
    for (i, component) in components.iter().enumerate() {
        if i > 0 && !component.is_bracketed() {
            out.push('.');
        }
        out.push_str(&component.to_string());
    }
    out
}

/// A location produced by traversal together with the value found there.
///
/// A slice yields its sub-array with the path of the array it was cut from.
/// Steps taken below a slice are reported as indices into that array, so
/// `a[1:3][0]` matches at `/a/1`.
#[derive(Debug, Clone, PartialEq)]
pub struct Match<'a> {
    pub path: Vec<PathToken>,
    pub value: Cow<'a, Value>,
}

impl Match<'_> {
    pub fn pointer(&self) -> PointerBuf {
        to_pointer(&self.path)
    }

    pub fn into_value(self) -> Value {
        self.value.into_owned()
    }
}

/// How `set` writes its value at each target.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Replace the target.
    #[default]
    Set,
    /// Push onto the target, wrapping a non-list target into a list first.
    Append,
    /// Concatenate a list onto the target.
    Extend,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Set => "set",
            Operation::Append => "append",
            Operation::Extend => "extend",
        }
    }
}

impl FromStr for Operation {
    type Err = JqpathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "set" => Ok(Operation::Set),
            "append" => Ok(Operation::Append),
            "extend" => Ok(Operation::Extend),
            other => Err(JqpathError::ValueError(format!(
                "unsupported operation '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum JqpathError {
    #[error("Parsing error: {0}")]
    ParseError(String),
    #[error("Type mismatch at '{path}': expected {expected}, found {found}")]
    TypeMismatch {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Key not found: '{0}'")]
    KeyError(String),
    #[error("Index out of range: '{0}'")]
    IndexError(String),
    #[error("Invalid value: {0}")]
    ValueError(String),
    #[error("Maximum depth of {0} exceeded")]
    DepthExceeded(usize),
    #[error("Patch error: {0}")]
    PatchError(String),
}

impl From<json_patch::PatchError> for JqpathError {
    fn from(err: json_patch::PatchError) -> Self {
        JqpathError::PatchError(err.to_string())
    }
}

impl From<regex::Error> for JqpathError {
    fn from(err: regex::Error) -> Self {
        JqpathError::ValueError(err.to_string())
    }
}

pub type Result<T, E = JqpathError> = std::result::Result<T, E>;
