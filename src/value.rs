//! Helpers over `serde_json::Value`: kind names, numeric-aware equality and
//! the orderings used by the built-in functions and selectors.

use std::cmp::Ordering;

use serde_json::{Number, Value};

/// The name `type` reports for a value.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Deep equality where numbers compare by numeric value (`1 == 1.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| values_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => a == b,
    }
}

/// Orders two values of the same comparable kind (number, string, bool).
/// Anything else is incomparable.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// String form used for joins and for ordering mixed-kind arrays. Strings are
/// taken verbatim, everything else is rendered as JSON.
pub fn display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Builds a JSON number, keeping integral results as integers.
pub fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// How a list of values is ordered by `sort`, `min`, `max` and `unique`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collation {
    /// All elements share one comparable kind.
    Natural,
    /// Mixed kinds: compare string representations.
    Textual,
}

impl Collation {
    pub fn for_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        let mut iter = values.into_iter();
        let Some(first) = iter.next() else {
            return Collation::Natural;
        };
        let comparable = matches!(first, Value::Number(_) | Value::String(_) | Value::Bool(_));
        if comparable && iter.all(|v| std::mem::discriminant(v) == std::mem::discriminant(first)) {
            Collation::Natural
        } else {
            Collation::Textual
        }
    }

    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match self {
            Collation::Natural => match (a, b) {
                (Value::Number(x), Value::Number(y)) => {
                    let x = x.as_f64().unwrap_or(f64::NAN);
                    let y = y.as_f64().unwrap_or(f64::NAN);
                    x.total_cmp(&y)
                }
                _ => compare_values(a, b).unwrap_or(Ordering::Equal),
            },
            Collation::Textual => display_string(a).cmp(&display_string(b)),
        }
    }
}

/// Parses a literal written in an expression: JSON first, then a
/// single-quoted string, and finally the bare text as a string.
pub fn parse_literal(text: &str) -> Value {
    let text = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(text) {
        return value;
    }
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        return Value::String(text[1..text.len() - 1].replace("\\'", "'"));
    }
    Value::String(text.to_string())
}
