//! Built-in functions usable as path segments (`items.length`, `tags.join(", ")`).
//!
//! Every function is total over its input: a value of the wrong kind yields
//! `null` rather than an error. Only recursion past the configured depth fails.

use std::cmp::Ordering;

use serde_json::Value;

use crate::config::Options;
use crate::traverse::Traversal;
use crate::types::{ArithOp, Function, JqpathError, MapExpr, PathsFilter, Result};
use crate::value::{display_string, kind_name, number_value, values_equal, Collation};

impl Function {
    /// Applies the function to `value`. `depth` is the recursion depth of the
    /// caller and counts against `options.max_depth`.
    pub fn apply(&self, value: &Value, options: &Options, depth: usize) -> Result<Value> {
        let result = match self {
            Function::Keys => keys(value),
            Function::Length => length(value),
            Function::Type => Value::from(kind_name(value)),
            Function::Has(key) => Value::Bool(has(value, key)),
            Function::Map(expr) => map_elements(value, expr, options, depth)?,
            Function::Paths(filter) => paths(value, *filter, options, depth)?,
            Function::Split(separator) => split(value, separator),
            Function::Join(separator) => join(value, separator),
            Function::Lowercase => map_str(value, str::to_lowercase),
            Function::Uppercase => map_str(value, str::to_uppercase),
            Function::Trim => map_str(value, |s| s.trim().to_string()),
            Function::StartsWith(prefix) => test_str(value, |s| s.starts_with(prefix.as_str())),
            Function::EndsWith(suffix) => test_str(value, |s| s.ends_with(suffix.as_str())),
            Function::Contains(needle) => contains(value, needle),
            Function::Add => add(value),
            Function::Min => extremum(value, Ordering::Less),
            Function::Max => extremum(value, Ordering::Greater),
            Function::Sort => sort(value),
            Function::Reverse => reverse(value),
            Function::Unique => unique(value),
            Function::Flatten(limit) => match value {
                Value::Array(items) => {
                    let mut out = Vec::new();
                    flatten_into(items, limit.unwrap_or(usize::MAX), &mut out, options, depth)?;
                    Value::Array(out)
                }
                _ => Value::Null,
            },
        };
        Ok(result)
    }
}

fn keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            Value::Array(keys.into_iter().map(|k| Value::String(k.clone())).collect())
        }
        Value::Array(items) => Value::Array((0..items.len()).map(Value::from).collect()),
        _ => Value::Null,
    }
}

fn length(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::from(map.len()),
        Value::Array(items) => Value::from(items.len()),
        Value::String(s) => Value::from(s.chars().count()),
        Value::Null => Value::from(0),
        _ => Value::Null,
    }
}

fn has(value: &Value, key: &Value) -> bool {
    match (value, key) {
        (Value::Object(map), Value::String(key)) => map.contains_key(key),
        (Value::Array(items), key) => key
            .as_i64()
            .is_some_and(|i| i >= 0 && (i as usize) < items.len()),
        _ => false,
    }
}

fn map_elements(value: &Value, expr: &MapExpr, options: &Options, depth: usize) -> Result<Value> {
    let Value::Array(items) = value else {
        return Ok(Value::Null);
    };
    let mapped = items
        .iter()
        .map(|item| match expr {
            MapExpr::Arithmetic { op, operand } => Ok(match item.as_f64() {
                Some(n) => number_value(match op {
                    ArithOp::Mul => n * operand,
                    ArithOp::Add => n + operand,
                }),
                None => Value::Null,
            }),
            MapExpr::Path(path) => Traversal::nested(item, path, *options, depth + 1)
                .next()
                .transpose()
                .map(|found| found.map(|m| m.into_value()).unwrap_or(Value::Null)),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(mapped))
}

fn paths(
    value: &Value,
    filter: Option<PathsFilter>,
    options: &Options,
    depth: usize,
) -> Result<Value> {
    let mut out = Vec::new();
    let mut prefix = Vec::new();
    collect_paths(value, filter, &mut prefix, &mut out, options, depth)?;
    Ok(Value::Array(out))
}

fn collect_paths(
    value: &Value,
    filter: Option<PathsFilter>,
    prefix: &mut Vec<Value>,
    out: &mut Vec<Value>,
    options: &Options,
    depth: usize,
) -> Result<()> {
    if depth > options.max_depth {
        return Err(JqpathError::DepthExceeded(options.max_depth));
    }
    let children: Vec<(Value, &Value)> = match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| (Value::String(k.clone()), v))
            .collect(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (Value::from(i), v))
            .collect(),
        _ => return Ok(()),
    };
    for (step, child) in children {
        prefix.push(step);
        let accepted = match filter {
            None => true,
            Some(PathsFilter::Objects) => child.is_object(),
            Some(PathsFilter::Arrays) => child.is_array(),
            Some(PathsFilter::Scalars) => !child.is_object() && !child.is_array(),
        };
        if accepted {
            out.push(Value::Array(prefix.clone()));
        }
        collect_paths(child, filter, prefix, out, options, depth + 1)?;
        prefix.pop();
    }
    Ok(())
}

fn map_str(value: &Value, f: impl Fn(&str) -> String) -> Value {
    value
        .as_str()
        .map(|s| Value::String(f(s)))
        .unwrap_or(Value::Null)
}

fn test_str(value: &Value, f: impl Fn(&str) -> bool) -> Value {
    value
        .as_str()
        .map(|s| Value::Bool(f(s)))
        .unwrap_or(Value::Null)
}

fn split(value: &Value, separator: &str) -> Value {
    let Some(s) = value.as_str() else {
        return Value::Null;
    };
    let parts: Vec<Value> = if separator.is_empty() {
        s.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        s.split(separator)
            .map(|part| Value::String(part.to_string()))
            .collect()
    };
    Value::Array(parts)
}

fn join(value: &Value, separator: &str) -> Value {
    let Value::Array(items) = value else {
        return Value::Null;
    };
    if items.iter().any(|v| v.is_array() || v.is_object()) {
        return Value::Null;
    }
    let parts: Vec<String> = items
        .iter()
        .map(|v| match v {
            Value::Null => String::new(),
            other => display_string(other),
        })
        .collect();
    Value::String(parts.join(separator))
}

fn contains(value: &Value, needle: &Value) -> Value {
    match (value, needle) {
        (Value::String(s), Value::String(n)) => Value::Bool(s.contains(n.as_str())),
        (Value::Array(items), needle) => {
            Value::Bool(items.iter().any(|item| values_equal(item, needle)))
        }
        (Value::Object(map), Value::String(key)) => Value::Bool(map.contains_key(key)),
        _ => Value::Null,
    }
}

fn add(value: &Value) -> Value {
    let Value::Array(items) = value else {
        return Value::Null;
    };
    let Some(first) = items.first() else {
        return Value::Null;
    };
    let uniform = items
        .iter()
        .all(|v| std::mem::discriminant(v) == std::mem::discriminant(first));
    if !uniform {
        return Value::Null;
    }
    match first {
        Value::Number(_) => {
            let integers: Option<Vec<i64>> = items.iter().map(Value::as_i64).collect();
            match integers.and_then(|ints| ints.into_iter().try_fold(0i64, i64::checked_add)) {
                Some(sum) => Value::from(sum),
                None => number_value(items.iter().filter_map(Value::as_f64).sum()),
            }
        }
        Value::String(_) => Value::String(items.iter().filter_map(Value::as_str).collect()),
        Value::Array(_) => Value::Array(
            items
                .iter()
                .filter_map(Value::as_array)
                .flatten()
                .cloned()
                .collect(),
        ),
        _ => Value::Null,
    }
}

fn extremum(value: &Value, want: Ordering) -> Value {
    let Value::Array(items) = value else {
        return Value::Null;
    };
    let collation = Collation::for_values(items);
    let found = match want {
        Ordering::Greater => items.iter().max_by(|a, b| collation.compare(a, b)),
        _ => items.iter().min_by(|a, b| collation.compare(a, b)),
    };
    found.cloned().unwrap_or(Value::Null)
}

fn sort(value: &Value) -> Value {
    let Value::Array(items) = value else {
        return Value::Null;
    };
    let collation = Collation::for_values(items);
    let mut sorted = items.clone();
    sorted.sort_by(|a, b| collation.compare(a, b));
    Value::Array(sorted)
}

fn reverse(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().rev().cloned().collect()),
        Value::String(s) => Value::String(s.chars().rev().collect()),
        _ => Value::Null,
    }
}

fn unique(value: &Value) -> Value {
    let Value::Array(items) = value else {
        return Value::Null;
    };
    let mut seen: Vec<Value> = Vec::with_capacity(items.len());
    for item in items {
        if !seen.iter().any(|s| values_equal(s, item)) {
            seen.push(item.clone());
        }
    }
    Value::Array(seen)
}

fn flatten_into(
    items: &[Value],
    levels: usize,
    out: &mut Vec<Value>,
    options: &Options,
    depth: usize,
) -> Result<()> {
    if depth > options.max_depth {
        return Err(JqpathError::DepthExceeded(options.max_depth));
    }
    for item in items {
        match item {
            Value::Array(inner) if levels > 0 => {
                flatten_into(inner, levels - 1, out, options, depth + 1)?
            }
            other => out.push(other.clone()),
        }
    }
    Ok(())
}
