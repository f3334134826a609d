//! Conversion between nested values and flat maps of compound keys
//! (`{"a": {"b": [1]}}` <-> `{"a.b.0": 1}`).

use serde_json::{Map, Value};
use tracing::trace;

use crate::config::Options;
use crate::types::{JqpathError, Result};

/// Flattens `value` into compound keys joined by the configured separator.
///
/// Leaves and empty containers become entries. A scalar or empty-array root is
/// stored under the empty key; an empty object root flattens to an empty map.
pub fn flatten_with(value: &Value, options: &Options) -> Map<String, Value> {
    let separator = options.separator.as_char();
    let mut out = Map::new();
    match value {
        Value::Object(map) if map.is_empty() => return out,
        Value::Object(_) => {}
        Value::Array(items) if !items.is_empty() => {}
        root => {
            out.insert(String::new(), root.clone());
            return out;
        }
    }

    let mut stack: Vec<(Option<String>, &Value)> = vec![(None, value)];
    while let Some((prefix, node)) = stack.pop() {
        let children: Vec<(String, &Value)> = match node {
            Value::Object(map) if !map.is_empty() => {
                map.iter().map(|(k, v)| (k.clone(), v)).collect()
            }
            Value::Array(items) if !items.is_empty() => items
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
            leaf => {
                if let Some(key) = prefix {
                    out.insert(key, leaf.clone());
                }
                continue;
            }
        };
        for (segment, child) in children.into_iter().rev() {
            let key = match &prefix {
                Some(prefix) => format!("{prefix}{separator}{segment}"),
                None => segment,
            };
            stack.push((Some(key), child));
        }
    }
    out
}

/// Rebuilds the nested value described by a flat map; the inverse of
/// [`flatten_with`].
///
/// Keys are grouped by their first segment in insertion order. A group whose
/// segments are all non-negative integers becomes an array, padded with
/// `null` where indices are missing. A key that is both a leaf and the prefix
/// of another key is a `ValueError`.
pub fn unflatten_with(flat: &Map<String, Value>, options: &Options) -> Result<Value> {
    if let Some(root) = flat.get("") {
        if flat.len() == 1 {
            return Ok(root.clone());
        }
        return Err(JqpathError::ValueError(
            "the empty key holds the root and cannot be combined with other keys".to_string(),
        ));
    }
    let entries: Vec<(&str, &Value)> = flat.iter().map(|(k, v)| (k.as_str(), v)).collect();
    build(&entries, "", options, 0)
}

type Group<'m> = (&'m str, Vec<(Option<&'m str>, &'m Value)>);

fn build(
    entries: &[(&str, &Value)],
    prefix: &str,
    options: &Options,
    depth: usize,
) -> Result<Value> {
    if depth > options.max_depth {
        return Err(JqpathError::DepthExceeded(options.max_depth));
    }
    let separator = options.separator.as_char();

    let mut groups: Vec<Group<'_>> = Vec::new();
    for &(key, value) in entries {
        let (head, rest) = match key.split_once(separator) {
            Some((head, rest)) => (head, Some(rest)),
            None => (key, None),
        };
        match groups.iter_mut().find(|(name, _)| *name == head) {
            Some((_, members)) => members.push((rest, value)),
            None => groups.push((head, vec![(rest, value)])),
        }
    }

    let mut children = Vec::with_capacity(groups.len());
    for (head, members) in &groups {
        let path = if prefix.is_empty() {
            head.to_string()
        } else {
            format!("{prefix}{separator}{head}")
        };
        let child = match members.as_slice() {
            [(None, leaf)] => (*leaf).clone(),
            members if members.iter().any(|(rest, _)| rest.is_none()) => {
                return Err(JqpathError::ValueError(format!(
                    "'{path}' is both a value and a prefix of other keys"
                )));
            }
            members => {
                let nested: Vec<(&str, &Value)> = members
                    .iter()
                    .filter_map(|&(rest, value)| rest.map(|rest| (rest, value)))
                    .collect();
                build(&nested, &path, options, depth + 1)?
            }
        };
        children.push((*head, child));
    }

    let indices: Option<Vec<usize>> = children
        .iter()
        .map(|(head, _)| array_index(head))
        .collect();
    match indices {
        Some(indices) if !indices.is_empty() => {
            let max = indices.iter().copied().max().unwrap_or(0);
            // Segments are distinct, so `max` is at least `indices.len() - 1`.
            let padding = max - (indices.len() - 1);
            if padding > options.max_padding {
                return Err(JqpathError::ValueError(format!(
                    "'{prefix}' would need {padding} null elements, more than the limit of {}",
                    options.max_padding
                )));
            }
            let len = max + 1;
            trace!(prefix, len, "rebuilding array");
            let mut items = vec![Value::Null; len];
            for (index, (_, child)) in indices.into_iter().zip(children) {
                items[index] = child;
            }
            Ok(Value::Array(items))
        }
        _ => Ok(Value::Object(
            children
                .into_iter()
                .map(|(head, child)| (head.to_string(), child))
                .collect(),
        )),
    }
}

/// A segment that names an array slot: digits only, no leading zeros.
fn array_index(segment: &str) -> Option<usize> {
    segment
        .parse::<usize>()
        .ok()
        .filter(|index| index.to_string() == segment)
}
