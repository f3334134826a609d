//! Copy-on-write mutation: every operation borrows the input tree and returns
//! a new root.
//!
//! Edits are first resolved to concrete locations, then compiled into a JSON
//! Patch and applied to a clone of the root in one step.

use json_patch::{AddOperation, PatchOperation, RemoveOperation, ReplaceOperation};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Options;
use crate::selector::select;
use crate::traverse::{lookup, resolve_index, Traversal};
use crate::types::{
    render_path, to_pointer, JqpathError, Operation, PathComponent, PathToken, Result,
};
use crate::value::kind_name;

/// Sets `value` at every location `components` resolves to.
///
/// With no matching location, a path made only of keys and indices is created
/// when `create_missing` is set (intermediate containers are inferred from the
/// following component, arrays are padded with `null`) and reported as a
/// `KeyError`, `IndexError` or `TypeMismatch` otherwise. Any other path with
/// no matches leaves the tree unchanged.
pub fn set(
    root: &Value,
    components: &[PathComponent],
    value: Value,
    create_missing: bool,
    operation: Operation,
    options: &Options,
) -> Result<Value> {
    ensure_addressable(components)?;
    let candidates = expand(root, components, true, options)?;
    debug!(
        path = %render_path(components),
        candidates = candidates.len(),
        %operation,
        "resolved set targets"
    );

    if candidates.is_empty() {
        if !components.iter().all(PathComponent::is_concrete) {
            return Ok(root.clone());
        }
        if !create_missing {
            return Err(resolve_concrete(root, components)
                .err()
                .unwrap_or_else(|| JqpathError::KeyError(render_path(components))));
        }
        return create(root, components, value, operation, options);
    }

    let mut ops = Vec::with_capacity(candidates.len());
    for path in candidates {
        let existing = lookup_path(root, &path);
        let new_value = apply_operation(existing, value.clone(), operation)?;
        let path = to_pointer(&path);
        ops.push(match existing {
            Some(_) => PatchOperation::Replace(ReplaceOperation {
                path,
                value: new_value,
            }),
            None => PatchOperation::Add(AddOperation {
                path,
                value: new_value,
            }),
        });
    }
    apply(root, &ops)
}

/// Removes every location `components` resolves to.
///
/// A path made only of keys and indices must exist unless `tolerant` is set
/// or one of its components is optional. Other paths remove whatever
/// currently matches, which may be nothing.
pub fn delete(
    root: &Value,
    components: &[PathComponent],
    tolerant: bool,
    options: &Options,
) -> Result<Value> {
    ensure_addressable(components)?;
    if components.is_empty() {
        return Err(JqpathError::ValueError("cannot delete the root".to_string()));
    }

    let mut targets = if components.iter().all(PathComponent::is_concrete) {
        match resolve_concrete(root, components) {
            Ok(path) => vec![path],
            Err(_) if tolerant || components.iter().any(PathComponent::is_optional) => {
                debug!(path = %render_path(components), "nothing to delete");
                return Ok(root.clone());
            }
            Err(err) => return Err(err),
        }
    } else {
        expand(root, components, false, options)?
    };

    // Descending, so no removal shifts an index that is still pending.
    targets.sort();
    targets.dedup();
    targets.reverse();
    debug!(
        path = %render_path(components),
        targets = targets.len(),
        "resolved delete targets"
    );

    let ops: Vec<PatchOperation> = targets
        .iter()
        .map(|path| {
            PatchOperation::Remove(RemoveOperation {
                path: to_pointer(path),
            })
        })
        .collect();
    apply(root, &ops)
}

/// Applies several sets in order, stopping at the first error.
pub fn batch_set<I>(root: &Value, assignments: I, options: &Options) -> Result<Value>
where
    I: IntoIterator<Item = (Vec<PathComponent>, Value)>,
{
    let mut current = root.clone();
    for (components, value) in assignments {
        current = set(
            &current,
            &components,
            value,
            options.create_missing,
            Operation::Set,
            options,
        )?;
    }
    Ok(current)
}

/// Copies the first match of `source_path` in `source` to `target_path` in
/// `target`, falling back to `default`. Without either, `target` is returned
/// unchanged.
pub fn copy_path(
    source: &Value,
    target: &Value,
    source_path: &[PathComponent],
    target_path: &[PathComponent],
    default: Option<Value>,
    options: &Options,
) -> Result<Value> {
    let found = Traversal::new(source, source_path, options.with_only_first(true))
        .next()
        .transpose()?
        .map(|m| m.into_value())
        .or(default);
    match found {
        Some(value) => set(
            target,
            target_path,
            value,
            options.create_missing,
            Operation::Set,
            options,
        ),
        None => Ok(target.clone()),
    }
}

/// Deep-merges `overlay` into a copy of `base`.
///
/// Objects merge key by key; anything else in `overlay`, arrays included,
/// replaces what `base` holds.
pub fn merge(base: &Value, overlay: &Value, options: &Options) -> Result<Value> {
    let mut merged = base.clone();
    merge_json(&mut merged, overlay, 0, options.max_depth)?;
    Ok(merged)
}

fn merge_json(a: &mut Value, b: &Value, depth: usize, max_depth: usize) -> Result<()> {
    if depth > max_depth {
        return Err(JqpathError::DepthExceeded(max_depth));
    }
    match (a, b) {
        (Value::Object(a_map), Value::Object(b_map)) => {
            for (k, v) in b_map {
                match a_map.get_mut(k) {
                    Some(existing) => merge_json(existing, v, depth + 1, max_depth)?,
                    None => {
                        a_map.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        (a, b_value) => *a = b_value.clone(),
    }
    Ok(())
}

fn apply(root: &Value, ops: &[PatchOperation]) -> Result<Value> {
    let mut updated = root.clone();
    json_patch::patch(&mut updated, ops)?;
    Ok(updated)
}

fn ensure_addressable(components: &[PathComponent]) -> Result<()> {
    match components.iter().find(|c| !c.is_addressable()) {
        Some(component) => Err(JqpathError::ValueError(format!(
            "'{component}' does not address a location and cannot be modified"
        ))),
        None => Ok(()),
    }
}

fn apply_operation(existing: Option<&Value>, value: Value, operation: Operation) -> Result<Value> {
    match operation {
        Operation::Set => Ok(value),
        Operation::Append => Ok(match existing {
            Some(Value::Array(items)) => {
                let mut items = items.clone();
                items.push(value);
                Value::Array(items)
            }
            None | Some(Value::Null) => Value::Array(vec![value]),
            Some(other) => Value::Array(vec![other.clone(), value]),
        }),
        Operation::Extend => {
            let Value::Array(extra) = value else {
                return Err(JqpathError::ValueError(format!(
                    "extend requires an array, got {}",
                    kind_name(&value)
                )));
            };
            Ok(match existing {
                Some(Value::Array(items)) => {
                    let mut items = items.clone();
                    items.extend(extra);
                    Value::Array(items)
                }
                None | Some(Value::Null) => Value::Array(extra),
                Some(other) => {
                    let mut items = vec![other.clone()];
                    items.extend(extra);
                    Value::Array(items)
                }
            })
        }
    }
}

fn lookup_path<'v>(root: &'v Value, path: &[PathToken]) -> Option<&'v Value> {
    path.iter().try_fold(root, |node, token| lookup(node, token))
}

/// Resolves every location the components name in the current tree.
///
/// With `include_absent`, a terminal key on an existing object is a location
/// even when the key is not there yet. A slice followed by more components
/// narrows the array the rest of the path sees, as it does when reading.
fn expand(
    root: &Value,
    components: &[PathComponent],
    include_absent: bool,
    options: &Options,
) -> Result<Vec<Vec<PathToken>>> {
    if components.len() > options.max_depth {
        return Err(JqpathError::DepthExceeded(options.max_depth));
    }
    let Some((last, init)) = components.split_last() else {
        return Ok(vec![Vec::new()]);
    };
    let mut frontier = vec![Reached {
        path: Vec::new(),
        node: root,
        origin: None,
    }];

    for component in init {
        let mut next = Vec::new();
        for reached in frontier {
            if let (PathComponent::Slice(slice), Value::Array(items)) = (component, reached.node) {
                let len = reached.origin.as_ref().map_or(items.len(), Vec::len);
                let origin = slice
                    .indices(len)
                    .into_iter()
                    .map(|i| reached.index(i))
                    .collect();
                next.push(Reached {
                    origin: Some(origin),
                    ..reached
                });
                continue;
            }
            for token in reached.tokens(component) {
                if let Some(child) = lookup(reached.node, &token) {
                    let mut path = reached.path.clone();
                    path.push(token);
                    next.push(Reached {
                        path,
                        node: child,
                        origin: None,
                    });
                }
            }
        }
        frontier = next;
    }

    let mut candidates = Vec::new();
    for reached in frontier {
        let mut tokens = reached.tokens(last);
        if tokens.is_empty() && include_absent {
            if let (PathComponent::Key(key) | PathComponent::OptionalKey(key), Value::Object(_)) =
                (last, reached.node)
            {
                tokens.push(PathToken::Key(key.clone()));
            }
        }
        candidates.extend(tokens.into_iter().map(|token| {
            let mut candidate = reached.path.clone();
            candidate.push(token);
            candidate
        }));
    }
    Ok(candidates)
}

/// A node reached while expanding a path.
struct Reached<'v> {
    path: Vec<PathToken>,
    node: &'v Value,
    /// Set after a slice: the path continues on these elements of `node` only.
    origin: Option<Vec<usize>>,
}

impl Reached<'_> {
    fn index(&self, index: usize) -> usize {
        self.origin
            .as_ref()
            .and_then(|origin| origin.get(index).copied())
            .unwrap_or(index)
    }

    /// Children addressed by `component`, as tokens into `node`.
    fn tokens(&self, component: &PathComponent) -> Vec<PathToken> {
        let tokens = match (&self.origin, self.node) {
            (Some(origin), Value::Array(items)) => {
                let view = Value::Array(
                    origin
                        .iter()
                        .filter_map(|&i| items.get(i).cloned())
                        .collect(),
                );
                children(&view, component)
            }
            _ => children(self.node, component),
        };
        tokens
            .into_iter()
            .map(|token| match token {
                PathToken::Index(index) => PathToken::Index(self.index(index)),
                key => key,
            })
            .collect()
    }
}

/// Existing children of `node` addressed by one component.
fn children(node: &Value, component: &PathComponent) -> Vec<PathToken> {
    match (component, node) {
        (PathComponent::Key(key) | PathComponent::OptionalKey(key), Value::Object(map))
            if map.contains_key(key) =>
        {
            vec![PathToken::Key(key.clone())]
        }
        (PathComponent::Index(index) | PathComponent::OptionalIndex(index), Value::Array(items)) => {
            resolve_index(*index, items.len())
                .map(PathToken::Index)
                .into_iter()
                .collect()
        }
        (PathComponent::Wildcard | PathComponent::OptionalWildcard, Value::Object(map)) => {
            map.keys().cloned().map(PathToken::Key).collect()
        }
        (
            PathComponent::Wildcard
            | PathComponent::OptionalWildcard
            | PathComponent::ArrayWildcard
            | PathComponent::OptionalArrayWildcard,
            Value::Array(items),
        ) => (0..items.len()).map(PathToken::Index).collect(),
        (PathComponent::Slice(slice), Value::Array(items)) => slice
            .indices(items.len())
            .into_iter()
            .map(PathToken::Index)
            .collect(),
        (PathComponent::Selector { predicate, .. }, node) => select(node, predicate),
        _ => Vec::new(),
    }
}

/// Walks a key/index path and reports the first step that does not exist.
fn resolve_concrete(root: &Value, components: &[PathComponent]) -> Result<Vec<PathToken>> {
    let mut path = Vec::with_capacity(components.len());
    let mut node = root;
    for component in components {
        let token = match (component, node) {
            (PathComponent::Key(key) | PathComponent::OptionalKey(key), Value::Object(map)) => {
                if !map.contains_key(key) {
                    path.push(PathToken::Key(key.clone()));
                    return Err(JqpathError::KeyError(to_pointer(&path).to_string()));
                }
                PathToken::Key(key.clone())
            }
            (PathComponent::Index(index) | PathComponent::OptionalIndex(index), Value::Array(items)) => {
                match resolve_index(*index, items.len()) {
                    Some(i) => PathToken::Index(i),
                    None => {
                        return Err(JqpathError::IndexError(format!(
                            "{}/{index}",
                            to_pointer(&path)
                        )))
                    }
                }
            }
            (component, node) => {
                let expected = match component {
                    PathComponent::Key(_) | PathComponent::OptionalKey(_) => "object",
                    _ => "array",
                };
                return Err(JqpathError::TypeMismatch {
                    path: to_pointer(&path).to_string(),
                    expected,
                    found: kind_name(node),
                });
            }
        };
        node = match lookup(node, &token) {
            Some(child) => child,
            None => return Err(JqpathError::KeyError(to_pointer(&path).to_string())),
        };
        path.push(token);
    }
    Ok(path)
}

/// Builds the missing tail of a key/index path and writes `value` at its end.
///
/// The deepest existing ancestor is rebuilt and swapped in with a single
/// replace, so a scalar standing where a container is needed is overwritten.
fn create(
    root: &Value,
    components: &[PathComponent],
    value: Value,
    operation: Operation,
    options: &Options,
) -> Result<Value> {
    let mut prefix = Vec::new();
    let mut node = root;
    let mut rest = components;
    while let Some((component, tail)) = rest.split_first() {
        let token = match (component, node) {
            (PathComponent::Key(key) | PathComponent::OptionalKey(key), Value::Object(map))
                if map.contains_key(key) =>
            {
                PathToken::Key(key.clone())
            }
            (PathComponent::Index(index) | PathComponent::OptionalIndex(index), Value::Array(items)) => {
                match resolve_index(*index, items.len()) {
                    Some(i) => PathToken::Index(i),
                    None => break,
                }
            }
            _ => break,
        };
        match lookup(node, &token) {
            Some(child) => node = child,
            None => break,
        }
        prefix.push(token);
        rest = tail;
    }

    let missing = rest
        .iter()
        .map(|component| match component {
            PathComponent::Key(key) | PathComponent::OptionalKey(key) => {
                Ok(PathToken::Key(key.clone()))
            }
            PathComponent::Index(index) | PathComponent::OptionalIndex(index) if *index >= 0 => {
                Ok(PathToken::Index(*index as usize))
            }
            PathComponent::Index(index) | PathComponent::OptionalIndex(index) => {
                Err(JqpathError::IndexError(format!(
                    "{}/{index}: negative indices cannot be created",
                    to_pointer(&prefix)
                )))
            }
            other => Err(JqpathError::ValueError(format!(
                "'{other}' cannot be created"
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    check_padding(node, &prefix, &missing, options.max_padding)?;

    debug!(
        at = %to_pointer(&prefix),
        missing = missing.len(),
        "creating missing path"
    );
    let mut rebuilt = node.clone();
    insert_value(&mut rebuilt, &missing, apply_operation(None, value, operation)?);
    apply(
        root,
        &[PatchOperation::Replace(ReplaceOperation {
            path: to_pointer(&prefix),
            value: rebuilt,
        })],
    )
}

/// Rejects a missing tail whose indices would pad an array with more than
/// `max_padding` nulls.
fn check_padding(
    node: &Value,
    prefix: &[PathToken],
    missing: &[PathToken],
    max_padding: usize,
) -> Result<()> {
    // Only the first missing step can land in an existing array.
    let mut len = node.as_array().map_or(0, Vec::len);
    for (i, token) in missing.iter().enumerate() {
        if let PathToken::Index(index) = token {
            if index.saturating_sub(len) > max_padding {
                let mut path = prefix.to_vec();
                path.extend_from_slice(&missing[..=i]);
                return Err(JqpathError::IndexError(format!(
                    "{}: more than {max_padding} missing elements",
                    to_pointer(&path)
                )));
            }
        }
        len = 0;
    }
    Ok(())
}

/// Writes `value` at `tokens` below `node`, turning whatever stands in the
/// way into the container the next token needs.
fn insert_value(node: &mut Value, tokens: &[PathToken], value: Value) {
    let Some((first, rest)) = tokens.split_first() else {
        *node = value;
        return;
    };
    match first {
        PathToken::Key(key) => {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            if let Value::Object(map) = node {
                let entry = map.entry(key.clone()).or_insert(Value::Null);
                insert_value(entry, rest, value);
            }
        }
        PathToken::Index(index) => {
            if !node.is_array() {
                *node = Value::Array(Vec::new());
            }
            if let Value::Array(items) = node {
                if *index >= items.len() {
                    items.resize(*index + 1, Value::Null);
                }
                insert_value(&mut items[*index], rest, value);
            }
        }
    }
}

