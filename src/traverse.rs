use std::borrow::Cow;

use serde_json::{Map, Value};
use tracing::trace;

use crate::config::Options;
use crate::selector::select;
use crate::types::{to_pointer, JqpathError, Match, PathComponent, PathToken, Result};
use crate::value::kind_name;

/// Resolves a possibly negative index against an array of `len` elements.
pub(crate) fn resolve_index(index: i64, len: usize) -> Option<usize> {
    if index < 0 {
        len.checked_sub(index.unsigned_abs() as usize)
    } else {
        let index = index as usize;
        (index < len).then_some(index)
    }
}

/// Looks up a single concrete step.
pub(crate) fn lookup<'v>(value: &'v Value, token: &PathToken) -> Option<&'v Value> {
    match (value, token) {
        (Value::Object(map), PathToken::Key(key)) => map.get(key),
        (Value::Array(items), PathToken::Index(index)) => items.get(*index),
        _ => None,
    }
}

fn child<'a>(parent: &Cow<'a, Value>, token: &PathToken) -> Option<Cow<'a, Value>> {
    match parent {
        Cow::Borrowed(borrowed) => {
            let borrowed: &'a Value = borrowed;
            lookup(borrowed, token).map(Cow::Borrowed)
        }
        Cow::Owned(owned) => lookup(owned, token).cloned().map(Cow::Owned),
    }
}

struct Frame<'a> {
    value: Cow<'a, Value>,
    path: Vec<PathToken>,
    position: usize,
    depth: usize,
    /// Set when `value` is a slice of the array at `path`: element `i` of the
    /// slice is element `origin[i]` of that array.
    origin: Option<Vec<usize>>,
}

impl Frame<'_> {
    fn origin(&self, index: usize) -> usize {
        self.origin
            .as_ref()
            .and_then(|origin| origin.get(index).copied())
            .unwrap_or(index)
    }
}

/// Lazily applies a component sequence to a value, yielding matches
/// depth-first: objects in insertion order, arrays in index order.
///
/// The cursor keeps an explicit stack of pending branches; nothing is
/// evaluated until the next match is requested. Once exhausted (or after the
/// first error) it stays exhausted.
///
/// ## Example
///
/// ```rust
/// use jqpath::{parse, Options, Traversal};
/// use serde_json::json;
///
/// let doc = json!({"users": {"alice": {"age": 30}, "bob": {"age": 25}}});
/// let components = parse("users.*.age").unwrap();
///
/// let ages: Vec<_> = Traversal::new(&doc, &components, Options::default())
///     .map(|m| m.unwrap().into_value())
///     .collect();
/// assert_eq!(ages, vec![json!(30), json!(25)]);
/// ```
pub struct Traversal<'a> {
    components: &'a [PathComponent],
    options: Options,
    stack: Vec<Frame<'a>>,
    finished: bool,
}

impl<'a> Traversal<'a> {
    pub fn new(value: &'a Value, components: &'a [PathComponent], options: Options) -> Self {
        Self::nested(value, components, options, 0)
    }

    /// Starts a traversal that is itself part of an enclosing evaluation at `depth`.
    pub(crate) fn nested(
        value: &'a Value,
        components: &'a [PathComponent],
        options: Options,
        depth: usize,
    ) -> Self {
        Self {
            components,
            options,
            stack: vec![Frame {
                value: Cow::Borrowed(value),
                path: Vec::new(),
                position: 0,
                depth,
                origin: None,
            }],
            finished: false,
        }
    }

    fn push(&mut self, frame: &Frame<'a>, value: Cow<'a, Value>, step: Option<PathToken>) {
        let mut path = frame.path.clone();
        path.extend(step);
        self.stack.push(Frame {
            value,
            path,
            position: frame.position + 1,
            depth: frame.depth + 1,
            origin: None,
        });
    }

    /// Pushes the children named by `tokens` so that the first token is visited first.
    fn push_children(&mut self, frame: &Frame<'a>, tokens: Vec<PathToken>) {
        for token in tokens.into_iter().rev() {
            if let Some(value) = child(&frame.value, &token) {
                let step = match token {
                    PathToken::Index(index) => PathToken::Index(frame.origin(index)),
                    key => key,
                };
                self.push(frame, value, Some(step));
            }
        }
    }

    fn null_match(frame: Frame<'a>) -> Option<Match<'a>> {
        Some(Match {
            path: frame.path,
            value: Cow::Owned(Value::Null),
        })
    }

    fn mismatch(frame: &Frame<'a>, expected: &'static str) -> JqpathError {
        JqpathError::TypeMismatch {
            path: to_pointer(&frame.path).to_string(),
            expected,
            found: kind_name(&frame.value),
        }
    }

    fn missing_key(frame: &Frame<'a>, key: &str) -> JqpathError {
        let mut path = frame.path.clone();
        path.push(PathToken::Key(key.to_string()));
        let pointer = to_pointer(&path).to_string();
        trace!(path = %pointer, "strict traversal miss");
        JqpathError::KeyError(pointer)
    }

    fn step(&mut self, frame: Frame<'a>) -> Result<Option<Match<'a>>> {
        if frame.depth > self.options.max_depth {
            return Err(JqpathError::DepthExceeded(self.options.max_depth));
        }
        let components = self.components;
        let Some(component) = components.get(frame.position) else {
            return Ok(Some(Match {
                path: frame.path,
                value: frame.value,
            }));
        };
        let terminal = frame.position + 1 == components.len();
        let strict = self.options.strict && !component.is_optional();

        match component {
            PathComponent::Key(key) | PathComponent::OptionalKey(key) => match frame.value.as_ref() {
                Value::Object(map) if map.contains_key(key) => {
                    self.push_children(&frame, vec![PathToken::Key(key.clone())]);
                }
                Value::Object(_) if strict => {
                    return Err(Self::missing_key(&frame, key));
                }
                _ if strict => return Err(Self::mismatch(&frame, "object")),
                _ => {}
            },
            PathComponent::Index(index) | PathComponent::OptionalIndex(index) => {
                let resolved = match frame.value.as_ref() {
                    Value::Array(items) => Some(resolve_index(*index, items.len())),
                    _ => None,
                };
                match resolved {
                    Some(Some(i)) => self.push_children(&frame, vec![PathToken::Index(i)]),
                    _ if component.is_optional() && terminal => return Ok(Self::null_match(frame)),
                    Some(None) if strict => {
                        let pointer = format!("{}/{index}", to_pointer(&frame.path));
                        trace!(path = %pointer, "strict traversal miss");
                        return Err(JqpathError::IndexError(pointer));
                    }
                    None if strict => return Err(Self::mismatch(&frame, "array")),
                    _ => {}
                }
            }
            PathComponent::Wildcard
            | PathComponent::OptionalWildcard
            | PathComponent::ArrayWildcard
            | PathComponent::OptionalArrayWildcard => {
                let arrays_only = matches!(
                    component,
                    PathComponent::ArrayWildcard | PathComponent::OptionalArrayWildcard
                );
                let tokens = match frame.value.as_ref() {
                    Value::Object(map) if !arrays_only => {
                        map.keys().cloned().map(PathToken::Key).collect()
                    }
                    Value::Array(items) => (0..items.len()).map(PathToken::Index).collect(),
                    _ if strict => return Err(Self::mismatch(&frame, "array or object")),
                    _ => Vec::new(),
                };
                self.push_children(&frame, tokens);
            }
            PathComponent::Slice(slice) => match frame.value.as_ref() {
                Value::Array(items) => {
                    let picked = slice.indices(items.len());
                    let selected: Vec<Value> = picked.iter().map(|&i| items[i].clone()).collect();
                    let origin = picked.iter().map(|&i| frame.origin(i)).collect();
                    self.stack.push(Frame {
                        value: Cow::Owned(Value::Array(selected)),
                        path: frame.path.clone(),
                        position: frame.position + 1,
                        depth: frame.depth + 1,
                        origin: Some(origin),
                    });
                }
                _ if strict => return Err(Self::mismatch(&frame, "array")),
                _ => {}
            },
            PathComponent::Selector { predicate, .. } => {
                let tokens = match frame.value.as_ref() {
                    value @ (Value::Object(_) | Value::Array(_)) => select(value, predicate),
                    _ if strict => return Err(Self::mismatch(&frame, "array or object")),
                    _ => Vec::new(),
                };
                self.push_children(&frame, tokens);
            }
            PathComponent::Function { function, .. } => {
                let result = function.apply(&frame.value, &self.options, frame.depth)?;
                self.push(&frame, Cow::Owned(result), None);
            }
            PathComponent::Literal(literal) => {
                self.push(&frame, Cow::Borrowed(literal), None);
            }
            PathComponent::Construct(fields) => {
                let object = self.construct(&frame, fields)?;
                self.push(&frame, Cow::Owned(object), None);
            }
        }
        Ok(None)
    }

    fn construct(
        &self,
        frame: &Frame<'a>,
        fields: &[(String, Vec<PathComponent>)],
    ) -> Result<Value> {
        let options = self.options.with_only_first(false);
        let mut object = Map::new();
        for (name, path) in fields {
            let mut found = Traversal::nested(&frame.value, path, options, frame.depth + 1)
                .map(|m| m.map(Match::into_value))
                .collect::<Result<Vec<_>>>()?;
            let value = match found.len() {
                0 => Value::Null,
                1 => found.remove(0),
                _ => Value::Array(found),
            };
            object.insert(name.clone(), value);
        }
        Ok(Value::Object(object))
    }
}

impl<'a> Iterator for Traversal<'a> {
    type Item = Result<Match<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        while let Some(frame) = self.stack.pop() {
            match self.step(frame) {
                Ok(Some(found)) => {
                    if self.options.only_first {
                        self.finish();
                    }
                    return Some(Ok(found));
                }
                Ok(None) => {}
                Err(err) => {
                    self.finish();
                    return Some(Err(err));
                }
            }
        }
        self.finished = true;
        None
    }
}

impl Traversal<'_> {
    fn finish(&mut self) {
        self.finished = true;
        self.stack.clear();
    }
}
