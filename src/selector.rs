use serde_json::Value;

use crate::types::{CompareOp, PathToken, Predicate, SelectorKey};
use crate::value::{compare_values, values_equal};

/// Evaluates a selector predicate against one key/index and its value.
///
/// Matching is total: unsupported type combinations simply do not match.
pub fn matches(key: SelectorKey<'_>, value: &Value, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Any => true,
        Predicate::Compare {
            key: field,
            op,
            literal,
        } => value
            .as_object()
            .and_then(|object| object.get(field))
            .is_some_and(|actual| compare(actual, *op, literal)),
        Predicate::DictMatch(expected) => dict_match(value, expected),
        Predicate::Slice(slice) => match key {
            SelectorKey::Index { index, len } => slice.contains(index, len),
            SelectorKey::Name(_) => false,
        },
        Predicate::Custom(custom) => custom.call(key, value),
    }
}

/// Children of `value` accepted by `predicate`, in insertion or index order.
/// Scalars have no children.
pub(crate) fn select(value: &Value, predicate: &Predicate) -> Vec<PathToken> {
    match value {
        Value::Object(map) => map
            .iter()
            .filter(|(key, child)| matches(SelectorKey::Name(key.as_str()), child, predicate))
            .map(|(key, _)| PathToken::Key(key.clone()))
            .collect(),
        Value::Array(items) => {
            let len = items.len();
            items
                .iter()
                .enumerate()
                .filter(|(index, child)| {
                    matches(SelectorKey::Index { index: *index, len }, child, predicate)
                })
                .map(|(index, _)| PathToken::Index(index))
                .collect()
        }
        _ => Vec::new(),
    }
}

fn compare(actual: &Value, op: CompareOp, literal: &Value) -> bool {
    let Some(ordering) = compare_values(actual, literal) else {
        return false;
    };
    match op {
        CompareOp::Eq => ordering.is_eq(),
        CompareOp::Ne => ordering.is_ne(),
        CompareOp::Gt => ordering.is_gt(),
        CompareOp::Lt => ordering.is_lt(),
        CompareOp::Ge => ordering.is_ge(),
        CompareOp::Le => ordering.is_le(),
    }
}

fn dict_match(value: &Value, expected: &serde_json::Map<String, Value>) -> bool {
    let Some(object) = value.as_object() else {
        return false;
    };
    expected.iter().all(|(key, want)| match (object.get(key), want) {
        (Some(have @ Value::Object(_)), Value::Object(nested)) => dict_match(have, nested),
        (Some(have), want) => values_equal(have, want),
        (None, _) => false,
    })
}
