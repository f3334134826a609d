//! Invariants that hold across the read, write, search and reshape operations.

use jqpath::{delete, find_paths, flatten, get, has, set, unflatten, PathToken, SearchOptions};
use serde_json::{json, Value};
use yare::parameterized;

fn leaves(value: &Value) -> Vec<Value> {
    match value {
        Value::Object(map) if !map.is_empty() => map.values().flat_map(leaves).collect(),
        Value::Array(items) if !items.is_empty() => items.iter().flat_map(leaves).collect(),
        other => vec![other.clone()],
    }
}

fn size(value: &Value) -> usize {
    1 + match value {
        Value::Object(map) => map.values().map(size).sum(),
        Value::Array(items) => items.iter().map(size).sum(),
        _ => 0,
    }
}

#[parameterized(
    flat_object = { json!({"a": 1, "b": 2}), "*" },
    two_levels = { json!({"a": {"x": 1, "y": 2}, "b": {"z": 3}}), "*.*" },
    arrays = { json!([[1, 2], [3], [4, 5, 6]]), "[*][*]" },
    mixed = { json!({"a": [1, 2], "b": {"c": 3, "d": 4}}), "*.*" },
)]
fn test_wildcard_paths_visit_every_leaf_in_order(value: Value, path: &str) {
    assert_eq!(get(&value, path).unwrap(), leaves(&value));
}

#[parameterized(
    nested = { json!({"a": {"b": [1, 2]}}) },
    empty_containers = { json!({"x": {"y": {}}, "z": [[], {}]}) },
    records = { json!({"users": [{"name": "ann", "tags": ["a"]}, {"name": "bob", "tags": []}]}) },
)]
fn test_flatten_round_trip(value: Value) {
    assert_eq!(unflatten(&flatten(&value)).unwrap(), value);
}

#[parameterized(
    new_key = { json!({}), "a" },
    deep_new_path = { json!({"a": 1}), "b.c[3].d" },
    existing_index = { json!({"a": [1, 2, 3]}), "a[1]" },
    negative_index = { json!({"a": [1, 2, 3]}), "a[-1]" },
    quoted = { json!({}), r#"["x.y"].z"# },
)]
fn test_set_then_get(value: Value, path: &str) {
    let new_value = json!({"marker": [true]});
    let updated = set(&value, path, new_value.clone()).unwrap();
    assert_eq!(get(&updated, path).unwrap(), vec![new_value]);
}

#[parameterized(
    key = { json!({"a": {"b": 1}}), "a.b" },
    index = { json!({"a": [1]}), "a[0]" },
    top_level = { json!({"a": 1, "b": 2}), "b" },
)]
fn test_delete_then_has(value: Value, path: &str) {
    assert!(has(&value, path).unwrap());
    let updated = delete(&value, path).unwrap();
    assert!(!has(&updated, path).unwrap());
}

#[parameterized(
    object_wildcard = { json!({"u": {"a": {"k": 1}, "b": {"k": 2}, "c": {}}}), "u.*.k" },
    array_wildcard = { json!({"l": [1, 2, 3]}), "l[*]" },
    selector = { json!({"l": [{"v": 1}, {"v": 6}, {"v": 9}]}), "l[?(@.v > 5)]" },
)]
fn test_wildcard_delete_removes_every_match(value: Value, path: &str) {
    let matches = get(&value, path).unwrap();
    let updated = delete(&value, path).unwrap();
    assert!(!matches.is_empty());
    assert!(get(&updated, path).unwrap().is_empty());
    assert_eq!(
        size(&value) - size(&updated),
        matches.iter().map(size).sum::<usize>(),
        "removed nodes"
    );
}

#[test]
fn test_negative_index_counts_from_the_end() {
    let value = json!({"items": ["a", "b", "c"]});
    let len = value["items"].as_array().map_or(0, Vec::len);
    assert_eq!(
        get(&value, "items[-1]").unwrap(),
        get(&value, &format!("items[{}]", len - 1)).unwrap()
    );
}

#[test]
fn test_documented_examples() {
    assert_eq!(get(&json!([1, 2, 3, 4, 5]), "[1:3]").unwrap(), vec![json!([2, 3])]);
    assert_eq!(
        get(
            &json!({"users": {"alice": {"age": 30}, "bob": {"age": 25}}}),
            "users.*.age"
        )
        .unwrap(),
        vec![json!(30), json!(25)]
    );
    assert_eq!(
        Value::Object(flatten(&json!({"a": {"b": [1, 2]}}))),
        json!({"a.b.0": 1, "a.b.1": 2})
    );
    assert_eq!(
        find_paths(
            &json!({"id": 1, "nested": {"id": 2}}),
            &json!("id"),
            SearchOptions::default().keys_only()
        )
        .unwrap(),
        vec![
            vec![PathToken::from("id")],
            vec![PathToken::from("nested"), PathToken::from("id")],
        ]
    );
    assert_eq!(
        set(&json!({}), "items[2]", json!("v")).unwrap(),
        json!({"items": [null, null, "v"]})
    );
}
