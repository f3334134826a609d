use jqpath::{flatten, flatten_with, unflatten, unflatten_with, JqpathError, Options, Separator};
use serde_json::{json, Map, Value};
use yare::parameterized;

fn as_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("Expected an object, got {other}"),
    }
}

#[parameterized(
    nested = { json!({"a": {"b": [1, 2]}}), json!({"a.b.0": 1, "a.b.1": 2}) },
    empty_containers_kept = { json!({"a": {}, "b": [], "c": null}), json!({"a": {}, "b": [], "c": null}) },
    array_root = { json!([{"x": 1}, 2]), json!({"0.x": 1, "1": 2}) },
    scalar_root = { json!(5), json!({"": 5}) },
    null_root = { Value::Null, json!({"": null}) },
    empty_array_root = { json!([]), json!({"": []}) },
    empty_object_root = { json!({}), json!({}) },
    deep = { json!({"a": {"b": {"c": {"d": "e"}}}}), json!({"a.b.c.d": "e"}) },
)]
fn test_flatten(value: Value, expected: Value) {
    assert_eq!(Value::Object(flatten(&value)), expected);
}

#[test]
fn test_flatten_keeps_document_order() {
    let flat = flatten(&json!({"z": 1, "a": {"y": 2, "b": 3}, "m": [4]}));
    let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["z", "a.y", "a.b", "m.0"]);
}

#[parameterized(
    slash = { Separator::Slash, json!({"a/b": 1, "a/c/0": true}) },
    custom = { Separator::Custom('|'), json!({"a|b": 1, "a|c|0": true}) },
)]
fn test_flatten_with_separator(separator: Separator, expected: Value) {
    let options = Options::default().with_separator(separator);
    let value = json!({"a": {"b": 1, "c": [true]}});
    let flat = flatten_with(&value, &options);
    assert_eq!(Value::Object(flat.clone()), expected);
    assert_eq!(unflatten_with(&flat, &options).unwrap(), value);
}

#[parameterized(
    objects = { json!({"a.b": 1, "a.c": 2}), json!({"a": {"b": 1, "c": 2}}) },
    padded_array = { json!({"a.0": 1, "a.2": 3}), json!({"a": [1, null, 3]}) },
    array_root = { json!({"0": "x", "1": "y"}), json!(["x", "y"]) },
    leading_zero_is_a_key = { json!({"a.01": 1}), json!({"a": {"01": 1}}) },
    mixed_siblings_make_object = { json!({"a.0": 1, "a.b": 2}), json!({"a": {"0": 1, "b": 2}}) },
    scalar_root = { json!({"": 5}), json!(5) },
    empty = { json!({}), json!({}) },
    explicit_empty_containers = { json!({"a": {}, "b": []}), json!({"a": {}, "b": []}) },
)]
fn test_unflatten(flat: Value, expected: Value) {
    assert_eq!(unflatten(&as_map(flat)).unwrap(), expected);
}

#[parameterized(
    leaf_and_prefix = { json!({"a": 1, "a.b": 2}) },
    prefix_then_leaf = { json!({"a.b.c": 1, "a.b": 2}) },
    root_with_other_keys = { json!({"": 1, "a": 2}) },
)]
fn test_unflatten_conflicts(flat: Value) {
    let err = unflatten(&as_map(flat)).unwrap_err();
    assert!(matches!(err, JqpathError::ValueError(_)), "got {err:?}");
}

#[parameterized(
    huge_index = { json!({"a.1000000000000000000": 1}) },
    largest_index = { json!({"18446744073709551615": 1}) },
    sparse_siblings = { json!({"a.0": 1, "a.100002": 2}) },
)]
fn test_unflatten_refuses_excessive_padding(flat: Value) {
    let err = unflatten(&as_map(flat)).unwrap_err();
    assert!(matches!(err, JqpathError::ValueError(_)), "got {err:?}");
}

#[test]
fn test_unflatten_max_padding_is_configurable() {
    let options = Options::default().with_max_padding(1);
    assert_eq!(
        unflatten_with(&as_map(json!({"a.0": 1, "a.2": 3})), &options).unwrap(),
        json!({"a": [1, null, 3]})
    );
    assert!(unflatten_with(&as_map(json!({"a.3": 1})), &options).is_err());
}

#[test]
fn test_unflatten_respects_max_depth() {
    let flat = as_map(json!({"a.b.c.d": 1}));
    let options = Options::default().with_max_depth(2);
    assert_eq!(
        unflatten_with(&flat, &options).unwrap_err(),
        JqpathError::DepthExceeded(2)
    );
}

#[parameterized(
    nested = { json!({"a": {"b": [1, 2]}, "c": "d"}) },
    empty_containers = { json!({"a": {}, "b": [], "c": [{}, []]}) },
    array_root = { json!([1, [2, [3]], {"k": null}]) },
    scalar_root = { json!("text") },
    empty_array_root = { json!([]) },
    empty_object_root = { json!({}) },
    unicode_keys = { json!({"ключ": {"значение": 1}}) },
)]
fn test_round_trip(value: Value) {
    assert_eq!(unflatten(&flatten(&value)).unwrap(), value);
}
