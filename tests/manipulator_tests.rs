use jqpath::{
    batch_set, copy_path, delete, delete_tolerant, get, has, merge, set, set_with, JqpathError,
    Operation, Options, Query,
};
use serde_json::{json, Value};
use yare::parameterized;

#[parameterized(
    create_padded_array = { json!({}), "items[2]", json!("v"), json!({"items": [null, null, "v"]}) },
    create_nested_objects = { json!({}), "a.b.c", json!(1), json!({"a": {"b": {"c": 1}}}) },
    create_array_of_objects = { json!({}), "items[0].name", json!("x"), json!({"items": [{"name": "x"}]}) },
    create_nested_arrays = { json!({}), "a[0][1]", json!(2), json!({"a": [[null, 2]]}) },
    create_inside_existing_array = { json!({"a": []}), "a[1].b", json!(true), json!({"a": [null, {"b": true}]}) },
    replace_existing = { json!({"a": 1}), "a", json!(2), json!({"a": 2}) },
    add_key_to_existing_object = { json!({"a": {"x": 1}}), "a.y", json!(2), json!({"a": {"x": 1, "y": 2}}) },
    replace_negative_index = { json!({"a": [1, 2, 3]}), "a[-1]", json!(9), json!({"a": [1, 2, 9]}) },
    overwrite_scalar_with_container = { json!({"a": 1}), "a.b", json!(2), json!({"a": {"b": 2}}) },
    quoted_key = { json!({}), r#"["a.b"]"#, json!(1), json!({"a.b": 1}) },
    every_wildcard_match = {
        json!({"a": [{"v": 1}, {"v": 2}]}),
        "a[*].v",
        json!(0),
        json!({"a": [{"v": 0}, {"v": 0}]})
    },
    selector_matches_only = {
        json!({"a": [{"v": 1}, {"v": 20}]}),
        "a[?(@.v > 5)].v",
        json!(0),
        json!({"a": [{"v": 1}, {"v": 0}]})
    },
    slice_elements = { json!({"a": [1, 2, 3, 4]}), "a[1:3]", json!(0), json!({"a": [1, 0, 0, 4]}) },
    slice_then_wildcard = {
        json!({"a": [{"v": 1}, {"v": 2}, {"v": 3}]}),
        "a[0:2][*].v",
        json!(0),
        json!({"a": [{"v": 0}, {"v": 0}, {"v": 3}]})
    },
    slice_then_index = { json!({"a": [1, 2, 3]}), "a[1:3][0]", json!(9), json!({"a": [1, 9, 3]}) },
    nested_slices = { json!({"a": [1, 2, 3, 4]}), "a[1:][1:][0]", json!(9), json!({"a": [1, 2, 9, 4]}) },
    slice_then_selector = {
        json!({"a": [{"v": 9}, {"v": 1}, {"v": 8}]}),
        "a[1:][?(@.v > 5)].v",
        json!(0),
        json!({"a": [{"v": 9}, {"v": 1}, {"v": 0}]})
    },
    wildcard_over_object = {
        json!({"u": {"x": {"n": 1}, "y": {"n": 2}}}),
        "u.*.n",
        json!(null),
        json!({"u": {"x": {"n": null}, "y": {"n": null}}})
    },
    wildcard_without_matches = { json!({"a": {}}), "a.*.b", json!(1), json!({"a": {}}) },
    replace_root = { json!({"x": 1}), ".", json!(5), json!(5) },
)]
fn test_set(doc: Value, path: &str, value: Value, expected: Value) {
    let original = doc.clone();
    let updated = set(&doc, path, value).unwrap();
    assert_eq!(updated, expected);
    assert_eq!(doc, original);
}

#[parameterized(
    append_to_list = { json!({"t": ["a"]}), "t", json!("b"), Operation::Append, json!({"t": ["a", "b"]}) },
    append_wraps_scalar = { json!({"t": "a"}), "t", json!("b"), Operation::Append, json!({"t": ["a", "b"]}) },
    append_to_missing_key = { json!({}), "t", json!("b"), Operation::Append, json!({"t": ["b"]}) },
    append_creates_path = { json!({}), "a.b", json!(1), Operation::Append, json!({"a": {"b": [1]}}) },
    extend_list = { json!({"t": [1]}), "t", json!([2, 3]), Operation::Extend, json!({"t": [1, 2, 3]}) },
    extend_missing = { json!({}), "t", json!([1]), Operation::Extend, json!({"t": [1]}) },
    extend_scalar = { json!({"t": 0}), "t", json!([1]), Operation::Extend, json!({"t": [0, 1]}) },
    append_each_match = {
        json!({"a": [{"l": []}, {"l": [1]}]}),
        "a[*].l",
        json!(9),
        Operation::Append,
        json!({"a": [{"l": [9]}, {"l": [1, 9]}]})
    },
)]
fn test_set_with_operation(
    doc: Value,
    path: &str,
    value: Value,
    operation: Operation,
    expected: Value,
) {
    assert_eq!(set_with(&doc, path, value, true, operation).unwrap(), expected);
}

#[test]
fn test_extend_requires_a_list() {
    let err = set_with(&json!({"t": []}), "t", json!(1), true, Operation::Extend).unwrap_err();
    assert!(matches!(err, JqpathError::ValueError(_)));
}

#[parameterized(
    named_set = { "set", Operation::Set },
    named_append = { "append", Operation::Append },
    named_extend = { "extend", Operation::Extend },
)]
fn test_operation_from_str(input: &str, expected: Operation) {
    assert_eq!(input.parse::<Operation>().unwrap(), expected);
    assert_eq!(expected.to_string(), input);
}

#[test]
fn test_unknown_operation() {
    let err = "merge".parse::<Operation>().unwrap_err();
    assert!(matches!(err, JqpathError::ValueError(_)));
}

#[parameterized(
    missing_key = { json!({}), "a.b", JqpathError::KeyError("/a".to_string()) },
    missing_index = { json!({"a": [1]}), "a[3]", JqpathError::IndexError("/a/3".to_string()) },
    key_into_scalar = {
        json!({"a": 1}),
        "a.b",
        JqpathError::TypeMismatch { path: "/a".to_string(), expected: "object", found: "number" }
    },
    index_into_object = {
        json!({"a": {}}),
        "a[0]",
        JqpathError::TypeMismatch { path: "/a".to_string(), expected: "array", found: "object" }
    },
)]
fn test_set_without_create_missing(doc: Value, path: &str, expected: JqpathError) {
    let err = set_with(&doc, path, json!(1), false, Operation::Set).unwrap_err();
    assert_eq!(err, expected);
}

#[test]
fn test_set_without_create_missing_adds_terminal_key() {
    let updated = set_with(&json!({"a": {}}), "a.b", json!(1), false, Operation::Set).unwrap();
    assert_eq!(updated, json!({"a": {"b": 1}}));
}

#[test]
fn test_negative_index_cannot_be_created() {
    let err = set(&json!({"a": []}), "a[-1]", json!(1)).unwrap_err();
    assert!(matches!(err, JqpathError::IndexError(_)));
}

#[parameterized(
    function = { "a.length" },
    construct = { "{a}" },
)]
fn test_computed_components_are_not_addressable(path: &str) {
    let doc = json!({"a": [1]});
    assert!(matches!(set(&doc, path, json!(1)), Err(JqpathError::ValueError(_))));
    assert!(matches!(delete(&doc, path), Err(JqpathError::ValueError(_))));
}

#[parameterized(
    key = { json!({"a": 1, "b": 2}), "a", json!({"b": 2}) },
    nested_key = { json!({"a": {"b": 1, "c": 2}}), "a.b", json!({"a": {"c": 2}}) },
    index = { json!({"a": [1, 2, 3]}), "a[0]", json!({"a": [2, 3]}) },
    negative_index = { json!({"a": [1, 2, 3]}), "a[-1]", json!({"a": [1, 2]}) },
    all_elements = { json!({"a": [1, 2, 3, 4]}), "a[*]", json!({"a": []}) },
    slice = { json!({"a": [1, 2, 3, 4]}), "a[1:3]", json!({"a": [1, 4]}) },
    slice_then_wildcard = {
        json!({"a": [{"v": 1}, {"v": 2}, {"v": 3}]}),
        "a[0:2][*].v",
        json!({"a": [{}, {}, {"v": 3}]})
    },
    slice_then_index = { json!({"a": [1, 2, 3, 4]}), "a[1:3][-1]", json!({"a": [1, 2, 4]}) },
    selector = {
        json!({"a": [{"v": 1}, {"v": 9}, {"v": 3}, {"v": 7}]}),
        "a[?(@.v > 5)]",
        json!({"a": [{"v": 1}, {"v": 3}]})
    },
    wildcard_keys = {
        json!({"u": {"x": {"k": 1, "j": 0}, "y": {"k": 2}}}),
        "u.*.k",
        json!({"u": {"x": {"j": 0}, "y": {}}})
    },
    nothing_matches = { json!({"a": [1, 2]}), "a[?(@.v > 5)]", json!({"a": [1, 2]}) },
    optional_missing = { json!({"a": 1}), "b?", json!({"a": 1}) },
)]
fn test_delete(doc: Value, path: &str, expected: Value) {
    let original = doc.clone();
    assert_eq!(delete(&doc, path).unwrap(), expected);
    assert_eq!(doc, original);
}

#[parameterized(
    missing_key = { json!({"a": 1}), "b", JqpathError::KeyError("/b".to_string()) },
    missing_nested_key = { json!({"a": {}}), "a.b.c", JqpathError::KeyError("/a/b".to_string()) },
    missing_index = { json!({"a": [1]}), "a[5]", JqpathError::IndexError("/a/5".to_string()) },
)]
fn test_delete_missing(doc: Value, path: &str, expected: JqpathError) {
    assert_eq!(delete(&doc, path).unwrap_err(), expected);
    assert_eq!(delete_tolerant(&doc, path).unwrap(), doc);
}

#[test]
fn test_delete_root_is_rejected() {
    assert!(matches!(delete(&json!({"a": 1}), "."), Err(JqpathError::ValueError(_))));
}

#[test]
fn test_query_honours_mutation_options() {
    let doc = json!({"a": 1});
    let tolerant = Query::new("missing")
        .unwrap()
        .with_options(Options::default().with_tolerant_delete(true));
    assert_eq!(tolerant.delete(&doc).unwrap(), doc);

    let no_create = Query::new("x.y")
        .unwrap()
        .with_options(Options::default().with_create_missing(false));
    assert!(matches!(no_create.set(&doc, json!(1)), Err(JqpathError::KeyError(_))));
}

#[parameterized(
    slice_then_wildcard = { json!({"a": [{"v": 1}, {"v": 2}, {"v": 3}]}), "a[0:2][*].v" },
    slice_then_index = { json!({"a": [1, 2, 3, 4]}), "a[2:][1]" },
    slice_then_nested_index = { json!({"a": [[1, 2], [3, 4], [5, 6]]}), "a[1:][*][0]" },
)]
fn test_writes_reach_what_reads_find(doc: Value, path: &str) {
    let found = get(&doc, path).unwrap();
    assert!(!found.is_empty());
    let updated = set(&doc, path, json!("new")).unwrap();
    assert_eq!(get(&updated, path).unwrap(), vec![json!("new"); found.len()]);
}

#[parameterized(
    huge_index_from_nothing = { json!({}), "items[1000000000000000000]" },
    huge_index_in_existing_array = { json!({"items": [1]}), "items[200001]" },
    huge_nested_index = { json!({"a": {}}), "a.b[500000].c" },
)]
fn test_set_refuses_excessive_padding(doc: Value, path: &str) {
    let err = set(&doc, path, json!(1)).unwrap_err();
    assert!(matches!(err, JqpathError::IndexError(_)), "got {err:?}");
}

#[test]
fn test_max_padding_is_configurable() {
    let query = |path: &str| {
        Query::new(path)
            .unwrap()
            .with_options(Options::default().with_max_padding(2))
    };
    assert_eq!(
        query("a[2]").set(&json!({}), json!(1)).unwrap(),
        json!({"a": [null, null, 1]})
    );
    assert_eq!(
        query("a[3]").set(&json!({}), json!(1)).unwrap_err(),
        JqpathError::IndexError("/a/3: more than 2 missing elements".to_string())
    );
    assert_eq!(
        query("a[4]").set(&json!({"a": [0, 0]}), json!(1)).unwrap(),
        json!({"a": [0, 0, null, null, 1]})
    );
}

#[test]
fn test_delete_then_has() {
    let doc = json!({"a": {"b": [1, 2]}});
    let updated = delete(&doc, "a.b").unwrap();
    assert!(has(&doc, "a.b").unwrap());
    assert!(!has(&updated, "a.b").unwrap());
}

#[parameterized(
    nested_objects_merge = {
        json!({"a": {"x": 1, "y": [1, 2]}, "b": 1}),
        json!({"a": {"y": [3], "z": true}, "c": 2}),
        json!({"a": {"x": 1, "y": [3], "z": true}, "b": 1, "c": 2})
    },
    scalar_overrides = { json!({"a": {"b": 1}}), json!({"a": 2}), json!({"a": 2}) },
    object_replaces_scalar = { json!({"a": 1}), json!({"a": {"b": 1}}), json!({"a": {"b": 1}}) },
    non_object_overlay = { json!({"a": 1}), json!(5), json!(5) },
    empty_overlay = { json!({"a": 1}), json!({}), json!({"a": 1}) },
)]
fn test_merge(base: Value, overlay: Value, expected: Value) {
    assert_eq!(merge(&base, &overlay).unwrap(), expected);
}

#[parameterized(
    found = { json!({}), "user.name", None, json!({"profile": {"display": "ann"}}) },
    missing_with_default = { json!({}), "user.nick", Some(json!("anon")), json!({"profile": {"display": "anon"}}) },
    missing_without_default = { json!({"keep": true}), "user.nick", None, json!({"keep": true}) },
    found_ignores_default = { json!({}), "user.name", Some(json!("anon")), json!({"profile": {"display": "ann"}}) },
    into_existing = { json!({"profile": {"id": 1}}), "user.name", None, json!({"profile": {"id": 1, "display": "ann"}}) },
)]
fn test_copy_path(target: Value, source_path: &str, default: Option<Value>, expected: Value) {
    let source = json!({"user": {"name": "ann"}});
    let copied = copy_path(&source, &target, source_path, "profile.display", default).unwrap();
    assert_eq!(copied, expected);
}

#[test]
fn test_batch_set() {
    let updated = batch_set(
        &json!({}),
        [("a", json!(1)), ("b.c", json!(2)), ("b.d[1]", json!(3))],
    )
    .unwrap();
    assert_eq!(updated, json!({"a": 1, "b": {"c": 2, "d": [null, 3]}}));
}

#[test]
fn test_batch_set_stops_at_first_error() {
    let err = batch_set(&json!({}), [("a", json!(1)), ("a.length", json!(2))]).unwrap_err();
    assert!(matches!(err, JqpathError::ValueError(_)));

    let err = batch_set(&json!({}), vec![("ok".to_string(), json!(1)), ("[".to_string(), json!(2))])
        .unwrap_err();
    assert!(matches!(err, JqpathError::ParseError(_)));
}

#[test]
fn test_set_then_get() {
    let doc = json!({"a": [{"b": 1}]});
    let updated = set(&doc, "a[0].c.d", json!({"k": [1]})).unwrap();
    assert_eq!(get(&updated, "a[0].c.d").unwrap(), vec![json!({"k": [1]})]);
    assert_eq!(get(&updated, "a[0].b").unwrap(), vec![json!(1)]);
}
