//! Integration tests for loading, reference resolution, and the combinator
//! algebra working together across documents.

use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use schema_model::{SchemaStore, StoreOptions, STRING_CONSTANT};
use serde_json::json;
use tempfile::TempDir;

fn write_schema(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn reference_chain_across_files() {
    let dir = TempDir::new().unwrap();
    write_schema(&dir, "c.json", r#"{"type": "string", "minLength": 1}"#);
    write_schema(
        &dir,
        "b.json",
        r#"{"type": "object", "properties": {"leaf": {"$ref": "c.json"}}}"#,
    );
    let root = write_schema(
        &dir,
        "a.json",
        r#"{"type": "object", "properties": {"child": {"$ref": "b.json"}}}"#,
    );

    let store = SchemaStore::new();
    let schema = store.load(&root).unwrap();
    let child = schema.property_schema("child").unwrap();
    assert!(child.is_object());
    let leaf = child.property_schema("leaf").unwrap();
    assert!(leaf.is_string());
    assert_eq!(leaf.get_int("minLength").unwrap(), 1);
}

#[test]
fn shared_reference_targets_share_nodes() {
    let dir = TempDir::new().unwrap();
    write_schema(&dir, "leaf.json", r#"{"type": "integer"}"#);
    let root = write_schema(
        &dir,
        "root.json",
        r#"{
            "type": "object",
            "properties": {
                "a": {"$ref": "leaf.json"},
                "b": {"$ref": "leaf.json"}
            }
        }"#,
    );

    let store = SchemaStore::new();
    let schema = store.load(&root).unwrap();
    let a = schema.property_schema("a").unwrap();
    let b = schema.property_schema("b").unwrap();
    assert!(Rc::ptr_eq(&a, &b));
}

#[test]
fn internal_definitions_resolve() {
    let store = SchemaStore::new();
    let schema = store
        .load_str(
            r##"{
                "type": "object",
                "properties": {"name": {"$ref": "#/$defs/name"}},
                "$defs": {"name": {"type": "string", "maxLength": 40}}
            }"##,
        )
        .unwrap();
    let name = schema.property_schema("name").unwrap();
    assert!(name.is_string());
    assert_eq!(name.get_int("maxLength").unwrap(), 40);
}

#[test]
fn cyclic_references_terminate() {
    let dir = TempDir::new().unwrap();
    write_schema(
        &dir,
        "node.json",
        r#"{
            "type": "object",
            "properties": {
                "value": {"type": "integer"},
                "next": {"$ref": "node.json"}
            },
            "additionalProperties": false
        }"#,
    );

    let store = SchemaStore::new();
    let schema = store.load(&dir.path().join("node.json")).unwrap();
    assert!(schema.needs_further_unfolding());

    // Following the cycle one step lands back on the same node.
    let next = schema.property_schema("next").unwrap();
    assert!(Rc::ptr_eq(&schema, &next));
    assert!(schema.depth().unwrap() > 0);
}

#[test]
fn mutually_cyclic_fragments_terminate() {
    let store = SchemaStore::new();
    let schema = store
        .load_str(
            r##"{
                "$defs": {
                    "a": {"type": "object", "properties": {"b": {"$ref": "#/$defs/b"}}},
                    "b": {"type": "object", "properties": {"a": {"$ref": "#/$defs/a"}}}
                },
                "properties": {"start": {"$ref": "#/$defs/a"}}
            }"##,
        )
        .unwrap();
    assert!(schema.needs_further_unfolding());
    let start = schema.property_schema("start").unwrap();
    assert!(start.is_object());
    assert!(start.depth().unwrap() > 0);
}

#[test]
fn all_of_with_references_flattens() {
    let dir = TempDir::new().unwrap();
    write_schema(
        &dir,
        "base.json",
        r#"{"type": "object", "required": ["id"], "properties": {"id": {"type": "string"}}}"#,
    );
    let root = write_schema(
        &dir,
        "extended.json",
        r#"{
            "required": ["name"],
            "properties": {"name": {"type": "string"}},
            "allOf": [{"$ref": "base.json"}]
        }"#,
    );

    let store = SchemaStore::new();
    let schema = store.load(&root).unwrap();
    let flat = schema.flatten().unwrap();
    assert!(flat.is_object());
    let mut required = flat.required_property_keys().unwrap();
    required.sort();
    assert_eq!(required, vec!["id", "name"]);
    assert!(flat.property_names().contains(&"id".to_string()));
    assert!(flat.property_names().contains(&"name".to_string()));
}

#[test]
fn merge_is_associative_for_disjoint_keywords() {
    let store = SchemaStore::new();
    let a = store.load_str(r#"{"type": "object"}"#).unwrap();
    let b = store.load_str(r#"{"required": ["x"]}"#).unwrap();
    let c = store.load_str(r#"{"minProperties": 2}"#).unwrap();

    let left = a.merge(&b).unwrap().merge(&c).unwrap();
    let right = a.merge(&b.merge(&c).unwrap()).unwrap();
    assert_eq!(left, right);
    assert!(Rc::ptr_eq(&left, &right));
}

#[test]
fn merge_is_associative_for_shared_properties() {
    let store = SchemaStore::new();
    let a = store
        .load_str(r#"{"properties": {"x": {"minLength": 1}}}"#)
        .unwrap();
    let b = store
        .load_str(r#"{"properties": {"x": {"maxLength": 5}}}"#)
        .unwrap();
    let c = store
        .load_str(r#"{"properties": {"x": {"type": "string"}}}"#)
        .unwrap();

    // Grouping the shared property must not nest allOf differently per
    // association order.
    let left = a.merge(&b).unwrap().merge(&c).unwrap();
    let right = a.merge(&b.merge(&c).unwrap()).unwrap();
    assert_eq!(left, right);
    assert!(Rc::ptr_eq(&left, &right));

    let x = left.document()["properties"]["x"].clone();
    assert_eq!(
        x,
        json!({"allOf": [{"minLength": 1}, {"maxLength": 5}, {"type": "string"}]})
    );
}

#[test]
fn one_of_alternatives_flatten_exclusively() {
    let store = SchemaStore::new();
    let schema = store
        .load_str(r#"{"oneOf": [{"type": "string"}, {"type": "integer"}]}"#)
        .unwrap();

    let alternatives = schema.one_of().unwrap();
    assert_eq!(alternatives.len(), 2);

    let first = alternatives[0].flatten().unwrap();
    assert!(first.is_string());
    assert!(!first.is_integer());

    let second = alternatives[1].flatten().unwrap();
    assert!(second.is_integer());
    assert!(!second.is_string());
}

#[test]
fn unsatisfiable_one_of_branch_collapses() {
    let store = SchemaStore::new();
    let schema = store
        .load_str(r#"{"oneOf": [{"const": 1}, {"const": 2}]}"#)
        .unwrap();
    let alternatives = schema.one_of().unwrap();

    // Each alternative keeps its constant and forbids the other.
    let first = alternatives[0].flatten().unwrap();
    assert_eq!(first.const_value(), Some(&json!(1)));
    assert_eq!(first.forbidden_values(), vec![json!(2)]);
}

#[test]
fn enum_merge_across_documents() {
    let dir = TempDir::new().unwrap();
    let left_path = write_schema(&dir, "left.json", r#"{"type": "integer", "enum": [1, 2, 3]}"#);
    let right_path = write_schema(&dir, "right.json", r#"{"enum": [2, 3, 4]}"#);

    let store = SchemaStore::new();
    let left = store.load(&left_path).unwrap();
    let right = store.load(&right_path).unwrap();

    let merged = left.merge(&right).unwrap();
    assert!(merged.is_integer());
    assert_eq!(merged.enum_values().unwrap(), &vec![json!(2), json!(3)]);
}

#[test]
fn disjoint_merge_collapses_to_false_singleton() {
    let store = SchemaStore::new();
    let strings = store.load_str(r#"{"type": "string"}"#).unwrap();
    let objects = store.load_str(r#"{"type": "object"}"#).unwrap();

    let merged = strings.merge(&objects).unwrap();
    assert!(Rc::ptr_eq(&merged, &store.false_schema()));
    assert!(SchemaStore::is_false_schema(&merged));
}

#[test]
fn abstract_slot_survives_flattening() {
    let store = SchemaStore::new();
    let schema = store
        .load_str(
            r#"{
                "allOf": [
                    {"type": "object", "properties": {"name": {"type": "string"}}},
                    {"type": "object", "additionalProperties": {"type": "integer"}}
                ]
            }"#,
        )
        .unwrap();
    let flat = schema.flatten().unwrap();
    assert!(flat.is_object());
    let slot = flat.property_schema(STRING_CONSTANT).unwrap();
    assert!(slot.is_integer());
}

#[test]
fn ignore_true_additional_properties_option() {
    let content = r#"{"type": "object", "properties": {"a": {}}, "additionalProperties": true}"#;

    let tracking = SchemaStore::new();
    let schema = tracking.load_str(content).unwrap();
    assert!(schema.property_names().contains(&STRING_CONSTANT.to_string()));

    let ignoring = SchemaStore::with_options(StoreOptions {
        ignore_true_additional_properties: true,
    });
    let schema = ignoring.load_str(content).unwrap();
    assert!(!schema.property_names().contains(&STRING_CONSTANT.to_string()));
}

#[test]
fn boolean_file_schemas() {
    let dir = TempDir::new().unwrap();
    let always = write_schema(&dir, "always.json", "true");
    let never = write_schema(&dir, "never.json", "false");

    let store = SchemaStore::new();
    let always = store.load(&always).unwrap();
    let never = store.load(&never).unwrap();
    assert!(SchemaStore::is_true_schema(&always));
    assert!(SchemaStore::is_false_schema(&never));

    // Merging with them behaves as identity and absorption.
    let schema = store.load_str(r#"{"type": "integer"}"#).unwrap();
    assert!(Rc::ptr_eq(&schema.merge(&always).unwrap(), &schema));
    assert!(Rc::ptr_eq(
        &schema.merge(&never).unwrap(),
        &store.false_schema()
    ));
}
