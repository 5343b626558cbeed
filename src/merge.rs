//! The keyword merge algebra: how constraints combine under conjunction.
//!
//! Every supported keyword has a merge policy: bounds are tightest-wins,
//! `required` and combinator lists are unioned, `enum` and `type` are
//! intersected, per-property definitions are regrouped under `allOf` for
//! later flattening, and `not` is pushed down keyword by keyword. An empty
//! `type`/`enum` intersection or a `const` disagreement is not an error; it
//! means the combined schema is unsatisfiable and collapses to the false
//! schema.

use serde_json::{json, Map, Value};

use crate::canonical::values_equal;
use crate::error::SchemaError;

const ALL_TYPE_KEYWORDS: [&str; 7] = [
    "string", "integer", "number", "object", "array", "boolean", "null",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    /// Tightest upper bound: keep the minimum of the values.
    TakeMinimum,
    /// Tightest lower bound: keep the maximum of the values.
    TakeMaximum,
    Product,
    And,
    Concatenation,
    Intersection,
    MergeProperties,
    MergeItems,
    CheckEquality,
    Not,
}

fn operation_for(key: &str) -> Option<Operation> {
    match key {
        "maxItems" | "maxProperties" | "maximum" | "exclusiveMaximum" | "maxLength"
        | "maxContains" => Some(Operation::TakeMinimum),
        "minItems" | "minProperties" | "minimum" | "exclusiveMinimum" | "minLength"
        | "minContains" => Some(Operation::TakeMaximum),
        "multipleOf" => Some(Operation::Product),
        "uniqueItems" => Some(Operation::And),
        "required" | "allOf" | "anyOf" | "oneOf" => Some(Operation::Concatenation),
        "enum" | "type" => Some(Operation::Intersection),
        "properties" | "patternProperties" | "$defs" | "definitions" => {
            Some(Operation::MergeProperties)
        }
        "items" => Some(Operation::MergeItems),
        "$ref" | "const" | "additionalProperties" => Some(Operation::CheckEquality),
        "not" => Some(Operation::Not),
        _ => None,
    }
}

/// Whether a keyword participates in merging. Unknown keywords are dropped
/// from merge results.
pub(crate) fn is_mergeable(key: &str) -> bool {
    operation_for(key).is_some()
}

/// The lower-bound keyword negating an upper bound, and vice versa.
fn bound_counterpart(key: &str) -> Option<&'static str> {
    match key {
        "minItems" => Some("maxItems"),
        "maxItems" => Some("minItems"),
        "minProperties" => Some("maxProperties"),
        "maxProperties" => Some("minProperties"),
        "minimum" => Some("maximum"),
        "maximum" => Some("minimum"),
        "exclusiveMinimum" => Some("exclusiveMaximum"),
        "exclusiveMaximum" => Some("exclusiveMinimum"),
        "minLength" => Some("maxLength"),
        "maxLength" => Some("minLength"),
        "minContains" => Some("maxContains"),
        "maxContains" => Some("minContains"),
        _ => None,
    }
}

/// Keyword values collected across the documents being merged, in first-seen
/// order, with structural duplicates dropped.
#[derive(Debug, Default)]
pub(crate) struct KeywordValues(Vec<(String, Vec<Value>)>);

impl KeywordValues {
    pub fn insert(&mut self, key: &str, value: &Value) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some((_, values)) => {
                if !values.iter().any(|v| values_equal(v, value)) {
                    values.push(value.clone());
                }
            }
            None => self.0.push((key.to_string(), vec![value.clone()])),
        }
    }

    /// Collect every mergeable keyword of `doc`.
    pub fn insert_mergeable(&mut self, doc: &Map<String, Value>) {
        for (key, value) in doc {
            if is_mergeable(key) {
                self.insert(key, value);
            }
        }
    }

    /// Collect every keyword of `doc`, mergeable or not. Unknown keywords are
    /// dropped later, when the merged document is built.
    pub fn insert_all(&mut self, doc: &Map<String, Value>) {
        for (key, value) in doc {
            self.insert(key, value);
        }
    }
}

/// Result of merging one keyword's collected values.
enum Merged {
    Value(Value),
    Unsatisfiable,
    Drop,
}

/// Result of merging whole constraint sets.
pub(crate) enum MergeOutcome {
    Document(Value),
    Unsatisfiable,
}

/// Build a single document from collected keyword values.
///
/// `not` is handled last, since its negated constraints fold into the
/// document's `anyOf`/`allOf` structure.
pub(crate) fn merged_document(collected: KeywordValues) -> Result<MergeOutcome, SchemaError> {
    let mut constraints = Map::new();
    let mut not_values: Option<Vec<Value>> = None;

    for (key, values) in collected.0 {
        if key == "not" {
            not_values = Some(values);
            continue;
        }
        match apply_operation(&key, &values)? {
            Merged::Value(value) => {
                constraints.insert(key, value);
            }
            Merged::Unsatisfiable => return Ok(MergeOutcome::Unsatisfiable),
            Merged::Drop => {}
        }
    }

    if let Some(values) = not_values {
        handle_not_in_merge(&mut constraints, &values)?;
    }

    Ok(MergeOutcome::Document(Value::Object(constraints)))
}

fn apply_operation(key: &str, values: &[Value]) -> Result<Merged, SchemaError> {
    let operation = match operation_for(key) {
        Some(operation) => operation,
        None => return Ok(Merged::Drop),
    };
    match operation {
        Operation::TakeMinimum => extreme_bound(key, values, false).map(Merged::Value),
        Operation::TakeMaximum => extreme_bound(key, values, true).map(Merged::Value),
        Operation::Product => product(key, values).map(Merged::Value),
        Operation::And => {
            let mut all = true;
            for value in values {
                all &= value.as_bool().ok_or_else(|| non_numeric(key, "boolean"))?;
            }
            Ok(Merged::Value(Value::Bool(all)))
        }
        Operation::Concatenation => union_arrays(key, values).map(Merged::Value),
        Operation::Intersection => match intersect(key, values)? {
            Some(items) => Ok(Merged::Value(Value::Array(items))),
            None => Ok(Merged::Unsatisfiable),
        },
        Operation::MergeProperties => merge_properties(key, values).map(Merged::Value),
        Operation::MergeItems => {
            if values.len() == 1 {
                Ok(Merged::Value(values[0].clone()))
            } else {
                Ok(Merged::Value(json!({ "allOf": values })))
            }
        }
        Operation::CheckEquality => {
            // Values are structurally deduplicated on collection, so more
            // than one value means a genuine disagreement.
            if values.len() == 1 {
                Ok(Merged::Value(values[0].clone()))
            } else if key == "const" {
                Ok(Merged::Unsatisfiable)
            } else {
                Err(SchemaError::MergeConflict {
                    keyword: key.to_string(),
                })
            }
        }
        Operation::Not => Ok(Merged::Drop),
    }
}

fn non_numeric(key: &str, expected: &str) -> SchemaError {
    SchemaError::MalformedDocument {
        message: format!("keyword \"{}\" requires {} values", key, expected),
    }
}

fn extreme_bound(key: &str, values: &[Value], want_max: bool) -> Result<Value, SchemaError> {
    let (first, rest) = values
        .split_first()
        .ok_or_else(|| non_numeric(key, "numeric"))?;
    if !values.iter().all(Value::is_number) {
        return Err(non_numeric(key, "numeric"));
    }
    let mut best = first;
    for value in rest {
        // Integer pairs compare exactly; going through f64 rounds bounds
        // above 2^53.
        let ordering = match (value.as_i64(), best.as_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => match (value.as_f64(), best.as_f64()) {
                (Some(a), Some(b)) => {
                    a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
                }
                _ => std::cmp::Ordering::Equal,
            },
        };
        if (want_max && ordering.is_gt()) || (!want_max && ordering.is_lt()) {
            best = value;
        }
    }
    Ok(best.clone())
}

fn product(key: &str, values: &[Value]) -> Result<Value, SchemaError> {
    let mut int_product: Option<i64> = Some(1);
    let mut float_product = 1.0;
    for value in values {
        let f = value.as_f64().ok_or_else(|| non_numeric(key, "numeric"))?;
        float_product *= f;
        int_product = match (int_product, value.as_i64()) {
            (Some(acc), Some(i)) => acc.checked_mul(i),
            _ => None,
        };
    }
    match int_product {
        Some(i) => Ok(json!(i)),
        None => Ok(json!(float_product)),
    }
}

fn union_arrays(key: &str, values: &[Value]) -> Result<Value, SchemaError> {
    let mut union: Vec<Value> = Vec::new();
    for value in values {
        let items = value.as_array().ok_or_else(|| non_numeric(key, "array"))?;
        for item in items {
            if !union.iter().any(|existing| values_equal(existing, item)) {
                union.push(item.clone());
            }
        }
    }
    Ok(Value::Array(union))
}

/// Normalize a `type`/`enum` value to a list: `"object"` and `["object"]`
/// are the same constraint.
fn as_item_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// Intersect list-valued constraints, preserving first-seen order.
/// `None` means the intersection is empty and the schema unsatisfiable.
fn intersect(_key: &str, values: &[Value]) -> Result<Option<Vec<Value>>, SchemaError> {
    let (first, rest) = match values.split_first() {
        Some(split) => split,
        None => return Ok(None),
    };
    let mut intersection = as_item_list(first);
    for value in rest {
        let keep = as_item_list(value);
        intersection.retain(|item| keep.iter().any(|other| values_equal(item, other)));
    }
    if intersection.is_empty() {
        Ok(None)
    } else {
        Ok(Some(intersection))
    }
}

/// Merge several `properties`-like objects: group definitions per property
/// name, wrapping multiple definitions in `allOf` for later flattening.
fn merge_properties(key: &str, values: &[Value]) -> Result<Value, SchemaError> {
    let mut by_name: Vec<(String, Vec<Value>)> = Vec::new();
    for value in values {
        let map = value.as_object().ok_or_else(|| non_numeric(key, "object"))?;
        for (name, definition) in map {
            let index = match by_name.iter().position(|(n, _)| n == name) {
                Some(index) => index,
                None => {
                    by_name.push((name.clone(), Vec::new()));
                    by_name.len() - 1
                }
            };
            push_definition(&mut by_name[index].1, definition);
        }
    }

    let mut merged = Map::new();
    for (name, mut definitions) in by_name {
        let combined = if definitions.len() == 1 {
            definitions.remove(0)
        } else {
            json!({ "allOf": definitions })
        };
        merged.insert(name, combined);
    }
    Ok(Value::Object(merged))
}

/// Add one property definition to a group, keeping the group a flat branch
/// list. A definition that is itself a bare `allOf` came from an earlier
/// grouping pass, so its branches are spliced in rather than nested; this
/// keeps regrouping associative.
fn push_definition(definitions: &mut Vec<Value>, definition: &Value) {
    if let Value::Object(map) = definition {
        if map.len() == 1 {
            if let Some(Value::Array(branches)) = map.get("allOf") {
                for branch in branches {
                    push_definition(definitions, branch);
                }
                return;
            }
        }
    }
    if !definitions.iter().any(|d| values_equal(d, definition)) {
        definitions.push(definition.clone());
    }
}

/// Fold merged `not` constraints into the document.
///
/// The negation becomes a disjunction of per-keyword complements. It lands in
/// `anyOf`; when the document already carries an `anyOf`, both alternation
/// sets move under `allOf` so neither loses its meaning.
fn handle_not_in_merge(
    constraints: &mut Map<String, Value>,
    not_values: &[Value],
) -> Result<(), SchemaError> {
    let disjunction = Value::Array(not_disjunction(not_values)?);
    if let Some(existing) = constraints.remove("anyOf") {
        let already_any_of = json!({ "anyOf": existing });
        let from_not = json!({ "anyOf": disjunction });
        match constraints.get_mut("allOf") {
            Some(Value::Array(all_of)) => {
                all_of.push(already_any_of);
                all_of.push(from_not);
            }
            _ => {
                constraints.insert("allOf".into(), json!([already_any_of, from_not]));
            }
        }
    } else {
        constraints.insert("anyOf".into(), disjunction);
    }
    Ok(())
}

/// Keywords that survive inside a negated schema.
fn kept_in_not(key: &str) -> bool {
    matches!(
        key,
        "items" | "properties" | "type" | "not" | "enum" | "const" | "anyOf" | "allOf"
    ) || bound_counterpart(key).is_some()
}

/// Turn a conjunction of negated schemas into a disjunction of per-keyword
/// complements (`NOT AND` into `OR NOT`).
pub(crate) fn not_disjunction(not_documents: &[Value]) -> Result<Vec<Value>, SchemaError> {
    let mut by_key = KeywordValues::default();
    for document in not_documents {
        if let Value::Object(map) = document {
            for (key, value) in map {
                if kept_in_not(key) {
                    by_key.insert(key, value);
                }
            }
        }
    }

    if by_key.0.is_empty() {
        return Ok(vec![json!({})]);
    }

    let mut disjunction = Vec::new();
    for (key, values) in by_key.0 {
        let Some(negated) = apply_not(&key, &values)? else {
            continue;
        };
        if key == "not" {
            disjunction.push(json!({ "not": negated }));
        } else {
            disjunction.push(negated);
        }
    }
    Ok(disjunction)
}

fn bound_shift(value: &Value, delta: i64) -> Value {
    match value.as_i64() {
        Some(i) => json!(i + delta),
        None => match value.as_f64() {
            Some(f) => json!(f + delta as f64),
            None => value.clone(),
        },
    }
}

/// Negate one keyword's merged constraint, producing a schema document.
///
/// Returns `None` for keywords with no usable complement.
pub(crate) fn apply_not(key: &str, values: &[Value]) -> Result<Option<Value>, SchemaError> {
    match key {
        "properties" => {
            let merged = match apply_operation(key, values)? {
                Merged::Value(Value::Object(props)) => props,
                _ => return Ok(None),
            };
            let mut negated = Map::new();
            for (name, definition) in merged {
                negated.insert(name, json!({ "not": definition }));
            }
            Ok(Some(json!({ "properties": negated })))
        }
        "items" => match apply_operation(key, values)? {
            Merged::Value(items) => Ok(Some(json!({ "items": items }))),
            _ => Ok(None),
        },
        "type" => {
            let excluded = match apply_operation(key, values)? {
                Merged::Value(Value::Array(types)) => types,
                // An empty intersection excludes nothing.
                _ => Vec::new(),
            };
            let complement: Vec<Value> = ALL_TYPE_KEYWORDS
                .iter()
                .filter(|name| !excluded.iter().any(|t| t.as_str() == Some(name)))
                .map(|name| json!(name))
                .collect();
            Ok(Some(json!({ "type": complement })))
        }
        "not" => Ok(values.first().cloned()),
        "allOf" => match apply_operation(key, values)? {
            Merged::Value(Value::Array(branches)) => {
                let negated: Vec<Value> =
                    branches.iter().map(|b| json!({ "not": b })).collect();
                Ok(Some(json!({ "anyOf": negated })))
            }
            _ => Ok(None),
        },
        "anyOf" => match apply_operation(key, values)? {
            Merged::Value(Value::Array(branches)) => {
                let negated: Vec<Value> =
                    branches.iter().map(|b| json!({ "not": b })).collect();
                Ok(Some(json!({ "allOf": negated })))
            }
            _ => Ok(None),
        },
        "enum" => {
            let mut union = Vec::new();
            for value in values {
                for item in as_item_list(value) {
                    if !union.iter().any(|existing| values_equal(existing, &item)) {
                        union.push(item);
                    }
                }
            }
            Ok(Some(json!({ "not": { "enum": union } })))
        }
        "const" => Ok(values
            .first()
            .map(|value| json!({ "not": { "const": value } }))),
        _ => {
            let Some(counterpart) = bound_counterpart(key) else {
                return Ok(None);
            };
            let bound = match apply_operation(key, values)? {
                Merged::Value(bound) => bound,
                _ => return Ok(None),
            };
            // not(max n) is min n+1, not(min n) is max n-1.
            let delta = if key.starts_with("max") || key == "exclusiveMaximum" {
                1
            } else {
                -1
            };
            Ok(Some(json!({ counterpart: bound_shift(&bound, delta) })))
        }
    }
}
