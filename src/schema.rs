//! The schema model: a resolved node with typed accessors, classification
//! predicates, and the combinator algebra (`allOf` merging, `oneOf`
//! expansion, `not` push-down, flattening).
//!
//! A node wraps a canonical document and a weak handle to its store. All
//! combinator operations return nodes interned in the same store, so
//! structurally identical results share identity.

use std::cell::Cell;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::{json, Map, Value};

use crate::canonical::{values_equal, CanonicalValue};
use crate::error::SchemaError;
use crate::merge::{merged_document, KeywordValues, MergeOutcome};
use crate::store::{
    false_document, is_false_document, is_true_document, normalize_document, true_document,
    SchemaId, StoreInner, StoreOptions,
};
use crate::types::{json_type_name, SchemaType, ALL_TYPES, STRING_CONSTANT};

/// A resolved schema node.
///
/// Created through a [`SchemaStore`](crate::SchemaStore); two nodes from the
/// same store with structurally identical documents and the same owning root
/// are the same `Rc`.
pub struct Schema {
    doc: CanonicalValue,
    store: Weak<StoreInner>,
    id: SchemaId,
    types: Vec<SchemaType>,
    const_value: Option<Value>,
    forbidden_value: Option<Value>,
    /// Effective properties: declared `properties` plus the abstract
    /// additional-property slot under `"\S"` when additional properties are
    /// allowed. Empty for non-object schemas.
    properties: Map<String, Value>,
    additional_properties: Value,
    cyclic: Cell<bool>,
}

fn add_type(types: &mut Vec<SchemaType>, schema_type: SchemaType) {
    if !types.contains(&schema_type) {
        types.push(schema_type);
    }
}

fn add_types(types: &mut Vec<SchemaType>, value: &Value) -> Result<(), SchemaError> {
    match value {
        Value::String(name) => {
            add_type(types, SchemaType::from_keyword(name)?);
            Ok(())
        }
        Value::Array(names) => {
            for name in names {
                let name = name.as_str().ok_or_else(|| SchemaError::MalformedDocument {
                    message: format!(
                        "\"type\" array entries must be strings, got {}",
                        json_type_name(name)
                    ),
                })?;
                add_type(types, SchemaType::from_keyword(name)?);
            }
            Ok(())
        }
        other => Err(SchemaError::MalformedDocument {
            message: format!(
                "\"type\" must be a string or array of strings, got {}",
                json_type_name(other)
            ),
        }),
    }
}

fn remove_types(types: &mut Vec<SchemaType>, value: &Value) -> Result<(), SchemaError> {
    let mut removed = Vec::new();
    add_types(&mut removed, value)?;
    types.retain(|schema_type| !removed.contains(schema_type));
    Ok(())
}

fn additional_properties_document(map: &Map<String, Value>) -> Result<Value, SchemaError> {
    match map.get("additionalProperties") {
        None => Ok(true_document()),
        Some(Value::Bool(true)) => Ok(true_document()),
        Some(Value::Bool(false)) => Ok(false_document()),
        Some(Value::Object(constraint)) => Ok(Value::Object(constraint.clone())),
        Some(other) => Err(SchemaError::MalformedDocument {
            message: format!(
                "\"additionalProperties\" must be a schema, got {}",
                json_type_name(other)
            ),
        }),
    }
}

impl Schema {
    /// Classify a document: allowed types, constant, forbidden constant, and
    /// effective properties are all fixed at construction; combinators stay
    /// lazy.
    pub(crate) fn new(
        doc: CanonicalValue,
        store: Weak<StoreInner>,
        id: SchemaId,
        options: &StoreOptions,
    ) -> Result<Schema, SchemaError> {
        let (types, const_value, forbidden_value, properties, additional_properties) = {
            let map = doc
                .value()
                .as_object()
                .ok_or_else(|| SchemaError::MalformedDocument {
                    message: format!(
                        "schema document must be an object or boolean, got {}",
                        json_type_name(doc.value())
                    ),
                })?;

            let mut types = Vec::new();
            let mut constrained = false;
            if let Some(type_value) = map.get("type") {
                add_types(&mut types, type_value)?;
                constrained = true;
            }
            if map.contains_key("enum") {
                add_type(&mut types, SchemaType::Enum);
                constrained = true;
            }
            let const_value = map.get("const").cloned();
            if let Some(value) = &const_value {
                // A constant pins the schema to exactly one kind.
                types.clear();
                types.push(SchemaType::of_value(value));
                constrained = true;
            }
            if !constrained {
                types.extend(ALL_TYPES);
            }

            let not_doc: Option<&Map<String, Value>> = match map.get("not") {
                Some(value) => value.as_object(),
                None => map
                    .get("anyOf")
                    .and_then(Value::as_array)
                    .filter(|branches| branches.len() == 1)
                    .and_then(|branches| branches[0].get("not"))
                    .and_then(Value::as_object),
            };
            let mut forbidden_value = None;
            if let Some(not) = not_doc {
                if let Some(excluded) = not.get("type") {
                    remove_types(&mut types, excluded)?;
                }
                forbidden_value = not.get("const").cloned();
            }

            let (properties, additional_properties) = if types.contains(&SchemaType::Object) {
                let mut properties = match map.get("properties") {
                    Some(Value::Object(declared)) => declared.clone(),
                    Some(other) => {
                        return Err(SchemaError::MalformedDocument {
                            message: format!(
                                "\"properties\" must be an object, got {}",
                                json_type_name(other)
                            ),
                        })
                    }
                    None => Map::new(),
                };
                let additional = additional_properties_document(map)?;
                let keep_abstract_slot = !is_false_document(&additional)
                    && !(is_true_document(&additional) && options.ignore_true_additional_properties);
                if keep_abstract_slot {
                    properties.insert(STRING_CONSTANT.to_string(), additional.clone());
                }
                (properties, additional)
            } else {
                (Map::new(), false_document())
            };

            (
                types,
                const_value,
                forbidden_value,
                properties,
                additional_properties,
            )
        };

        Ok(Schema {
            doc,
            store,
            id,
            types,
            const_value,
            forbidden_value,
            properties,
            additional_properties,
            cyclic: Cell::new(false),
        })
    }

    /// The underlying JSON document.
    pub fn document(&self) -> &Value {
        self.doc.value()
    }

    /// The canonical wrapper, carrying the structural hash.
    pub fn canonical(&self) -> &CanonicalValue {
        &self.doc
    }

    pub(crate) fn id(&self) -> SchemaId {
        self.id
    }

    pub(crate) fn mark_cyclic(&self) {
        self.cyclic.set(true);
    }

    fn store(&self) -> Result<Rc<StoreInner>, SchemaError> {
        self.store.upgrade().ok_or(SchemaError::StoreDropped)
    }

    // ---- classification ----------------------------------------------------

    /// The kinds of value this schema can accept, in declaration order.
    pub fn allowed_types(&self) -> &[SchemaType] {
        &self.types
    }

    pub fn is_object(&self) -> bool {
        self.types.contains(&SchemaType::Object)
    }

    pub fn is_array(&self) -> bool {
        self.types.contains(&SchemaType::Array)
    }

    pub fn is_string(&self) -> bool {
        self.types.contains(&SchemaType::String)
    }

    pub fn is_number(&self) -> bool {
        self.types.contains(&SchemaType::Number)
    }

    pub fn is_integer(&self) -> bool {
        self.types.contains(&SchemaType::Integer)
    }

    pub fn is_boolean(&self) -> bool {
        self.types.contains(&SchemaType::Boolean)
    }

    pub fn is_null(&self) -> bool {
        self.types.contains(&SchemaType::Null)
    }

    pub fn is_enum(&self) -> bool {
        self.types.contains(&SchemaType::Enum)
    }

    /// The pinned constant, when the schema carries a `const` constraint.
    pub fn const_value(&self) -> Option<&Value> {
        self.const_value.as_ref()
    }

    /// The declared `enum` members, when present.
    pub fn enum_values(&self) -> Option<&Vec<Value>> {
        self.document().get("enum").and_then(Value::as_array)
    }

    /// Values this schema rejects: enum members excluded through `not`
    /// branches plus a forbidden constant, structurally deduplicated.
    pub fn forbidden_values(&self) -> Vec<Value> {
        let mut forbidden: Vec<Value> = Vec::new();
        let mut push = |value: &Value| {
            if !forbidden.iter().any(|existing| values_equal(existing, value)) {
                forbidden.push(value.clone());
            }
        };

        if let Some(map) = self.document().as_object() {
            let mut negated: Vec<&Value> = Vec::new();
            if let Some(not) = map.get("not") {
                negated.push(not);
            }
            if let Some(branches) = map.get("anyOf").and_then(Value::as_array) {
                for branch in branches {
                    if let Some(not) = branch.get("not") {
                        negated.push(not);
                    }
                }
            }
            for not in negated {
                if let Some(members) = not.get("enum").and_then(Value::as_array) {
                    for member in members {
                        push(member);
                    }
                }
            }
        }
        if let Some(value) = &self.forbidden_value {
            push(value);
        }
        forbidden
    }

    // ---- typed accessors ---------------------------------------------------

    fn field(&self, key: &str) -> Result<&Value, SchemaError> {
        self.document()
            .get(key)
            .ok_or_else(|| SchemaError::MissingField { key: key.into() })
    }

    fn mismatch(&self, key: &str, expected: &'static str) -> SchemaError {
        let actual = self
            .document()
            .get(key)
            .map_or("missing", json_type_name);
        SchemaError::TypeMismatch {
            key: key.into(),
            expected,
            actual,
        }
    }

    /// Read a keyword as an integer.
    ///
    /// # Errors
    ///
    /// `MissingField` when absent, `TypeMismatch` when not an integer.
    pub fn get_int(&self, key: &str) -> Result<i64, SchemaError> {
        self.field(key)?
            .as_i64()
            .ok_or_else(|| self.mismatch(key, "integer"))
    }

    pub fn get_int_or(&self, key: &str, default: i64) -> i64 {
        self.document()
            .get(key)
            .and_then(Value::as_i64)
            .unwrap_or(default)
    }

    /// Read a keyword as a number.
    pub fn get_number(&self, key: &str) -> Result<f64, SchemaError> {
        self.field(key)?
            .as_f64()
            .ok_or_else(|| self.mismatch(key, "number"))
    }

    pub fn get_number_or(&self, key: &str, default: f64) -> f64 {
        self.document()
            .get(key)
            .and_then(Value::as_f64)
            .unwrap_or(default)
    }

    /// Read a keyword as a string.
    pub fn get_string(&self, key: &str) -> Result<&str, SchemaError> {
        self.field(key)?
            .as_str()
            .ok_or_else(|| self.mismatch(key, "string"))
    }

    pub fn get_string_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.document()
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
    }

    /// Read a keyword as a boolean.
    pub fn get_bool(&self, key: &str) -> Result<bool, SchemaError> {
        self.field(key)?
            .as_bool()
            .ok_or_else(|| self.mismatch(key, "boolean"))
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.document()
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(default)
    }

    // ---- structure ---------------------------------------------------------

    /// Names of the effective properties, the abstract additional-property
    /// slot included.
    pub fn property_names(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    /// The effective property schemas, references followed.
    pub fn properties(&self) -> Result<BTreeMap<String, Rc<Schema>>, SchemaError> {
        let store = self.store()?;
        let mut resolved = BTreeMap::new();
        for (name, definition) in &self.properties {
            resolved.insert(
                name.clone(),
                store.resolve_subdocument(self.id, definition.clone())?,
            );
        }
        Ok(resolved)
    }

    /// One effective property's schema, reference followed.
    ///
    /// # Errors
    ///
    /// `MissingField` when the property is not declared.
    pub fn property_schema(&self, name: &str) -> Result<Rc<Schema>, SchemaError> {
        let definition = self
            .properties
            .get(name)
            .ok_or_else(|| SchemaError::MissingField { key: name.into() })?;
        self.store()?.resolve_subdocument(self.id, definition.clone())
    }

    /// Property names listed in `required`. Empty for non-object schemas.
    ///
    /// # Errors
    ///
    /// `MalformedDocument` when a `required` entry is not a string.
    pub fn required_property_keys(&self) -> Result<Vec<String>, SchemaError> {
        if !self.is_object() {
            return Ok(Vec::new());
        }
        let names = match self.document().get("required").and_then(Value::as_array) {
            Some(names) => names,
            None => return Ok(Vec::new()),
        };
        names
            .iter()
            .map(|name| {
                name.as_str().map(str::to_string).ok_or_else(|| {
                    SchemaError::MalformedDocument {
                        message: format!("non-string entry in \"required\": {}", name),
                    }
                })
            })
            .collect()
    }

    /// Schemas of the required properties.
    ///
    /// # Errors
    ///
    /// `MissingField` when a required name has no effective definition.
    pub fn required_properties(&self) -> Result<BTreeMap<String, Rc<Schema>>, SchemaError> {
        let mut required = BTreeMap::new();
        for name in self.required_property_keys()? {
            let schema = self.property_schema(&name)?;
            required.insert(name, schema);
        }
        Ok(required)
    }

    /// Schemas of the effective properties that are not required.
    pub fn non_required_properties(&self) -> Result<BTreeMap<String, Rc<Schema>>, SchemaError> {
        let required = self.required_property_keys()?;
        let mut optional = self.properties()?;
        optional.retain(|name, _| !required.contains(name));
        Ok(optional)
    }

    /// The additional-properties schema. The true schema when unconstrained,
    /// the false schema when additional properties are forbidden or the
    /// schema is not an object.
    pub fn additional_properties(&self) -> Result<Rc<Schema>, SchemaError> {
        self.store()?
            .resolve_subdocument(self.id, self.additional_properties.clone())
    }

    /// The item schemas. A single-schema `items` yields one element, a tuple
    /// form yields one per position, and a missing or empty `items` yields
    /// the true schema.
    pub fn items(&self) -> Result<Vec<Rc<Schema>>, SchemaError> {
        let store = self.store()?;
        let Some(value) = self.document().get("items") else {
            return Ok(vec![store.true_schema()]);
        };
        match value {
            Value::Array(entries) => {
                if entries.is_empty() {
                    return Ok(vec![store.true_schema()]);
                }
                entries
                    .iter()
                    .map(|entry| store.resolve_subdocument(self.id, entry.clone()))
                    .collect()
            }
            single => Ok(vec![store.resolve_subdocument(self.id, single.clone())?]),
        }
    }

    /// A raw sub-document as a schema, reference followed.
    pub fn sub_schema(&self, key: &str) -> Result<Rc<Schema>, SchemaError> {
        let value = self.field(key)?;
        if !value.is_object() && !value.is_boolean() {
            return Err(self.mismatch(key, "object"));
        }
        self.store()?.resolve_subdocument(self.id, value.clone())
    }

    // ---- combinators -------------------------------------------------------

    /// Merge every `allOf` branch into one conjunct schema.
    ///
    /// References in branches are followed first. A false branch or an
    /// unsatisfiable combination collapses to the false schema; a missing
    /// `allOf` yields the true schema.
    ///
    /// # Errors
    ///
    /// `MergeConflict` when branches disagree on `$ref` or
    /// `additionalProperties`.
    pub fn all_of(&self) -> Result<Rc<Schema>, SchemaError> {
        let store = self.store()?;
        let Some(branches) = self.document().get("allOf").and_then(Value::as_array) else {
            return Ok(store.true_schema());
        };

        let mut collected = KeywordValues::default();
        for branch in branches {
            let resolved = match branch.get("$ref").and_then(Value::as_str) {
                Some(reference) => store
                    .resolve_reference(self.id, reference)?
                    .document()
                    .clone(),
                None => normalize_document(branch.clone()),
            };
            if is_false_document(&resolved) {
                return Ok(store.false_schema());
            }
            if let Some(map) = resolved.as_object() {
                collected.insert_mergeable(map);
            }
        }

        match merged_document(collected)? {
            MergeOutcome::Document(doc) => store.intern(doc, self.id),
            MergeOutcome::Unsatisfiable => Ok(store.false_schema()),
        }
    }

    /// The `anyOf` alternatives, references followed. A missing `anyOf`
    /// yields the single true schema.
    pub fn any_of(&self) -> Result<Vec<Rc<Schema>>, SchemaError> {
        let store = self.store()?;
        let Some(branches) = self.document().get("anyOf").and_then(Value::as_array) else {
            return Ok(vec![store.true_schema()]);
        };
        branches
            .iter()
            .map(|branch| store.resolve_subdocument(self.id, branch.clone()))
            .collect()
    }

    /// Expand `oneOf` into exclusive alternatives: each branch combined with
    /// the negation of every other branch, so the exactly-one semantics
    /// survive as plain conjunction.
    pub fn one_of(&self) -> Result<Vec<Rc<Schema>>, SchemaError> {
        let store = self.store()?;
        let Some(branches) = self.document().get("oneOf").and_then(Value::as_array) else {
            return Ok(vec![store.true_schema()]);
        };
        let mut exclusive = Vec::with_capacity(branches.len());
        for (index, branch) in branches.iter().enumerate() {
            let mut conjunction = vec![branch.clone()];
            for (other_index, other) in branches.iter().enumerate() {
                if other_index != index {
                    conjunction.push(json!({ "not": other }));
                }
            }
            exclusive.push(store.intern(json!({ "allOf": conjunction }), self.id)?);
        }
        Ok(exclusive)
    }

    /// The negated schema as written: the `not` sub-document, or the false
    /// schema when none is present.
    pub fn raw_not(&self) -> Result<Rc<Schema>, SchemaError> {
        if self.document().get("not").is_some() {
            self.sub_schema("not")
        } else {
            Ok(self.store()?.false_schema())
        }
    }

    /// Push the negation down: one complemented schema per keyword of the
    /// `not` sub-document. Keywords with no usable complement are skipped; a
    /// missing `not` yields the single true schema.
    pub fn not_branches(&self) -> Result<Vec<Rc<Schema>>, SchemaError> {
        let store = self.store()?;
        let Some(not_value) = self.document().get("not") else {
            return Ok(vec![store.true_schema()]);
        };

        let resolved = match not_value.get("$ref").and_then(Value::as_str) {
            Some(reference) => store
                .resolve_reference(self.id, reference)?
                .document()
                .clone(),
            None => normalize_document(not_value.clone()),
        };
        let Some(map) = resolved.as_object() else {
            return Ok(vec![store.true_schema()]);
        };

        let mut branches = Vec::new();
        for (key, value) in map {
            let values = vec![value.clone()];
            if let Some(negated) = crate::merge::apply_not(key, &values)? {
                branches.push(store.resolve_subdocument(self.id, negated)?);
            }
        }
        Ok(branches)
    }

    /// Merge two schemas into their conjunction.
    ///
    /// The false schema absorbs; the true schema is the identity. The result
    /// is interned, so merging with an equivalent schema returns a shared
    /// node.
    ///
    /// # Errors
    ///
    /// `MergeConflict` when the documents disagree on `$ref` or
    /// `additionalProperties`.
    pub fn merge(&self, other: &Schema) -> Result<Rc<Schema>, SchemaError> {
        let store = self.store()?;
        if is_false_document(self.document()) || is_false_document(other.document()) {
            return Ok(store.false_schema());
        }
        if is_true_document(other.document()) {
            return store.intern(self.document().clone(), self.id);
        }
        if is_true_document(self.document()) {
            return store.intern(other.document().clone(), other.id);
        }

        let mut collected = KeywordValues::default();
        if let Some(map) = self.document().as_object() {
            collected.insert_all(map);
        }
        if let Some(map) = other.document().as_object() {
            collected.insert_all(map);
        }
        match merged_document(collected)? {
            MergeOutcome::Document(doc) => store.intern(doc, self.id),
            MergeOutcome::Unsatisfiable => Ok(store.false_schema()),
        }
    }

    /// Fold the schema's own constraints together with its merged `allOf`
    /// into a single conjunct document.
    ///
    /// Flattening an already flat schema returns the identical node, so the
    /// operation is idempotent.
    pub fn flatten(&self) -> Result<Rc<Schema>, SchemaError> {
        let store = self.store()?;
        let Some(map) = self.document().as_object() else {
            return store.intern(self.document().clone(), self.id);
        };
        if !map.contains_key("allOf") {
            return store.intern(self.document().clone(), self.id);
        }

        let conjunct = self.all_of()?;
        let mut own = map.clone();
        own.remove("allOf");
        let own_schema = store.intern(Value::Object(own), self.id)?;
        own_schema.merge(&conjunct)
    }

    // ---- analysis ----------------------------------------------------------

    /// Whether combinator structure remains that flattening and `oneOf`/`not`
    /// expansion have not eliminated, or the node sits on a reference cycle.
    pub fn needs_further_unfolding(&self) -> bool {
        if self.cyclic.get() {
            return true;
        }
        let Some(map) = self.document().as_object() else {
            return false;
        };
        if map.contains_key("$ref") {
            return true;
        }
        if let Some(not) = map.get("not").and_then(Value::as_object) {
            if not_needs_unfolding(not) {
                return true;
            }
        }
        ["allOf", "anyOf", "oneOf"].iter().any(|key| {
            map.get(*key)
                .and_then(Value::as_array)
                .is_some_and(|branches| branches_need_unfolding(branches))
        })
    }

    /// Maximum nesting level of the value shape this schema describes.
    ///
    /// Reference cycles contribute nothing beyond their first traversal, so
    /// the result is finite for every schema.
    pub fn depth(&self) -> Result<usize, SchemaError> {
        let mut visited = HashSet::new();
        self.depth_of(self.document(), &mut visited)
    }

    fn depth_of(
        &self,
        doc: &Value,
        visited: &mut HashSet<(SchemaId, String)>,
    ) -> Result<usize, SchemaError> {
        let Some(map) = doc.as_object() else {
            return Ok(0);
        };
        if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
            if !visited.insert((self.id, reference.to_string())) {
                return Ok(0);
            }
            let target = self.store()?.resolve_reference(self.id, reference)?;
            return target.depth_of(target.document(), visited);
        }

        let mut depth = 0;
        for (key, value) in map {
            match key.as_str() {
                "properties" | "patternProperties" | "$defs" | "definitions" => {
                    if let Some(children) = value.as_object() {
                        for child in children.values() {
                            depth = depth.max(self.depth_of(child, visited)? + 1);
                        }
                    }
                }
                "items" => match value {
                    Value::Array(entries) => {
                        for entry in entries {
                            depth = depth.max(self.depth_of(entry, visited)? + 1);
                        }
                    }
                    single => depth = depth.max(self.depth_of(single, visited)? + 1),
                },
                "allOf" | "anyOf" | "oneOf" => {
                    if let Some(branches) = value.as_array() {
                        for branch in branches {
                            depth = depth.max(self.depth_of(branch, visited)?);
                        }
                    }
                }
                "not" | "additionalProperties" => {
                    depth = depth.max(self.depth_of(value, visited)?);
                }
                _ => {}
            }
        }
        Ok(depth)
    }
}

/// A negation is fully unfolded only when it excludes nothing but literal
/// values.
fn not_needs_unfolding(not: &Map<String, Value>) -> bool {
    let literal_only = match not.len() {
        1 => not.contains_key("const") || not.contains_key("enum"),
        2 => not.contains_key("const") && not.contains_key("enum"),
        _ => false,
    };
    !literal_only
}

fn branches_need_unfolding(branches: &[Value]) -> bool {
    if branches.len() != 1 {
        return true;
    }
    match branches[0]
        .as_object()
        .and_then(|branch| branch.get("not").and_then(Value::as_object))
    {
        Some(not) => not_needs_unfolding(not),
        None => true,
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.doc == other.doc
    }
}

impl Eq for Schema {}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("document", self.document())
            .field("types", &self.types)
            .finish()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = serde_json::to_string_pretty(self.document()).map_err(|_| fmt::Error)?;
        f.write_str(&rendered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{SchemaStore, StoreOptions};

    // The store must outlive the node: accessors resolve through a weak
    // handle back to it.
    fn load(content: &str) -> (SchemaStore, Rc<Schema>) {
        let store = SchemaStore::new();
        let schema = store.load_str(content).unwrap();
        (store, schema)
    }

    #[test]
    fn type_keyword_single_and_array() {
        let (_store, schema) = load(r#"{"type": "string"}"#);
        assert!(schema.is_string());
        assert!(!schema.is_object());

        let (_store, schema) = load(r#"{"type": ["object", "null"]}"#);
        assert!(schema.is_object());
        assert!(schema.is_null());
        assert!(!schema.is_string());
    }

    #[test]
    fn unconstrained_schema_allows_everything() {
        let (_store, schema) = load(r#"{"minLength": 2}"#);
        assert_eq!(schema.allowed_types(), &ALL_TYPES);
    }

    #[test]
    fn enum_keyword_adds_enum_kind() {
        let (_store, schema) = load(r#"{"type": "string", "enum": ["a", "b"]}"#);
        assert!(schema.is_string());
        assert!(schema.is_enum());
        assert_eq!(
            schema.enum_values().unwrap(),
            &vec![json!("a"), json!("b")]
        );
    }

    #[test]
    fn const_pins_the_kind() {
        let (_store, schema) = load(r#"{"type": ["string", "integer"], "const": 3}"#);
        assert_eq!(schema.allowed_types(), &[SchemaType::Integer]);
        assert_eq!(schema.const_value(), Some(&json!(3)));
    }

    #[test]
    fn not_type_removes_kinds() {
        let (_store, schema) = load(r#"{"not": {"type": ["string", "object"]}}"#);
        assert!(!schema.is_string());
        assert!(!schema.is_object());
        assert!(schema.is_integer());
        assert!(schema.is_array());
    }

    #[test]
    fn single_any_of_not_counts_as_negation() {
        let (_store, schema) = load(r#"{"anyOf": [{"not": {"type": "null", "const": 7}}]}"#);
        assert!(!schema.is_null());
        assert_eq!(schema.forbidden_values(), vec![json!(7)]);
    }

    #[test]
    fn forbidden_enum_members_collected() {
        let (_store, schema) = load(r#"{"anyOf": [{"not": {"enum": [1, 2]}}, {"not": {"enum": [2, 3]}}]}"#);
        assert_eq!(schema.forbidden_values(), vec![json!(1), json!(2), json!(3)]);
    }

    #[test]
    fn effective_properties_include_abstract_slot() {
        let (_store, schema) = load(r#"{"type": "object", "properties": {"name": {"type": "string"}}}"#);
        let names = schema.property_names();
        assert!(names.contains(&"name".to_string()));
        assert!(names.contains(&STRING_CONSTANT.to_string()));

        let slot = schema.property_schema(STRING_CONSTANT).unwrap();
        assert!(SchemaStore::is_true_schema(&slot));
    }

    #[test]
    fn false_additional_properties_drop_the_slot() {
        let (_store, schema) = load(
            r#"{"type": "object", "properties": {"name": {}}, "additionalProperties": false}"#,
        );
        assert!(!schema.property_names().contains(&STRING_CONSTANT.to_string()));
        let additional = schema.additional_properties().unwrap();
        assert!(SchemaStore::is_false_schema(&additional));
    }

    #[test]
    fn true_additional_properties_can_be_ignored() {
        let store = SchemaStore::with_options(StoreOptions {
            ignore_true_additional_properties: true,
        });
        let schema = store
            .load_str(r#"{"type": "object", "additionalProperties": true}"#)
            .unwrap();
        assert!(schema.property_names().is_empty());
    }

    #[test]
    fn constrained_additional_properties_fill_the_slot() {
        let (_store, schema) = load(r#"{"type": "object", "additionalProperties": {"type": "integer"}}"#);
        let slot = schema.property_schema(STRING_CONSTANT).unwrap();
        assert!(slot.is_integer());
        assert!(!slot.is_string());
    }

    #[test]
    fn required_and_non_required_split() {
        let (_store, schema) = load(
            r#"{
                "type": "object",
                "properties": {"a": {"type": "string"}, "b": {"type": "integer"}},
                "required": ["a"],
                "additionalProperties": false
            }"#,
        );
        assert_eq!(schema.required_property_keys().unwrap(), vec!["a"]);
        let required = schema.required_properties().unwrap();
        assert_eq!(required.keys().collect::<Vec<_>>(), vec!["a"]);
        let optional = schema.non_required_properties().unwrap();
        assert_eq!(optional.keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn non_string_required_entry_is_an_error() {
        let (_store, schema) = load(
            r#"{"type": "object", "required": ["a", 7], "additionalProperties": false}"#,
        );
        assert!(matches!(
            schema.required_property_keys(),
            Err(SchemaError::MalformedDocument { .. })
        ));
    }

    #[test]
    fn missing_required_property_definition_is_an_error() {
        let (_store, schema) = load(
            r#"{"type": "object", "required": ["ghost"], "additionalProperties": false}"#,
        );
        assert!(matches!(
            schema.required_properties(),
            Err(SchemaError::MissingField { .. })
        ));
    }

    #[test]
    fn typed_accessors() {
        let (_store, schema) = load(r#"{"minLength": 2, "multipleOf": 1.5, "title": "t", "uniqueItems": true}"#);
        assert_eq!(schema.get_int("minLength").unwrap(), 2);
        assert_eq!(schema.get_number("multipleOf").unwrap(), 1.5);
        assert_eq!(schema.get_string("title").unwrap(), "t");
        assert!(schema.get_bool("uniqueItems").unwrap());

        assert!(matches!(
            schema.get_int("maxLength"),
            Err(SchemaError::MissingField { .. })
        ));
        assert!(matches!(
            schema.get_int("title"),
            Err(SchemaError::TypeMismatch { .. })
        ));
        assert_eq!(schema.get_int_or("maxLength", 9), 9);
        assert_eq!(schema.get_string_or("description", "none"), "none");
    }

    #[test]
    fn items_forms() {
        let (_store, schema) = load(r#"{"type": "array"}"#);
        let items = schema.items().unwrap();
        assert_eq!(items.len(), 1);
        assert!(SchemaStore::is_true_schema(&items[0]));

        let (_store, schema) = load(r#"{"type": "array", "items": {"type": "string"}}"#);
        let items = schema.items().unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_string());

        let (_store, schema) = load(r#"{"type": "array", "items": [{"type": "string"}, {"type": "null"}]}"#);
        let items = schema.items().unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_string());
        assert!(items[1].is_null());
    }

    #[test]
    fn all_of_merges_branches() {
        let (_store, schema) = load(
            r#"{"allOf": [
                {"type": "object", "required": ["a"]},
                {"type": "object", "required": ["b"]}
            ]}"#,
        );
        let merged = schema.all_of().unwrap();
        assert!(merged.is_object());
        let mut required = merged.required_property_keys().unwrap();
        required.sort();
        assert_eq!(required, vec!["a", "b"]);
    }

    #[test]
    fn all_of_with_false_branch_collapses() {
        let store = SchemaStore::new();
        let schema = store
            .load_str(r#"{"allOf": [{"type": "object"}, false]}"#)
            .unwrap();
        let merged = schema.all_of().unwrap();
        assert!(Rc::ptr_eq(&merged, &store.false_schema()));
    }

    #[test]
    fn missing_all_of_is_the_true_schema() {
        let store = SchemaStore::new();
        let schema = store.load_str(r#"{"type": "integer"}"#).unwrap();
        assert!(Rc::ptr_eq(&schema.all_of().unwrap(), &store.true_schema()));
    }

    #[test]
    fn one_of_expands_exclusively() {
        let (_store, schema) = load(r#"{"oneOf": [{"type": "string"}, {"type": "integer"}]}"#);
        let exclusive = schema.one_of().unwrap();
        assert_eq!(exclusive.len(), 2);
        assert_eq!(
            exclusive[0].document(),
            &json!({"allOf": [{"type": "string"}, {"not": {"type": "integer"}}]})
        );
        assert_eq!(
            exclusive[1].document(),
            &json!({"allOf": [{"type": "integer"}, {"not": {"type": "string"}}]})
        );
    }

    #[test]
    fn not_branches_push_negation_down() {
        let (_store, schema) = load(r#"{"not": {"type": "string", "minLength": 3}}"#);
        let branches = schema.not_branches().unwrap();
        assert_eq!(branches.len(), 2);
        assert!(branches.iter().any(|b| !b.is_string() && b.is_integer()));
        assert!(branches
            .iter()
            .any(|b| b.document().get("maxLength") == Some(&json!(2))));
    }

    #[test]
    fn double_negation_unwraps() {
        let (_store, schema) = load(r#"{"not": {"not": {"type": "string"}}}"#);
        let branches = schema.not_branches().unwrap();
        assert_eq!(branches.len(), 1);
        assert_eq!(branches[0].document(), &json!({"type": "string"}));
    }

    #[test]
    fn merge_intersects_enums() {
        let store = SchemaStore::new();
        let left = store
            .load_str(r#"{"type": "integer", "enum": [1, 2, 3]}"#)
            .unwrap();
        let right = store.load_str(r#"{"enum": [2, 3, 4]}"#).unwrap();
        let merged = left.merge(&right).unwrap();
        assert!(merged.is_integer());
        assert!(merged.is_enum());
        assert_eq!(merged.enum_values().unwrap(), &vec![json!(2), json!(3)]);
    }

    #[test]
    fn merge_with_disjoint_types_is_false() {
        let store = SchemaStore::new();
        let left = store.load_str(r#"{"type": "string"}"#).unwrap();
        let right = store.load_str(r#"{"type": "integer"}"#).unwrap();
        let merged = left.merge(&right).unwrap();
        assert!(Rc::ptr_eq(&merged, &store.false_schema()));
    }

    #[test]
    fn merge_true_is_identity() {
        let store = SchemaStore::new();
        let schema = store.load_str(r#"{"type": "object"}"#).unwrap();
        let merged = schema.merge(&store.true_schema()).unwrap();
        assert!(Rc::ptr_eq(&merged, &schema));
    }

    #[test]
    fn merge_false_absorbs() {
        let store = SchemaStore::new();
        let schema = store.load_str(r#"{"type": "object"}"#).unwrap();
        let merged = schema.merge(&store.false_schema()).unwrap();
        assert!(Rc::ptr_eq(&merged, &store.false_schema()));
    }

    #[test]
    fn merge_conflicting_additional_properties_is_an_error() {
        let store = SchemaStore::new();
        let left = store
            .load_str(r#"{"type": "object", "additionalProperties": {"type": "string"}}"#)
            .unwrap();
        let right = store
            .load_str(r#"{"type": "object", "additionalProperties": {"type": "integer"}}"#)
            .unwrap();
        assert!(matches!(
            left.merge(&right),
            Err(SchemaError::MergeConflict { .. })
        ));
    }

    #[test]
    fn flatten_folds_all_of_into_the_document() {
        let (_store, schema) = load(
            r#"{
                "type": "object",
                "required": ["a"],
                "allOf": [{"required": ["b"], "minProperties": 2}]
            }"#,
        );
        let flat = schema.flatten().unwrap();
        assert!(flat.document().get("allOf").is_none());
        let mut required = flat.required_property_keys().unwrap();
        required.sort();
        assert_eq!(required, vec!["a", "b"]);
        assert_eq!(flat.get_int("minProperties").unwrap(), 2);
    }

    #[test]
    fn flatten_is_idempotent() {
        let (_store, schema) = load(
            r#"{"allOf": [{"type": "object", "required": ["a"]}, {"required": ["b"]}]}"#,
        );
        let once = schema.flatten().unwrap();
        let twice = once.flatten().unwrap();
        assert!(Rc::ptr_eq(&once, &twice));
    }

    #[test]
    fn flatten_unsatisfiable_conjunction_is_false() {
        let store = SchemaStore::new();
        let schema = store
            .load_str(r#"{"allOf": [{"type": "string"}, {"type": "integer"}]}"#)
            .unwrap();
        let flat = schema.flatten().unwrap();
        assert!(Rc::ptr_eq(&flat, &store.false_schema()));
    }

    #[test]
    fn needs_further_unfolding_signals() {
        let unfolds = |content: &str| load(content).1.needs_further_unfolding();
        assert!(!unfolds(r#"{"type": "object"}"#));
        assert!(unfolds(r#"{"allOf": [{"type": "object"}, {"type": "object"}]}"#));
        assert!(unfolds(r#"{"oneOf": [{"type": "string"}]}"#));
        assert!(unfolds(r#"{"not": {"type": "string"}}"#));
        // A negation excluding only literal values is already unfolded.
        assert!(!unfolds(r#"{"not": {"const": 3}}"#));
        assert!(!unfolds(r#"{"anyOf": [{"not": {"enum": [1, 2]}}]}"#));
    }

    #[test]
    fn depth_counts_nesting() {
        let (_store, schema) = load(r#"{"type": "string"}"#);
        assert_eq!(schema.depth().unwrap(), 0);
        let (_store, schema) =
            load(r#"{"type": "object", "properties": {"a": {"type": "string"}}}"#);
        assert_eq!(schema.depth().unwrap(), 1);
        let (_store, schema) = load(
            r#"{
                "type": "object",
                "properties": {
                    "a": {"type": "array", "items": {"type": "object", "properties": {"b": {}}}}
                }
            }"#,
        );
        assert_eq!(schema.depth().unwrap(), 3);
    }

    #[test]
    fn depth_ignores_combinator_wrappers() {
        let (_store, schema) = load(
            r#"{"allOf": [{"type": "object", "properties": {"a": {"type": "string"}}}]}"#,
        );
        assert_eq!(schema.depth().unwrap(), 1);
    }

    #[test]
    fn display_renders_pretty_json() {
        let (_store, schema) = load(r#"{"type": "string"}"#);
        let rendered = schema.to_string();
        assert!(rendered.contains("\"type\": \"string\""));
    }
}
