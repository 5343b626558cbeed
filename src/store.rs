//! The schema store: loads documents, resolves references, deduplicates
//! structurally identical schemas, and owns the boolean-schema singletons.
//!
//! One store is one resolution session. All caches are interior to the store;
//! two stores never share state, so independent sessions cannot leak schemas
//! into each other.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::{json, Value};

use crate::canonical::CanonicalValue;
use crate::error::SchemaError;
use crate::loader;
use crate::schema::Schema;

/// Identifies the root document a schema node belongs to. Internal `#/…`
/// references resolve against the owning root; relative references resolve
/// against its base directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaId {
    True,
    False,
    Root(usize),
}

/// Session options.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Discard `"additionalProperties": true`, so the abstract
    /// additional-property slot is only materialized for constrained
    /// additional properties.
    pub ignore_true_additional_properties: bool,
}

/// The canonical `true` schema document: accepts every value.
pub fn true_document() -> Value {
    json!({})
}

/// The canonical `false` schema document: accepts no value.
pub fn false_document() -> Value {
    json!({"not": {}})
}

/// Recognizes documents provably equivalent to the `true` schema: the
/// literal `true`, the empty object, and an empty `allOf`.
pub fn is_true_document(document: &Value) -> bool {
    match document {
        Value::Bool(true) => true,
        Value::Object(map) => {
            map.is_empty()
                || (map.len() == 1
                    && map
                        .get("allOf")
                        .and_then(Value::as_array)
                        .is_some_and(Vec::is_empty))
        }
        _ => false,
    }
}

/// Recognizes documents provably equivalent to the `false` schema: the
/// literal `false`, a negated true schema, and an empty `anyOf`/`oneOf`.
pub fn is_false_document(document: &Value) -> bool {
    let Value::Object(map) = document else {
        return matches!(document, Value::Bool(false));
    };
    if map.len() != 1 {
        return false;
    }
    if let Some(not) = map.get("not") {
        return is_true_document(not);
    }
    ["anyOf", "oneOf"].iter().any(|key| {
        map.get(*key)
            .and_then(Value::as_array)
            .is_some_and(Vec::is_empty)
    })
}

pub(crate) fn normalize_document(raw: Value) -> Value {
    match raw {
        Value::Bool(true) => true_document(),
        Value::Bool(false) => false_document(),
        other => other,
    }
}

/// Split a reference into its file part and optional fragment.
fn split_reference(reference: &str) -> (&str, Option<&str>) {
    match reference.find('#') {
        Some(idx) => (&reference[..idx], Some(&reference[idx + 1..])),
        None => (reference, None),
    }
}

/// Navigate a JSON Pointer fragment (e.g. `/$defs/foo`) within a document.
/// Segments unescape `~1` to `/` and `~0` to `~`; numeric segments index
/// arrays.
pub(crate) fn navigate_fragment<'doc>(
    document: &'doc Value,
    fragment: &str,
) -> Result<&'doc Value, SchemaError> {
    let path = fragment.trim_start_matches('/');
    if path.is_empty() {
        return Ok(document);
    }
    let mut current = document;
    for part in path.split('/') {
        let key = part.replace("~1", "/").replace("~0", "~");
        let next = match current {
            Value::Array(items) => key.parse::<usize>().ok().and_then(|idx| items.get(idx)),
            other => other.get(&key),
        };
        current = next.ok_or_else(|| SchemaError::UnresolvedReference {
            reference: format!("#{}", fragment),
            message: format!("fragment segment \"{}\" not found", part),
        })?;
    }
    Ok(current)
}

/// A session-scoped universe of resolved schemas.
pub struct SchemaStore {
    inner: Rc<StoreInner>,
}

pub(crate) struct StoreInner {
    options: StoreOptions,
    true_schema: Rc<Schema>,
    false_schema: Rc<Schema>,
    roots: RefCell<Vec<Rc<Schema>>>,
    base_dirs: RefCell<Vec<Option<PathBuf>>>,
    by_location: RefCell<HashMap<PathBuf, Rc<Schema>>>,
    roots_by_doc: RefCell<HashMap<CanonicalValue, Rc<Schema>>>,
    interned: RefCell<HashMap<(CanonicalValue, SchemaId), Rc<Schema>>>,
    /// Locations currently being resolved, outermost first. A reference back
    /// into this stack is a cycle.
    in_flight: RefCell<Vec<PathBuf>>,
    /// References currently being followed lazily; a repeat entry means a
    /// reference cycle, answered with a deferred placeholder node.
    resolving: RefCell<Vec<(SchemaId, String)>>,
}

impl Default for SchemaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaStore {
    pub fn new() -> Self {
        Self::with_options(StoreOptions::default())
    }

    pub fn with_options(options: StoreOptions) -> Self {
        let inner = Rc::new_cyclic(|weak| {
            let true_schema = Rc::new(
                Schema::new(
                    CanonicalValue::new(true_document()),
                    weak.clone(),
                    SchemaId::True,
                    &options,
                )
                .expect("the true document is well-formed"),
            );
            let false_schema = Rc::new(
                Schema::new(
                    CanonicalValue::new(false_document()),
                    weak.clone(),
                    SchemaId::False,
                    &options,
                )
                .expect("the false document is well-formed"),
            );
            StoreInner {
                options,
                true_schema,
                false_schema,
                roots: RefCell::new(Vec::new()),
                base_dirs: RefCell::new(Vec::new()),
                by_location: RefCell::new(HashMap::new()),
                roots_by_doc: RefCell::new(HashMap::new()),
                interned: RefCell::new(HashMap::new()),
                in_flight: RefCell::new(Vec::new()),
                resolving: RefCell::new(Vec::new()),
            }
        });
        SchemaStore { inner }
    }

    /// Load a schema document from a file, resolving every reference
    /// reachable from it.
    ///
    /// Re-loading a location returns the identical node; loading a
    /// structurally identical document from another location shares the
    /// already-built node.
    ///
    /// # Errors
    ///
    /// Retrieval errors (`FileNotFound`, `ReadError`), parse errors
    /// (`InvalidJson`), malformed schemas, and broken references
    /// (`UnresolvedReference`).
    pub fn load(&self, path: &Path) -> Result<Rc<Schema>, SchemaError> {
        if !path.exists() {
            return Err(SchemaError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.inner.load_path(&path)
    }

    /// Load a schema from an in-memory document. The schema has no base
    /// location, so relative external references fail with
    /// `NoBaseLocation`.
    pub fn load_document(&self, document: Value) -> Result<Rc<Schema>, SchemaError> {
        self.inner.register_root(document, None)
    }

    /// Parse and load a schema from a JSON string.
    pub fn load_str(&self, content: &str) -> Result<Rc<Schema>, SchemaError> {
        self.load_document(loader::parse_document(content)?)
    }

    /// The singleton node accepting every value. Identity is stable for the
    /// life of the store.
    pub fn true_schema(&self) -> Rc<Schema> {
        self.inner.true_schema.clone()
    }

    /// The singleton node accepting no value.
    pub fn false_schema(&self) -> Rc<Schema> {
        self.inner.false_schema.clone()
    }

    /// Whether a node accepts every value, by identity or by document shape.
    pub fn is_true_schema(schema: &Schema) -> bool {
        schema.id() == SchemaId::True || is_true_document(schema.document())
    }

    /// Whether a node accepts no value, by identity or by document shape.
    pub fn is_false_schema(schema: &Schema) -> bool {
        schema.id() == SchemaId::False || is_false_document(schema.document())
    }
}

impl StoreInner {
    pub(crate) fn true_schema(&self) -> Rc<Schema> {
        self.true_schema.clone()
    }

    pub(crate) fn false_schema(&self) -> Rc<Schema> {
        self.false_schema.clone()
    }

    fn load_path(self: &Rc<Self>, path: &Path) -> Result<Rc<Schema>, SchemaError> {
        if let Some(existing) = self.by_location.borrow().get(path) {
            return Ok(existing.clone());
        }
        let raw = loader::load_document(path)?;
        self.register_root(raw, Some(path))
    }

    fn register_root(
        self: &Rc<Self>,
        raw: Value,
        location: Option<&Path>,
    ) -> Result<Rc<Schema>, SchemaError> {
        let doc = CanonicalValue::new(normalize_document(raw));

        if let Some(existing) = self.roots_by_doc.borrow().get(&doc) {
            if let Some(path) = location {
                self.by_location
                    .borrow_mut()
                    .insert(path.to_path_buf(), existing.clone());
            }
            return Ok(existing.clone());
        }

        let index = self.roots.borrow().len();
        let id = SchemaId::Root(index);
        let schema = Rc::new(Schema::new(
            doc.clone(),
            Rc::downgrade(self),
            id,
            &self.options,
        )?);

        self.roots.borrow_mut().push(schema.clone());
        self.base_dirs
            .borrow_mut()
            .push(location.and_then(Path::parent).map(Path::to_path_buf));
        if let Some(path) = location {
            self.by_location
                .borrow_mut()
                .insert(path.to_path_buf(), schema.clone());
        }
        self.roots_by_doc
            .borrow_mut()
            .insert(doc.clone(), schema.clone());
        self.interned
            .borrow_mut()
            .insert((doc.clone(), id), schema.clone());

        if let Some(path) = location {
            self.in_flight.borrow_mut().push(path.to_path_buf());
        }
        let resolved = self.resolve_document_refs(&schema);
        if location.is_some() {
            self.in_flight.borrow_mut().pop();
        }

        if let Err(err) = resolved {
            // A broken reference poisons the whole document: drop the lookup
            // entries so a later load retries instead of serving a
            // half-resolved root.
            if let Some(path) = location {
                self.by_location.borrow_mut().remove(path);
            }
            self.roots_by_doc.borrow_mut().remove(&doc);
            self.interned.borrow_mut().remove(&(doc, id));
            return Err(err);
        }

        Ok(schema)
    }

    /// Eagerly walk a freshly registered root: load every externally
    /// referenced document, verify every internal fragment, and mark roots
    /// participating in reference cycles.
    fn resolve_document_refs(self: &Rc<Self>, root: &Rc<Schema>) -> Result<(), SchemaError> {
        let mut fragments = Vec::new();
        self.walk_refs(root, root.document(), &mut fragments)
    }

    fn walk_refs(
        self: &Rc<Self>,
        root: &Rc<Schema>,
        doc: &Value,
        fragments: &mut Vec<String>,
    ) -> Result<(), SchemaError> {
        let Some(map) = doc.as_object() else {
            return Ok(());
        };
        if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
            self.walk_reference(root, reference, fragments)?;
        }
        for (key, value) in map {
            match key.as_str() {
                "properties" | "patternProperties" | "$defs" | "definitions" => {
                    if let Some(children) = value.as_object() {
                        for child in children.values() {
                            self.walk_refs(root, child, fragments)?;
                        }
                    }
                }
                "items" => match value {
                    Value::Array(items) => {
                        for item in items {
                            self.walk_refs(root, item, fragments)?;
                        }
                    }
                    other => self.walk_refs(root, other, fragments)?,
                },
                "additionalProperties" | "not" => self.walk_refs(root, value, fragments)?,
                "allOf" | "anyOf" | "oneOf" => {
                    if let Some(branches) = value.as_array() {
                        for branch in branches {
                            self.walk_refs(root, branch, fragments)?;
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn walk_reference(
        self: &Rc<Self>,
        root: &Rc<Schema>,
        reference: &str,
        fragments: &mut Vec<String>,
    ) -> Result<(), SchemaError> {
        if let Some(fragment) = reference.strip_prefix('#') {
            if fragments.iter().any(|seen| seen == fragment) {
                root.mark_cyclic();
                return Ok(());
            }
            let target = navigate_fragment(root.document(), fragment)?;
            fragments.push(fragment.to_string());
            let result = self.walk_refs(root, target, fragments);
            fragments.pop();
            return result;
        }

        let (file_part, fragment) = split_reference(reference);
        let path = self.relative_path(root.id(), file_part, reference)?;
        if self.in_flight.borrow().iter().any(|flying| flying == &path) {
            self.mark_cycle_from(&path);
            root.mark_cyclic();
            return Ok(());
        }
        let target_root = self.load_path(&path)?;
        if let Some(fragment) = fragment {
            navigate_fragment(target_root.document(), fragment)?;
        }
        Ok(())
    }

    /// Mark every root from `path` to the top of the in-flight stack: all of
    /// them sit on the active reference cycle.
    fn mark_cycle_from(&self, path: &Path) {
        let in_flight = self.in_flight.borrow();
        let Some(position) = in_flight.iter().position(|flying| flying == path) else {
            return;
        };
        let by_location = self.by_location.borrow();
        for flying in &in_flight[position..] {
            if let Some(schema) = by_location.get(flying) {
                schema.mark_cyclic();
            }
        }
    }

    fn relative_path(
        &self,
        id: SchemaId,
        file_part: &str,
        reference: &str,
    ) -> Result<PathBuf, SchemaError> {
        let base = match id {
            SchemaId::Root(index) => self.base_dirs.borrow().get(index).cloned().flatten(),
            SchemaId::True | SchemaId::False => None,
        };
        let base = base.ok_or_else(|| SchemaError::NoBaseLocation {
            reference: reference.to_string(),
        })?;
        let path = base.join(file_part.trim_start_matches('/'));
        Ok(path.canonicalize().unwrap_or(path))
    }

    fn root(&self, id: SchemaId) -> Option<Rc<Schema>> {
        match id {
            SchemaId::Root(index) => self.roots.borrow().get(index).cloned(),
            SchemaId::True => Some(self.true_schema.clone()),
            SchemaId::False => Some(self.false_schema.clone()),
        }
    }

    /// Intern a schema document: boolean-equivalent documents collapse to
    /// the singletons, and structurally identical documents within one root
    /// share a node.
    pub(crate) fn intern(
        self: &Rc<Self>,
        raw: Value,
        id: SchemaId,
    ) -> Result<Rc<Schema>, SchemaError> {
        let raw = normalize_document(raw);
        if is_true_document(&raw) {
            return Ok(self.true_schema());
        }
        if is_false_document(&raw) {
            return Ok(self.false_schema());
        }
        let doc = CanonicalValue::new(raw);
        let key = (doc.clone(), id);
        if let Some(existing) = self.interned.borrow().get(&key) {
            return Ok(existing.clone());
        }
        let schema = Rc::new(Schema::new(doc, Rc::downgrade(self), id, &self.options)?);
        self.interned.borrow_mut().insert(key, schema.clone());
        Ok(schema)
    }

    /// Build a node for a sub-document, following a `$ref` if present.
    pub(crate) fn resolve_subdocument(
        self: &Rc<Self>,
        id: SchemaId,
        doc: Value,
    ) -> Result<Rc<Schema>, SchemaError> {
        if let Some(reference) = doc.get("$ref").and_then(Value::as_str) {
            let reference = reference.to_string();
            return self.resolve_reference(id, &reference);
        }
        self.intern(doc, id)
    }

    /// Follow a reference from a node owned by root `id`.
    ///
    /// A reference already being followed on the active stack is a cycle; it
    /// resolves to a deferred placeholder node (the raw `$ref` document,
    /// marked cyclic) instead of expanding forever.
    pub(crate) fn resolve_reference(
        self: &Rc<Self>,
        id: SchemaId,
        reference: &str,
    ) -> Result<Rc<Schema>, SchemaError> {
        let key = (id, reference.to_string());
        if self.resolving.borrow().iter().any(|entry| entry == &key) {
            let placeholder = self.intern(json!({ "$ref": reference }), id)?;
            placeholder.mark_cyclic();
            return Ok(placeholder);
        }

        self.resolving.borrow_mut().push(key);
        let result = self.resolve_reference_inner(id, reference);
        self.resolving.borrow_mut().pop();
        result
    }

    fn resolve_reference_inner(
        self: &Rc<Self>,
        id: SchemaId,
        reference: &str,
    ) -> Result<Rc<Schema>, SchemaError> {
        if let Some(fragment) = reference.strip_prefix('#') {
            let root = self.root(id).ok_or_else(|| SchemaError::UnresolvedReference {
                reference: reference.to_string(),
                message: "owning root document is gone".into(),
            })?;
            let target = navigate_fragment(root.document(), fragment)?.clone();
            return self.resolve_subdocument(id, target);
        }

        let (file_part, fragment) = split_reference(reference);
        let path = self.relative_path(id, file_part, reference)?;
        let root = self.load_path(&path)?;
        match fragment {
            None | Some("") => Ok(root),
            Some(fragment) => {
                let target = navigate_fragment(root.document(), fragment)?.clone();
                self.resolve_subdocument(root.id(), target)
            }
        }
    }
}
