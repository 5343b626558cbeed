//! JSON Schema Model
//!
//! Loads JSON Schema documents, resolves `$ref` chains (including cycles),
//! and exposes a typed schema model with a combinator algebra: `allOf`
//! merging, `oneOf` expansion into exclusive alternatives, `not` push-down,
//! and flattening into a single conjunct document.
//!
//! Schemas are canonicalized structurally: object key order never matters,
//! and structurally identical documents resolved through the same store share
//! one node, so equality checks and repeated traversals stay cheap.
//!
//! # Example
//!
//! ```
//! use schema_model::SchemaStore;
//!
//! let store = SchemaStore::new();
//! let schema = store
//!     .load_str(
//!         r#"{
//!             "type": "object",
//!             "properties": { "name": { "type": "string" } },
//!             "required": ["name"],
//!             "allOf": [{ "required": ["id"], "properties": { "id": {} } }]
//!         }"#,
//!     )
//!     .unwrap();
//!
//! let flat = schema.flatten().unwrap();
//! assert!(flat.is_object());
//! let mut required = flat.required_property_keys().unwrap();
//! required.sort();
//! assert_eq!(required, vec!["id", "name"]);
//! ```
//!
//! # Boolean schemas
//!
//! The literals `true` and `false` are schemas too. The store normalizes them
//! to `{}` and `{"not": {}}` and hands out one shared node for each, so the
//! results of collapsing merges keep a stable identity:
//!
//! ```
//! use std::rc::Rc;
//! use schema_model::SchemaStore;
//!
//! let store = SchemaStore::new();
//! let left = store.load_str(r#"{"type": "string"}"#).unwrap();
//! let right = store.load_str(r#"{"type": "integer"}"#).unwrap();
//! let merged = left.merge(&right).unwrap();
//! assert!(Rc::ptr_eq(&merged, &store.false_schema()));
//! ```

mod canonical;
mod error;
mod loader;
mod merge;
mod schema;
mod store;
mod types;

pub use canonical::{hash_value, values_equal, CanonicalValue};
pub use error::SchemaError;
pub use loader::{is_url, load_document, load_document_auto, parse_document};
pub use schema::Schema;
pub use store::{
    false_document, is_false_document, is_true_document, true_document, SchemaStore, StoreOptions,
};
pub use types::{
    abstract_const_value, json_type_name, SchemaType, ALL_TYPES, ENUM_CONSTANT, INTEGER_CONSTANT,
    NUMBER_CONSTANT, STRING_CONSTANT,
};

#[cfg(feature = "remote")]
pub use loader::load_document_url;
