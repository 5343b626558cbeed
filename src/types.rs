//! The type vocabulary: JSON value kinds and abstract placeholder values.

use serde::Serialize;
use serde_json::{json, Value};

use crate::error::SchemaError;

/// Abstract placeholder for any string value.
pub const STRING_CONSTANT: &str = "\\S";
/// Abstract placeholder for any integer value.
pub const INTEGER_CONSTANT: &str = "\\I";
/// Abstract placeholder for any number value.
pub const NUMBER_CONSTANT: &str = "\\D";
/// Abstract placeholder for any enum member.
pub const ENUM_CONSTANT: &str = "\\E";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The closed set of value kinds a schema can allow.
///
/// `Enum` is not a `type` keyword value; it is set when a schema carries an
/// `enum` constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    Null,
    Enum,
}

/// All kinds, in the order used when a schema gives no type signal.
pub const ALL_TYPES: [SchemaType; 8] = [
    SchemaType::Object,
    SchemaType::Array,
    SchemaType::String,
    SchemaType::Number,
    SchemaType::Integer,
    SchemaType::Boolean,
    SchemaType::Null,
    SchemaType::Enum,
];

impl SchemaType {
    /// Parse a `type` keyword value.
    pub fn from_keyword(keyword: &str) -> Result<Self, SchemaError> {
        match keyword {
            "object" => Ok(SchemaType::Object),
            "array" => Ok(SchemaType::Array),
            "string" => Ok(SchemaType::String),
            "number" => Ok(SchemaType::Number),
            "integer" => Ok(SchemaType::Integer),
            "boolean" => Ok(SchemaType::Boolean),
            "null" => Ok(SchemaType::Null),
            _ => Err(SchemaError::MalformedDocument {
                message: format!("unknown value \"{}\" for keyword \"type\"", keyword),
            }),
        }
    }

    /// The `type` keyword spelling for this kind.
    pub fn keyword(self) -> &'static str {
        match self {
            SchemaType::Object => "object",
            SchemaType::Array => "array",
            SchemaType::String => "string",
            SchemaType::Number => "number",
            SchemaType::Integer => "integer",
            SchemaType::Boolean => "boolean",
            SchemaType::Null => "null",
            SchemaType::Enum => "enum",
        }
    }

    /// A representative abstract value of this kind.
    ///
    /// Strings, integers, numbers, and enum members use the abstract
    /// constants; the remaining kinds use their natural empty or unit value.
    pub fn placeholder(self) -> Value {
        match self {
            SchemaType::Object => json!({}),
            SchemaType::Array => json!([]),
            SchemaType::String => Value::String(STRING_CONSTANT.into()),
            SchemaType::Number => Value::String(NUMBER_CONSTANT.into()),
            SchemaType::Integer => Value::String(INTEGER_CONSTANT.into()),
            SchemaType::Boolean => Value::Bool(true),
            SchemaType::Null => Value::Null,
            SchemaType::Enum => Value::String(ENUM_CONSTANT.into()),
        }
    }

    /// The kind of a literal JSON value.
    pub fn of_value(value: &Value) -> Self {
        match value {
            Value::Null => SchemaType::Null,
            Value::Bool(_) => SchemaType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => SchemaType::Integer,
            Value::Number(_) => SchemaType::Number,
            Value::String(_) => SchemaType::String,
            Value::Array(_) => SchemaType::Array,
            Value::Object(_) => SchemaType::Object,
        }
    }
}

/// Recursively abstract a literal value.
///
/// Strings become `"\S"`, integers `"\I"`, other numbers `"\D"`; booleans and
/// null are kept; arrays and objects are abstracted element-wise.
pub fn abstract_const_value(value: &Value) -> Value {
    match value {
        Value::String(_) => Value::String(STRING_CONSTANT.into()),
        Value::Number(n) if n.is_i64() || n.is_u64() => Value::String(INTEGER_CONSTANT.into()),
        Value::Number(_) => Value::String(NUMBER_CONSTANT.into()),
        Value::Bool(_) | Value::Null => value.clone(),
        Value::Array(items) => Value::Array(items.iter().map(abstract_const_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), abstract_const_value(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_keyword_valid() {
        assert_eq!(
            SchemaType::from_keyword("string").unwrap(),
            SchemaType::String
        );
        assert_eq!(
            SchemaType::from_keyword("integer").unwrap(),
            SchemaType::Integer
        );
    }

    #[test]
    fn from_keyword_invalid() {
        assert!(SchemaType::from_keyword("text").is_err());
        assert!(SchemaType::from_keyword("enum").is_err());
    }

    #[test]
    fn of_value_distinguishes_integer_from_number() {
        assert_eq!(SchemaType::of_value(&json!(3)), SchemaType::Integer);
        assert_eq!(SchemaType::of_value(&json!(3.5)), SchemaType::Number);
    }

    #[test]
    fn abstract_const_value_recurses() {
        let value = json!({"name": "x", "count": 3, "ratio": 0.5, "flag": true, "tags": ["a"]});
        let abstracted = abstract_const_value(&value);
        assert_eq!(
            abstracted,
            json!({"name": "\\S", "count": "\\I", "ratio": "\\D", "flag": true, "tags": ["\\S"]})
        );
    }

    #[test]
    fn placeholder_kinds() {
        assert_eq!(SchemaType::String.placeholder(), json!("\\S"));
        assert_eq!(SchemaType::Object.placeholder(), json!({}));
        assert_eq!(SchemaType::Null.placeholder(), Value::Null);
    }
}
