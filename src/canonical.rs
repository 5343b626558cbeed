//! Canonical wrappers over JSON trees with structural hashing and equality.
//!
//! Objects compare as unordered key/value mappings, arrays as ordered
//! sequences, scalars by kind and value. The hash is computed once when a
//! document is wrapped, so canonical values are safe map keys: the store uses
//! them to deduplicate structurally identical documents and to track cycles.

use std::hash::{Hash, Hasher};
use std::rc::Rc;

use serde_json::Value;

// Per-kind seeds keep scalars of different kinds from colliding, e.g. the
// number 1 and the string "1".
const NULL_SEED: u64 = 0x9e37_79b9_7f4a_7c15;
const BOOL_SEED: u64 = 0x6a09_e667_f3bc_c909;
const NUMBER_SEED: u64 = 0xbb67_ae85_84ca_a73b;
const STRING_SEED: u64 = 0x3c6e_f372_fe94_f82b;
const ARRAY_SEED: u64 = 0xa54f_f53a_5f1d_36f1;
const OBJECT_SEED: u64 = 0x510e_527f_ade6_82d1;

/// An immutable JSON document with a precomputed structural hash.
///
/// Cloning is cheap; the underlying tree is shared.
#[derive(Debug, Clone)]
pub struct CanonicalValue {
    value: Rc<Value>,
    hash: u64,
}

impl CanonicalValue {
    /// Wrap a JSON tree, computing its structural hash.
    pub fn new(value: Value) -> Self {
        let hash = hash_value(&value);
        CanonicalValue {
            value: Rc::new(value),
            hash,
        }
    }

    /// The wrapped JSON tree.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The cached structural hash.
    pub fn structural_hash(&self) -> u64 {
        self.hash
    }
}

impl PartialEq for CanonicalValue {
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.value, &other.value) {
            return true;
        }
        self.hash == other.hash && values_equal(&self.value, &other.value)
    }
}

impl Eq for CanonicalValue {}

impl Hash for CanonicalValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl From<Value> for CanonicalValue {
    fn from(value: Value) -> Self {
        CanonicalValue::new(value)
    }
}

/// Structural equality: objects unordered, arrays ordered, numbers by their
/// `serde_json` representation class.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(u, v)| values_equal(u, v))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, u)| y.get(k).is_some_and(|v| values_equal(u, v)))
        }
        _ => false,
    }
}

fn numbers_equal(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => {
            // Keep consistent with hashing on bit patterns: an i64 and an
            // f64 never compare equal, matching serde_json's representation.
            a.is_f64() == b.is_f64() && x.to_bits() == y.to_bits()
        }
        _ => false,
    }
}

fn hash_scalar(seed: u64, payload: u64) -> u64 {
    // splitmix64 finalizer, enough mixing for structural identity.
    let mut h = seed ^ payload.wrapping_mul(0xff51_afd7_ed55_8ccd);
    h ^= h >> 33;
    h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^ (h >> 33)
}

fn hash_str(s: &str) -> u64 {
    let mut h = STRING_SEED;
    for byte in s.bytes() {
        h = h.wrapping_mul(0x0000_0100_0000_01b3) ^ u64::from(byte);
    }
    h
}

fn hash_number(n: &serde_json::Number) -> u64 {
    if let Some(i) = n.as_i64() {
        return hash_scalar(NUMBER_SEED, i as u64);
    }
    if let Some(u) = n.as_u64() {
        return hash_scalar(NUMBER_SEED, u);
    }
    match n.as_f64() {
        Some(f) => hash_scalar(NUMBER_SEED ^ 1, f.to_bits()),
        None => NUMBER_SEED,
    }
}

/// Structural hash of a JSON tree.
///
/// Objects fold entry hashes with a commutative wrapping sum, so key order
/// never matters; arrays fold element hashes polynomially, so element order
/// always does.
pub fn hash_value(value: &Value) -> u64 {
    match value {
        Value::Null => NULL_SEED,
        Value::Bool(b) => hash_scalar(BOOL_SEED, u64::from(*b)),
        Value::Number(n) => hash_number(n),
        Value::String(s) => hash_str(s),
        Value::Array(items) => {
            let mut h = ARRAY_SEED;
            for item in items {
                h = h.wrapping_mul(31).wrapping_add(hash_value(item));
            }
            h
        }
        Value::Object(map) => {
            let mut h = OBJECT_SEED;
            for (key, entry) in map {
                h = h.wrapping_add(
                    hash_str(key)
                        .wrapping_mul(31)
                        .wrapping_add(hash_value(entry)),
                );
            }
            h
        }
    }
}
