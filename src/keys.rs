//! # Key Construction
//!
//! Deterministic construction of compound cache keys. Values are normalized
//! into canonical strings through [`KeyPart`], a closed set of supported
//! categories, so that the same logical value always produces the same key
//! regardless of numeric width, sequence representation, or map insertion
//! order.
//!
//! Key shape: `prefix|part|part` for positional parts and
//! `prefix|name=value&name=value` for condition maps, with condition names
//! sorted lexicographically.

use std::collections::HashMap;
use std::fmt::Display;

/// Literal token produced for absent values.
const NIL_TOKEN: &str = "nil";

/// A value that can participate in cache-key construction.
///
/// The variants form the closed set of normalizable categories. Anything
/// outside the set goes through [`KeyPart::other`], a best-effort fallback
/// whose output is not guaranteed stable across types.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPart {
    /// An absent value, rendered as `nil`.
    None,
    /// Signed integer of any width, rendered in decimal.
    Int(i64),
    /// Unsigned integer of any width, rendered in decimal.
    Uint(u64),
    /// Floating point, rendered as the shortest round-trippable decimal.
    /// Whole values keep a `.0` suffix so float and integer keys never
    /// collide across kinds.
    Float(f64),
    /// Boolean, rendered as `true` or `false`.
    Bool(bool),
    /// A string, rendered as itself without escaping.
    Str(String),
    /// An ordered sequence, rendered as `[a,b,c]` recursively.
    Seq(Vec<KeyPart>),
    /// A string-keyed map, rendered with the condition-serialization rule.
    Map(HashMap<String, KeyPart>),
}

impl KeyPart {
    /// Fallback conversion for values outside the supported categories,
    /// using their `Display` form.
    pub fn other(value: impl Display) -> Self {
        KeyPart::Str(value.to_string())
    }
}

macro_rules! from_signed {
    ($($ty:ty),*) => {
        $(impl From<$ty> for KeyPart {
            fn from(value: $ty) -> Self {
                KeyPart::Int(value as i64)
            }
        })*
    };
}

macro_rules! from_unsigned {
    ($($ty:ty),*) => {
        $(impl From<$ty> for KeyPart {
            fn from(value: $ty) -> Self {
                KeyPart::Uint(value as u64)
            }
        })*
    };
}

from_signed!(i8, i16, i32, i64, isize);
from_unsigned!(u8, u16, u32, u64, usize);

impl From<f32> for KeyPart {
    fn from(value: f32) -> Self {
        KeyPart::Float(value as f64)
    }
}

impl From<f64> for KeyPart {
    fn from(value: f64) -> Self {
        KeyPart::Float(value)
    }
}

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        KeyPart::Bool(value)
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Str(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Str(value)
    }
}

impl<T: Into<KeyPart>> From<Option<T>> for KeyPart {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => KeyPart::None,
        }
    }
}

impl<T: Into<KeyPart>> From<Vec<T>> for KeyPart {
    fn from(values: Vec<T>) -> Self {
        KeyPart::Seq(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<KeyPart>> From<HashMap<String, T>> for KeyPart {
    fn from(values: HashMap<String, T>) -> Self {
        KeyPart::Map(values.into_iter().map(|(k, v)| (k, v.into())).collect())
    }
}

/// Normalizes a value into its canonical string form. Total: never fails.
pub fn normalize(part: &KeyPart) -> String {
    match part {
        KeyPart::None => NIL_TOKEN.to_string(),
        KeyPart::Int(value) => value.to_string(),
        KeyPart::Uint(value) => value.to_string(),
        KeyPart::Float(value) => normalize_float(*value),
        KeyPart::Bool(value) => value.to_string(),
        KeyPart::Str(value) => value.clone(),
        KeyPart::Seq(parts) => {
            let elements: Vec<String> = parts.iter().map(normalize).collect();
            format!("[{}]", elements.join(","))
        }
        KeyPart::Map(conds) => serialize_conditions(conds),
    }
}

/// Shortest round-trippable rendering, with a `.0` suffix on whole values so
/// the float kind never shares a token with the integer kinds.
fn normalize_float(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let mut rendered = value.to_string();
    if !rendered.contains('.') {
        rendered.push_str(".0");
    }
    rendered
}

/// Serializes a condition map as `name=value` pairs joined with `&`, names
/// sorted lexicographically ascending. Returns `""` for an empty map.
///
/// The sort is what makes key construction deterministic: two maps that are
/// equal as sets of pairs serialize identically no matter the insertion
/// order.
pub fn serialize_conditions(conds: &HashMap<String, KeyPart>) -> String {
    if conds.is_empty() {
        return String::new();
    }
    let mut names: Vec<&String> = conds.keys().collect();
    names.sort();
    let pairs: Vec<String> = names
        .into_iter()
        .map(|name| format!("{}={}", name, normalize(&conds[name])))
        .collect();
    pairs.join("&")
}

/// Joins a prefix and normalized parts with `|`. Returns the prefix
/// unchanged when no parts are given.
pub fn build_key(prefix: &str, parts: &[KeyPart]) -> String {
    let mut key = String::from(prefix);
    for part in parts {
        key.push('|');
        key.push_str(&normalize(part));
    }
    key
}

/// Builds `prefix|name=value&...` from a condition map, or just the prefix
/// when the map is empty.
pub fn build_key_from_conditions(prefix: &str, conds: &HashMap<String, KeyPart>) -> String {
    let serialized = serialize_conditions(conds);
    if serialized.is_empty() {
        return prefix.to_string();
    }
    format!("{}|{}", prefix, serialized)
}
