//! Loosely typed values at the request boundary.
//!
//! Requests arrive as JSON, so step parameters start life as a
//! string → [`Value`] mapping ([`Params`]). Each handler's `validate` turns
//! that mapping into its own typed parameter struct exactly once; nothing
//! past validation inspects a `Params` again.
//!
//! Step results travel the other way: handlers describe what they did as an
//! insertion-ordered [`Attributes`] list that serializes to a JSON object.
//!
//! Parameter keys may have aliases (e.g. `angle` / `rotation_angle`). The
//! first key in an alias list is the canonical name used in error messages.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// A parameter or attribute value.
///
/// Any JSON document deserializes into a `Value`, so a parameter of the wrong
/// shape (`null`, an array, an object) reaches the handler's `validate` and
/// fails that step alone instead of the whole request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Null => "null",
            Value::List(_) => "array",
            Value::Map(_) => "object",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s}"),
            Value::Null => f.write_str("null"),
            Value::List(_) | Value::Map(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// Why a parameter mapping was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("missing required parameter '{key}'")]
    Missing { key: &'static str },
    #[error("parameter '{key}' must be {expected}, got {found}")]
    WrongType {
        key: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    #[error("parameters must be an object, got {found}")]
    NotAMapping { found: &'static str },
    #[error("parameter '{key}' is {value}; {expected}")]
    OutOfRange {
        key: &'static str,
        value: String,
        expected: String,
    },
}

/// Raw step parameters, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, Value>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for constructing requests in code.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// First value found under any of `keys`, with the canonical key.
    fn lookup(&self, keys: &[&'static str]) -> Result<(&'static str, &Value), ParamError> {
        let canonical = keys.first().copied().unwrap_or("<unnamed>");
        keys.iter()
            .find_map(|k| self.0.get(*k))
            .map(|v| (canonical, v))
            .ok_or(ParamError::Missing { key: canonical })
    }

    /// Required integer parameter.
    pub fn int(&self, keys: &[&'static str]) -> Result<i64, ParamError> {
        let (key, value) = self.lookup(keys)?;
        value.as_i64().ok_or(ParamError::WrongType {
            key,
            expected: "an integer",
            found: value.type_name(),
        })
    }

    /// Required string parameter.
    pub fn string(&self, keys: &[&'static str]) -> Result<&str, ParamError> {
        let (key, value) = self.lookup(keys)?;
        value.as_str().ok_or(ParamError::WrongType {
            key,
            expected: "a string",
            found: value.type_name(),
        })
    }
}

/// Only an object is a parameter mapping.
impl TryFrom<Value> for Params {
    type Error = ParamError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Map(map) => Ok(Self(map)),
            other => Err(ParamError::NotAMapping {
                found: other.type_name(),
            }),
        }
    }
}

/// Insertion-ordered attribute list describing what a step did.
///
/// Serializes as a JSON object whose keys keep insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes(Vec<(String, Value)>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or overwrite; an overwritten key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_deserialize_mixed_types() {
        let p: Params =
            serde_json::from_str(r#"{"a": 90, "b": 1.5, "c": "png", "d": true}"#).unwrap();
        assert_eq!(p.get("a"), Some(&Value::Int(90)));
        assert_eq!(p.get("b"), Some(&Value::Float(1.5)));
        assert_eq!(p.get("c"), Some(&Value::Str("png".into())));
        assert_eq!(p.get("d"), Some(&Value::Bool(true)));
    }

    #[test]
    fn params_deserialize_any_json_shape() {
        let p: Params =
            serde_json::from_str(r#"{"n": null, "l": [200], "m": {"x": 1}}"#).unwrap();
        assert_eq!(p.get("n"), Some(&Value::Null));
        assert_eq!(p.get("l"), Some(&Value::List(vec![Value::Int(200)])));
        assert!(matches!(p.get("m"), Some(Value::Map(_))));
        assert!(matches!(
            p.int(&["n"]),
            Err(ParamError::WrongType { found: "null", .. })
        ));
        assert!(matches!(
            p.int(&["l"]),
            Err(ParamError::WrongType { found: "array", .. })
        ));
        assert!(matches!(
            p.string(&["m"]),
            Err(ParamError::WrongType { found: "object", .. })
        ));
    }

    #[test]
    fn only_objects_convert_to_params() {
        let map: Value = serde_json::from_str(r#"{"angle": 90}"#).unwrap();
        let params = Params::try_from(map).unwrap();
        assert_eq!(params.get("angle"), Some(&Value::Int(90)));
        assert_eq!(
            Params::try_from(Value::Null),
            Err(ParamError::NotAMapping { found: "null" })
        );
        assert_eq!(
            Params::try_from(Value::List(vec![])),
            Err(ParamError::NotAMapping { found: "array" })
        );
    }

    #[test]
    fn compound_values_display_as_json() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Str("a".into())]).to_string(),
            r#"[1,"a"]"#
        );
    }

    #[test]
    fn int_accepts_alias() {
        let p = Params::new().with("rotation_angle", 180);
        assert_eq!(p.int(&["angle", "rotation_angle"]), Ok(180));
    }

    #[test]
    fn canonical_key_wins_over_alias() {
        let p = Params::new().with("angle", 90).with("rotation_angle", 270);
        assert_eq!(p.int(&["angle", "rotation_angle"]), Ok(90));
    }

    #[test]
    fn missing_reports_canonical_key() {
        let p = Params::new();
        assert_eq!(
            p.int(&["angle", "rotation_angle"]),
            Err(ParamError::Missing { key: "angle" })
        );
    }

    #[test]
    fn wrong_type_reports_found_type() {
        let p = Params::new().with("delta", "bright");
        assert_eq!(
            p.int(&["delta"]),
            Err(ParamError::WrongType {
                key: "delta",
                expected: "an integer",
                found: "string"
            })
        );
        let p = Params::new().with("delta", 50.0);
        assert!(matches!(
            p.int(&["delta"]),
            Err(ParamError::WrongType { found: "float", .. })
        ));
    }

    #[test]
    fn attributes_keep_insertion_order() {
        let attrs = Attributes::new()
            .with("zeta", 1)
            .with("alpha", "x")
            .with("mid", true);
        let json = serde_json::to_string(&attrs).unwrap();
        assert_eq!(json, r#"{"zeta":1,"alpha":"x","mid":true}"#);
    }

    #[test]
    fn attributes_overwrite_in_place() {
        let mut attrs = Attributes::new().with("a", 1).with("b", 2);
        attrs.insert("a", 3);
        let keys: Vec<&str> = attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(attrs.get("a"), Some(&Value::Int(3)));
    }

    #[test]
    fn param_error_messages_are_readable() {
        let err = ParamError::OutOfRange {
            key: "delta",
            value: "150".into(),
            expected: "must be between 1 and 100".into(),
        };
        assert_eq!(
            err.to_string(),
            "parameter 'delta' is 150; must be between 1 and 100"
        );
    }
}
