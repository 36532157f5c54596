//! The resolved, fully typed configuration value.
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::Serialize;

/// Plain nested value returned by `resolve()`.
///
/// Dict entries keep schema declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Float(OrderedFloat<f64>),
    String(String),
    #[serde(serialize_with = "ser_date")]
    Date(NaiveDate),
    #[serde(serialize_with = "ser_datetime")]
    DateTime(NaiveDateTime),
    List(Vec<Value>),
    Dict(IndexMap<String, Value>),
}

impl Value {
    pub fn float(x: f64) -> Self { Value::Float(OrderedFloat(x)) }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::List(_) => "list",
            Value::Dict(_) => "dict",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self { Value::Integer(i) => Some(*i), _ => None }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self { Value::Float(f) => Some(f.0), _ => None }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self { Value::Bool(b) => Some(*b), _ => None }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self { Value::String(s) => Some(s), _ => None }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self { Value::Date(d) => Some(*d), _ => None }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self { Value::DateTime(d) => Some(*d), _ => None }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Dict(m) => m.get(key),
            Value::List(xs) => key.parse::<usize>().ok().and_then(|i| xs.get(i)),
            _ => None,
        }
    }

    /// Text handed to the renderer when this value is referenced from a leaf.
    ///
    /// Scalars use their natural form (ISO-8601 for dates), containers are JSON.
    pub fn to_text(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::List(_) | Value::Dict(_) => {
                serde_json::to_string(self).unwrap_or_default()
            }
            other => other.to_string(),
        }
    }

    /// Convert a raw JSON value without interpolation or parsing.
    pub fn from_json(v: &serde_json::Value) -> Self {
        use serde_json::Value as J;
        match v {
            J::Null => Value::Null,
            J::Bool(b) => Value::Bool(*b),
            J::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::float(n.as_f64().unwrap_or(f64::NAN)),
            },
            J::String(s) => Value::String(s.clone()),
            J::Array(xs) => Value::List(xs.iter().map(Value::from_json).collect()),
            J::Object(m) => Value::Dict(
                m.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect()
            ),
        }
    }
}

/// Canonical text of a raw JSON scalar, as fed to a leaf parser.
pub fn json_scalar_text(v: &serde_json::Value) -> String {
    match v {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn json_kind_name(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "dict",
    }
}

pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

fn ser_date<S: serde::Serializer>(d: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&d.format("%Y-%m-%d"))
}

fn ser_datetime<S: serde::Serializer>(d: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(&d.format(DATETIME_FORMAT))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Integer(i) => write!(f, "{i}"),
            // keep a trailing `.0` so the text still reads as a float
            Value::Float(x) if x.0.is_finite() && x.0.fract() == 0.0 => write!(f, "{:.1}", x.0),
            Value::Float(x) => write!(f, "{}", x.0),
            Value::String(s) => f.write_str(s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::DateTime(d) => write!(f, "{}", d.format(DATETIME_FORMAT)),
            Value::List(_) | Value::Dict(_) => f.write_str(&self.to_text()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Bool(b) }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self { Value::Integer(i) }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self { Value::float(x) }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::String(s.to_string()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Value::String(s) }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self { Value::Date(d) }
}

impl From<NaiveDateTime> for Value {
    fn from(d: NaiveDateTime) -> Self { Value::DateTime(d) }
}
