//! Schema model: the declarative type grammar a raw configuration is checked against.
//!
//! ```text
//! SCHEMA        = DICT_SCHEMA | LIST_SCHEMA | LEAF_SCHEMA | ANY_SCHEMA
//! DICT_SCHEMA   = { type: "dict", [required_keys], [optional_keys], [extra_keys_schema], [nullable] }
//! LIST_SCHEMA   = { type: "list", element_schema, [nullable] }
//! LEAF_SCHEMA   = { type: "string"|"integer"|"float"|"boolean"|"date"|"datetime", [nullable] }
//! ANY_SCHEMA    = { type: "any" }
//! ```
//!
//! A schema is pure, immutable metadata. It is validated once by [`parse_schema`]
//! and then shared read-only by every node built from it.
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::keypath::{Keypath, Segment};
use crate::value::{json_kind_name, Value};

// ———————————————————————————————————————————————————————————————————————————
// TYPES
// ———————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Dict(DictSchema),
    List(ListSchema),
    Leaf(LeafSchema),
    Any,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DictSchema {
    pub required_keys: IndexMap<String, Schema>,
    pub optional_keys: IndexMap<String, OptionalKey>,
    pub extra_keys_schema: Option<Box<Schema>>,
    pub nullable: bool,
}

/// An `optional_keys` entry. The default, if any, is already typed.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionalKey {
    pub schema: Schema,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListSchema {
    pub element_schema: Box<Schema>,
    pub nullable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeafSchema {
    pub type_: LeafType,
    pub nullable: bool,
}

/// The closed set of leaf kinds; parser selection is keyed by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LeafType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    DateTime,
    Any,
}

/// Wire shape of a schema definition, before semantic checks.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SchemaDef {
    #[serde(rename = "type")]
    type_: String,
    #[serde(default)]
    required_keys: Option<IndexMap<String, SchemaDef>>,
    #[serde(default)]
    optional_keys: Option<IndexMap<String, SchemaDef>>,
    #[serde(default)]
    extra_keys_schema: Option<Box<SchemaDef>>,
    #[serde(default)]
    element_schema: Option<Box<SchemaDef>>,
    #[serde(default)]
    nullable: Option<bool>,
    // `default: null` must stay distinguishable from a missing default
    #[serde(default, deserialize_with = "present")]
    default: Option<serde_json::Value>,
}

fn present<'de, D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Option<serde_json::Value>, D::Error> {
    serde_json::Value::deserialize(d).map(Some)
}

// ———————————————————————————————————————————————————————————————————————————
// PARSING
// ———————————————————————————————————————————————————————————————————————————

/// Validate a schema definition and build the in-memory model.
pub fn parse_schema(definition: &serde_json::Value) -> Result<Schema> {
    let def: SchemaDef = crate::path_de::from_value_with_path(definition)?;
    let root = Keypath::root();
    if def.default.is_some() {
        return Err(Error::schema(root, "`default` is only valid on an optional_keys entry"));
    }
    lower(&def, &root)
}

fn lower(def: &SchemaDef, keypath: &Keypath) -> Result<Schema> {
    let nullable = def.nullable.unwrap_or(false);
    match def.type_.as_str() {
        "dict" => {
            reject(def.element_schema.is_some(), keypath, "element_schema", "dict")?;
            let mut out = DictSchema { nullable, ..DictSchema::default() };
            if let Some(required) = &def.required_keys {
                let group = keypath.key("required_keys");
                for (name, sub) in required {
                    let at = group.key(name.as_str());
                    if sub.default.is_some() {
                        return Err(Error::schema(at, "`default` is only valid on an optional_keys entry"));
                    }
                    out.required_keys.insert(name.clone(), lower(sub, &at)?);
                }
            }
            if let Some(optional) = &def.optional_keys {
                let group = keypath.key("optional_keys");
                for (name, sub) in optional {
                    let at = group.key(name.as_str());
                    if out.required_keys.contains_key(name) {
                        return Err(Error::schema(at, format!("`{name}` is declared both required and optional")));
                    }
                    let schema = lower(sub, &at)?;
                    let default = match &sub.default {
                        Some(raw) => Some(typed_default(&schema, raw, &at.key("default"))?),
                        None => None,
                    };
                    out.optional_keys.insert(name.clone(), OptionalKey { schema, default });
                }
            }
            if let Some(extra) = &def.extra_keys_schema {
                let at = keypath.key("extra_keys_schema");
                if extra.default.is_some() {
                    return Err(Error::schema(at, "`default` is only valid on an optional_keys entry"));
                }
                out.extra_keys_schema = Some(Box::new(lower(extra, &at)?));
            }
            Ok(Schema::Dict(out))
        }
        "list" => {
            reject_dict_fields(def, keypath, "list")?;
            let Some(element) = &def.element_schema else {
                return Err(Error::schema(keypath.clone(), "list schema requires `element_schema`"));
            };
            let at = keypath.key("element_schema");
            if element.default.is_some() {
                return Err(Error::schema(at, "`default` is only valid on an optional_keys entry"));
            }
            Ok(Schema::List(ListSchema { element_schema: Box::new(lower(element, &at)?), nullable }))
        }
        other => {
            let type_ = other.parse::<LeafType>()
                .map_err(|reason| Error::schema(keypath.key("type"), reason))?;
            reject_dict_fields(def, keypath, other)?;
            reject(def.element_schema.is_some(), keypath, "element_schema", other)?;
            if type_ == LeafType::Any {
                Ok(Schema::Any)
            } else {
                Ok(Schema::Leaf(LeafSchema { type_, nullable }))
            }
        }
    }
}

fn reject(present: bool, keypath: &Keypath, field: &str, type_: &str) -> Result<()> {
    if present {
        return Err(Error::schema(keypath.key(field), format!("`{field}` is not valid for a {type_} schema")));
    }
    Ok(())
}

fn reject_dict_fields(def: &SchemaDef, keypath: &Keypath, type_: &str) -> Result<()> {
    reject(def.required_keys.is_some(), keypath, "required_keys", type_)?;
    reject(def.optional_keys.is_some(), keypath, "optional_keys", type_)?;
    reject(def.extra_keys_schema.is_some(), keypath, "extra_keys_schema", type_)
}

/// Check a default literal against its declared type and convert it once.
fn typed_default(schema: &Schema, raw: &serde_json::Value, keypath: &Keypath) -> Result<Value> {
    use serde_json::Value as J;
    let mismatch = || Error::schema(
        keypath.clone(),
        format!("default {} does not match declared type {}", json_kind_name(raw), schema.type_name()),
    );
    if raw.is_null() {
        return if schema.is_nullable() { Ok(Value::Null) } else { Err(mismatch()) };
    }
    match (schema, raw) {
        (Schema::Any, _) => Ok(Value::from_json(raw)),
        (Schema::Dict(_), J::Object(_)) | (Schema::List(_), J::Array(_)) => {
            // same shape rules as configuration data; scalars inside stay verbatim
            crate::tree::build(raw, schema).map_err(|err| Error::schema(
                keypath.clone(),
                format!("default does not fit its schema at `{}`: {err}", err.keypath()),
            ))?;
            Ok(Value::from_json(raw))
        }
        (Schema::Leaf(leaf), _) => match (leaf.type_, raw) {
            (LeafType::String, J::String(s)) => Ok(Value::String(s.clone())),
            (LeafType::Integer, J::Number(n)) => n.as_i64().map(Value::Integer).ok_or_else(mismatch),
            (LeafType::Float, J::Number(n)) => n.as_f64().map(Value::float).ok_or_else(mismatch),
            (LeafType::Boolean, J::Bool(b)) => Ok(Value::Bool(*b)),
            (LeafType::Date, J::String(s)) => crate::parsers::date::date_literal(s)
                .map(Value::Date)
                .ok_or_else(|| Error::schema(keypath.clone(), format!("default {s:?} is not an ISO date"))),
            (LeafType::DateTime, J::String(s)) => crate::parsers::date::datetime_literal(s)
                .map(Value::DateTime)
                .ok_or_else(|| Error::schema(keypath.clone(), format!("default {s:?} is not an ISO datetime"))),
            _ => Err(mismatch()),
        },
        _ => Err(mismatch()),
    }
}

// ———————————————————————————————————————————————————————————————————————————
// LOOKUP
// ———————————————————————————————————————————————————————————————————————————

static ANY: Schema = Schema::Any;

impl Schema {
    pub fn is_nullable(&self) -> bool {
        match self {
            Schema::Dict(d) => d.nullable,
            Schema::List(l) => l.nullable,
            Schema::Leaf(l) => l.nullable,
            Schema::Any => true,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Schema::Dict(_) => "dict",
            Schema::List(_) => "list",
            Schema::Leaf(l) => l.type_.as_str(),
            Schema::Any => "any",
        }
    }

    /// Sub-schema for a child key or index, if the schema admits one.
    pub fn child(&self, segment: &Segment) -> Option<&Schema> {
        match (self, segment) {
            (Schema::Dict(d), Segment::Key(k)) => d.required_keys.get(k)
                .or_else(|| d.optional_keys.get(k).map(|o| &o.schema))
                .or(d.extra_keys_schema.as_deref()),
            (Schema::List(l), Segment::Index(_)) => Some(&l.element_schema),
            (Schema::Any, _) => Some(&ANY),
            _ => None,
        }
    }
}

impl LeafType {
    pub const ALL: [LeafType; 7] = [
        LeafType::String,
        LeafType::Integer,
        LeafType::Float,
        LeafType::Boolean,
        LeafType::Date,
        LeafType::DateTime,
        LeafType::Any,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LeafType::String => "string",
            LeafType::Integer => "integer",
            LeafType::Float => "float",
            LeafType::Boolean => "boolean",
            LeafType::Date => "date",
            LeafType::DateTime => "datetime",
            LeafType::Any => "any",
        }
    }
}

impl FromStr for LeafType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        LeafType::ALL.into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unrecognized schema type {s:?}"))
    }
}

impl fmt::Display for LeafType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}
