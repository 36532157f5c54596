//! Leaf parsers: pure `text -> Value` functions keyed by [`LeafType`].
//!
//! The built-in table maps each leaf type to a default parser. Callers may
//! override entries per `resolve()` call through [`Parsers`]; the merged
//! [`ParserTable`] lives only as long as that call and is never shared.
pub mod arith;
pub mod logic;
pub mod date;

use std::collections::HashMap;
use std::fmt;

use crate::error::ParseError;
use crate::schema::LeafType;
use crate::value::Value;

/// Signature every leaf parser (built-in or override) has.
pub type ParseFn = dyn Fn(&str) -> Result<Value, ParseError>;

/// Nesting bound for the recursive-descent parsers.
pub(crate) const MAX_DEPTH: usize = 256;

// ------------------------------ Built-ins -------------------------------- //

pub fn integer(text: &str) -> Result<Value, ParseError> {
    // plain literals stay exact past 2^53
    if let Ok(n) = text.trim().parse::<i64>() {
        return Ok(Value::Integer(n));
    }
    arith::evaluate_integer(text).map(Value::Integer)
}

pub fn float(text: &str) -> Result<Value, ParseError> {
    arith::evaluate(text).map(Value::float)
}

pub fn boolean(text: &str) -> Result<Value, ParseError> {
    logic::evaluate(text).map(Value::Bool)
}

pub fn smartdate(text: &str) -> Result<Value, ParseError> {
    date::smartdate(text).map(Value::Date)
}

pub fn smartdatetime(text: &str) -> Result<Value, ParseError> {
    date::smartdatetime(text).map(Value::DateTime)
}

pub fn identity(text: &str) -> Result<Value, ParseError> {
    Ok(Value::String(text.to_string()))
}

pub fn builtin(type_: LeafType) -> &'static ParseFn {
    match type_ {
        LeafType::Integer => &integer,
        LeafType::Float => &float,
        LeafType::Boolean => &boolean,
        LeafType::Date => &smartdate,
        LeafType::DateTime => &smartdatetime,
        LeafType::String | LeafType::Any => &identity,
    }
}

// ------------------------------ Overrides -------------------------------- //

/// Caller-supplied parser overrides, keyed by leaf type.
#[derive(Default)]
pub struct Parsers {
    overrides: HashMap<LeafType, Box<ParseFn>>,
}

impl Parsers {
    pub fn new() -> Self { Self::default() }

    pub fn with(mut self, type_: LeafType, parser: impl Fn(&str) -> Result<Value, ParseError> + 'static) -> Self {
        self.insert(type_, parser);
        self
    }

    pub fn insert(&mut self, type_: LeafType, parser: impl Fn(&str) -> Result<Value, ParseError> + 'static) {
        self.overrides.insert(type_, Box::new(parser));
    }

    pub fn is_empty(&self) -> bool { self.overrides.is_empty() }

    /// Merge built-ins with these overrides into a per-call table.
    pub fn table(&self) -> ParserTable<'_> {
        let entries = LeafType::ALL.into_iter()
            .map(|t| {
                let f: &ParseFn = match self.overrides.get(&t) {
                    Some(custom) => custom.as_ref(),
                    None => builtin(t),
                };
                (t, f)
            })
            .collect();
        ParserTable { entries }
    }
}

impl fmt::Debug for Parsers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.overrides.keys().collect();
        keys.sort();
        f.debug_struct("Parsers").field("overrides", &keys).finish()
    }
}

/// Immutable leaf-type -> parser table for one resolution.
pub struct ParserTable<'a> {
    entries: HashMap<LeafType, &'a ParseFn>,
}

impl<'a> ParserTable<'a> {
    pub fn get(&self, type_: LeafType) -> &'a ParseFn {
        self.entries.get(&type_).copied().unwrap_or_else(|| builtin(type_))
    }

    pub fn parse(&self, type_: LeafType, text: &str) -> Result<Value, ParseError> {
        (self.get(type_))(text)
    }
}
