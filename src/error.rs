//! Error taxonomy for schema parsing, tree building and resolution.
use std::fmt;
use thiserror::Error;

use crate::keypath::Keypath;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can abort a `resolve()` call. Each variant carries the
/// keypath it concerns; nothing is recovered or retried.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed schema definition. The keypath points into the schema, not the data.
    #[error("invalid schema at `{keypath}`: {reason}")]
    Schema { keypath: Keypath, reason: String },

    #[error("type mismatch at `{keypath}`: expected {expected}, found {found}")]
    Type { keypath: Keypath, expected: String, found: String },

    #[error("missing required key `{keypath}`")]
    MissingRequiredKey { keypath: Keypath },

    #[error("unexpected key `{keypath}` (no schema entry and no extra_keys_schema)")]
    UnknownKey { keypath: Keypath },

    #[error("unknown reference `{name}` in `{keypath}`")]
    UnknownReference { keypath: Keypath, name: String },

    #[error("circular reference: {}", CycleDisplay(.cycle))]
    CircularReference { keypath: Keypath, cycle: Vec<Keypath> },

    #[error("cannot parse `{keypath}`: {source} (raw: {raw:?}, substituted: {substituted:?})")]
    Parse {
        keypath: Keypath,
        raw: String,
        substituted: String,
        #[source]
        source: ParseError,
    },

    #[error("malformed template in `{keypath}` at position {position}: {message} (raw: {raw:?})")]
    Template { keypath: Keypath, raw: String, position: usize, message: String },

    #[error("external variables cannot define `{name}`: the name is reserved for self references")]
    ReservedVariable { keypath: Keypath, name: String },
}

/// Fieldless discriminant of [`Error`], for callers that branch on the failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Schema,
    Type,
    MissingRequiredKey,
    UnknownKey,
    UnknownReference,
    CircularReference,
    Parse,
    Template,
    ReservedVariable,
}

impl Error {
    pub fn keypath(&self) -> &Keypath {
        match self {
            Error::Schema { keypath, .. }
            | Error::Type { keypath, .. }
            | Error::MissingRequiredKey { keypath }
            | Error::UnknownKey { keypath }
            | Error::UnknownReference { keypath, .. }
            | Error::CircularReference { keypath, .. }
            | Error::Parse { keypath, .. }
            | Error::Template { keypath, .. }
            | Error::ReservedVariable { keypath, .. } => keypath,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Schema { .. } => ErrorKind::Schema,
            Error::Type { .. } => ErrorKind::Type,
            Error::MissingRequiredKey { .. } => ErrorKind::MissingRequiredKey,
            Error::UnknownKey { .. } => ErrorKind::UnknownKey,
            Error::UnknownReference { .. } => ErrorKind::UnknownReference,
            Error::CircularReference { .. } => ErrorKind::CircularReference,
            Error::Parse { .. } => ErrorKind::Parse,
            Error::Template { .. } => ErrorKind::Template,
            Error::ReservedVariable { .. } => ErrorKind::ReservedVariable,
        }
    }

    pub(crate) fn schema(keypath: Keypath, reason: impl Into<String>) -> Self {
        Error::Schema { keypath, reason: reason.into() }
    }

    pub(crate) fn type_mismatch(keypath: Keypath, expected: impl Into<String>, found: impl Into<String>) -> Self {
        Error::Type { keypath, expected: expected.into(), found: found.into() }
    }
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Schema => "schema",
            ErrorKind::Type => "type",
            ErrorKind::MissingRequiredKey => "missing_required_key",
            ErrorKind::UnknownKey => "unknown_key",
            ErrorKind::UnknownReference => "unknown_reference",
            ErrorKind::CircularReference => "circular_reference",
            ErrorKind::Parse => "parse",
            ErrorKind::Template => "template",
            ErrorKind::ReservedVariable => "reserved_variable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

struct CycleDisplay<'a>(&'a [Keypath]);

impl fmt::Display for CycleDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, kp) in self.0.iter().enumerate() {
            if i > 0 { f.write_str(" -> ")?; }
            write!(f, "{kp}")?;
        }
        Ok(())
    }
}

// ------------------------------ Parsers ---------------------------------- //

/// Diagnostic produced by a domain parser (or a caller-supplied override).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("syntax error at position {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("non-integral result: {0}")]
    NonIntegral(f64),

    #[error("result out of range: {0}")]
    OutOfRange(f64),

    #[error("{0}")]
    Invalid(String),
}

impl ParseError {
    pub fn syntax(position: usize, message: impl Into<String>) -> Self {
        ParseError::Syntax { position, message: message.into() }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        ParseError::Invalid(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypath;

    #[test]
    fn cycle_message_lists_every_hop() {
        let err = Error::CircularReference {
            keypath: keypath!["a"],
            cycle: vec![keypath!["a"], keypath!["b"], keypath!["a"]],
        };
        assert_eq!(err.to_string(), "circular reference: a -> b -> a");
        assert_eq!(err.kind(), ErrorKind::CircularReference);
        assert_eq!(err.keypath(), &keypath!["a"]);
    }

    #[test]
    fn parse_error_is_the_source() {
        use std::error::Error as _;
        let err = Error::Parse {
            keypath: keypath!["x"],
            raw: "1/0".into(),
            substituted: "1/0".into(),
            source: ParseError::DivisionByZero,
        };
        assert_eq!(err.source().map(|e| e.to_string()), Some("division by zero".to_string()));
    }
}
