//! Typed configuration resolution.
//!
//! A raw, JSON-like configuration is checked against a schema, its string
//! leaves are interpolated (`${this.a.b}` for self references, `${name}` for
//! external variables) and each leaf is parsed into its declared type:
//!
//! ```
//! use serde_json::json;
//! use dictconfig::{resolve, Parsers, Value};
//!
//! let schema = json!({
//!     "type": "dict",
//!     "required_keys": {
//!         "x": {"type": "integer"},
//!         "y": {"type": "integer"},
//!         "z": {"type": "integer"},
//!     }
//! });
//! let raw = json!({"x": "10", "y": "3", "z": "2 * ${this.x} + ${this.y}"});
//! let out = resolve(&raw, &schema, &json!({}), Parsers::new()).unwrap();
//! assert_eq!(out.get("z"), Some(&Value::Integer(23)));
//! ```
pub mod keypath;
pub mod error;
pub mod value;
pub mod path_de;
pub mod schema;
pub mod tree;
pub mod render;
pub mod parsers;
pub mod resolve;
pub mod cli;

pub use error::{Error, ErrorKind, ParseError, Result};
pub use keypath::{Keypath, Segment};
pub use parsers::{ParserTable, Parsers};
pub use render::{Interpolator, RenderError, Renderer};
pub use resolve::{resolve, Resolver, DEFAULT_SELF_PREFIX};
pub use schema::{parse_schema, LeafType, Schema};
pub use value::Value;
