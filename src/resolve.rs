//! Resolution engine: turn a node tree into a plain, fully typed [`Value`].
//!
//! Internal nodes are resolved top-down in declaration order. Leaves are
//! resolved on demand, either by that walk or by a reference from another
//! leaf, whichever comes first. Every leaf moves through
//! `Unstarted -> InProgress -> Done` exactly once:
//!
//! - `Done` is the memo: diamond references parse their target once.
//! - Meeting an `InProgress` leaf again means the reference graph has a cycle;
//!   the stack of in-progress leaves gives the exact loop to report.
use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::error::{Error, ParseError, Result};
use crate::keypath::Keypath;
use crate::parsers::{ParserTable, Parsers};
use crate::render::{sole_reference, Interpolator, RenderError, Renderer};
use crate::schema::{parse_schema, LeafType, Schema};
use crate::tree::{self, Container, LeafKind, LeafState, Node, NodeId, Tree};
use crate::value::{json_kind_name, json_scalar_text, Value};

/// Default name under which the configuration refers to itself: `${this.a.b}`.
pub const DEFAULT_SELF_PREFIX: &str = "this";

// ———————————————————————————————————————————————————————————————————————————
// PUBLIC API
// ———————————————————————————————————————————————————————————————————————————

/// Resolve `raw` against a schema definition.
///
/// `external_variables` must be a mapping (or null); `override_parsers`
/// replaces built-in parsers for this call only.
pub fn resolve(
    raw: &Json,
    schema_definition: &Json,
    external_variables: &Json,
    override_parsers: Parsers,
) -> Result<Value> {
    let schema = parse_schema(schema_definition)?;
    Resolver::new(schema)
        .with_variables(external_variables.clone())
        .with_parsers(override_parsers)
        .resolve(raw)
}

/// Reusable resolution settings for one schema.
///
/// Each [`Resolver::resolve`] call builds its own tree and memo table, so a
/// resolver can be used for any number of configurations.
pub struct Resolver {
    schema: Schema,
    variables: Json,
    parsers: Parsers,
    renderer: Box<dyn Renderer>,
    self_prefix: String,
}

impl Resolver {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            variables: Json::Null,
            parsers: Parsers::new(),
            renderer: Box::new(Interpolator),
            self_prefix: DEFAULT_SELF_PREFIX.to_string(),
        }
    }

    pub fn from_definition(definition: &Json) -> Result<Self> {
        parse_schema(definition).map(Self::new)
    }

    pub fn with_variables(mut self, variables: Json) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_parsers(mut self, parsers: Parsers) -> Self {
        self.parsers = parsers;
        self
    }

    pub fn with_parser(
        mut self,
        type_: LeafType,
        parser: impl Fn(&str) -> std::result::Result<Value, ParseError> + 'static,
    ) -> Self {
        self.parsers.insert(type_, parser);
        self
    }

    pub fn with_renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn with_self_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.self_prefix = prefix.into();
        self
    }

    pub fn schema(&self) -> &Schema { &self.schema }

    pub fn resolve(&self, raw: &Json) -> Result<Value> {
        self.check_variables()?;
        let tree = tree::build(raw, &self.schema)?;
        let mut engine = Engine {
            tree,
            parsers: self.parsers.table(),
            variables: &self.variables,
            renderer: self.renderer.as_ref(),
            self_prefix: &self.self_prefix,
            stack: Vec::new(),
        };
        let root = engine.tree.root();
        engine.resolve_node(root)
    }

    fn check_variables(&self) -> Result<()> {
        match &self.variables {
            Json::Null => Ok(()),
            Json::Object(map) if map.contains_key(&self.self_prefix) => Err(Error::ReservedVariable {
                keypath: Keypath::root().key(self.self_prefix.as_str()),
                name: self.self_prefix.clone(),
            }),
            Json::Object(_) => Ok(()),
            other => Err(Error::type_mismatch(Keypath::root(), "dict of external variables", json_kind_name(other))),
        }
    }
}

// ———————————————————————————————————————————————————————————————————————————
// ENGINE
// ———————————————————————————————————————————————————————————————————————————

/// Per-call state. Owns the tree (and with it every leaf's memo slot).
struct Engine<'a> {
    tree: Tree,
    parsers: ParserTable<'a>,
    variables: &'a Json,
    renderer: &'a dyn Renderer,
    self_prefix: &'a str,
    /// Leaves currently `InProgress`, outermost first.
    stack: Vec<NodeId>,
}

impl Engine<'_> {
    fn resolve_node(&mut self, id: NodeId) -> Result<Value> {
        match self.tree.node(id) {
            Node::Dict { children, .. } => {
                let children = children.iter().map(|(k, c)| (k.clone(), *c)).collect::<Vec<_>>();
                let mut out = IndexMap::with_capacity(children.len());
                for (key, child) in children {
                    out.insert(key, self.resolve_node(child)?);
                }
                Ok(Value::Dict(out))
            }
            Node::List { children, .. } => {
                let children = children.clone();
                children.into_iter()
                    .map(|child| self.resolve_node(child))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List)
            }
            Node::Leaf(_) => self.resolve_leaf(id),
        }
    }

    fn resolve_leaf(&mut self, id: NodeId) -> Result<Value> {
        match self.tree.node(id) {
            Node::Leaf(leaf) => match &leaf.state {
                LeafState::Done(value) => return Ok(value.clone()),
                LeafState::InProgress => return Err(self.cycle_error(id)),
                LeafState::Unstarted => {}
            },
            _ => return self.resolve_node(id),
        }
        let Some(leaf) = self.tree.leaf_mut(id) else {
            return self.resolve_node(id);
        };
        leaf.state = LeafState::InProgress;
        let (keypath, kind, raw) = (leaf.keypath.clone(), leaf.kind, leaf.raw.clone());
        self.stack.push(id);

        let outcome = match kind {
            LeafKind::Typed(type_) => self.resolve_typed(&keypath, type_, &raw),
            LeafKind::Alias { container } => self.resolve_alias(&keypath, container, &raw),
        };
        self.stack.pop();
        let value = outcome?;

        tracing::debug!(keypath = %keypath, kind = value.kind_name(), "leaf resolved");
        if let Some(leaf) = self.tree.leaf_mut(id) {
            leaf.state = LeafState::Done(value.clone());
        }
        Ok(value)
    }

    fn resolve_typed(&mut self, keypath: &Keypath, type_: LeafType, raw: &Json) -> Result<Value> {
        let text = match raw {
            Json::String(template) => self.render(keypath, template)?,
            // non-string scalars carry no references
            other if type_ == LeafType::Any => return Ok(Value::from_json(other)),
            other => json_scalar_text(other),
        };
        self.parsers.parse(type_, &text).map_err(|source| Error::Parse {
            keypath: keypath.clone(),
            raw: json_scalar_text(raw),
            substituted: text,
            source,
        })
    }

    fn resolve_alias(&mut self, keypath: &Keypath, container: Container, raw: &Json) -> Result<Value> {
        let name = raw.as_str().and_then(sole_reference).unwrap_or_default();
        let parts = Keypath::dotted_parts(&name);
        let value = if parts.first() == Some(&self.self_prefix) {
            self.internal(keypath, &name, &parts[1..])?
        } else {
            self.external(keypath, &name, &parts).map(Value::from_json)?
        };
        let expected = match container {
            Container::Dict => "dict",
            Container::List => "list",
        };
        if value.kind_name() != expected {
            return Err(Error::type_mismatch(keypath.clone(), expected, value.kind_name()));
        }
        Ok(value)
    }

    fn render(&mut self, keypath: &Keypath, template: &str) -> Result<String> {
        let renderer = self.renderer;
        let mut lookup = |name: &str| self.lookup(keypath, name);
        renderer.render(template, &mut lookup).map_err(|err| match err {
            RenderError::Lookup(err) => *err,
            RenderError::Syntax { position, message } => Error::Template {
                keypath: keypath.clone(),
                raw: template.to_string(),
                position,
                message,
            },
        })
    }

    /// The callback behind every `${...}`: text of an internal node or external variable.
    fn lookup(&mut self, from: &Keypath, name: &str) -> Result<String> {
        tracing::trace!(from = %from, reference = name, "lookup");
        let parts = Keypath::dotted_parts(name);
        if parts.first() == Some(&self.self_prefix) {
            self.internal(from, name, &parts[1..]).map(|v| v.to_text())
        } else {
            self.external(from, name, &parts).map(|v| match v {
                Json::Array(_) | Json::Object(_) => v.to_string(),
                scalar => json_scalar_text(scalar),
            })
        }
    }

    fn internal(&mut self, from: &Keypath, name: &str, parts: &[&str]) -> Result<Value> {
        let unknown = || Error::UnknownReference { keypath: from.clone(), name: name.to_string() };
        let (id, consumed) = self.tree.locate(parts).ok_or_else(unknown)?;
        let value = self.resolve_node(id)?;
        // the walk stopped at a leaf (e.g. an alias): continue inside its value
        let mut at = &value;
        for part in &parts[consumed..] {
            at = at.get(part).ok_or_else(unknown)?;
        }
        Ok(at.clone())
    }

    fn external(&self, from: &Keypath, name: &str, parts: &[&str]) -> Result<&Json> {
        let unknown = || Error::UnknownReference { keypath: from.clone(), name: name.to_string() };
        let mut at = self.variables;
        for part in parts {
            at = match at {
                Json::Object(map) => map.get(*part),
                Json::Array(xs) => part.parse::<usize>().ok().and_then(|i| xs.get(i)),
                _ => None,
            }
            .ok_or_else(unknown)?;
        }
        Ok(at)
    }

    /// Cycle from the first re-entered leaf back to itself.
    fn cycle_error(&self, reentered: NodeId) -> Error {
        let start = self.stack.iter().position(|id| *id == reentered).unwrap_or(0);
        let mut cycle: Vec<Keypath> = self.stack[start..].iter()
            .map(|id| self.tree.node(*id).keypath().clone())
            .collect();
        let keypath = self.tree.node(reentered).keypath().clone();
        cycle.push(keypath.clone());
        Error::CircularReference { keypath, cycle }
    }
}
