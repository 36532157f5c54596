//! Node tree: the schema-guided, typed view of one raw configuration.
//!
//! Built fresh for every `resolve()` call and dropped afterwards. Nodes live in
//! an arena and refer to each other by [`NodeId`]; the structure is a strict
//! tree; only leaf text can point elsewhere (the reference graph).
use indexmap::IndexMap;
use serde_json::Value as Json;

use crate::error::{Error, Result};
use crate::keypath::Keypath;
use crate::render::sole_reference;
use crate::schema::{DictSchema, LeafType, ListSchema, Schema};
use crate::value::{json_kind_name, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub enum Node {
    Dict { keypath: Keypath, children: IndexMap<String, NodeId> },
    List { keypath: Keypath, children: Vec<NodeId> },
    Leaf(Leaf),
}

#[derive(Debug, Clone)]
pub struct Leaf {
    pub keypath: Keypath,
    pub kind: LeafKind,
    /// The scalar exactly as supplied.
    pub raw: Json,
    pub state: LeafState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafKind {
    Typed(LeafType),
    /// A dict/list slot filled by a single `${...}` reference to another container.
    Alias { container: Container },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Dict,
    List,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LeafState {
    Unstarted,
    InProgress,
    Done(Value),
}

#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

// ———————————————————————————————————————————————————————————————————————————
// BUILD
// ———————————————————————————————————————————————————————————————————————————

/// Build the node tree for `raw` under `schema`. Any mismatch aborts the build.
pub fn build(raw: &Json, schema: &Schema) -> Result<Tree> {
    let mut nodes = Vec::new();
    let root = build_node(&mut nodes, raw, schema, Keypath::root())?;
    tracing::debug!(nodes = nodes.len(), "configuration tree built");
    Ok(Tree { nodes, root })
}

fn push(nodes: &mut Vec<Node>, node: Node) -> NodeId {
    nodes.push(node);
    NodeId(nodes.len() - 1)
}

fn done_leaf(nodes: &mut Vec<Node>, keypath: Keypath, type_: LeafType, raw: &Json, value: Value) -> NodeId {
    push(nodes, Node::Leaf(Leaf {
        keypath,
        kind: LeafKind::Typed(type_),
        raw: raw.clone(),
        state: LeafState::Done(value),
    }))
}

fn build_node(nodes: &mut Vec<Node>, raw: &Json, schema: &Schema, keypath: Keypath) -> Result<NodeId> {
    match schema {
        Schema::Dict(dict) => build_dict(nodes, raw, dict, keypath),
        Schema::List(list) => build_list(nodes, raw, list, keypath),
        Schema::Leaf(leaf) => match raw {
            Json::Null if leaf.nullable => Ok(done_leaf(nodes, keypath, leaf.type_, raw, Value::Null)),
            Json::Null | Json::Array(_) | Json::Object(_) => {
                Err(Error::type_mismatch(keypath, leaf.type_.as_str(), json_kind_name(raw)))
            }
            _ => Ok(push(nodes, Node::Leaf(Leaf {
                keypath,
                kind: LeafKind::Typed(leaf.type_),
                raw: raw.clone(),
                state: LeafState::Unstarted,
            }))),
        },
        Schema::Any => match raw {
            Json::Object(map) => {
                let mut children = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    let id = build_node(nodes, value, &Schema::Any, keypath.key(key.as_str()))?;
                    children.insert(key.clone(), id);
                }
                Ok(push(nodes, Node::Dict { keypath, children }))
            }
            Json::Array(xs) => {
                let children = xs.iter().enumerate()
                    .map(|(i, x)| build_node(nodes, x, &Schema::Any, keypath.index(i)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(push(nodes, Node::List { keypath, children }))
            }
            Json::Null => Ok(done_leaf(nodes, keypath, LeafType::Any, raw, Value::Null)),
            _ => Ok(push(nodes, Node::Leaf(Leaf {
                keypath,
                kind: LeafKind::Typed(LeafType::Any),
                raw: raw.clone(),
                state: LeafState::Unstarted,
            }))),
        },
    }
}

/// Null for a nullable container, or a `${...}` alias; otherwise `None`.
fn container_stand_in(
    nodes: &mut Vec<Node>,
    raw: &Json,
    nullable: bool,
    container: Container,
    keypath: &Keypath,
) -> Option<NodeId> {
    match raw {
        Json::Null if nullable => Some(done_leaf(nodes, keypath.clone(), LeafType::Any, raw, Value::Null)),
        Json::String(s) if sole_reference(s).is_some() => Some(push(nodes, Node::Leaf(Leaf {
            keypath: keypath.clone(),
            kind: LeafKind::Alias { container },
            raw: raw.clone(),
            state: LeafState::Unstarted,
        }))),
        _ => None,
    }
}

fn build_dict(nodes: &mut Vec<Node>, raw: &Json, schema: &DictSchema, keypath: Keypath) -> Result<NodeId> {
    if let Some(id) = container_stand_in(nodes, raw, schema.nullable, Container::Dict, &keypath) {
        return Ok(id);
    }
    let Json::Object(map) = raw else {
        return Err(Error::type_mismatch(keypath, "dict", json_kind_name(raw)));
    };

    let mut children = IndexMap::with_capacity(map.len());
    for (key, sub) in &schema.required_keys {
        let at = keypath.key(key.as_str());
        let Some(value) = map.get(key) else {
            return Err(Error::MissingRequiredKey { keypath: at });
        };
        children.insert(key.clone(), build_node(nodes, value, sub, at)?);
    }
    for (key, optional) in &schema.optional_keys {
        let at = keypath.key(key.as_str());
        let id = match (map.get(key), &optional.default) {
            (Some(value), _) => build_node(nodes, value, &optional.schema, at)?,
            // defaults are already typed: no interpolation, no parsing
            (None, Some(default)) => done_leaf(nodes, at, default_type(&optional.schema), &Json::Null, default.clone()),
            (None, None) => return Err(Error::MissingRequiredKey { keypath: at }),
        };
        children.insert(key.clone(), id);
    }
    for (key, value) in map {
        if schema.required_keys.contains_key(key) || schema.optional_keys.contains_key(key) {
            continue;
        }
        let at = keypath.key(key.as_str());
        let Some(extra) = schema.extra_keys_schema.as_deref() else {
            return Err(Error::UnknownKey { keypath: at });
        };
        children.insert(key.clone(), build_node(nodes, value, extra, at)?);
    }
    Ok(push(nodes, Node::Dict { keypath, children }))
}

fn build_list(nodes: &mut Vec<Node>, raw: &Json, schema: &ListSchema, keypath: Keypath) -> Result<NodeId> {
    if let Some(id) = container_stand_in(nodes, raw, schema.nullable, Container::List, &keypath) {
        return Ok(id);
    }
    let Json::Array(xs) = raw else {
        return Err(Error::type_mismatch(keypath, "list", json_kind_name(raw)));
    };
    let children = xs.iter().enumerate()
        .map(|(i, x)| build_node(nodes, x, &schema.element_schema, keypath.index(i)))
        .collect::<Result<Vec<_>>>()?;
    Ok(push(nodes, Node::List { keypath, children }))
}

fn default_type(schema: &Schema) -> LeafType {
    match schema {
        Schema::Leaf(leaf) => leaf.type_,
        _ => LeafType::Any,
    }
}

// ———————————————————————————————————————————————————————————————————————————
// ACCESS
// ———————————————————————————————————————————————————————————————————————————

impl Tree {
    pub fn root(&self) -> NodeId { self.root }

    pub fn len(&self) -> usize { self.nodes.len() }

    pub fn is_empty(&self) -> bool { self.nodes.is_empty() }

    pub fn node(&self, id: NodeId) -> &Node { &self.nodes[id.0] }

    pub fn leaf_mut(&mut self, id: NodeId) -> Option<&mut Leaf> {
        match &mut self.nodes[id.0] {
            Node::Leaf(leaf) => Some(leaf),
            _ => None,
        }
    }

    /// Walk dotted parts from the root.
    ///
    /// Returns the deepest node reached and how many parts were consumed; fewer
    /// than `parts.len()` means the walk stopped at a leaf. `None` if an internal
    /// node has no such child.
    pub fn locate(&self, parts: &[&str]) -> Option<(NodeId, usize)> {
        let mut at = self.root;
        for (consumed, part) in parts.iter().enumerate() {
            at = match self.node(at) {
                Node::Dict { children, .. } => *children.get(*part)?,
                Node::List { children, .. } => *children.get(part.parse::<usize>().ok()?)?,
                Node::Leaf(_) => return Some((at, consumed)),
            };
        }
        Some((at, parts.len()))
    }
}

impl Node {
    pub fn keypath(&self) -> &Keypath {
        match self {
            Node::Dict { keypath, .. } | Node::List { keypath, .. } => keypath,
            Node::Leaf(leaf) => &leaf.keypath,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::keypath;
    use crate::schema::parse_schema;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn schema() -> Schema {
        parse_schema(&json!({
            "type": "dict",
            "required_keys": {
                "name": {"type": "string"},
                "authors": {"type": "list", "element_schema": {"type": "string"}},
            },
            "optional_keys": {
                "retries": {"type": "integer", "default": 3},
                "note": {"type": "string", "nullable": true, "default": null},
            },
        })).unwrap()
    }

    fn child_keys(tree: &Tree, id: NodeId) -> Vec<String> {
        match tree.node(id) {
            Node::Dict { children, .. } => children.keys().cloned().collect(),
            other => panic!("not a dict: {other:?}"),
        }
    }

    #[test]
    fn children_follow_schema_order() {
        let raw = json!({"note": "hi", "authors": ["a", "b"], "name": "x"});
        let tree = build(&raw, &schema()).unwrap();
        assert_eq!(child_keys(&tree, tree.root()), vec!["name", "authors", "retries", "note"]);
    }

    #[test]
    fn defaults_are_done_at_build_time() {
        let tree = build(&json!({"name": "x", "authors": []}), &schema()).unwrap();
        let (id, _) = tree.locate(&["retries"]).unwrap();
        let Node::Leaf(leaf) = tree.node(id) else { panic!() };
        assert_eq!(leaf.state, LeafState::Done(Value::Integer(3)));
        assert_eq!(leaf.keypath, keypath!["retries"]);
    }

    #[test]
    fn keypaths_address_list_elements() {
        let tree = build(&json!({"name": "x", "authors": ["a", "b", "c"]}), &schema()).unwrap();
        let (id, consumed) = tree.locate(&["authors", "2"]).unwrap();
        assert_eq!(consumed, 2);
        assert_eq!(tree.node(id).keypath(), &keypath!["authors", 2usize]);
        assert!(tree.locate(&["authors", "9"]).is_none());
        assert_eq!(tree.locate(&["name", "deeper"]).map(|(_, n)| n), Some(1));
    }

    #[test]
    fn missing_required_key() {
        let err = build(&json!({"name": "x"}), &schema()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredKey);
        assert_eq!(err.keypath(), &keypath!["authors"]);
    }

    #[test]
    fn unknown_key_without_extra_schema() {
        let err = build(&json!({"name": "x", "authors": [], "surprise": 1}), &schema()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownKey);
        assert_eq!(err.keypath(), &keypath!["surprise"]);
    }

    #[test]
    fn container_kind_mismatch() {
        let err = build(&json!({"name": "x", "authors": {"a": 1}}), &schema()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.keypath(), &keypath!["authors"]);
        let err = build(&json!({"name": ["x"], "authors": []}), &schema()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
    }

    #[test]
    fn null_needs_nullable() {
        let err = build(&json!({"name": null, "authors": []}), &schema()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        let tree = build(&json!({"name": "x", "authors": [], "note": null}), &schema()).unwrap();
        let (id, _) = tree.locate(&["note"]).unwrap();
        let Node::Leaf(leaf) = tree.node(id) else { panic!() };
        assert_eq!(leaf.state, LeafState::Done(Value::Null));
    }

    #[test]
    fn any_builds_free_form_containers() {
        let tree = build(&json!({"b": 1, "a": [true, null]}), &Schema::Any).unwrap();
        assert_eq!(child_keys(&tree, tree.root()), vec!["b", "a"]);
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn container_alias() {
        let tree = build(&json!({"name": "x", "authors": "${this.others}"}), &schema()).unwrap();
        let (id, _) = tree.locate(&["authors"]).unwrap();
        let Node::Leaf(leaf) = tree.node(id) else { panic!() };
        assert_eq!(leaf.kind, LeafKind::Alias { container: Container::List });
    }
}
