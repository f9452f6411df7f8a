//! Format-agnostic intermediate tree produced by codecs and programmatic sources.

mod flat;
mod serde_impl;


pub use flat::FlatKeyConflict;

use crate::path::KeyPath;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Leaf value of a tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Integer(i64),
    /// Unsigned values that do not fit in `i64`.
    Unsigned(u64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(value) => f.write_str(value),
            Scalar::Integer(value) => write!(f, "{value}"),
            Scalar::Unsigned(value) => write!(f, "{value}"),
            Scalar::Float(value) => write!(f, "{value}"),
            Scalar::Bool(value) => write!(f, "{value}"),
        }
    }
}

/// Recursive, read-only configuration tree.
#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Null,
    Scalar(Scalar),
    List(Vec<TreeNode>),
    Map(BTreeMap<String, TreeNode>),
}

impl Default for TreeNode {
    /// The empty tree is an empty map, the identity of the merge.
    fn default() -> Self {
        TreeNode::empty()
    }
}

impl TreeNode {
    /// An empty map, the tree of a layer that sets nothing.
    pub fn empty() -> Self {
        TreeNode::Map(BTreeMap::new())
    }

    pub fn string(value: impl Into<String>) -> Self {
        TreeNode::Scalar(Scalar::String(value.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, TreeNode::Null)
    }

    /// True for an empty map (the tree of a no-op layer).
    pub fn is_empty_map(&self) -> bool {
        matches!(self, TreeNode::Map(map) if map.is_empty())
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            TreeNode::Scalar(scalar) => Some(scalar),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, TreeNode>> {
        match self {
            TreeNode::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[TreeNode]> {
        match self {
            TreeNode::List(list) => Some(list),
            _ => None,
        }
    }

    /// Short name of the node kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            TreeNode::Null => "null",
            TreeNode::Scalar(_) => "scalar",
            TreeNode::List(_) => "list",
            TreeNode::Map(_) => "map",
        }
    }

    /// Look up the node at `path`. List elements are addressed by their
    /// decimal index.
    pub fn get(&self, path: &KeyPath) -> Option<&TreeNode> {
        let mut node = self;
        for segment in path.segments() {
            node = match node {
                TreeNode::Map(map) => map.get(segment)?,
                TreeNode::List(list) => list.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(node)
    }

    pub fn contains(&self, path: &KeyPath) -> bool {
        self.get(path).is_some()
    }

    /// Place `node` at `path`, turning anything in the way into maps.
    pub fn insert(&mut self, path: &KeyPath, node: TreeNode) {
        let mut slot = self;
        for segment in path.segments() {
            if !matches!(slot, TreeNode::Map(_)) {
                *slot = TreeNode::empty();
            }
            let TreeNode::Map(map) = slot else {
                unreachable!("slot was just replaced by a map");
            };
            slot = map.entry(segment.clone()).or_insert(TreeNode::Null);
        }
        *slot = node;
    }

    /// Paths of every leaf: scalars, nulls, lists and empty maps.
    pub fn leaf_paths(&self) -> Vec<KeyPath> {
        let mut paths = Vec::new();
        collect_leaf_paths(self, KeyPath::root(), &mut paths);
        paths
    }

    /// Build a tree from dotted keys, e.g. `server.port = 80`.
    pub fn from_flat_map<I, K, V>(entries: I) -> Result<TreeNode, FlatKeyConflict>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<TreeNode>,
    {
        flat::unflatten(entries)
    }

    /// Flatten to dotted keys; lists are flattened by index.
    pub fn flatten(&self) -> BTreeMap<String, String> {
        flat::flatten(self)
    }

    /// Convert to `serde_json::Value`; non-finite floats become null.
    pub fn to_json(&self) -> Value {
        match self {
            TreeNode::Null => Value::Null,
            TreeNode::Scalar(Scalar::String(value)) => Value::String(value.clone()),
            TreeNode::Scalar(Scalar::Integer(value)) => Value::Number((*value).into()),
            TreeNode::Scalar(Scalar::Unsigned(value)) => Value::Number((*value).into()),
            TreeNode::Scalar(Scalar::Float(value)) => {
                Number::from_f64(*value).map_or(Value::Null, Value::Number)
            }
            TreeNode::Scalar(Scalar::Bool(value)) => Value::Bool(*value),
            TreeNode::List(list) => Value::Array(list.iter().map(TreeNode::to_json).collect()),
            TreeNode::Map(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

fn collect_leaf_paths(node: &TreeNode, path: KeyPath, paths: &mut Vec<KeyPath>) {
    match node {
        TreeNode::Map(map) if !map.is_empty() => {
            for (key, child) in map {
                collect_leaf_paths(child, path.child(key.clone()), paths);
            }
        }
        _ if path.is_root() => {}
        _ => paths.push(path),
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeNode::Null => f.write_str("null"),
            TreeNode::Scalar(scalar) => write!(f, "{scalar}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<Value> for TreeNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => TreeNode::Null,
            Value::Bool(value) => TreeNode::Scalar(Scalar::Bool(value)),
            Value::Number(number) => {
                if let Some(value) = number.as_i64() {
                    TreeNode::Scalar(Scalar::Integer(value))
                } else if let Some(value) = number.as_u64() {
                    TreeNode::Scalar(Scalar::Unsigned(value))
                } else {
                    TreeNode::Scalar(Scalar::Float(number.as_f64().unwrap_or(f64::NAN)))
                }
            }
            Value::String(value) => TreeNode::Scalar(Scalar::String(value)),
            Value::Array(values) => TreeNode::List(values.into_iter().map(TreeNode::from).collect()),
            Value::Object(map) => TreeNode::Map(
                map.into_iter()
                    .map(|(key, value)| (key, TreeNode::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<Scalar> for TreeNode {
    fn from(value: Scalar) -> Self {
        TreeNode::Scalar(value)
    }
}

impl From<&str> for TreeNode {
    fn from(value: &str) -> Self {
        TreeNode::string(value)
    }
}

impl From<String> for TreeNode {
    fn from(value: String) -> Self {
        TreeNode::string(value)
    }
}

impl From<i64> for TreeNode {
    fn from(value: i64) -> Self {
        TreeNode::Scalar(Scalar::Integer(value))
    }
}

impl From<f64> for TreeNode {
    fn from(value: f64) -> Self {
        TreeNode::Scalar(Scalar::Float(value))
    }
}

impl From<bool> for TreeNode {
    fn from(value: bool) -> Self {
        TreeNode::Scalar(Scalar::Bool(value))
    }
}

impl From<Vec<TreeNode>> for TreeNode {
    fn from(value: Vec<TreeNode>) -> Self {
        TreeNode::List(value)
    }
}

impl From<BTreeMap<String, TreeNode>> for TreeNode {
    fn from(value: BTreeMap<String, TreeNode>) -> Self {
        TreeNode::Map(value)
    }
}
