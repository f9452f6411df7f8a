//! Conversion between trees and flat dotted-key maps.

use super::TreeNode;
use crate::path::KeyPath;
use std::collections::BTreeMap;
use std::fmt;

/// A flat key is both a leaf and the parent of another key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatKeyConflict {
    pub path: KeyPath,
}

impl fmt::Display for FlatKeyConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "key {} is used both as a value and as a parent", self.path)
    }
}

impl std::error::Error for FlatKeyConflict {}

pub(super) fn unflatten<I, K, V>(entries: I) -> Result<TreeNode, FlatKeyConflict>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<TreeNode>,
{
    let mut root = BTreeMap::new();
    for (key, value) in entries {
        let path = KeyPath::parse(key.as_ref());
        if path.is_root() {
            continue;
        }
        insert_flat(&mut root, &path, value.into())?;
    }
    Ok(TreeNode::Map(root))
}

fn insert_flat(
    root: &mut BTreeMap<String, TreeNode>,
    path: &KeyPath,
    value: TreeNode,
) -> Result<(), FlatKeyConflict> {
    let segments = path.segments();
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| FlatKeyConflict { path: path.clone() })?;
    let mut map = root;
    for (depth, segment) in parents.iter().enumerate() {
        let entry = map.entry(segment.clone()).or_insert_with(TreeNode::empty);
        map = match entry {
            TreeNode::Map(child) => child,
            _ => {
                return Err(FlatKeyConflict {
                    path: KeyPath::from_segments(segments[..=depth].iter().cloned()),
                });
            }
        };
    }
    match map.get(last) {
        Some(TreeNode::Map(existing)) if !existing.is_empty() => {
            Err(FlatKeyConflict { path: path.clone() })
        }
        _ => {
            map.insert(last.clone(), value);
            Ok(())
        }
    }
}

pub(super) fn flatten(node: &TreeNode) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into(node, &KeyPath::root(), &mut out);
    out
}

fn flatten_into(node: &TreeNode, path: &KeyPath, out: &mut BTreeMap<String, String>) {
    match node {
        TreeNode::Map(map) => {
            for (key, child) in map {
                flatten_into(child, &path.child(key.clone()), out);
            }
        }
        TreeNode::List(list) => {
            for (index, child) in list.iter().enumerate() {
                flatten_into(child, &path.child(index.to_string()), out);
            }
        }
        TreeNode::Null if !path.is_root() => {
            out.insert(path.to_string(), String::new());
        }
        TreeNode::Scalar(scalar) if !path.is_root() => {
            out.insert(path.to_string(), scalar.to_string());
        }
        _ => {}
    }
}
