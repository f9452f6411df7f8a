//! Cascading merge of layer trees.

use crate::path::KeyPath;
use crate::tree::TreeNode;
use std::collections::BTreeMap;

/// Merge `overlay` on top of `base` and return the composed tree.
///
/// Paths present in the overlay win; paths only in the base survive; maps
/// present in both are merged key by key. Scalars, lists and nulls replace
/// whatever the base holds at that path.
pub fn merge_trees(base: &TreeNode, overlay: &TreeNode) -> TreeNode {
    let mut merged = base.clone();
    merge_into(&mut merged, overlay);
    merged
}

/// Merge overlay values into the base, recursively overriding maps.
pub fn merge_into(base: &mut TreeNode, overlay: &TreeNode) {
    match (base, overlay) {
        (TreeNode::Map(base_map), TreeNode::Map(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

/// Fold layers in load order into one tree.
pub fn merge_layers<'a, I>(layers: I) -> TreeNode
where
    I: IntoIterator<Item = &'a TreeNode>,
{
    let mut merged = TreeNode::empty();
    for layer in layers {
        merge_into(&mut merged, layer);
    }
    merged
}

/// Leaf paths of `tree` that no declared item covers.
///
/// A leaf is covered when an item path is a prefix of it (the item owns the
/// whole subtree). A leaf above an item is covered only when it is an empty
/// map or null placeholder; a scalar or list there would hide the items
/// below it and is reported.
pub fn unknown_paths(tree: &TreeNode, item_paths: &[KeyPath]) -> Vec<KeyPath> {
    tree.leaf_paths()
        .into_iter()
        .filter(|leaf| {
            let placeholder = tree
                .get(leaf)
                .is_some_and(|node| node.is_null() || node.is_empty_map());
            !item_paths.iter().any(|item| {
                leaf.starts_with(item) || (placeholder && item.starts_with(leaf))
            })
        })
        .collect()
}

/// Rewrite map keys that match a declared path ignoring ASCII case to the
/// declared spelling. Keys below an item path are left alone.
pub fn normalize_key_case(tree: &TreeNode, item_paths: &[KeyPath]) -> TreeNode {
    normalize_at(tree, &KeyPath::root(), item_paths)
}

fn normalize_at(node: &TreeNode, path: &KeyPath, item_paths: &[KeyPath]) -> TreeNode {
    let TreeNode::Map(map) = node else {
        return node.clone();
    };
    if item_paths.iter().any(|item| path.starts_with(item) && !path.is_root()) {
        return node.clone();
    }
    let depth = path.len();
    let candidates = item_paths
        .iter()
        .filter(|item| item.len() > depth && item.starts_with(path))
        .map(|item| item.segments()[depth].as_str())
        .collect::<Vec<_>>();

    let mut out = BTreeMap::new();
    for (key, child) in map {
        let key = if candidates.contains(&key.as_str()) {
            key.clone()
        } else {
            candidates
                .iter()
                .find(|candidate| candidate.eq_ignore_ascii_case(key))
                .map_or_else(|| key.clone(), |candidate| candidate.to_string())
        };
        let child = normalize_at(child, &path.child(key.clone()), item_paths);
        match out.get_mut(&key) {
            Some(existing) => merge_into(existing, &child),
            None => {
                out.insert(key, child);
            }
        }
    }
    TreeNode::Map(out)
}
