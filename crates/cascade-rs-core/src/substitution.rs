//! `${path}` substitution inside string values of a layer.
//!
//! References resolve against the layer first and then against the tree the
//! layer is merged onto. `${path:-fallback}` supplies a fallback and `$${`
//! escapes a literal `${`. A string that is exactly one reference takes the
//! referenced node as is, so `${server}` can copy a whole map.

use crate::error::ConfigError;
use crate::path::KeyPath;
use crate::tree::{Scalar, TreeNode};

/// Substitute every reference in `layer`.
pub fn substitute(layer: &TreeNode, base: &TreeNode, origin: &str) -> Result<TreeNode, ConfigError> {
    let mut resolver = Resolver {
        layer,
        base,
        origin,
        stack: Vec::new(),
    };
    resolver.node(layer, &KeyPath::root())
}

struct Resolver<'a> {
    layer: &'a TreeNode,
    base: &'a TreeNode,
    origin: &'a str,
    stack: Vec<KeyPath>,
}

impl<'a> Resolver<'a> {
    fn node(&mut self, node: &'a TreeNode, path: &KeyPath) -> Result<TreeNode, ConfigError> {
        match node {
            TreeNode::Scalar(Scalar::String(text)) => self.string(text, path),
            TreeNode::List(list) => list
                .iter()
                .enumerate()
                .map(|(index, child)| self.node(child, &path.child(index.to_string())))
                .collect::<Result<Vec<_>, _>>()
                .map(TreeNode::List),
            TreeNode::Map(map) => map
                .iter()
                .map(|(key, child)| {
                    self.node(child, &path.child(key.clone()))
                        .map(|child| (key.clone(), child))
                })
                .collect::<Result<_, _>>()
                .map(TreeNode::Map),
            other => Ok(other.clone()),
        }
    }

    fn string(&mut self, text: &str, path: &KeyPath) -> Result<TreeNode, ConfigError> {
        if !text.contains("${") {
            return Ok(TreeNode::string(text));
        }
        if let Some(reference) = whole_reference(text) {
            return self.lookup(reference, path);
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(pos) = rest.find("${") {
            if rest[..pos].ends_with('$') {
                out.push_str(&rest[..pos - 1]);
                out.push_str("${");
                rest = &rest[pos + 2..];
                continue;
            }
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[pos..]);
                rest = "";
                break;
            };
            let resolved = self.lookup(&after[..end], path)?;
            out.push_str(&resolved.to_string());
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(TreeNode::string(out))
    }

    fn lookup(&mut self, reference: &str, path: &KeyPath) -> Result<TreeNode, ConfigError> {
        let (name, fallback) = match reference.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (reference, None),
        };
        let target = KeyPath::parse(name.trim());
        let unresolved = || ConfigError::UnresolvedSubstitution {
            path: path.clone(),
            reference: reference.to_string(),
            origin: self.origin.to_string(),
        };
        if target.is_root() || self.stack.contains(&target) {
            return Err(unresolved());
        }

        let layer: &'a TreeNode = self.layer;
        let base: &'a TreeNode = self.base;
        match layer.get(&target).or_else(|| base.get(&target)) {
            Some(node) if !node.is_null() => {
                self.stack.push(target.clone());
                let resolved = self.node(node, &target);
                self.stack.pop();
                resolved
            }
            _ => match fallback {
                Some(fallback) => Ok(TreeNode::string(fallback)),
                None => Err(unresolved()),
            },
        }
    }
}

fn whole_reference(text: &str) -> Option<&str> {
    text.strip_prefix("${")?
        .strip_suffix('}')
        .filter(|inner| !inner.contains('}') && !inner.contains("${"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(layer: serde_json::Value, base: serde_json::Value) -> Result<serde_json::Value, ConfigError> {
        substitute(&TreeNode::from(layer), &TreeNode::from(base), "test").map(|tree| tree.to_json())
    }

    /// References look in the layer first, then in the tree below it.
    #[test]
    fn substitutes_from_layer_then_base() {
        let out = run(
            json!({ "host": "example.org", "url": "http://${host}:${port}/" }),
            json!({ "port": 8080 }),
        )
        .expect("substituted");
        assert_eq!(out["url"], json!("http://example.org:8080/"));
    }

    #[test]
    fn whole_reference_copies_node() {
        let out = run(json!({ "a": { "b": 1 }, "c": "${a}" }), json!({})).expect("substituted");
        assert_eq!(out["c"], json!({ "b": 1 }));
    }

    /// `$${` writes a literal `${`; `:-` supplies a fallback.
    #[test]
    fn escapes_and_fallbacks() {
        let out = run(json!({ "x": "$${literal}", "y": "${missing:-dflt}" }), json!({}))
            .expect("substituted");
        assert_eq!(out, json!({ "x": "${literal}", "y": "dflt" }));
    }

    #[test]
    fn nested_references_resolve_transitively() {
        let out = run(json!({ "a": "${b}", "b": "${c}-x", "c": "z" }), json!({})).expect("ok");
        assert_eq!(out["a"], json!("z-x"));
    }

    /// Unresolvable and self-referencing values are load errors.
    #[test]
    fn missing_and_cyclic_references_fail() {
        let err = run(json!({ "a": "${nope}" }), json!({})).unwrap_err();
        assert!(matches!(err, ConfigError::UnresolvedSubstitution { .. }));
        let err = run(json!({ "a": "${b}", "b": "${a}" }), json!({})).unwrap_err();
        assert!(matches!(err, ConfigError::UnresolvedSubstitution { .. }));
    }
}
