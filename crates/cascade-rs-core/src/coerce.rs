//! Coercion of untyped tree nodes into declared item types.
//!
//! A node is first normalised against the item's [`TypeDescriptor`] (string
//! scalars parsed into numbers, comma lists split, index maps turned into
//! lists) and then deserialised through `serde_json`.

use crate::descriptor::{ScalarKind, TypeDescriptor};
use crate::error::ConfigError;
use crate::path::KeyPath;
use crate::tree::{Scalar, TreeNode};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// Coerce `node` and deserialise the result into `T`.
pub fn bind<T: DeserializeOwned>(
    node: &TreeNode,
    descriptor: &TypeDescriptor,
    path: &KeyPath,
) -> Result<T, ConfigError> {
    let normalized = coerce(node, descriptor, path)?;
    serde_json::from_value(normalized.to_json()).map_err(|err| ConfigError::TypeMismatch {
        path: path.clone(),
        expected: format!("{descriptor} ({err})"),
        raw: node.to_string(),
    })
}

/// Normalise `node` so that it has the shape `descriptor` describes.
pub fn coerce(
    node: &TreeNode,
    descriptor: &TypeDescriptor,
    path: &KeyPath,
) -> Result<TreeNode, ConfigError> {
    match descriptor {
        TypeDescriptor::Any => Ok(node.clone()),
        TypeDescriptor::Optional(inner) => match node {
            TreeNode::Null => Ok(TreeNode::Null),
            other => coerce(other, inner, path),
        },
        TypeDescriptor::Scalar(kind) => match node.as_scalar() {
            Some(scalar) => coerce_scalar(scalar, *kind)
                .map(TreeNode::Scalar)
                .ok_or_else(|| mismatch(node, descriptor, path)),
            None => Err(mismatch(node, descriptor, path)),
        },
        TypeDescriptor::Enum(variants) => match node.as_scalar() {
            Some(scalar) if variants.iter().any(|variant| *variant == scalar.to_string()) => {
                Ok(TreeNode::string(scalar.to_string()))
            }
            _ => Err(mismatch(node, descriptor, path)),
        },
        TypeDescriptor::List(element) => {
            let elements = list_elements(node).ok_or_else(|| mismatch(node, descriptor, path))?;
            elements
                .iter()
                .enumerate()
                .map(|(index, child)| coerce(child, element, &path.child(index.to_string())))
                .collect::<Result<Vec<_>, _>>()
                .map(TreeNode::List)
        }
        TypeDescriptor::Map(value) => {
            let map = node
                .as_map()
                .ok_or_else(|| mismatch(node, descriptor, path))?;
            map.iter()
                .map(|(key, child)| {
                    coerce(child, value, &path.child(key.clone())).map(|child| (key.clone(), child))
                })
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(TreeNode::Map)
        }
        TypeDescriptor::Nested(fields) => {
            let map = node
                .as_map()
                .ok_or_else(|| mismatch(node, descriptor, path))?;
            let mut out = map.clone();
            for field in fields {
                let field_path = path.child(field.name.clone());
                match map.get(&field.name) {
                    Some(child) if !child.is_null() => {
                        out.insert(
                            field.name.clone(),
                            coerce(child, &field.descriptor, &field_path)?,
                        );
                    }
                    _ if field.optional || field.descriptor.is_optional() => {
                        out.remove(&field.name);
                    }
                    _ => return Err(ConfigError::MissingRequiredItem { path: field_path }),
                }
            }
            Ok(TreeNode::Map(out))
        }
    }
}

fn coerce_scalar(scalar: &Scalar, kind: ScalarKind) -> Option<Scalar> {
    match kind {
        ScalarKind::String => Some(Scalar::String(scalar.to_string())),
        ScalarKind::Bool => match scalar {
            Scalar::Bool(value) => Some(Scalar::Bool(*value)),
            Scalar::String(text) => parse_bool(text.trim()).map(Scalar::Bool),
            _ => None,
        },
        ScalarKind::Integer => match scalar {
            Scalar::Integer(value) => Some(Scalar::Integer(*value)),
            Scalar::Unsigned(value) => i64::try_from(*value).ok().map(Scalar::Integer),
            Scalar::Float(value) if value.fract() == 0.0 && value.abs() < i64::MAX as f64 => {
                Some(Scalar::Integer(*value as i64))
            }
            Scalar::String(text) => text.trim().parse::<i64>().ok().map(Scalar::Integer),
            _ => None,
        },
        ScalarKind::Unsigned => {
            let value = match scalar {
                Scalar::Integer(value) => u64::try_from(*value).ok(),
                Scalar::Unsigned(value) => Some(*value),
                Scalar::Float(value)
                    if value.fract() == 0.0 && *value >= 0.0 && *value < u64::MAX as f64 =>
                {
                    Some(*value as u64)
                }
                Scalar::String(text) => text.trim().parse::<u64>().ok(),
                _ => None,
            }?;
            Some(match i64::try_from(value) {
                Ok(small) => Scalar::Integer(small),
                Err(_) => Scalar::Unsigned(value),
            })
        }
        ScalarKind::Float => match scalar {
            Scalar::Float(value) => Some(Scalar::Float(*value)),
            Scalar::Integer(value) => Some(Scalar::Float(*value as f64)),
            Scalar::Unsigned(value) => Some(Scalar::Float(*value as f64)),
            Scalar::String(text) => text.trim().parse::<f64>().ok().map(Scalar::Float),
            Scalar::Bool(_) => None,
        },
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Elements of a list node, a comma separated string, or a map keyed `0..n`.
fn list_elements(node: &TreeNode) -> Option<Vec<TreeNode>> {
    match node {
        TreeNode::List(list) => Some(list.clone()),
        TreeNode::Scalar(Scalar::String(text)) => {
            if text.trim().is_empty() {
                return Some(Vec::new());
            }
            Some(
                text.split(',')
                    .map(|piece| TreeNode::string(piece.trim()))
                    .collect(),
            )
        }
        TreeNode::Map(map) => {
            let mut indexed = map
                .iter()
                .map(|(key, child)| key.parse::<usize>().ok().map(|index| (index, child)))
                .collect::<Option<Vec<_>>>()?;
            indexed.sort_by_key(|(index, _)| *index);
            let contiguous = indexed
                .iter()
                .enumerate()
                .all(|(position, (index, _))| position == *index);
            contiguous.then(|| indexed.into_iter().map(|(_, child)| child.clone()).collect())
        }
        _ => None,
    }
}

fn mismatch(node: &TreeNode, descriptor: &TypeDescriptor, path: &KeyPath) -> ConfigError {
    ConfigError::TypeMismatch {
        path: path.clone(),
        expected: descriptor.to_string(),
        raw: node.to_string(),
    }
}
