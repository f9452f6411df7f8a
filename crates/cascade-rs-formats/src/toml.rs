//! TOML codec backed by `toml`.
//!
//! TOML has no null, so null entries are left out when serializing, and
//! the document root must be a table. Datetimes parse as strings.

use cascade_rs_core::{Codec, ConfigError, ParseError, TreeNode};
use std::collections::BTreeMap;

/// Key `toml` uses when a datetime goes through `deserialize_any`.
const DATETIME_KEY: &str = "$__toml_private_datetime";

/// `.toml` documents. The root must be a table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TomlCodec;

impl Codec for TomlCodec {
    fn name(&self) -> &str {
        "toml"
    }

    fn extensions(&self) -> &[&str] {
        &["toml"]
    }

    fn parse(&self, bytes: &[u8], origin: &str) -> Result<TreeNode, ParseError> {
        let text = std::str::from_utf8(bytes).map_err(|err| {
            ParseError::new(origin, format!("invalid UTF-8: {err}")).at_offset(err.valid_up_to())
        })?;
        let tree = ::toml::from_str::<TreeNode>(text).map_err(|err| {
            let parse = ParseError::new(origin, err.message());
            match err.span() {
                Some(span) => {
                    let (line, column) = line_and_column(text, span.start);
                    parse.at_line(line, Some(column)).at_offset(span.start)
                }
                None => parse,
            }
        })?;
        Ok(unwrap_datetimes(tree))
    }

    fn serialize(&self, tree: &TreeNode) -> Result<Vec<u8>, ConfigError> {
        let tree = match tree {
            TreeNode::Null => TreeNode::empty(),
            TreeNode::Map(_) => without_nulls(tree),
            other => {
                return Err(ConfigError::Serialize(format!(
                    "TOML documents must be tables, got a {}",
                    other.kind()
                )));
            }
        };
        ::toml::to_string_pretty(&tree)
            .map(String::into_bytes)
            .map_err(|err| ConfigError::Serialize(err.to_string()))
    }
}

/// 1-based line and column of a byte offset.
fn line_and_column(text: &str, offset: usize) -> (usize, usize) {
    let before = text.get(..offset).unwrap_or(text);
    let line = before.matches('\n').count() + 1;
    let column = before
        .rfind('\n')
        .map_or(before.chars().count(), |newline| {
            before[newline + 1..].chars().count()
        })
        + 1;
    (line, column)
}

fn unwrap_datetimes(node: TreeNode) -> TreeNode {
    match node {
        TreeNode::Map(mut map) => {
            if map.len() == 1 {
                if let Some(TreeNode::Scalar(_)) = map.get(DATETIME_KEY) {
                    if let Some(value) = map.remove(DATETIME_KEY) {
                        return value;
                    }
                }
            }
            TreeNode::Map(
                map.into_iter()
                    .map(|(key, value)| (key, unwrap_datetimes(value)))
                    .collect(),
            )
        }
        TreeNode::List(list) => TreeNode::List(list.into_iter().map(unwrap_datetimes).collect()),
        other => other,
    }
}

fn without_nulls(node: &TreeNode) -> TreeNode {
    match node {
        TreeNode::Map(map) => TreeNode::Map(
            map.iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| (key.clone(), without_nulls(value)))
                .collect::<BTreeMap<_, _>>(),
        ),
        TreeNode::List(list) => TreeNode::List(
            list.iter()
                .filter(|value| !value.is_null())
                .map(without_nulls)
                .collect(),
        ),
        other => other.clone(),
    }
}
