//! JSON codec backed by `serde_json`.

use crate::codec::Codec;
use crate::error::{ConfigError, ParseError};
use crate::tree::TreeNode;

/// `.json` documents through `serde_json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &str {
        "json"
    }

    fn extensions(&self) -> &[&str] {
        &["json"]
    }

    fn parse(&self, bytes: &[u8], origin: &str) -> Result<TreeNode, ParseError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(TreeNode::empty());
        }
        serde_json::from_slice::<TreeNode>(bytes).map_err(|err| {
            ParseError::new(origin, err.to_string()).at_line(err.line(), Some(err.column()))
        })
    }

    fn serialize(&self, tree: &TreeNode) -> Result<Vec<u8>, ConfigError> {
        serde_json::to_vec_pretty(tree).map_err(|err| ConfigError::Serialize(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_nested_documents() {
        let tree = JsonCodec
            .parse(br#"{"server": {"port": 80, "hosts": ["a", "b"]}}"#, "inline")
            .expect("parsed");
        assert_eq!(
            tree.to_json(),
            json!({ "server": { "port": 80, "hosts": ["a", "b"] } })
        );
    }

    #[test]
    fn errors_carry_origin_and_position() {
        let err = JsonCodec
            .parse(b"{\n  \"a\": }", "app.json")
            .unwrap_err();
        assert_eq!(err.origin, "app.json");
        assert_eq!(err.line, Some(2));
        assert!(err.column.is_some());
    }

    #[test]
    fn serialized_trees_parse_back_unchanged() {
        let tree = TreeNode::from(json!({
            "a": { "b": [1, 2.5, "x", true, null] },
            "big": u64::MAX,
            "empty": {}
        }));
        let bytes = JsonCodec.serialize(&tree).expect("serialized");
        assert_eq!(JsonCodec.parse(&bytes, "round-trip").expect("parsed"), tree);
    }
}
