//! YAML codec backed by `serde_yaml`.

use cascade_rs_core::{Codec, ConfigError, ParseError, TreeNode};

/// `.yaml` and `.yml` documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn name(&self) -> &str {
        "yaml"
    }

    fn extensions(&self) -> &[&str] {
        &["yaml", "yml"]
    }

    fn parse(&self, bytes: &[u8], origin: &str) -> Result<TreeNode, ParseError> {
        if is_blank(bytes) {
            return Ok(TreeNode::empty());
        }
        let tree = serde_yaml::from_slice::<TreeNode>(bytes).map_err(|err| {
            let parse = ParseError::new(origin, err.to_string());
            match err.location() {
                Some(location) => parse
                    .at_line(location.line(), Some(location.column()))
                    .at_offset(location.index()),
                None => parse,
            }
        })?;
        Ok(if tree.is_null() { TreeNode::empty() } else { tree })
    }

    fn serialize(&self, tree: &TreeNode) -> Result<Vec<u8>, ConfigError> {
        serde_yaml::to_string(tree)
            .map(String::into_bytes)
            .map_err(|err| ConfigError::Serialize(err.to_string()))
    }
}

/// No content besides comments and document markers.
fn is_blank(bytes: &[u8]) -> bool {
    String::from_utf8_lossy(bytes).lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line == "---" || line == "..."
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn parses_nested_documents() {
        let tree = YamlCodec
            .parse(
                b"server:\n  host: example.org\n  port: 8080\n  tags: [a, b]\n  debug: true\n",
                "app.yaml",
            )
            .expect("parsed");
        assert_eq!(
            tree.to_json(),
            json!({ "server": { "host": "example.org", "port": 8080, "tags": ["a", "b"], "debug": true } })
        );
    }

    /// Blank and comment-only documents set nothing.
    #[test]
    fn empty_documents_are_empty_trees() {
        assert_eq!(YamlCodec.parse(b"", "empty.yaml").expect("empty"), TreeNode::empty());
        assert_eq!(
            YamlCodec.parse(b"# only a comment\n", "empty.yaml").expect("comment"),
            TreeNode::empty()
        );
    }

    /// Non-string keys are stringified.
    #[test]
    fn numeric_keys_become_strings() {
        let tree = YamlCodec.parse(b"ports:\n  80: http\n", "app.yaml").expect("parsed");
        assert_eq!(tree.to_json(), json!({ "ports": { "80": "http" } }));
    }

    #[test]
    fn errors_report_position() {
        let err = YamlCodec
            .parse(b"server:\n  host: [unclosed\n", "broken.yaml")
            .unwrap_err();
        assert_eq!(err.origin, "broken.yaml");
        assert!(err.line.is_some());
    }

    #[test]
    fn serialized_trees_parse_back() {
        let tree = TreeNode::from(json!({ "a": { "b": [1, 2.5, "x"], "c": null, "d": false } }));
        let bytes = YamlCodec.serialize(&tree).expect("serialize");
        assert_eq!(YamlCodec.parse(&bytes, "round.yaml").expect("parse"), tree);
    }
}
