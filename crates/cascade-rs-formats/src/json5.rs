//! JSON5 codec. Parsing goes through `json5`; output is plain JSON, which
//! every JSON5 reader accepts.

use cascade_rs_core::{Codec, ConfigError, ParseError, TreeNode};

/// `.json5` documents; written back as plain JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json5Codec;

impl Codec for Json5Codec {
    fn name(&self) -> &str {
        "json5"
    }

    fn extensions(&self) -> &[&str] {
        &["json5"]
    }

    fn parse(&self, bytes: &[u8], origin: &str) -> Result<TreeNode, ParseError> {
        let text = std::str::from_utf8(bytes).map_err(|err| {
            ParseError::new(origin, format!("invalid UTF-8: {err}")).at_offset(err.valid_up_to())
        })?;
        if text.trim().is_empty() {
            return Ok(TreeNode::empty());
        }
        ::json5::from_str::<TreeNode>(text).map_err(|err| ParseError::new(origin, err.to_string()))
    }

    fn serialize(&self, tree: &TreeNode) -> Result<Vec<u8>, ConfigError> {
        serde_json::to_vec_pretty(tree).map_err(|err| ConfigError::Serialize(err.to_string()))
    }
}
