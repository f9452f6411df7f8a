//! Codec contract between raw bytes and intermediate trees.

use crate::error::{ConfigError, ParseError};
use crate::tree::TreeNode;
use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

/// Interface for format codecs.
pub trait Codec: Send + Sync + Debug {
    /// Return the codec name.
    fn name(&self) -> &str;
    /// File extensions handled by this codec, without the leading dot.
    fn extensions(&self) -> &[&str];
    /// Parse `bytes` into a tree; `origin` describes where they came from.
    fn parse(&self, bytes: &[u8], origin: &str) -> Result<TreeNode, ParseError>;
    /// Serialize a tree back into this format.
    fn serialize(&self, tree: &TreeNode) -> Result<Vec<u8>, ConfigError>;
}

/// Codecs keyed by lower-case file extension.
#[derive(Default, Clone)]
pub struct CodecRegistry {
    codecs: Arc<RwLock<HashMap<String, Arc<dyn Codec>>>>,
}

impl CodecRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the codecs built into this crate.
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        crate::formats::register_builtin_codecs(&registry);
        registry
    }

    /// Register a codec under each of its extensions.
    pub fn register(&self, codec: Arc<dyn Codec>) {
        debug!(
            "registering codec (name={}, extensions={:?})",
            codec.name(),
            codec.extensions()
        );
        let mut codecs = self.codecs.write();
        for extension in codec.extensions() {
            codecs.insert(extension.to_ascii_lowercase(), Arc::clone(&codec));
        }
    }

    /// Fetch a codec by extension, ignoring case.
    pub fn get(&self, extension: &str) -> Option<Arc<dyn Codec>> {
        self.codecs
            .read()
            .get(&extension.trim_start_matches('.').to_ascii_lowercase())
            .cloned()
    }

    /// Fetch the codec for the extension of `path`.
    pub fn for_path(&self, path: &Path) -> Option<Arc<dyn Codec>> {
        path.extension()
            .and_then(|extension| extension.to_str())
            .and_then(|extension| self.get(extension))
    }

    /// List all registered extensions, sorted.
    pub fn extensions(&self) -> Vec<String> {
        let mut extensions = self.codecs.read().keys().cloned().collect::<Vec<_>>();
        extensions.sort();
        extensions
    }
}

impl Debug for CodecRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodecRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}
