//! Immutable merged snapshots and typed reads against them.

use crate::coerce;
use crate::descriptor::ConfigValue;
use crate::error::ConfigError;
use crate::item::{Item, ItemKind};
use crate::merge::{merge_into, merge_layers};
use crate::path::KeyPath;
use crate::source::SourceInfo;
use crate::spec::SpecRegistry;
use crate::tree::TreeNode;
use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a layer, shared by every fork that contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerId(u64);

impl LayerId {
    pub(crate) fn next() -> Self {
        LayerId(NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// One source merged into a config.
#[derive(Debug)]
pub struct Layer {
    pub(crate) id: LayerId,
    pub(crate) info: SourceInfo,
    pub(crate) tree: Arc<TreeNode>,
}

impl Layer {
    pub(crate) fn new(info: SourceInfo, tree: TreeNode) -> Self {
        Self {
            id: LayerId::next(),
            info,
            tree: Arc::new(tree),
        }
    }

    /// Identity that survives reloads of this layer.
    pub fn id(&self) -> LayerId {
        self.id
    }

    /// Where the layer came from.
    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    /// The prepared tree this layer contributes.
    pub fn tree(&self) -> &TreeNode {
        &self.tree
    }
}

/// Layers in load order plus their eagerly merged tree.
#[derive(Debug, Default)]
pub(crate) struct Snapshot {
    pub(crate) layers: Vec<Arc<Layer>>,
    pub(crate) tree: TreeNode,
}

impl Snapshot {
    /// Merge every layer from scratch.
    pub(crate) fn compose(layers: Vec<Arc<Layer>>) -> Self {
        let tree = merge_layers(layers.iter().map(|layer| layer.tree.as_ref()));
        Self { layers, tree }
    }

    /// Put `layer` on top of this snapshot.
    pub(crate) fn push(&self, layer: Arc<Layer>) -> Self {
        let mut tree = self.tree.clone();
        merge_into(&mut tree, &layer.tree);
        let mut layers = self.layers.clone();
        layers.push(layer);
        Self { layers, tree }
    }

    /// Tree of the layers below `id`, if the layer is present.
    pub(crate) fn base_below(&self, id: LayerId) -> Option<(usize, TreeNode)> {
        let index = self.layers.iter().position(|layer| layer.id == id)?;
        let base = merge_layers(self.layers[..index].iter().map(|layer| layer.tree.as_ref()));
        Some((index, base))
    }
}

/// A pinned view of one snapshot; reads through it are mutually consistent.
pub struct ConfigSnapshot {
    registry: Arc<SpecRegistry>,
    snapshot: Arc<Snapshot>,
    resolving: RefCell<Vec<KeyPath>>,
}

impl ConfigSnapshot {
    pub(crate) fn new(registry: Arc<SpecRegistry>, snapshot: Arc<Snapshot>) -> Self {
        Self {
            registry,
            snapshot,
            resolving: RefCell::new(Vec::new()),
        }
    }

    /// Resolve `item` against this snapshot.
    pub fn get<T: ConfigValue>(&self, item: &Item<T>) -> Result<T, ConfigError> {
        let path = item.path();
        if !self.registry.contains(path) {
            return Err(ConfigError::NoSuchItem { path: path.clone() });
        }
        match self.snapshot.tree.get(path) {
            Some(node) if !node.is_null() => coerce::bind(node, item.descriptor(), path),
            _ => self.absent(item),
        }
    }

    /// Like [`get`](Self::get) but a missing value is `Ok(None)`.
    pub fn get_optional<T: ConfigValue>(&self, item: &Item<T>) -> Result<Option<T>, ConfigError> {
        match self.get(item) {
            Ok(value) => Ok(Some(value)),
            Err(ConfigError::MissingRequiredItem { path }) if &path == item.path() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Bind the node at `path` to `T` whether or not an item declares it.
    pub fn get_by_path<T: ConfigValue>(&self, path: &KeyPath) -> Result<T, ConfigError> {
        match self.snapshot.tree.get(path) {
            Some(node) if !node.is_null() => coerce::bind(node, &T::descriptor(), path),
            _ => Err(ConfigError::MissingRequiredItem { path: path.clone() }),
        }
    }

    /// Raw node at `path` in the merged tree, without binding.
    pub fn get_node(&self, path: &KeyPath) -> Option<&TreeNode> {
        self.snapshot.tree.get(path)
    }

    /// A value for `item` is present in the merged tree.
    pub fn is_set<T: ConfigValue>(&self, item: &Item<T>) -> bool {
        self.snapshot
            .tree
            .get(item.path())
            .is_some_and(|node| !node.is_null())
    }

    /// Merged tree of every layer.
    pub fn tree(&self) -> &TreeNode {
        &self.snapshot.tree
    }

    /// Layers in load order, oldest first.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.snapshot.layers.iter().map(AsRef::as_ref)
    }

    fn absent<T: ConfigValue>(&self, item: &Item<T>) -> Result<T, ConfigError> {
        let path = item.path();
        match item.kind() {
            ItemKind::Optional(default) => Ok(default.clone()),
            ItemKind::Lazy(thunk) => {
                if self.resolving.borrow().contains(path) {
                    return Err(ConfigError::LazyCycle { path: path.clone() });
                }
                self.resolving.borrow_mut().push(path.clone());
                let value = thunk(self);
                self.resolving.borrow_mut().pop();
                value
            }
            ItemKind::Required if item.descriptor().is_optional() => {
                coerce::bind(&TreeNode::Null, item.descriptor(), path)
            }
            ItemKind::Required => Err(ConfigError::MissingRequiredItem { path: path.clone() }),
        }
    }
}
