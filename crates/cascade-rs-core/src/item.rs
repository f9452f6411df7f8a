//! Typed configuration item declarations.

use crate::config::ConfigSnapshot;
use crate::descriptor::{ConfigValue, TypeDescriptor};
use crate::error::ConfigError;
use crate::path::KeyPath;
use crate::tree::TreeNode;
use std::fmt;
use std::sync::Arc;

/// Thunk computing a lazy item from other items of the same snapshot.
pub type LazyFn<T> = Arc<dyn Fn(&ConfigSnapshot) -> Result<T, ConfigError> + Send + Sync>;

/// How an item obtains its value when the tree has none.
pub enum ItemKind<T> {
    /// Absent values are an error at read time.
    Required,
    /// Absent values fall back to the default.
    Optional(T),
    /// Absent values are derived from other items.
    Lazy(LazyFn<T>),
}

impl<T: Clone> Clone for ItemKind<T> {
    fn clone(&self) -> Self {
        match self {
            ItemKind::Required => ItemKind::Required,
            ItemKind::Optional(default) => ItemKind::Optional(default.clone()),
            ItemKind::Lazy(thunk) => ItemKind::Lazy(Arc::clone(thunk)),
        }
    }
}

/// Declaration of a single typed entry. Never holds a runtime value.
pub struct Item<T> {
    path: KeyPath,
    descriptor: TypeDescriptor,
    kind: ItemKind<T>,
    description: Option<String>,
}

impl<T: ConfigValue> Item<T> {
    fn with_kind(path: impl Into<KeyPath>, kind: ItemKind<T>) -> Self {
        Self {
            path: path.into(),
            descriptor: T::descriptor(),
            kind,
            description: None,
        }
    }

    /// Item that must be set by some layer.
    pub fn required(path: impl Into<KeyPath>) -> Self {
        Self::with_kind(path, ItemKind::Required)
    }

    /// Item falling back to `default` when no layer sets it.
    pub fn optional(path: impl Into<KeyPath>, default: T) -> Self {
        Self::with_kind(path, ItemKind::Optional(default))
    }

    /// Item computed from other items when no layer sets it.
    ///
    /// The thunk sees the snapshot being read, so its result is consistent
    /// with the value it is returned alongside.
    pub fn lazy<F>(path: impl Into<KeyPath>, thunk: F) -> Self
    where
        F: Fn(&ConfigSnapshot) -> Result<T, ConfigError> + Send + Sync + 'static,
    {
        Self::with_kind(path, ItemKind::Lazy(Arc::new(thunk)))
    }

    /// Human-readable description, shown in exports and errors.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the descriptor derived from `T`, e.g. to narrow a `String`
    /// item down to a set of variants.
    pub fn with_descriptor(mut self, descriptor: TypeDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    pub(crate) fn rebase(mut self, prefix: &KeyPath) -> Self {
        self.path = prefix.join(&self.path);
        self
    }

    /// Full path, including the prefix of the spec that declared it.
    pub fn path(&self) -> &KeyPath {
        &self.path
    }

    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    pub fn kind(&self) -> &ItemKind<T> {
        &self.kind
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Default of an optional item.
    pub fn default_value(&self) -> Option<&T> {
        match &self.kind {
            ItemKind::Optional(default) => Some(default),
            _ => None,
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self.kind, ItemKind::Required)
    }
}

impl<T: Clone> Clone for Item<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            descriptor: self.descriptor.clone(),
            kind: self.kind.clone(),
            description: self.description.clone(),
        }
    }
}

impl<T> fmt::Debug for Item<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ItemKind::Required => "required",
            ItemKind::Optional(_) => "optional",
            ItemKind::Lazy(_) => "lazy",
        };
        f.debug_struct("Item")
            .field("path", &self.path)
            .field("descriptor", &self.descriptor)
            .field("kind", &kind)
            .field("description", &self.description)
            .finish()
    }
}

/// Type-erased view of an item, as stored in spec registries.
pub trait AnyItem: fmt::Debug + Send + Sync {
    fn path(&self) -> &KeyPath;
    fn descriptor(&self) -> &TypeDescriptor;
    fn description(&self) -> Option<&str>;
    fn is_required(&self) -> bool;
    fn is_lazy(&self) -> bool;
    /// The default serialised to a tree node, for optional items.
    fn default_node(&self) -> Option<Result<TreeNode, ConfigError>>;
    /// Resolve the item against `snapshot` and serialise the result.
    fn resolve_node(&self, snapshot: &ConfigSnapshot) -> Result<TreeNode, ConfigError>;
}

impl<T: ConfigValue> AnyItem for Item<T> {
    fn path(&self) -> &KeyPath {
        &self.path
    }

    fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn is_required(&self) -> bool {
        Item::is_required(self)
    }

    fn is_lazy(&self) -> bool {
        matches!(self.kind, ItemKind::Lazy(_))
    }

    fn default_node(&self) -> Option<Result<TreeNode, ConfigError>> {
        self.default_value().map(to_node)
    }

    fn resolve_node(&self, snapshot: &ConfigSnapshot) -> Result<TreeNode, ConfigError> {
        snapshot.get(self).and_then(|value| to_node(&value))
    }
}

/// Serialise a value into a tree node.
pub(crate) fn to_node<T: serde::Serialize>(value: &T) -> Result<TreeNode, ConfigError> {
    serde_json::to_value(value)
        .map(TreeNode::from)
        .map_err(|err| ConfigError::Serialize(err.to_string()))
}
