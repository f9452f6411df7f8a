//! Named groupings of items and the registry a config resolves them in.

use crate::config::ConfigSnapshot;
use crate::descriptor::ConfigValue;
use crate::error::ConfigError;
use crate::item::{AnyItem, Item};
use crate::path::KeyPath;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A prefix plus the items declared under it.
///
/// Items added to a spec are rebased onto its prefix, so `Spec::new("server")`
/// with `required::<u16>("port")` declares `server.port`.
#[derive(Debug, Clone, Default)]
pub struct Spec {
    prefix: KeyPath,
    description: Option<String>,
    items: Vec<Arc<dyn AnyItem>>,
    inner: Vec<Spec>,
}

impl Spec {
    /// Spec whose items live under `prefix`; `""` is the root.
    pub fn new(prefix: impl Into<KeyPath>) -> Self {
        Self {
            prefix: prefix.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach another spec. Its prefix is used as is, not nested under ours.
    pub fn with_inner(mut self, spec: Spec) -> Self {
        self.inner.push(spec);
        self
    }

    /// Register `item` under this spec's prefix and return the rebased item.
    pub fn add<T: ConfigValue>(&mut self, item: Item<T>) -> Item<T> {
        let item = item.rebase(&self.prefix);
        self.items.push(Arc::new(item.clone()));
        item
    }

    /// Declare a required item at `prefix.name`.
    pub fn required<T: ConfigValue>(&mut self, name: &str) -> Item<T> {
        self.add(Item::required(name))
    }

    /// Declare an item at `prefix.name` with a default.
    pub fn optional<T: ConfigValue>(&mut self, name: &str, default: T) -> Item<T> {
        self.add(Item::optional(name, default))
    }

    /// Declare an item at `prefix.name` computed by `thunk` when unset.
    pub fn lazy<T, F>(&mut self, name: &str, thunk: F) -> Item<T>
    where
        T: ConfigValue,
        F: Fn(&ConfigSnapshot) -> Result<T, ConfigError> + Send + Sync + 'static,
    {
        self.add(Item::lazy(name, thunk))
    }

    pub fn prefix(&self) -> &KeyPath {
        &self.prefix
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Every item of this spec and its inner specs.
    pub fn items(&self) -> Vec<Arc<dyn AnyItem>> {
        let mut items = self.items.clone();
        for inner in &self.inner {
            items.extend(inner.items());
        }
        items
    }
}

/// Items of every spec added to a config, keyed by full path.
#[derive(Debug, Clone, Default)]
pub struct SpecRegistry {
    items: BTreeMap<KeyPath, Arc<dyn AnyItem>>,
}

impl SpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every item of `spec`, rejecting duplicates and paths that
    /// nest inside another item.
    pub fn add_spec(&mut self, spec: &Spec) -> Result<(), ConfigError> {
        for item in spec.items() {
            self.add_item(item)?;
        }
        Ok(())
    }

    /// Register one item; see [`SpecRegistry::add_spec`].
    pub fn add_item(&mut self, item: Arc<dyn AnyItem>) -> Result<(), ConfigError> {
        let path = item.path().clone();
        if self.items.contains_key(&path) {
            return Err(ConfigError::DuplicateItem { path });
        }
        if let Some(other) = self
            .items
            .keys()
            .find(|other| path.starts_with(other) || other.starts_with(&path))
        {
            return Err(ConfigError::PathConflict {
                path,
                other: other.clone(),
            });
        }
        self.items.insert(path, item);
        Ok(())
    }

    pub fn get(&self, path: &KeyPath) -> Option<&Arc<dyn AnyItem>> {
        self.items.get(path)
    }

    pub fn contains(&self, path: &KeyPath) -> bool {
        self.items.contains_key(path)
    }

    /// Declared paths in sorted order.
    pub fn paths(&self) -> Vec<KeyPath> {
        self.items.keys().cloned().collect()
    }

    pub fn items(&self) -> impl Iterator<Item = &Arc<dyn AnyItem>> {
        self.items.values()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
