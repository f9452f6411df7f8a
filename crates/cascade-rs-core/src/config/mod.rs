//! Layered configuration handles.
//!
//! A [`Config`] pairs a spec registry with a live snapshot cell. Every load
//! or override forks a new handle with its own cell, so holders of an older
//! handle never observe later loads. Watched layers are the exception: a
//! reload swaps the snapshot of every live handle containing the layer.

mod snapshot;

#[cfg(test)]
mod tests;

pub use snapshot::{ConfigSnapshot, Layer, LayerId};
pub(crate) use snapshot::Snapshot;

use crate::codec::{Codec, CodecRegistry};
use crate::descriptor::ConfigValue;
use crate::error::ConfigError;
use crate::feature::{Feature, FeatureSet};
use crate::item::{AnyItem, Item, to_node};
use crate::loader::{Loader, LoaderOptions};
use crate::merge::{normalize_key_case, unknown_paths};
use crate::path::KeyPath;
use crate::source::{Source, SourceInfo};
use crate::spec::{Spec, SpecRegistry};
use crate::substitution::substitute;
use crate::tree::TreeNode;
use crate::watch::{WatchHandle, WatchShared};
use arc_swap::ArcSwap;
use log::{debug, info};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Handle to a layered configuration. Cloning shares the same live cell.
#[derive(Clone)]
pub struct Config {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    registry: Arc<SpecRegistry>,
    features: FeatureSet,
    options: LoaderOptions,
    snapshot: ArcSwap<Snapshot>,
    /// Serialises snapshot swaps.
    write_lock: Mutex<()>,
    watches: Mutex<Vec<Arc<WatchShared>>>,
}

/// Builder for a root [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    specs: Vec<Spec>,
    features: FeatureSet,
    options: Option<LoaderOptions>,
}

impl ConfigBuilder {
    /// Declare the items of `spec`.
    pub fn spec(mut self, spec: Spec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn enable(mut self, feature: Feature) -> Self {
        self.features.set(feature, true);
        self
    }

    pub fn disable(mut self, feature: Feature) -> Self {
        self.features.set(feature, false);
        self
    }

    /// Replace every feature override at once.
    pub fn features(mut self, features: FeatureSet) -> Self {
        self.features = features;
        self
    }

    /// Resource roots and HTTP settings; defaults to [`LoaderOptions::new`].
    pub fn loader_options(mut self, options: LoaderOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Register every spec; duplicate or nested item paths fail here.
    pub fn build(self) -> Result<Config, ConfigError> {
        let mut registry = SpecRegistry::new();
        for spec in &self.specs {
            registry.add_spec(spec)?;
        }
        debug!(
            "building config (specs={}, items={})",
            self.specs.len(),
            registry.len()
        );
        Ok(Config::from_parts(
            Arc::new(registry),
            self.features,
            self.options.unwrap_or_default(),
            Snapshot::default(),
        ))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::from_parts(
            Arc::new(SpecRegistry::new()),
            FeatureSet::new(),
            LoaderOptions::default(),
            Snapshot::default(),
        )
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    fn from_parts(
        registry: Arc<SpecRegistry>,
        features: FeatureSet,
        options: LoaderOptions,
        snapshot: Snapshot,
    ) -> Self {
        Config {
            shared: Arc::new(Shared {
                registry,
                features,
                options,
                snapshot: ArcSwap::from_pointee(snapshot),
                write_lock: Mutex::new(()),
                watches: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Fork this config. Watches of the parent keep the fork up to date too.
    fn fork(&self, registry: Arc<SpecRegistry>, features: FeatureSet, snapshot: Snapshot) -> Config {
        let child = Config::from_parts(registry, features, self.shared.options.clone(), snapshot);
        let watches = self.shared.watches.lock().clone();
        for watch in &watches {
            watch.add_target(Arc::downgrade(&child.shared));
        }
        *child.shared.watches.lock() = watches;
        child
    }

    /// Fork with `spec`'s items added to the registry.
    pub fn with_spec(&self, spec: &Spec) -> Result<Config, ConfigError> {
        let mut registry = (*self.shared.registry).clone();
        registry.add_spec(spec)?;
        let current = self.shared.snapshot.load_full();
        Ok(self.fork(
            Arc::new(registry),
            self.shared.features.clone(),
            Snapshot::compose(current.layers.clone()),
        ))
    }

    /// Fork with `feature` enabled for future loads.
    pub fn enable(&self, feature: Feature) -> Config {
        self.with_features(self.shared.features.clone().enable(feature))
    }

    /// Fork with `feature` disabled for future loads.
    pub fn disable(&self, feature: Feature) -> Config {
        self.with_features(self.shared.features.clone().disable(feature))
    }

    fn with_features(&self, features: FeatureSet) -> Config {
        let current = self.shared.snapshot.load_full();
        self.fork(
            Arc::clone(&self.shared.registry),
            features,
            Snapshot::compose(current.layers.clone()),
        )
    }

    /// Feature overrides used by loads on this config.
    pub fn features(&self) -> &FeatureSet {
        &self.shared.features
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        self.shared.features.is_enabled(feature)
    }

    pub fn loader_options(&self) -> &LoaderOptions {
        &self.shared.options
    }

    /// Fork with `source` as the newest layer.
    pub fn with_source(&self, source: Source) -> Result<Config, ConfigError> {
        let (info, tree) = source.into_parts();
        self.with_layer(info, tree, &FeatureSet::new())
            .map(|(config, _)| config)
    }

    /// Fork with `value` set for `item` in a layer of its own.
    pub fn with_value<T: ConfigValue>(&self, item: &Item<T>, value: T) -> Result<Config, ConfigError> {
        if !self.shared.registry.contains(item.path()) {
            return Err(ConfigError::NoSuchItem {
                path: item.path().clone(),
            });
        }
        let mut tree = TreeNode::empty();
        tree.insert(item.path(), to_node(&value)?);
        self.with_source(Source::from_tree(format!("value({})", item.path()), tree))
    }

    /// Prepare `tree` against the current snapshot and fork with it on top.
    pub(crate) fn with_layer(
        &self,
        info: SourceInfo,
        tree: TreeNode,
        overrides: &FeatureSet,
    ) -> Result<(Config, LayerId), ConfigError> {
        let features = self.shared.features.merged_with(overrides);
        let current = self.shared.snapshot.load_full();
        let prepared = prepare_layer(
            &self.shared.registry,
            &features,
            &tree,
            &current.tree,
            info.description(),
        )?;
        info!(
            "loaded layer (source={}, depth={})",
            info,
            current.layers.len() + 1
        );
        let layer = Arc::new(Layer::new(info, prepared));
        let id = layer.id;
        let config = self.fork(
            Arc::clone(&self.shared.registry),
            self.shared.features.clone(),
            current.push(layer),
        );
        Ok((config, id))
    }

    /// Load through a single codec.
    pub fn from(&self, codec: Arc<dyn Codec>) -> Loader {
        Loader::with_codec(self.clone(), codec)
    }

    /// Load choosing the codec by file extension.
    pub fn from_registry(&self, registry: CodecRegistry) -> Loader {
        Loader::with_registry(self.clone(), registry)
    }

    /// Pin the current snapshot for consistent reads.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot::new(
            Arc::clone(&self.shared.registry),
            self.shared.snapshot.load_full(),
        )
    }

    /// Bind `item` from the current snapshot.
    ///
    /// Falls back to the item's default or lazy thunk; a required item with
    /// no value is [`ConfigError::MissingRequiredItem`].
    pub fn get<T: ConfigValue>(&self, item: &Item<T>) -> Result<T, ConfigError> {
        self.snapshot().get(item)
    }

    /// Like [`Config::get`], with a missing value as `Ok(None)`.
    pub fn get_optional<T: ConfigValue>(&self, item: &Item<T>) -> Result<Option<T>, ConfigError> {
        self.snapshot().get_optional(item)
    }

    /// Bind the value at `path` as `T`, declared or not.
    pub fn get_by_path<T: ConfigValue>(&self, path: &KeyPath) -> Result<T, ConfigError> {
        self.snapshot().get_by_path(path)
    }

    /// Raw node at `path` in the merged tree.
    pub fn get_node(&self, path: &KeyPath) -> Option<TreeNode> {
        self.shared.snapshot.load().tree.get(path).cloned()
    }

    /// True when an item is declared at `path`.
    pub fn contains(&self, path: &KeyPath) -> bool {
        self.shared.registry.contains(path)
    }

    /// Some layer sets a non-null value for `item`.
    pub fn is_set<T: ConfigValue>(&self, item: &Item<T>) -> bool {
        self.snapshot().is_set(item)
    }

    pub fn items(&self) -> Vec<Arc<dyn AnyItem>> {
        self.shared.registry.items().cloned().collect()
    }

    /// Paths of every declared item.
    pub fn item_paths(&self) -> Vec<KeyPath> {
        self.shared.registry.paths()
    }

    /// Provenance of each layer in load order.
    pub fn layers(&self) -> Vec<SourceInfo> {
        self.shared
            .snapshot
            .load()
            .layers
            .iter()
            .map(|layer| layer.info.clone())
            .collect()
    }

    /// The merged tree of all layers.
    pub fn tree(&self) -> TreeNode {
        self.shared.snapshot.load().tree.clone()
    }

    /// The merged tree completed with defaults and lazy values of items.
    pub fn to_tree(&self) -> Result<TreeNode, ConfigError> {
        let snapshot = self.snapshot();
        let mut tree = snapshot.tree().clone();
        for item in self.shared.registry.items() {
            if tree.get(item.path()).is_some_and(|node| !node.is_null()) {
                continue;
            }
            match item.resolve_node(&snapshot) {
                Ok(node) if !node.is_null() => tree.insert(item.path(), node),
                Ok(_) | Err(ConfigError::MissingRequiredItem { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(tree)
    }

    /// Serialise [`to_tree`](Self::to_tree) with `codec`.
    pub fn export(&self, codec: &dyn Codec) -> Result<Vec<u8>, ConfigError> {
        codec.serialize(&self.to_tree()?)
    }

    /// Handles of the watches feeding this config.
    pub fn watches(&self) -> Vec<WatchHandle> {
        self.shared
            .watches
            .lock()
            .iter()
            .map(WatchShared::handle)
            .collect()
    }

    /// Stop every watch feeding this config, including for its forks.
    pub fn cancel_watches(&self) {
        for watch in self.shared.watches.lock().iter() {
            watch.cancel();
        }
    }

    /// True when both handles share the same live cell.
    pub fn ptr_eq(&self, other: &Config) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Config {
        Config { shared }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("items", &self.shared.registry.paths())
            .field("layers", &self.layers())
            .field("features", &self.shared.features)
            .finish()
    }
}

impl Shared {
    pub(crate) fn add_watch(&self, watch: Arc<WatchShared>) {
        self.watches.lock().push(watch);
    }

    /// Swap the tree of layer `id` and republish the snapshot.
    ///
    /// Returns `Ok(false)` when this config does not contain the layer.
    pub(crate) fn replace_layer(
        &self,
        id: LayerId,
        tree: &TreeNode,
        overrides: &FeatureSet,
    ) -> Result<bool, ConfigError> {
        let _guard = self.write_lock.lock();
        let current = self.snapshot.load_full();
        let Some((index, base)) = current.base_below(id) else {
            return Ok(false);
        };
        let features = self.features.merged_with(overrides);
        let info = current.layers[index].info.clone();
        let prepared = prepare_layer(&self.registry, &features, tree, &base, info.description())?;
        let mut layers = current.layers.clone();
        layers[index] = Arc::new(Layer {
            id,
            info,
            tree: Arc::new(prepared),
        });
        self.snapshot.store(Arc::new(Snapshot::compose(layers)));
        Ok(true)
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        for watch in self.watches.get_mut().drain(..) {
            watch.release();
        }
    }
}

/// Normalise, substitute and check a layer before it is merged onto `base`.
fn prepare_layer(
    registry: &SpecRegistry,
    features: &FeatureSet,
    tree: &TreeNode,
    base: &TreeNode,
    origin: &str,
) -> Result<TreeNode, ConfigError> {
    let paths = registry.paths();
    let mut layer = if features.is_enabled(Feature::LoadKeysCaseInsensitively) {
        normalize_key_case(tree, &paths)
    } else {
        tree.clone()
    };
    if features.is_enabled(Feature::SubstituteSourceBeforeLoaded) {
        layer = substitute(&layer, base, origin)?;
    }
    if features.is_enabled(Feature::FailOnUnknownPath) {
        if let Some(path) = unknown_paths(&layer, &paths).into_iter().next() {
            return Err(ConfigError::UnknownPath {
                path,
                origin: origin.to_string(),
            });
        }
    }
    Ok(layer)
}
