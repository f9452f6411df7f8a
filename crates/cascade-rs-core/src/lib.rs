//! Layered, type-safe configuration.
//!
//! Items are declared with a path and a static type descriptor, grouped into
//! specs, and resolved against a config whose layers are merged in load
//! order. Sources come from programmatic trees, environment variables,
//! properties, byte buffers, readers, files, URLs and resources; file and URL
//! sources can be watched and reloaded in the background.

mod codec;
mod coerce;
mod config;
mod descriptor;
mod env;
mod error;
mod feature;
mod formats;
mod item;
mod loader;
mod merge;
mod path;
mod source;
mod spec;
mod substitution;
mod tree;
mod watch;

/// Codec contract and extension registry.
pub use codec::{Codec, CodecRegistry};
/// Descriptor-driven coercion of untyped nodes.
pub use coerce::{bind, coerce};
/// Config handles, pinned snapshots and layers.
pub use config::{Config, ConfigBuilder, ConfigSnapshot, Layer, LayerId};
/// Static type descriptors.
pub use descriptor::{ConfigValue, Field, ScalarKind, TypeDescriptor};
/// Environment variable naming convention.
pub use env::{env_name_to_path, path_to_env_name};
/// Public error types.
pub use error::{ConfigError, ParseError};
/// Feature flags.
pub use feature::{Feature, FeatureSet};
/// Built-in codecs.
pub use formats::{JsonCodec, PropertiesCodec, register_builtin_codecs};
/// Item declarations.
pub use item::{AnyItem, Item, ItemKind, LazyFn};
/// Loader entry points and options.
pub use loader::{Loader, LoaderOptions, RESOURCE_PATH_ENV, ResourceRoots};
/// Merge engine.
pub use merge::{merge_layers, merge_trees, normalize_key_case, unknown_paths};
/// Hierarchical key paths.
pub use path::KeyPath;
/// Programmatic sources.
pub use source::{Source, SourceInfo};
/// Specs and the item registry.
pub use spec::{Spec, SpecRegistry};
/// `${path}` substitution.
pub use substitution::substitute;
/// Intermediate trees.
pub use tree::{FlatKeyConflict, Scalar, TreeNode};
/// Watch pipeline and schedulers.
pub use watch::{
    DEFAULT_WATCH_INTERVAL, ErrorCallback, ManualScheduler, ReloadCallback, ReloadTrigger,
    ScheduledFn, ScheduledTask, Scheduler, TaskControl, ThreadScheduler, TokioScheduler,
    WatchHandle, WatchOptions, WatchState,
};
