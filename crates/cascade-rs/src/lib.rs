//! Layered, typed configuration.
//!
//! One dependency for applications: the engine from `cascade-rs-core`, the
//! YAML/TOML/JSON5 codecs from `cascade-rs-formats` and [`init_logging`].
//! The `cascade` binary in this crate merges sources from the command line.

pub use cascade_rs_core as core;
pub use cascade_rs_formats as formats;

pub use cascade_rs_core::{
    Codec, CodecRegistry, Config, ConfigBuilder, ConfigError, ConfigSnapshot, ConfigValue,
    Feature, FeatureSet, Field, Item, JsonCodec, KeyPath, Loader, LoaderOptions, ManualScheduler,
    ParseError, PropertiesCodec, ReloadTrigger, ResourceRoots, ScalarKind, Source, SourceInfo,
    Spec, ThreadScheduler, TokioScheduler, TreeNode, TypeDescriptor, WatchHandle, WatchOptions,
    WatchState,
};
pub use cascade_rs_formats::{Json5Codec, TomlCodec, YamlCodec, full_registry};

/// Log filter applied when `RUST_LOG` is not set: engine and CLI at
/// `info`, everything else at `warn`.
pub const DEFAULT_LOG_FILTER: &str =
    "warn,cascade=info,cascade_rs=info,cascade_rs_core=info,cascade_rs_formats=info";

/// Send `log` records from the engine and the CLI to stderr.
///
/// `RUST_LOG` replaces [`DEFAULT_LOG_FILTER`]. Calling this again, or after
/// another logger is installed, leaves the existing logger in place. Without
/// the `logging` feature this does nothing.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        let env = env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER);
        if let Err(err) = env_logger::Builder::from_env(env)
            .format_timestamp_millis()
            .try_init()
        {
            log::debug!("logger already installed, keeping it (error={err})");
        }
    }
}
