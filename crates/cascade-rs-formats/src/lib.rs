//! Additional config formats for cascade-rs.
//!
//! Every codec here implements the core [`Codec`] contract, so it can be
//! handed to `Config::from` directly or registered by extension.

mod json5;
mod toml;
mod yaml;

pub use self::json5::Json5Codec;
pub use self::toml::TomlCodec;
pub use self::yaml::YamlCodec;

use cascade_rs_core::{Codec, CodecRegistry};
use log::debug;
use std::sync::Arc;

/// Register the YAML, TOML and JSON5 codecs.
pub fn register_format_codecs(registry: &CodecRegistry) {
    let codecs: [Arc<dyn Codec>; 3] = [
        Arc::new(YamlCodec),
        Arc::new(TomlCodec),
        Arc::new(Json5Codec),
    ];
    for codec in codecs {
        registry.register(codec);
    }
    debug!(
        "format codecs registered (extensions={:?})",
        registry.extensions()
    );
}

/// Registry with the core codecs plus every codec of this crate.
pub fn full_registry() -> CodecRegistry {
    let registry = CodecRegistry::with_builtin();
    register_format_codecs(&registry);
    registry
}
