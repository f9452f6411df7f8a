//! Codecs built into the core crate.

mod json;
mod properties;

pub use json::JsonCodec;
pub use properties::PropertiesCodec;

use crate::codec::CodecRegistry;
use std::sync::Arc;

/// Register the JSON and properties codecs.
pub fn register_builtin_codecs(registry: &CodecRegistry) {
    registry.register(Arc::new(PropertiesCodec));
    registry.register(Arc::new(JsonCodec));
}
