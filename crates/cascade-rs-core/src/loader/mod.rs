//! Loader entry points turning raw input into a new config layer.
//!
//! Every entry point reads its input synchronously, parses it with a codec
//! and forks the config with the resulting tree as the newest layer. Errors
//! leave the originating config untouched.

mod fetch;
mod resource;

#[cfg(test)]
mod tests;

pub(crate) use fetch::Origin;
pub use resource::{RESOURCE_PATH_ENV, ResourceRoots};

use crate::codec::{Codec, CodecRegistry};
use crate::config::{Config, LayerId};
use crate::error::ConfigError;
use crate::feature::{Feature, FeatureSet};
use crate::source::SourceInfo;
use crate::tree::TreeNode;
use crate::watch::{self, WatchOptions};
use log::{debug, info};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Options shared by every load of a config and its forks.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Directories searched by [`Loader::resource`].
    pub resource_roots: ResourceRoots,
    /// Timeout for HTTP fetches; `None` keeps the client default.
    pub http_timeout: Option<Duration>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            resource_roots: ResourceRoots::from_env(),
            http_timeout: None,
        }
    }
}

impl LoaderOptions {
    /// Defaults, with resource roots taken from `CASCADE_RESOURCE_PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Search these roots for [`Loader::resource`].
    pub fn with_resource_roots(mut self, roots: ResourceRoots) -> Self {
        self.resource_roots = roots;
        self
    }

    pub fn with_resource_root(mut self, root: impl AsRef<Path>) -> Self {
        self.resource_roots = self.resource_roots.with_root(root);
        self
    }

    /// Timeout for each HTTP request, including reloads.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone)]
enum CodecChoice {
    Fixed(Arc<dyn Codec>),
    Registry(CodecRegistry),
}

/// A layer loaded from a re-readable origin.
pub(crate) struct LoadedOrigin {
    pub(crate) config: Config,
    pub(crate) layer: LayerId,
    pub(crate) codec: Arc<dyn Codec>,
    /// `None` when the source was missing and loaded as an empty layer.
    pub(crate) bytes: Option<Vec<u8>>,
}

/// Loads sources into forks of a config. Obtained from [`Config::from`] or
/// [`Config::from_registry`].
#[derive(Debug, Clone)]
pub struct Loader {
    config: Config,
    codec: CodecChoice,
    overrides: FeatureSet,
}

impl Loader {
    pub(crate) fn with_codec(config: Config, codec: Arc<dyn Codec>) -> Self {
        Self {
            config,
            codec: CodecChoice::Fixed(codec),
            overrides: FeatureSet::new(),
        }
    }

    pub(crate) fn with_registry(config: Config, registry: CodecRegistry) -> Self {
        Self {
            config,
            codec: CodecChoice::Registry(registry),
            overrides: FeatureSet::new(),
        }
    }

    /// Enable `feature` for loads through this loader only.
    pub fn enable(mut self, feature: Feature) -> Self {
        self.overrides.set(feature, true);
        self
    }

    /// Disable `feature` for loads through this loader only.
    pub fn disable(mut self, feature: Feature) -> Self {
        self.overrides.set(feature, false);
        self
    }

    /// Features in effect for this loader's loads.
    pub fn features(&self) -> FeatureSet {
        self.config.features().merged_with(&self.overrides)
    }

    /// Load UTF-8 text from a reader.
    pub fn reader(&self, mut reader: impl Read) -> Result<Config, ConfigError> {
        let mut text = String::new();
        reader
            .read_to_string(&mut text)
            .map_err(|err| ConfigError::io("reader", err))?;
        self.load_in_memory(text.as_bytes(), SourceInfo::new("reader"))
    }

    /// Load raw bytes from a stream.
    pub fn input_stream(&self, mut stream: impl Read) -> Result<Config, ConfigError> {
        let mut bytes = Vec::new();
        stream
            .read_to_end(&mut bytes)
            .map_err(|err| ConfigError::io("input stream", err))?;
        self.load_in_memory(&bytes, SourceInfo::new("input stream"))
    }

    pub fn bytes(&self, bytes: &[u8]) -> Result<Config, ConfigError> {
        self.load_in_memory(bytes, SourceInfo::new("bytes"))
    }

    /// Load `length` bytes starting at `offset`.
    pub fn bytes_slice(
        &self,
        bytes: &[u8],
        offset: usize,
        length: usize,
    ) -> Result<Config, ConfigError> {
        let end = offset
            .checked_add(length)
            .filter(|end| *end <= bytes.len())
            .ok_or(ConfigError::InvalidSlice {
                offset,
                length,
                available: bytes.len(),
            })?;
        let info = SourceInfo::new("bytes")
            .with_detail("offset", offset.to_string())
            .with_detail("length", length.to_string());
        self.load_in_memory(&bytes[offset..end], info)
    }

    pub fn string(&self, content: &str) -> Result<Config, ConfigError> {
        self.load_in_memory(content.as_bytes(), SourceInfo::new("string"))
    }

    /// Load a file. A missing file is [`ConfigError::SourceNotFound`]
    /// unless `OptionalSourceOnNotFound` is enabled.
    pub fn file(&self, path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        self.load_origin(Origin::File(path.as_ref().to_path_buf()))
            .map(|loaded| loaded.config)
    }

    pub fn file_path(&self, path: &str) -> Result<Config, ConfigError> {
        self.file(Path::new(path))
    }

    /// Load a `file://` or `http(s)://` URL. A 404 counts as not found.
    pub fn url(&self, url: &Url) -> Result<Config, ConfigError> {
        self.load_origin(Origin::Url(url.clone()))
            .map(|loaded| loaded.config)
    }

    /// Parse `url` and load it.
    pub fn url_str(&self, url: &str) -> Result<Config, ConfigError> {
        self.url(&Url::parse(url)?)
    }

    /// Load a resource found under the configured resource roots.
    pub fn resource(&self, name: &str) -> Result<Config, ConfigError> {
        self.load_origin(Origin::Resource(name.to_string()))
            .map(|loaded| loaded.config)
    }

    /// Load a file and keep reloading it in the background.
    pub fn watch_file(
        &self,
        path: impl AsRef<Path>,
        options: WatchOptions,
    ) -> Result<Config, ConfigError> {
        watch::start(self, Origin::File(path.as_ref().to_path_buf()), options)
    }

    pub fn watch_file_path(&self, path: &str, options: WatchOptions) -> Result<Config, ConfigError> {
        self.watch_file(Path::new(path), options)
    }

    /// Load a URL and keep reloading it in the background.
    pub fn watch_url(&self, url: &Url, options: WatchOptions) -> Result<Config, ConfigError> {
        watch::start(self, Origin::Url(url.clone()), options)
    }

    pub fn watch_url_str(&self, url: &str, options: WatchOptions) -> Result<Config, ConfigError> {
        self.watch_url(&Url::parse(url)?, options)
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn overrides(&self) -> &FeatureSet {
        &self.overrides
    }

    fn load_in_memory(&self, bytes: &[u8], info: SourceInfo) -> Result<Config, ConfigError> {
        let codec = match &self.codec {
            CodecChoice::Fixed(codec) => Arc::clone(codec),
            CodecChoice::Registry(_) => {
                return Err(ConfigError::UnsupportedFormat {
                    description: info.description().to_string(),
                });
            }
        };
        let tree = parse(codec.as_ref(), bytes, &info)?;
        self.config
            .with_layer(info, tree, &self.overrides)
            .map(|(config, _)| config)
    }

    fn codec_for(&self, origin: &Origin) -> Result<Arc<dyn Codec>, ConfigError> {
        match &self.codec {
            CodecChoice::Fixed(codec) => Ok(Arc::clone(codec)),
            CodecChoice::Registry(registry) => origin
                .extension()
                .and_then(|extension| registry.get(&extension))
                .ok_or_else(|| ConfigError::UnsupportedFormat {
                    description: origin.info().description().to_string(),
                }),
        }
    }

    pub(crate) fn load_origin(&self, origin: Origin) -> Result<LoadedOrigin, ConfigError> {
        let codec = self.codec_for(&origin)?;
        let mut info = origin.info();
        let (tree, bytes) = match origin.read(self.config.loader_options()) {
            Ok(bytes) => (parse(codec.as_ref(), &bytes, &info)?, Some(bytes)),
            Err(err)
                if err.is_not_found()
                    && self.features().is_enabled(Feature::OptionalSourceOnNotFound) =>
            {
                info!("optional source missing, loading empty layer (source={info})");
                info = info.with_detail("missing", "true");
                (TreeNode::empty(), None)
            }
            Err(err) => return Err(err),
        };
        let (config, layer) = self.config.with_layer(info, tree, &self.overrides)?;
        Ok(LoadedOrigin {
            config,
            layer,
            codec,
            bytes,
        })
    }
}

pub(crate) fn parse(
    codec: &dyn Codec,
    bytes: &[u8],
    info: &SourceInfo,
) -> Result<TreeNode, ConfigError> {
    debug!(
        "parsing config source (source={}, codec={}, len={})",
        info,
        codec.name(),
        bytes.len()
    );
    Ok(codec.parse(bytes, info.description())?)
}
