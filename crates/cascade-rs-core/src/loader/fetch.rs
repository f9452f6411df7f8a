//! Acquiring raw bytes from files, URLs and resources.

use super::LoaderOptions;
use crate::error::ConfigError;
use crate::source::SourceInfo;
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use url::Url;

/// Where the bytes of a layer come from. Re-readable, unlike streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Origin {
    File(PathBuf),
    Url(Url),
    Resource(String),
}

impl Origin {
    /// Provenance recorded on the layer.
    pub(crate) fn info(&self) -> SourceInfo {
        match self {
            Origin::File(path) => SourceInfo::new(format!("file({})", path.display()))
                .with_detail("path", path.display().to_string()),
            Origin::Url(url) => {
                SourceInfo::new(format!("url({url})")).with_detail("url", url.as_str())
            }
            Origin::Resource(name) => {
                SourceInfo::new(format!("resource({name})")).with_detail("resource", name.as_str())
            }
        }
    }

    /// Extension used to pick a codec from a registry.
    pub(crate) fn extension(&self) -> Option<String> {
        let name = match self {
            Origin::File(path) => path.file_name()?.to_str()?.to_string(),
            Origin::Url(url) => url.path_segments()?.next_back()?.to_string(),
            Origin::Resource(name) => name.rsplit('/').next()?.to_string(),
        };
        let (_, extension) = name.rsplit_once('.')?;
        Some(extension.to_ascii_lowercase())
    }

    /// The local file backing this origin, when there is one.
    pub(crate) fn local_path(&self, options: &LoaderOptions) -> Option<PathBuf> {
        match self {
            Origin::File(path) => Some(path.clone()),
            Origin::Url(url) if url.scheme() == "file" => url.to_file_path().ok(),
            Origin::Url(_) => None,
            Origin::Resource(name) => options.resource_roots.resolve(name),
        }
    }

    /// Read the full content.
    pub(crate) fn read(&self, options: &LoaderOptions) -> Result<Vec<u8>, ConfigError> {
        match self {
            Origin::File(path) => read_file(path, self),
            Origin::Url(url) => match url.scheme() {
                "file" => {
                    let path = url.to_file_path().map_err(|_| ConfigError::Http {
                        url: url.to_string(),
                        message: "file url does not name a local path".to_string(),
                    })?;
                    read_file(&path, self)
                }
                "http" | "https" => fetch_url(url, options),
                scheme => Err(ConfigError::Http {
                    url: url.to_string(),
                    message: format!("unsupported scheme {scheme}"),
                }),
            },
            Origin::Resource(name) => {
                let path = options
                    .resource_roots
                    .resolve(name)
                    .ok_or_else(|| self.not_found())?;
                read_file(&path, self)
            }
        }
    }

    fn not_found(&self) -> ConfigError {
        ConfigError::SourceNotFound {
            description: self.info().description().to_string(),
        }
    }
}

fn read_file(path: &Path, origin: &Origin) -> Result<Vec<u8>, ConfigError> {
    debug!("reading config source (path={})", path.display());
    fs::read(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => origin.not_found(),
        _ => ConfigError::io(origin.info().description(), err),
    })
}

fn fetch_url(url: &Url, options: &LoaderOptions) -> Result<Vec<u8>, ConfigError> {
    debug!("fetching config source (url={url})");
    let http_error = |err: reqwest::Error| ConfigError::Http {
        url: url.to_string(),
        message: err.to_string(),
    };
    let mut builder = reqwest::blocking::Client::builder();
    if let Some(timeout) = options.http_timeout {
        builder = builder.timeout(timeout);
    }
    let client = builder.build().map_err(http_error)?;
    let response = client.get(url.clone()).send().map_err(http_error)?;
    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(ConfigError::SourceNotFound {
            description: format!("url({url})"),
        });
    }
    if !status.is_success() {
        return Err(ConfigError::Http {
            url: url.to_string(),
            message: format!("unexpected status {status}"),
        });
    }
    let bytes = response.bytes().map_err(http_error)?;
    Ok(bytes.to_vec())
}
