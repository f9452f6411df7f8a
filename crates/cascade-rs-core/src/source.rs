//! Parsed sources: an intermediate tree tagged with its provenance.

use crate::env::env_name_to_path;
use crate::error::{ConfigError, ParseError};
use crate::path::KeyPath;
use crate::tree::TreeNode;
use log::debug;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;

/// Provenance of a source, used in logs and error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    description: String,
    details: BTreeMap<String, String>,
}

impl SourceInfo {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            details: BTreeMap::new(),
        }
    }

    /// Attach an extra key/value, e.g. the codec that parsed the bytes.
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    /// Short description such as `file(/etc/app.properties)`.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Extra key/values attached with [`SourceInfo::with_detail`].
    pub fn details(&self) -> &BTreeMap<String, String> {
        &self.details
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)
    }
}

/// A format-agnostic tree plus where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Source {
    info: SourceInfo,
    tree: TreeNode,
}

impl Source {
    pub fn new(info: SourceInfo, tree: TreeNode) -> Self {
        Self { info, tree }
    }

    /// Wrap an already built tree, e.g. one converted from `serde_json::Value`.
    pub fn from_tree(description: impl Into<String>, tree: TreeNode) -> Self {
        Self::new(SourceInfo::new(description), tree)
    }

    /// A source contributing nothing; merging it is a no-op.
    pub fn empty(description: impl Into<String>) -> Self {
        Self::from_tree(description, TreeNode::empty())
    }

    /// Build a source from dotted keys such as `server.port`.
    pub fn from_flat_map<I, K, V>(description: impl Into<String>, entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<TreeNode>,
    {
        let description = description.into();
        let tree = TreeNode::from_flat_map(entries)
            .map_err(|conflict| ParseError::new(description.clone(), conflict.to_string()))?;
        Ok(Self::from_tree(description, tree))
    }

    /// Build a source from environment-style variables.
    ///
    /// Names are mapped with [`env_name_to_path`]; names outside `prefix`
    /// are skipped, and so is a variable whose path is the parent of
    /// another variable's path (`SERVER` next to `SERVER_PORT`).
    pub fn from_env_vars<I, K, V>(vars: I, prefix: Option<&str>) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut entries: BTreeMap<KeyPath, String> = BTreeMap::new();
        for (name, value) in vars {
            if let Some(path) = env_name_to_path(name.as_ref(), prefix) {
                entries.insert(path, value.into());
            }
        }
        let parents = entries
            .keys()
            .filter(|path| {
                entries
                    .range::<KeyPath, _>((
                        std::ops::Bound::Excluded(*path),
                        std::ops::Bound::Unbounded,
                    ))
                    .next()
                    .is_some_and(|(next, _)| next.starts_with(path))
            })
            .cloned()
            .collect::<Vec<_>>();
        for path in parents {
            debug!("skipping env variable shadowed by children (path={path})");
            entries.remove(&path);
        }

        let mut tree = TreeNode::empty();
        for (path, value) in entries {
            tree.insert(&path, TreeNode::string(value));
        }
        let description = match prefix {
            Some(prefix) => format!("env(prefix={prefix})"),
            None => "env".to_string(),
        };
        Self::from_tree(description, tree)
    }

    /// Snapshot the process environment.
    pub fn from_env(prefix: Option<&str>) -> Self {
        Self::from_os_env_vars(std::env::vars_os(), prefix)
    }

    /// Like [`Source::from_env_vars`], for raw OS strings. Variables whose
    /// name or value is not valid Unicode are skipped.
    pub fn from_os_env_vars<I>(vars: I, prefix: Option<&str>) -> Self
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        let vars = vars
            .into_iter()
            .filter_map(|(name, value)| match (name.into_string(), value.into_string()) {
                (Ok(name), Ok(value)) => Some((name, value)),
                (name, _) => {
                    debug!(
                        "skipping env variable that is not valid unicode (name={})",
                        name.unwrap_or_else(|raw| raw.to_string_lossy().into_owned())
                    );
                    None
                }
            })
            .collect::<Vec<_>>();
        Self::from_env_vars(vars, prefix)
    }

    /// Build a source from `key=value` properties, e.g. command-line
    /// overrides. An entry without `=` is read as `key=true`.
    pub fn from_properties<I, S>(properties: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = properties
            .into_iter()
            .map(|property| {
                let property = property.as_ref();
                match property.split_once('=') {
                    Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
                    None => (property.trim().to_string(), "true".to_string()),
                }
            })
            .collect::<Vec<_>>();
        Self::from_flat_map("properties", entries)
    }

    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    pub fn tree(&self) -> &TreeNode {
        &self.tree
    }

    /// Split into provenance and tree.
    pub fn into_parts(self) -> (SourceInfo, TreeNode) {
        (self.info, self.tree)
    }
}
