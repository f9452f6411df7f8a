//! Resource roots used to resolve relative resource names.

use std::env;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Environment variable holding the default resource roots, in the
/// platform's path-list syntax.
pub const RESOURCE_PATH_ENV: &str = "CASCADE_RESOURCE_PATH";

/// Ordered directories searched for resources; the first match wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceRoots {
    roots: Vec<PathBuf>,
}

impl ResourceRoots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Roots listed in `CASCADE_RESOURCE_PATH`, or none when unset.
    pub fn from_env() -> Self {
        env::var_os(RESOURCE_PATH_ENV)
            .map(|value| Self::from_path_list(&value))
            .unwrap_or_default()
    }

    /// Split a platform path list (`:` on Unix, `;` on Windows).
    pub fn from_path_list(value: &OsStr) -> Self {
        Self {
            roots: env::split_paths(value)
                .filter(|root| !root.as_os_str().is_empty())
                .collect(),
        }
    }

    /// Search `root` after the roots already listed.
    pub fn with_root(mut self, root: impl AsRef<Path>) -> Self {
        self.roots.push(root.as_ref().to_path_buf());
        self
    }

    /// Roots in search order.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Locate `name` (a `/`-separated relative name) under the roots.
    ///
    /// Names that climb out of a root with `..` never match.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name.trim_start_matches('/'));
        let contained = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
        if !contained || relative.as_os_str().is_empty() {
            return None;
        }
        self.roots
            .iter()
            .map(|root| root.join(relative))
            .find(|candidate| candidate.is_file())
    }
}
