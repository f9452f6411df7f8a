//! Temporary files holding config sources.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempDir};

/// A named temp file with `contents` and the given extension.
pub fn temp_file_of(contents: &str, extension: &str) -> NamedTempFile {
    let file = tempfile::Builder::new()
        .prefix("cascade-")
        .suffix(&format!(".{extension}"))
        .tempfile()
        .expect("temp file");
    fs::write(file.path(), contents).expect("write temp file");
    file
}

/// A temp directory that config files can be written into and rewritten.
pub struct TempSourceDir {
    dir: TempDir,
}

impl TempSourceDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    /// Directory the files are written into.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` to `relative`, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("dir");
        }
        fs::write(&path, contents).expect("write");
        path
    }

    /// Delete a file written earlier.
    pub fn remove(&self, relative: &str) {
        fs::remove_file(self.dir.path().join(relative)).expect("remove");
    }
}

impl Default for TempSourceDir {
    fn default() -> Self {
        Self::new()
    }
}
