//! Error types for config loading, merging and typed reads.

use crate::path::KeyPath;
use std::fmt;
use thiserror::Error;

/// Errors returned while declaring, loading or reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file, resource or URL that was not marked optional does not exist.
    #[error("source not found: {description}")]
    SourceNotFound { description: String },
    /// A codec could not interpret the bytes of a source.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// A loaded layer contains a path that no declared item covers.
    #[error("unknown path {path} in {origin}")]
    UnknownPath { path: KeyPath, origin: String },
    /// A value is present but cannot be coerced to the declared type.
    #[error("type mismatch at {path}: expected {expected}, found {raw}")]
    TypeMismatch {
        path: KeyPath,
        expected: String,
        raw: String,
    },
    /// A required item has neither a value nor a default.
    #[error("missing required item {path}")]
    MissingRequiredItem { path: KeyPath },
    /// Offset/length do not describe a range inside the byte buffer.
    #[error("invalid slice: offset {offset} + length {length} exceeds buffer of {available} bytes")]
    InvalidSlice {
        offset: usize,
        length: usize,
        available: usize,
    },
    /// Reading a source failed.
    #[error("failed to read {origin}: {source}")]
    Io {
        origin: String,
        #[source]
        source: std::io::Error,
    },
    /// Fetching a URL failed.
    #[error("failed to fetch {url}: {message}")]
    Http { url: String, message: String },
    /// A URL string could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// No codec is available for the source.
    #[error("unsupported format for {description}")]
    UnsupportedFormat { description: String },
    /// Two items were declared with the same path.
    #[error("item {path} is declared more than once")]
    DuplicateItem { path: KeyPath },
    /// One item path is a prefix of another.
    #[error("item {path} conflicts with item {other}")]
    PathConflict { path: KeyPath, other: KeyPath },
    /// The item was never added to this config.
    #[error("no such item {path}")]
    NoSuchItem { path: KeyPath },
    /// Lazy items depend on each other in a cycle.
    #[error("cyclic lazy item {path}")]
    LazyCycle { path: KeyPath },
    /// A `${...}` reference in a source could not be resolved.
    #[error("unresolved substitution ${{{reference}}} at {path} in {origin}")]
    UnresolvedSubstitution {
        path: KeyPath,
        reference: String,
        origin: String,
    },
    /// Converting a value or tree failed.
    #[error("failed to serialize: {0}")]
    Serialize(String),
    /// Setting up a watch failed.
    #[error("watch error: {0}")]
    Watch(String),
}

impl ConfigError {
    /// Build an IO error tagged with the source it came from.
    pub fn io(origin: impl Into<String>, source: std::io::Error) -> Self {
        ConfigError::Io {
            origin: origin.into(),
            source,
        }
    }

    /// True for errors caused by a missing source.
    pub fn is_not_found(&self) -> bool {
        match self {
            ConfigError::SourceNotFound { .. } => true,
            ConfigError::Io { source, .. } => source.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<notify::Error> for ConfigError {
    fn from(err: notify::Error) -> Self {
        ConfigError::Watch(err.to_string())
    }
}

/// Failure reported by a codec, carrying the origin of the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ParseError {
    /// Description of the source (file path, URL, "string", ...).
    pub origin: String,
    /// 1-based line, when the codec reports one.
    pub line: Option<usize>,
    /// 1-based column, when the codec reports one.
    pub column: Option<usize>,
    /// Byte offset, when the codec reports one.
    pub offset: Option<usize>,
    pub message: String,
}

impl ParseError {
    /// Error without a position.
    pub fn new(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            line: None,
            column: None,
            offset: None,
            message: message.into(),
        }
    }

    /// 1-based line, and column when known.
    pub fn at_line(mut self, line: usize, column: Option<usize>) -> Self {
        self.line = Some(line);
        self.column = column;
        self
    }

    /// Byte offset into the input.
    pub fn at_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}", self.origin)?;
        match (self.line, self.column, self.offset) {
            (Some(line), Some(column), _) => write!(f, " at {line}:{column}")?,
            (Some(line), None, _) => write!(f, " at line {line}")?,
            (None, _, Some(offset)) => write!(f, " at offset {offset}")?,
            _ => {}
        }
        write!(f, ": {}", self.message)
    }
}
