//! Dot-delimited hierarchical keys.

use std::fmt;
use std::str::FromStr;

/// Immutable ordered sequence of path segments, written as `a.b.c`.
///
/// The empty string is the root path. Equality, hashing and ordering all
/// compare segment by segment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath {
    segments: Vec<String>,
}

impl KeyPath {
    /// The root path (no segments).
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dot-separated path. Empty segments are dropped, so `""`,
    /// `"."` and `"a..b"` parse as root, root and `a.b`.
    pub fn parse(text: &str) -> Self {
        Self {
            segments: text
                .split('.')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Build a path from segments taken verbatim, dots included.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Segments from the outermost inward.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments; zero for root.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append every segment of `other` to this path.
    pub fn join(&self, other: &KeyPath) -> KeyPath {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        KeyPath { segments }
    }

    /// Append a single segment.
    pub fn child(&self, segment: impl Into<String>) -> KeyPath {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        KeyPath { segments }
    }

    /// Path without its last segment; `None` for root.
    pub fn parent(&self) -> Option<KeyPath> {
        if self.is_root() {
            return None;
        }
        Some(KeyPath {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Last segment; `None` for root.
    pub fn last(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Segment-wise prefix test; every path starts with itself and root.
    pub fn starts_with(&self, prefix: &KeyPath) -> bool {
        self.segments.len() >= prefix.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }

    /// Remove `prefix` from the front of this path.
    pub fn strip_prefix(&self, prefix: &KeyPath) -> Option<KeyPath> {
        if !self.starts_with(prefix) {
            return None;
        }
        Some(KeyPath {
            segments: self.segments[prefix.segments.len()..].to_vec(),
        })
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return f.write_str("<root>");
        }
        f.write_str(&self.segments.join("."))
    }
}

impl FromStr for KeyPath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(KeyPath::parse(s))
    }
}

impl From<&str> for KeyPath {
    fn from(value: &str) -> Self {
        KeyPath::parse(value)
    }
}

impl From<String> for KeyPath {
    fn from(value: String) -> Self {
        KeyPath::parse(&value)
    }
}
