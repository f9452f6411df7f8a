//! Mapping between hierarchical paths and flat environment variable names.
//!
//! The convention is fixed and bidirectional:
//! - segments are upper-cased and joined with a single `_`;
//! - an underscore inside a segment is written as `__`;
//! - an optional prefix is prepended as `PREFIX_`.
//!
//! `server.max_conn` with prefix `APP` maps to `APP_SERVER_MAX__CONN` and back.
//! Segments that start with `_` do not survive the round trip.

use crate::path::KeyPath;

/// Environment variable name for `path`.
pub fn path_to_env_name(path: &KeyPath, prefix: Option<&str>) -> String {
    let body = path
        .segments()
        .iter()
        .map(|segment| segment.replace('_', "__").to_ascii_uppercase())
        .collect::<Vec<_>>()
        .join("_");
    match prefix {
        Some(prefix) if !prefix.is_empty() => format!("{}_{body}", prefix.to_ascii_uppercase()),
        _ => body,
    }
}

/// Path for an environment variable name, or `None` when the name does not
/// carry `prefix` or has no segments.
pub fn env_name_to_path(name: &str, prefix: Option<&str>) -> Option<KeyPath> {
    let body = match prefix {
        Some(prefix) if !prefix.is_empty() => {
            let head = format!("{}_", prefix.to_ascii_uppercase());
            match (name.get(..head.len()), name.get(head.len()..)) {
                (Some(found), Some(rest)) if !rest.is_empty() && found.eq_ignore_ascii_case(&head) => {
                    rest
                }
                _ => return None,
            }
        }
        _ => name,
    };

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = body.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '_' {
            if chars.peek() == Some(&'_') {
                chars.next();
                current.push('_');
            } else {
                if current.is_empty() {
                    return None;
                }
                segments.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch.to_ascii_lowercase());
        }
    }
    if current.is_empty() {
        return None;
    }
    segments.push(current);
    Some(KeyPath::from_segments(segments))
}
