//! Java-style `.properties` codec.
//!
//! Keys are dotted paths, values are always strings; typing happens when an
//! item binds the value.

use crate::codec::Codec;
use crate::error::{ConfigError, ParseError};
use crate::tree::TreeNode;
use std::fmt::Write as _;

/// `.properties` files with dotted keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct PropertiesCodec;

impl Codec for PropertiesCodec {
    fn name(&self) -> &str {
        "properties"
    }

    fn extensions(&self) -> &[&str] {
        &["properties"]
    }

    fn parse(&self, bytes: &[u8], origin: &str) -> Result<TreeNode, ParseError> {
        let text = std::str::from_utf8(bytes).map_err(|err| {
            ParseError::new(origin, "input is not valid UTF-8").at_offset(err.valid_up_to())
        })?;
        let entries = parse_entries(text, origin)?;
        TreeNode::from_flat_map(entries).map_err(|err| ParseError::new(origin, err.to_string()))
    }

    fn serialize(&self, tree: &TreeNode) -> Result<Vec<u8>, ConfigError> {
        let mut out = String::new();
        for (key, value) in tree.flatten() {
            writeln!(out, "{} = {}", escape(&key, true), escape(&value, false))
                .map_err(|err| ConfigError::Serialize(err.to_string()))?;
        }
        Ok(out.into_bytes())
    }
}

/// Parse `key = value` entries in file order; later keys win.
fn parse_entries(text: &str, origin: &str) -> Result<Vec<(String, String)>, ParseError> {
    let mut entries = Vec::new();
    let mut lines = text.lines().enumerate();
    while let Some((index, line)) = lines.next() {
        let first_line = index + 1;
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = String::from(trimmed);
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some((_, next)) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_entry(&logical);
        let key = unescape(key).map_err(|message| {
            ParseError::new(origin, message).at_line(first_line, None)
        })?;
        let value = unescape(value).map_err(|message| {
            ParseError::new(origin, message).at_line(first_line, None)
        })?;
        entries.push((key, value));
    }
    Ok(entries)
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

/// Split a logical line at the first unescaped `=`, `:` or whitespace.
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (pos, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\u{c}' => {
                key_end = pos;
                break;
            }
            _ => {}
        }
    }
    let key = &line[..key_end];
    let rest = line[key_end..].trim_start_matches([' ', '\t', '\u{c}']);
    let rest = rest
        .strip_prefix('=')
        .or_else(|| rest.strip_prefix(':'))
        .unwrap_or(rest);
    (key, rest.trim_start_matches([' ', '\t', '\u{c}']))
}

fn unescape(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex = chars.by_ref().take(4).collect::<String>();
                let code = u32::from_str_radix(&hex, 16)
                    .ok()
                    .filter(|_| hex.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| format!("malformed \\u escape: \\u{hex}"))?;
                out.push(code);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    Ok(out)
}

fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (pos, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{c}' => out.push_str("\\f"),
            ' ' if is_key || pos == 0 => out.push_str("\\ "),
            '=' | ':' | '#' | '!' if is_key => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
