//! Override file reader
//!
//! Parses newline-delimited `KEY=value` files into ordered [`RawEntry`]
//! lists. A missing file yields no entries; only malformed lines fail.

use crate::domain::errors::StrataError;
use crate::domain::result::Result;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Source id recorded for values taken from the process environment
pub const ENVIRONMENT_SOURCE: &str = "environment";

/// One `KEY=value` pair as read from a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawEntry {
    /// Uppercased key, delimiter preserved
    pub key: String,

    /// Value with surrounding whitespace and matching quotes removed
    pub value: String,

    /// File path or [`ENVIRONMENT_SOURCE`]
    pub source_id: String,
}

impl RawEntry {
    /// Creates a new entry, normalising the key to uppercase
    pub fn new(key: impl AsRef<str>, value: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            key: key.as_ref().to_uppercase(),
            value: value.into(),
            source_id: source_id.into(),
        }
    }

    /// Whether this entry came from an override file rather than the environment
    pub fn is_file_sourced(&self) -> bool {
        self.source_id != ENVIRONMENT_SOURCE
    }
}

/// Reads an override file
///
/// # Errors
///
/// Returns [`StrataError::Parse`] for a malformed line and
/// [`StrataError::Io`] if the file exists but cannot be read. An absent file
/// is not an error.
pub fn read_source(path: impl AsRef<Path>) -> Result<Vec<RawEntry>> {
    let path = path.as_ref();
    let source_id = path.display().to_string();

    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(source = %source_id, "Override file absent, skipping");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(StrataError::Io(format!(
                "Failed to read override file {source_id}: {e}"
            )))
        }
    };

    let entries = parse_source(&contents, &source_id)?;
    tracing::debug!(source = %source_id, entries = entries.len(), "Override file read");
    Ok(entries)
}

/// Parses override file contents
///
/// Blank lines and `#` comments are skipped. Each remaining line is split on
/// the first `=` not preceded by a backslash; an optional leading `export `
/// is ignored.
pub fn parse_source(contents: &str, source_id: &str) -> Result<Vec<RawEntry>> {
    let mut entries = Vec::new();

    for (idx, line) in contents.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let trimmed = trimmed
            .strip_prefix("export ")
            .map(str::trim_start)
            .unwrap_or(trimmed);

        let parse_error = |message: &str| StrataError::Parse {
            path: source_id.to_string(),
            line: line_no,
            message: message.to_string(),
        };

        let (raw_key, raw_value) =
            split_unescaped(trimmed).ok_or_else(|| parse_error("expected KEY=value, found no '='"))?;

        let key = raw_key.trim();
        if key.is_empty() {
            return Err(parse_error("empty key before '='"));
        }

        let value = unquote(raw_value.trim()).map_err(|m| parse_error(m))?;

        entries.push(RawEntry::new(key, value, source_id));
    }

    Ok(entries)
}

/// Splits on the first unescaped `=`, unescaping `\=` in the key
fn split_unescaped(line: &str) -> Option<(String, &str)> {
    let mut key = String::new();
    let mut chars = line.char_indices();

    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, '=')) => key.push('='),
                Some((_, other)) => {
                    key.push('\\');
                    key.push(other);
                }
                None => key.push('\\'),
            },
            '=' => return Some((key, &line[i + 1..])),
            _ => key.push(c),
        }
    }

    None
}

/// Strips the surrounding quotes of a quoted value
///
/// A value is quoted only when it starts with `"` or `'`. Quote characters
/// elsewhere are literal. An opening quote that never closes is an error.
fn unquote(value: &str) -> std::result::Result<String, &'static str> {
    let Some(quote @ ('"' | '\'')) = value.chars().next() else {
        return Ok(value.to_string());
    };
    let rest = &value[1..];

    if let Some(inner) = rest.strip_suffix(quote) {
        Ok(inner.to_string())
    } else if rest.contains(quote) {
        Ok(value.to_string())
    } else {
        Err("unbalanced quotes in value")
    }
}
