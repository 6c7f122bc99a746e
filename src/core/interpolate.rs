//! `${NAME}` interpolation over a merged mapping
//!
//! Runs after the full merge, so a value may reference a key defined in any
//! file. A token resolves to (a) the fully interpolated value of another key
//! in the mapping, else (b) the process environment variable of that exact
//! name. Replacement text is never re-scanned.

use crate::domain::errors::StrataError;
use crate::domain::result::Result;
use crate::source::ResolvedMapping;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::OnceLock;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("token pattern is valid")
    })
}

/// Token names referenced by a value, in order of appearance
pub fn references(value: &str) -> Vec<String> {
    token_pattern()
        .captures_iter(value)
        .map(|cap| cap[1].to_string())
        .collect()
}

/// Interpolates every file-sourced value of `mapping` in place
///
/// Values supplied by the process environment are taken verbatim.
///
/// # Errors
///
/// - [`StrataError::UnresolvedReference`] naming the token and containing key
/// - [`StrataError::CyclicReference`] naming every key in the cycle, with the
///   first key repeated at the end
pub fn interpolate(mapping: &mut ResolvedMapping) -> Result<()> {
    let mut resolver = Resolver {
        mapping: &*mapping,
        resolved: BTreeMap::new(),
        visiting: HashSet::new(),
        stack: Vec::new(),
    };

    let keys: Vec<String> = resolver.mapping.file_keys().cloned().collect();
    for key in &keys {
        resolver.resolve(key)?;
    }

    let resolved = resolver.resolved;
    let mut substituted = 0usize;
    for (key, value) in resolved {
        if mapping.value(&key) != Some(value.as_str()) {
            substituted += 1;
            mapping.set_value(&key, value);
        }
    }

    if substituted > 0 {
        tracing::debug!(keys = substituted, "Interpolated values");
    }
    Ok(())
}

struct Resolver<'a> {
    mapping: &'a ResolvedMapping,
    resolved: BTreeMap<String, String>,
    visiting: HashSet<String>,
    stack: Vec<String>,
}

impl Resolver<'_> {
    fn resolve(&mut self, key: &str) -> Result<String> {
        if let Some(done) = self.resolved.get(key) {
            return Ok(done.clone());
        }

        let Some(entry) = self.mapping.get(key) else {
            return Err(StrataError::UnresolvedReference {
                token: key.to_string(),
                key: self.stack.last().cloned().unwrap_or_default(),
            });
        };

        if entry.source_id == crate::source::ENVIRONMENT_SOURCE {
            return Ok(entry.value.clone());
        }

        if self.visiting.contains(key) {
            let start = self.stack.iter().position(|k| k == key).unwrap_or(0);
            let mut cycle: Vec<String> = self.stack[start..].to_vec();
            cycle.push(key.to_string());
            return Err(StrataError::CyclicReference { cycle });
        }

        self.visiting.insert(key.to_string());
        self.stack.push(key.to_string());

        let raw = entry.value.clone();
        let mut out = String::with_capacity(raw.len());
        let mut last = 0;

        for cap in token_pattern().captures_iter(&raw) {
            let whole = cap.get(0).expect("capture 0 is the whole match");
            let name = &cap[1];
            out.push_str(&raw[last..whole.start()]);

            let upper = name.to_uppercase();
            let replacement = if self.mapping.contains_key(&upper) {
                self.resolve(&upper)?
            } else if let Ok(env_value) = std::env::var(name) {
                env_value
            } else {
                return Err(StrataError::UnresolvedReference {
                    token: name.to_string(),
                    key: key.to_string(),
                });
            };

            out.push_str(&replacement);
            last = whole.end();
        }
        out.push_str(&raw[last..]);

        self.stack.pop();
        self.visiting.remove(key);
        self.resolved.insert(key.to_string(), out.clone());
        Ok(out)
    }
}
