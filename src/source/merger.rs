//! Precedence merging of override sources
//!
//! Sources are merged lowest priority first; the process environment is
//! always merged last. Each key keeps the value and provenance of the last
//! source that defined it.

use super::reader::{read_source, RawEntry, ENVIRONMENT_SOURCE};
use crate::domain::result::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Winning value for one key together with where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedValue {
    pub value: String,
    pub source_id: String,
}

/// Flat key to value mapping with provenance
///
/// Keys are uppercase and unique. Iteration order is sorted by key so two
/// merges of identical inputs compare (and serialize) identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedMapping {
    entries: BTreeMap<String, ResolvedValue>,
}

impl ResolvedMapping {
    /// Creates an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `entry`, replacing any earlier value for the same key
    pub fn insert(&mut self, entry: RawEntry) {
        self.entries.insert(
            entry.key,
            ResolvedValue {
                value: entry.value,
                source_id: entry.source_id,
            },
        );
    }

    /// Looks up a key (case-insensitive)
    pub fn get(&self, key: &str) -> Option<&ResolvedValue> {
        self.entries.get(&key.to_uppercase())
    }

    /// Value for a key, if present
    pub fn value(&self, key: &str) -> Option<&str> {
        self.get(key).map(|v| v.value.as_str())
    }

    /// Provenance of a key's winning value
    pub fn source_of(&self, key: &str) -> Option<&str> {
        self.get(key).map(|v| v.source_id.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResolvedValue)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Keys whose winning value came from an override file
    pub fn file_keys(&self) -> impl Iterator<Item = &String> {
        self.entries
            .iter()
            .filter(|(_, v)| v.source_id != ENVIRONMENT_SOURCE)
            .map(|(k, _)| k)
    }

    /// Flat key to value view without provenance
    pub fn values(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect()
    }

    /// Replaces the value of an existing key, keeping its provenance
    pub(crate) fn set_value(&mut self, key: &str, value: String) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.value = value;
        }
    }
}

/// Canonical override files for one load
///
/// For base `.env` and environment `prod`: `.env`, `.env.prod`, `.env.local`,
/// lowest priority first. Each file is individually optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSet {
    files: Vec<PathBuf>,
}

impl SourceSet {
    /// Discovers the file list for `base` and an optional environment name
    pub fn discover(base: impl AsRef<Path>, env: Option<&str>) -> Self {
        let base = base.as_ref();
        let mut files = vec![base.to_path_buf()];
        if let Some(env) = env.filter(|e| !e.is_empty()) {
            files.push(suffixed(base, env));
        }
        files.push(suffixed(base, "local"));
        Self { files }
    }

    /// Uses an explicit file list, lowest priority first
    pub fn from_files(files: Vec<PathBuf>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Reads every file in order
    ///
    /// # Errors
    ///
    /// Propagates the first parse or read error; no partial result is returned.
    pub fn read_all(&self) -> Result<Vec<Vec<RawEntry>>> {
        self.files.iter().map(read_source).collect()
    }
}

fn suffixed(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Snapshot of the process environment as entries, sorted by key
///
/// Variables whose names or values are not valid Unicode are skipped.
pub fn environment_entries() -> Vec<RawEntry> {
    let mut vars: Vec<(String, String)> = std::env::vars_os()
        .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
        .collect();
    vars.sort();
    vars.into_iter()
        .map(|(k, v)| RawEntry::new(k, v, ENVIRONMENT_SOURCE))
        .collect()
}

/// Merges sources lowest priority first
///
/// Later entries overwrite earlier ones key for key, including duplicate keys
/// inside a single source.
pub fn merge<I>(sources: I) -> ResolvedMapping
where
    I: IntoIterator<Item = Vec<RawEntry>>,
{
    let mut mapping = ResolvedMapping::new();
    for source in sources {
        for entry in source {
            mapping.insert(entry);
        }
    }
    mapping
}

/// Reads a source set and merges it under the live process environment
pub fn merge_with_environment(set: &SourceSet) -> Result<ResolvedMapping> {
    let mut sources = set.read_all()?;
    sources.push(environment_entries());
    let mapping = merge(sources);
    tracing::debug!(
        files = set.files().len(),
        keys = mapping.len(),
        "Sources merged"
    );
    Ok(mapping)
}
