//! Resolution pipeline
//!
//! One load runs, in order:
//! 1. discover and read the override files, merge them under the process
//!    environment ([`crate::source`])
//! 2. interpolate `${NAME}` tokens ([`super::interpolate`])
//! 3. in strict mode, reject undeclared file keys ([`super::diagnose`])
//! 4. nest, coerce and deserialize ([`crate::schema::validate`])
//!
//! Any failure aborts the load; no partial mapping reaches the schema.

use super::diagnose::{check_strict, diagnose, render_sources, Diagnosis};
use super::interpolate::interpolate;
use super::keymap::DEFAULT_DELIMITER;
use crate::adapters::publish;
use crate::domain::errors::StrataError;
use crate::domain::result::Result;
use crate::schema::generate::generate_example;
use crate::schema::validate::validate;
use crate::schema::Schema;
use crate::source::{merge_with_environment, ResolvedMapping, SourceSet};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Default base override file
pub const DEFAULT_BASE_FILE: &str = ".env";

/// Options for one load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Base override file; `{base}.{env}` and `{base}.local` sit next to it
    pub base: PathBuf,

    /// Environment name selecting the `{base}.{env}` file
    pub env: Option<String>,

    /// Reject keys in override files that the schema does not declare
    pub strict: bool,

    /// Return the cached instance when one exists
    pub cache: bool,

    /// Nesting delimiter
    pub delimiter: String,

    /// Log which source supplied each declared field
    pub show_sources: bool,

    /// Write `.env.example` next to the base file when it is missing
    pub auto_generate_example: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            base: PathBuf::from(DEFAULT_BASE_FILE),
            env: None,
            strict: false,
            cache: true,
            delimiter: DEFAULT_DELIMITER.to_string(),
            show_sources: false,
            auto_generate_example: false,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `STRATA_*` environment variables
    ///
    /// Reads `STRATA_BASE_FILE`, `STRATA_ENV`, `STRATA_STRICT` and
    /// `STRATA_DELIMITER`. An unparsable `STRATA_STRICT` is ignored.
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Ok(val) = std::env::var("STRATA_BASE_FILE") {
            options.base = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("STRATA_ENV") {
            if !val.is_empty() {
                options.env = Some(val);
            }
        }
        if let Ok(val) = std::env::var("STRATA_STRICT") {
            if let Some(strict) = crate::schema::validate::parse_bool(&val) {
                options.strict = strict;
            }
        }
        if let Ok(val) = std::env::var("STRATA_DELIMITER") {
            options.delimiter = val;
        }
        options
    }

    pub fn base(mut self, base: impl Into<PathBuf>) -> Self {
        self.base = base.into();
        self
    }

    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.env = Some(env.into());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn show_sources(mut self, show: bool) -> Self {
        self.show_sources = show;
        self
    }

    pub fn auto_generate_example(mut self, generate: bool) -> Self {
        self.auto_generate_example = generate;
        self
    }

    /// Canonical override files for these options
    pub fn source_set(&self) -> SourceSet {
        SourceSet::discover(&self.base, self.env.as_deref())
    }

    fn example_path(&self) -> PathBuf {
        self.base
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
            .join(".env.example")
    }

    fn check(&self) -> Result<()> {
        if self.delimiter.is_empty() {
            return Err(StrataError::Configuration(
                "nesting delimiter cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Merged and interpolated mapping for `options`
///
/// # Errors
///
/// Parse, I/O and interpolation errors.
pub fn resolve_mapping(options: &LoadOptions) -> Result<ResolvedMapping> {
    options.check()?;
    let mut mapping = merge_with_environment(&options.source_set())?;
    interpolate(&mut mapping)?;
    Ok(mapping)
}

/// A typed value together with the mapping it was built from
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub value: T,
    pub mapping: ResolvedMapping,
}

/// Runs the full pipeline once, bypassing the cache
///
/// On success the mapping is published to the `env` secret backend.
///
/// # Errors
///
/// Any error of the pipeline stages; strict violations and schema failures
/// are reported after the mapping is fully resolved.
pub fn build<T: DeserializeOwned>(schema: &Schema, options: &LoadOptions) -> Result<Resolved<T>> {
    if options.auto_generate_example {
        let path = options.example_path();
        if !path.exists() {
            generate_example(schema, &path, &options.delimiter, false)?;
        }
    }

    let mapping = resolve_mapping(options)?;

    if options.strict {
        check_strict(&mapping, schema)?;
    }

    let value = validate::<T>(&mapping, schema, &options.delimiter)?;
    publish(&mapping);

    if options.show_sources {
        tracing::info!("\n{}", render_sources(&mapping, schema));
    }

    tracing::info!(
        schema = %schema.name,
        keys = mapping.len(),
        env = options.env.as_deref().unwrap_or("-"),
        "Configuration resolved"
    );
    Ok(Resolved { value, mapping })
}

/// Diagnoses `schema` against the sources selected by `options`
///
/// Runs merge and interpolation but never validation or construction.
///
/// # Errors
///
/// Parse, I/O and interpolation errors.
pub fn diagnose_schema(schema: &Schema, options: &LoadOptions) -> Result<Diagnosis> {
    let mapping = resolve_mapping(options)?;
    Ok(diagnose(&mapping, schema, options.strict))
}

/// Boolean form of [`diagnose_schema`]
///
/// # Errors
///
/// Parse, I/O and interpolation errors.
pub fn check_schema(schema: &Schema, options: &LoadOptions) -> Result<bool> {
    Ok(diagnose_schema(schema, options)?.passed())
}
