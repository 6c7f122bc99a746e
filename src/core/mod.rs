//! Core resolution engine for Strata.
//!
//! # Modules
//!
//! - [`interpolate`] - `${NAME}` substitution with cycle detection
//! - [`keymap`] - delimiter-based nesting (flat mapping to ConfigTree and back)
//! - [`diagnose`] - missing/unknown field report with typo suggestions
//! - [`pipeline`] - [`LoadOptions`] and the end-to-end resolution run
//! - [`cache`] - per-type cached instance, reload and callbacks
//!
//! # Load Workflow
//!
//! 1. **Discover**: `{base}`, `{base}.{env}`, `{base}.local`
//! 2. **Merge**: later files override earlier ones, the process environment overrides all
//! 3. **Interpolate**: resolve `${NAME}` across the merged mapping
//! 4. **Strict check** (optional): reject undeclared keys from override files
//! 5. **Validate**: nest on the delimiter, coerce, deserialize
//! 6. **Install**: cache the instance for later `load` calls
//!
//! # Example
//!
//! ```rust,no_run
//! use serde::Deserialize;
//! use strata::core::{self, LoadOptions};
//! use strata::schema::{ConfigSchema, FieldKind, FieldSpec, Schema};
//!
//! #[derive(Debug, Deserialize)]
//! struct AppConfig {
//!     database_url: String,
//!     max_workers: u32,
//! }
//!
//! impl ConfigSchema for AppConfig {
//!     fn schema() -> Schema {
//!         Schema::new("AppConfig")
//!             .field(FieldSpec::new("DATABASE_URL", FieldKind::String).required())
//!             .field(FieldSpec::new("MAX_WORKERS", FieldKind::Integer).default_value("4"))
//!     }
//! }
//!
//! # fn example() -> strata::domain::Result<()> {
//! let options = LoadOptions::new().env("production");
//! if !core::check::<AppConfig>(&options)? {
//!     std::process::exit(1);
//! }
//!
//! let config = core::load::<AppConfig>(&options)?;
//! println!("workers: {}", config.max_workers);
//!
//! core::on_reload::<AppConfig, _>(|cfg| {
//!     println!("generation {} loaded", cfg.generation);
//!     Ok(())
//! });
//! core::reload::<AppConfig>()?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod diagnose;
pub mod interpolate;
pub mod keymap;
pub mod pipeline;

pub use cache::{
    current, generation, load, on_reload, reload, reload_with, reset, ConfigCell, Loaded,
};
pub use diagnose::{explain, render_diagnosis, render_sources, Diagnosis};
pub use keymap::{flatten, unflatten, ConfigTree, DEFAULT_DELIMITER};
pub use pipeline::{build, resolve_mapping, LoadOptions, Resolved};

use crate::domain::result::Result;
use crate::schema::ConfigSchema;

/// Diagnoses `T` against the sources selected by `options`
///
/// Never runs validation or construction.
///
/// # Errors
///
/// Parse, I/O and interpolation errors.
pub fn diagnose<T: ConfigSchema>(options: &LoadOptions) -> Result<Diagnosis> {
    pipeline::diagnose_schema(&T::schema(), options)
}

/// `true` when nothing required is missing (and, in strict mode, nothing unknown)
///
/// # Errors
///
/// Parse, I/O and interpolation errors.
pub fn check<T: ConfigSchema>(options: &LoadOptions) -> Result<bool> {
    pipeline::check_schema(&T::schema(), options)
}
