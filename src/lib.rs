//! # Strata - layered configuration resolution
//!
//! Strata builds a typed configuration object from layered `KEY=value`
//! override files and the process environment, resolving `${NAME}`
//! interpolation, delimiter-based nesting and deferred secret references
//! along the way.
//!
//! ## Overview
//!
//! - **Layering**: `{base}`, `{base}.{env}`, `{base}.local`, then the process
//!   environment, each overriding the last
//! - **Interpolation**: `${NAME}` tokens with cycle detection
//! - **Nesting**: `DATABASE__HOST` becomes `database.host`
//! - **Diagnostics**: missing/unknown variables with typo suggestions
//! - **Secrets**: `secretref:<backend>:<key>` values resolved lazily from
//!   environment, AWS Secrets Manager, Azure Key Vault or HashiCorp Vault
//! - **Caching**: one instance per type, pull-based reload with callbacks
//!
//! ## Architecture
//!
//! - [`source`] - override file reading and precedence merging
//! - [`core`] - interpolation, key mapping, diagnostics, pipeline, cache
//! - [`schema`] - schema contract, validation, generated artifacts
//! - [`secrets`] - secret references, masked values, backend registry
//! - [`adapters`] - secret backend implementations
//! - [`domain`] - error types
//! - [`logging`] - structured logging
//! - [`cli`] - command-line interface
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use serde::Deserialize;
//! use strata::{ConfigSchema, FieldKind, FieldSpec, LoadOptions, Schema, Secret};
//!
//! #[derive(Debug, Deserialize)]
//! struct AppConfig {
//!     database: DatabaseConfig,
//!     api_key: Secret,
//! }
//!
//! #[derive(Debug, Deserialize)]
//! struct DatabaseConfig {
//!     host: String,
//!     port: u16,
//! }
//!
//! impl ConfigSchema for AppConfig {
//!     fn schema() -> Schema {
//!         Schema::new("AppConfig")
//!             .group("DATABASE", "Database connection")
//!             .field(FieldSpec::new("DATABASE__HOST", FieldKind::String).required())
//!             .field(FieldSpec::new("DATABASE__PORT", FieldKind::Integer).default_value("5432"))
//!             .field(FieldSpec::new("API_KEY", FieldKind::Secret).required())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = strata::load::<AppConfig>(&LoadOptions::new().env("production"))?;
//!     println!("{}:{}", config.database.host, config.database.port);
//!
//!     let _key = config.api_key.resolve().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`domain::Result`]; the error is a
//! [`StrataError`] whose [`StrataError::exit_code`] is what the CLI exits with.
//!
//! ## Logging
//!
//! Strata logs through `tracing`. Secret values are never logged.

pub mod adapters;
pub mod cli;
pub mod core;
pub mod domain;
pub mod logging;
pub mod schema;
pub mod secrets;
pub mod source;

pub use crate::core::{
    check, current, diagnose, generation, load, on_reload, reload, reload_with, reset, Diagnosis,
    LoadOptions, Loaded,
};
pub use crate::domain::{BackendError, FieldError, Result, StrataError};
pub use crate::schema::{ConfigSchema, FieldKind, FieldSpec, Schema};
pub use crate::secrets::{Secret, SecretReference, SecretRegistry};
