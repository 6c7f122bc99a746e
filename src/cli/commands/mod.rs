//! CLI command implementations
//!
//! Every command reads the schema manifest through [`CommandContext`] and
//! returns its process exit code.

pub mod check;
pub mod docs;
pub mod explain;
pub mod generate;
pub mod show;
pub mod validate;

use super::Cli;
use crate::core::LoadOptions;
use crate::domain::errors::StrataError;
use crate::domain::result::Result;
use crate::schema::manifest::Manifest;
use crate::schema::Schema;
use crate::secrets::SecretRegistry;

/// Schema and load options shared by every command
#[derive(Debug)]
pub struct CommandContext {
    pub manifest: Manifest,
    pub schema: Schema,
    pub options: LoadOptions,
}

impl CommandContext {
    /// Loads the manifest named by the global arguments and registers its
    /// secret backends with the process-wide registry
    ///
    /// # Errors
    ///
    /// Manifest read or parse failures.
    pub fn open(cli: &Cli) -> Result<Self> {
        let manifest = Manifest::load(&cli.schema)?;
        let schema = manifest.schema()?;
        manifest.register_backends(SecretRegistry::global())?;

        let mut options = LoadOptions::from_env().cache(false);
        if let Some(base) = &cli.base {
            options = options.base(base);
        }
        if let Some(env) = &cli.env {
            options = options.env(env);
        }
        if let Some(delimiter) = &manifest.delimiter {
            options = options.delimiter(delimiter);
        }

        tracing::debug!(
            schema = %cli.schema.display(),
            fields = schema.fields().len(),
            base = %options.base.display(),
            "Command context ready"
        );

        Ok(Self {
            manifest,
            schema,
            options,
        })
    }
}

/// Prints `error` and returns its exit code
pub(crate) fn report(error: &StrataError) -> i32 {
    tracing::error!(error = %error, "Command failed");
    eprintln!("❌ {error}");
    error.exit_code()
}
