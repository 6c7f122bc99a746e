//! Validate command implementation
//!
//! Runs the full pipeline, coercion included, against the manifest.

use super::{report, CommandContext};
use crate::cli::Cli;
use crate::core::pipeline::build;
use clap::Args;

/// Arguments for the validate command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Reject undeclared keys found in override files
    #[arg(long)]
    pub strict: bool,
}

impl ValidateArgs {
    /// Execute the validate command
    pub async fn execute(&self, cli: &Cli) -> anyhow::Result<i32> {
        tracing::info!(schema = %cli.schema.display(), "Validating configuration");

        let ctx = match CommandContext::open(cli) {
            Ok(ctx) => ctx,
            Err(e) => return Ok(report(&e)),
        };
        let options = ctx.options.clone().strict(self.strict || ctx.options.strict);

        println!("🔍 Validating {} against {}", options.base.display(), ctx.schema.name);
        println!();

        match build::<serde_json::Value>(&ctx.schema, &options) {
            Ok(resolved) => {
                println!("✅ Configuration is valid");
                println!();
                println!("Summary:");
                println!("  Schema: {}", ctx.schema.name);
                println!("  Declared variables: {}", ctx.schema.fields().len());
                println!("  Resolved keys: {}", resolved.mapping.len());
                println!("  Override files: {}", options.source_set().files().len());
                if let Some(env) = &options.env {
                    println!("  Environment: {env}");
                }
                Ok(0)
            }
            Err(e) => Ok(report(&e)),
        }
    }
}
