//! Check command implementation
//!
//! Diagnoses the resolved sources against the manifest without building
//! anything. Exit code 0 when every required variable is present, 1 when not.

use super::{report, CommandContext};
use crate::adapters::publish;
use crate::cli::Cli;
use crate::core::diagnose::{diagnose, render_diagnosis};
use crate::core::pipeline::resolve_mapping;
use crate::domain::result::Result;
use crate::schema::validate::field_values;
use crate::schema::FieldKind;
use crate::secrets::Secret;
use crate::source::ResolvedMapping;
use clap::Args;

/// Arguments for the check command
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Also report undeclared keys found in override files
    #[arg(long)]
    pub strict: bool,

    /// Print the diagnosis as JSON
    #[arg(long)]
    pub json: bool,

    /// Fetch every secret field from its backend
    #[arg(long)]
    pub resolve_secrets: bool,
}

impl CheckArgs {
    /// Execute the check command
    pub async fn execute(&self, cli: &Cli) -> anyhow::Result<i32> {
        let ctx = match CommandContext::open(cli) {
            Ok(ctx) => ctx,
            Err(e) => return Ok(report(&e)),
        };
        let options = ctx.options.clone().strict(self.strict || ctx.options.strict);

        tracing::info!(
            base = %options.base.display(),
            env = options.env.as_deref().unwrap_or("-"),
            strict = options.strict,
            "Checking configuration"
        );

        let mapping = match resolve_mapping(&options) {
            Ok(mapping) => mapping,
            Err(e) => return Ok(report(&e)),
        };
        let diagnosis = diagnose(&mapping, &ctx.schema, options.strict);

        if self.json {
            println!("{}", serde_json::to_string_pretty(&diagnosis)?);
        } else {
            print!(
                "{}",
                render_diagnosis(&diagnosis, &ctx.schema, &options.delimiter)
            );
        }

        if !diagnosis.passed() {
            return Ok(1);
        }

        if self.resolve_secrets {
            if let Err(e) = resolve_secret_fields(&ctx, &mapping).await {
                return Ok(report(&e));
            }
            if !self.json {
                println!("✓ All secret references resolved");
            }
        }

        Ok(0)
    }
}

/// Fetches every secret field once; stops at the first failure
async fn resolve_secret_fields(ctx: &CommandContext, mapping: &ResolvedMapping) -> Result<()> {
    // `env` references read the mapping being checked
    publish(mapping);

    let values = field_values(mapping, &ctx.schema);
    for field in ctx.schema.fields() {
        if field.kind != FieldKind::Secret {
            continue;
        }
        let Some(raw) = values.get(&field.name) else {
            continue;
        };
        let secret = Secret::parse(raw)?;
        if let Some(reference) = secret.reference() {
            tracing::debug!(field = %field.name, backend = reference.backend(), "Resolving secret field");
        }
        secret.resolve().await?;
    }
    Ok(())
}
