//! Explain command implementation
//!
//! Describes one declared variable. The source line is shown when the
//! override files resolve cleanly; a broken file does not hide the schema
//! information.

use super::{report, CommandContext};
use crate::cli::Cli;
use crate::core::diagnose::explain;
use crate::core::pipeline::resolve_mapping;
use clap::Args;

/// Arguments for the explain command
#[derive(Args, Debug)]
pub struct ExplainArgs {
    /// Variable name (case-insensitive)
    pub variable: String,
}

impl ExplainArgs {
    /// Execute the explain command
    pub async fn execute(&self, cli: &Cli) -> anyhow::Result<i32> {
        let ctx = match CommandContext::open(cli) {
            Ok(ctx) => ctx,
            Err(e) => return Ok(report(&e)),
        };

        let mapping = match resolve_mapping(&ctx.options) {
            Ok(mapping) => Some(mapping),
            Err(e) => {
                tracing::warn!(error = %e, "Sources unavailable, explaining without them");
                None
            }
        };

        match explain(&ctx.schema, &self.variable.to_uppercase(), mapping.as_ref()) {
            Ok(text) => {
                print!("{text}");
                Ok(0)
            }
            Err(e) => Ok(report(&e)),
        }
    }
}
