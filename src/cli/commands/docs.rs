//! Docs command implementation

use super::{report, CommandContext};
use crate::cli::Cli;
use crate::schema::generate::generate_docs;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the docs command
#[derive(Args, Debug)]
pub struct DocsArgs {
    /// Path of the Markdown file to write
    #[arg(short, long, default_value = "CONFIG.md")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl DocsArgs {
    /// Execute the docs command
    pub async fn execute(&self, cli: &Cli) -> anyhow::Result<i32> {
        let ctx = match CommandContext::open(cli) {
            Ok(ctx) => ctx,
            Err(e) => return Ok(report(&e)),
        };

        match generate_docs(&ctx.schema, &self.output, &ctx.options.delimiter, self.force) {
            Ok(()) => {
                println!("✅ Documentation written: {}", self.output.display());
                Ok(0)
            }
            Err(e) => Ok(report(&e)),
        }
    }
}
