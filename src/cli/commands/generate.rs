//! Generate command implementation
//!
//! Writes a `.env.example` template from the manifest.

use super::{report, CommandContext};
use crate::cli::Cli;
use crate::schema::generate::generate_example;
use clap::Args;
use std::path::PathBuf;

/// Arguments for the generate command
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Path of the template to write
    #[arg(short, long, default_value = ".env.example")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl GenerateArgs {
    /// Execute the generate command
    pub async fn execute(&self, cli: &Cli) -> anyhow::Result<i32> {
        let ctx = match CommandContext::open(cli) {
            Ok(ctx) => ctx,
            Err(e) => return Ok(report(&e)),
        };

        match generate_example(&ctx.schema, &self.output, &ctx.options.delimiter, self.force) {
            Ok(()) => {
                println!("✅ Template written: {}", self.output.display());
                println!();
                println!("Next steps:");
                println!("  1. Copy {} to .env", self.output.display());
                println!("  2. Fill in the required values");
                println!("  3. Verify: strata check");
                Ok(0)
            }
            Err(e) => Ok(report(&e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_args_creation() {
        let args = GenerateArgs {
            output: PathBuf::from(".env.example"),
            force: false,
        };
        let _ = format!("{args:?}");
    }
}
