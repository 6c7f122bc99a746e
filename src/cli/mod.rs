//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Strata using clap.
//! The schema is read from a TOML manifest (see [`crate::schema::manifest`]).

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Strata - layered configuration resolution
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(version, about, long_about = None)]
#[command(author = "Strata Contributors")]
pub struct Cli {
    /// Path to the schema manifest
    #[arg(short, long, default_value = "strata.toml", env = "STRATA_SCHEMA", global = true)]
    pub schema: PathBuf,

    /// Base override file (default .env)
    #[arg(short, long, env = "STRATA_BASE_FILE", global = true)]
    pub base: Option<PathBuf>,

    /// Environment name selecting {base}.{env}
    #[arg(short, long, env = "STRATA_ENV", global = true)]
    pub env: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "STRATA_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Report present, defaulted, missing and unknown variables
    Check(commands::check::CheckArgs),

    /// Run the full pipeline including type coercion
    Validate(commands::validate::ValidateArgs),

    /// Print resolved values and where each came from
    Show(commands::show::ShowArgs),

    /// Write a .env.example template
    Generate(commands::generate::GenerateArgs),

    /// Write Markdown documentation for every variable
    Docs(commands::docs::DocsArgs),

    /// Describe a single variable
    Explain(commands::explain::ExplainArgs),
}
