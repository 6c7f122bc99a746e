use clap::Parser;
use std::process;
use strata::cli::{Cli, Commands};
use strata::logging::{init_logging, LoggingOptions};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Console-only logging for the CLI; RUST_LOG still takes precedence
    let log_level = cli.log_level.as_deref().unwrap_or("warn");
    let guard = match init_logging(&LoggingOptions::new(log_level)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(e.exit_code());
        }
    };

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Strata");

    let exit_code = match execute_command(&cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command execution failed");
            eprintln!("Error: {e}");
            5
        }
    };

    drop(guard);
    process::exit(exit_code);
}

/// Execute the CLI command
async fn execute_command(cli: &Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Check(args) => args.execute(cli).await,
        Commands::Validate(args) => args.execute(cli).await,
        Commands::Show(args) => args.execute(cli).await,
        Commands::Generate(args) => args.execute(cli).await,
        Commands::Docs(args) => args.execute(cli).await,
        Commands::Explain(args) => args.execute(cli).await,
    }
}
