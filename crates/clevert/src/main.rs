//! Clevert CLI - local automation host
//!
//! This is the main entry point for the clevert command-line interface.

mod cli;
mod commands;
mod output;
mod version;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let config_dir = cli.config_dir.as_deref();
    match cli.command {
        Commands::Version(args) => commands::version::run(args),
        Commands::Serve(args) => commands::serve::run(args, config_dir).await,
        Commands::Extension(args) => commands::extension::run(args, config_dir).await,
        Commands::Config(args) => commands::config::run(args, config_dir),
    }
}

/// Initialize tracing with appropriate verbosity; `RUST_LOG` wins when set
fn init_tracing(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if quiet {
            EnvFilter::new("error")
        } else {
            match verbose {
                0 => EnvFilter::new("info"),
                1 => EnvFilter::new("debug"),
                _ => EnvFilter::new("trace"),
            }
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();
}
