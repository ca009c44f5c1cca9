//! CLI argument parsing with clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Clevert - install extensions and run their actions over batches of files
#[derive(Parser, Debug)]
#[command(name = "clevert")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration directory (default: ~/.clevert)
    #[arg(long, global = true, env = "CLEVERT_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version(VersionArgs),

    /// Run the HTTP host
    Serve(ServeArgs),

    /// Installed extension management
    #[command(subcommand)]
    Extension(ExtensionCommands),

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Preferred port; later ports are tried when it is taken
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    pub host: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum ExtensionCommands {
    /// List installed extensions
    List(ExtensionListArgs),

    /// Remove an installed extension version
    Remove(ExtensionRemoveArgs),
}

#[derive(Args, Debug)]
pub struct ExtensionListArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ExtensionRemoveArgs {
    /// Extension id
    pub id: String,

    /// Extension version
    #[arg(id = "ext_version", value_name = "VERSION")]
    pub version: String,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration as YAML
    Show,

    /// Print the configuration file path
    Path,
}
