use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;

/// Record instrument measurements into rotating segment files and upload
/// them to a remote document store.
#[derive(Parser)]
#[command(name = "firth")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "firth.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write an example configuration file
    Init,
    /// Verify store connectivity and credentials
    Check,
    /// Record payload bytes from stdin into rotating segments
    Record {
        /// Extra metadata fields as key=value pairs
        #[arg(short, long = "field", value_name = "KEY=VALUE")]
        fields: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    diagnostics::init_diagnostics();
    let cli = Cli::parse();

    match cli.command {
        Command::Init => commands::init::run(&cli.config),
        Command::Check => commands::check::run(&cli.config).await,
        Command::Record { fields } => commands::record::run(&cli.config, &fields).await,
    }
}
