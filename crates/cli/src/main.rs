use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
use commands::{run_check_config, run_watch, WatchArgs};

#[derive(Parser)]
#[command(name = "chainwatch")]
#[command(about = "Chain monitor for Ethereum-compatible JSON-RPC nodes")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Follow the chain and stream block events to the log
    Watch(WatchArgs),

    /// Load and validate a config file, printing the effective configuration
    CheckConfig {
        /// Path to the TOML config file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch(args) => run_watch(args).await,
        Commands::CheckConfig { config } => run_check_config(&config),
    }
}
