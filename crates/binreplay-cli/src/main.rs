use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod commands;
mod env;
mod feed;

use binreplay_config::ReplayConfig;
use commands::{cmd_check_config, cmd_run, cmd_status};

#[derive(Parser)]
#[command(name = "binreplay")]
#[command(about = "Replay row-level replication events into a target database")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to binreplay.toml config file
    #[arg(short, long, global = true, default_value = "binreplay.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay change events into the target database
    Run {
        /// Newline-delimited JSON event feed (defaults to stdin)
        #[arg(long)]
        events: Option<PathBuf>,
    },

    /// Show recorded checkpoints
    Status,

    /// Validate the configuration file
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("binreplay=info".parse()?),
        )
        .init();

    env::load_dotenv_from_ancestors()?;

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Run { events } => cmd_run(config, events).await,
        Commands::Status => cmd_status(config),
        Commands::CheckConfig => cmd_check_config(config),
    }
}

fn load_config(path: &Path) -> Result<ReplayConfig> {
    ReplayConfig::load(path)
        .with_context(|| format!("Failed to load config file: {}", path.display()))
}
