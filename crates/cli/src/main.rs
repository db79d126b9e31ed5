//! Caduceus CLI: the main entry point.
//!
//! Commands:
//! - `serve`  : Start the HTTP API server
//! - `ask`    : Answer one question and print the reply
//! - `prompt` : Show the grounded, budget-fitted prompt without generating
//! - `doctor` : Diagnose configuration, generator and cache

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "caduceus",
    about = "Caduceus: evidence-grounded clinical chat",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs (and `prompt` output) as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Config file (default: ~/.caduceus/config.toml)
    #[arg(short, long, global = true, env = "CADUCEUS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Answer a single question
    Ask {
        #[arg(short, long)]
        message: String,

        /// JSON file holding prior turns: `[{"user": "...", "ai": "..."}]`
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Print the evidence, trim steps and final prompt without generating
    Prompt {
        #[arg(short, long)]
        message: String,

        /// JSON file holding prior turns
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Diagnose system health
    Doctor,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing. Logs go to stderr so command output stays clean.
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if cli.json {
        builder.json().init();
    } else {
        builder.init();
    }

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Ask { message, history } => {
            commands::ask::run(config_path, &message, history.as_deref()).await?
        }
        Commands::Prompt { message, history } => {
            commands::prompt::run(config_path, &message, history.as_deref(), cli.json).await?
        }
        Commands::Doctor => commands::doctor::run(config_path).await?,
    }

    Ok(())
}
