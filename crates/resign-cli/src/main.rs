use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{
    config::{handle_config_command, ConfigCommands},
    logs::handle_logs_command,
    run::{handle_run_command, RunArgs},
};

#[derive(Parser)]
#[command(name = "resign")]
#[command(about = "Re-sign the latest release of an iOS app and print its install link", long_about = None)]
struct Cli {
    /// Config file to use (overrides RESIGN_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download, re-sign and report the latest release
    Run(RunArgs),

    /// Extract errors and warnings from a build log
    Logs {
        /// Path to the build log
        file: PathBuf,
    },

    /// Manage CLI configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Show CLI version
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (doesn't override existing env vars)
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries the result
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resign_cli=info,resign_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => {
            let config_path = config::config_path(cli.config.as_deref())?;
            if !handle_run_command(&config_path, args).await? {
                std::process::exit(1);
            }
        }
        Commands::Logs { file } => handle_logs_command(&file).await?,
        Commands::Config(cmd) => {
            let config_path = config::config_path(cli.config.as_deref())?;
            handle_config_command(&config_path, cmd)?;
        }
        Commands::Version => println!("resign {}", resign_core::VERSION),
    }

    Ok(())
}
