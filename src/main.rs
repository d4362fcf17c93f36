//! kvinstall - cluster installer
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use kvinstall::cli::{Cli, Commands};
use kvinstall::config::ConfigManager;
use kvinstall::error::KvinstallResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> KvinstallResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("kvinstall=warn"),
        1 => EnvFilter::new("kvinstall=info"),
        _ => EnvFilter::new("kvinstall=debug"),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if config.general.log_format == "json" {
        subscriber.json().init();
    } else {
        subscriber.without_time().init();
    }

    match cli.command {
        Commands::Create(args) => kvinstall::cli::commands::create(args, &config).await,
        Commands::Validate(args) => kvinstall::cli::commands::validate(args, &config).await,
        Commands::Destroy(args) => kvinstall::cli::commands::destroy(args, &config).await,
        Commands::Config(args) => {
            kvinstall::cli::commands::config(args, &config, &config_manager).await
        }
    }
}
