mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;
use log::info;

use finsight::config::load_settings;
use finsight::logging::{init_logging, LogFormat};

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(LogFormat::from_env(), cli.verbose) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> finsight::Result<()> {
    let settings = load_settings(cli.config.as_deref())?;
    info!("Starting Finsight v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Serve { bind, workers } => commands::serve(settings, bind, workers).await,
        Command::Worker { workers } => commands::worker(settings, workers).await,
        Command::Analyze { file, query } => {
            commands::analyze(settings, &file, query.as_deref()).await
        }
    }
}
