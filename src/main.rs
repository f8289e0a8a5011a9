//! jellyreaper - stop idle media server sessions
//!
//! Main entry point. Meant to be invoked by cron; exits 0 when the run
//! completes (even if some sessions could not be stopped) and non-zero on
//! configuration, authentication, network, or protocol failure.

use std::process::ExitCode;

use jellyreaper::cli::Cli;
use jellyreaper::client::JellyfinClient;
use jellyreaper::config::Config;
use jellyreaper::error::{exit_code_for, Result};
use jellyreaper::logging::init_logging;
use jellyreaper::reaper::Reaper;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let cli = Cli::parse_args();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code_for(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Load and validate configuration before touching the network
    let config = Config::load(&cli)?;
    let settings = config.validate()?;

    init_logging(&config.logging)?;

    tracing::info!("Starting jellyreaper");
    tracing::info!("Server: {}", settings.server_url);
    tracing::info!("Timeout: {} minutes", settings.idle_timeout.num_minutes());
    if settings.dry_run {
        tracing::info!("Dry run: no session will be stopped");
    }
    tracing::debug!(
        missing_activity = %settings.missing_activity,
        include_stopped = settings.include_stopped,
        max_concurrent = settings.max_concurrent_terminations,
        "Evaluation policy"
    );

    let client = JellyfinClient::new(&settings)?;
    let run_interval = settings.run_interval;
    let reaper = Reaper::new(settings, client);
    let output = cli.output;

    match run_interval {
        None => {
            let summary = reaper.run_once().await?;
            summary.print(output)?;
        }
        Some(period) => {
            reaper
                .run_periodically(period, shutdown_signal(), |summary| {
                    if let Err(e) = summary.print(output) {
                        tracing::warn!("Failed to print summary: {}", e);
                    }
                })
                .await;
        }
    }

    Ok(())
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl-C, shutting down");
}
