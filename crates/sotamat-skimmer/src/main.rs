mod cli;
mod config;
mod error;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use skimmer_core::{ConnectionSupervisor, ReportDispatcher, SkimmerConfig, UpstreamConnector};

use crate::cli::Cli;
use crate::error::{CliError, exit_code};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_from(cli::normalize_legacy_args(std::env::args_os()));

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
    std::process::exit(exit_code::SUCCESS);
}

fn init_tracing(config: &SkimmerConfig) {
    let filter = if config.debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn banner() -> String {
    format!(
        "SOTAmatSkimmer v{}, Copyright (c) 2023-2024 Brian Mathews, AB6D. \
         Licensed under the MIT License.",
        env!("CARGO_PKG_VERSION")
    )
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = config::resolve(&cli)?;
    init_tracing(&config);

    println!("{}", banner());
    println!("Link: {}", config.describe_link());

    let dispatcher = ReportDispatcher::from_config(&config)?;
    if !dispatcher.authenticate().await {
        return Err(CliError::AuthFailed {
            detail: format!("callsign {}", config.callsign),
        });
    }

    let connector = UpstreamConnector::from_config(&config)?;
    let supervisor = ConnectionSupervisor::new(config, connector, dispatcher);

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, shutting down");
                on_signal.cancel();
            }
            Err(e) => warn!(error = %e, "cannot listen for Ctrl-C"),
        }
    });

    supervisor.run(shutdown).await?;

    let stats = supervisor.stats();
    info!(
        attempts = stats.attempts,
        spots = stats.spots,
        matched = stats.matched,
        heartbeat_losses = stats.heartbeat_losses,
        "skimmer stopped"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_carries_version() {
        assert!(banner().starts_with(&format!("SOTAmatSkimmer v{}", env!("CARGO_PKG_VERSION"))));
    }
}
