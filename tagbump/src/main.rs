mod config;
mod telemetry;

use clap::Parser;
use config::{Config, ConfigError};
use image_updater::RunError;
use image_updater::config::{Credentials, EnvError};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use telemetry::TelemetryError;

#[derive(Parser)]
#[command(name = "tagbump", version, about = "Moves matching services to a new image tag")]
enum CliCommand {
    /// Serve the update endpoint
    Serve {
        /// Optional YAML config file
        #[arg(long)]
        config_file: Option<PathBuf>,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Run(#[from] RunError),
}

fn main() -> ExitCode {
    let cli = CliCommand::parse();

    let result = match &cli {
        CliCommand::Serve { config_file } => serve(config_file.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Exiting");
            eprintln!("tagbump: {e}");
            ExitCode::FAILURE
        }
    }
}

fn serve(config_file: Option<&Path>) -> Result<(), CliError> {
    let mut config = Config::load(config_file)?;
    let _sentry = telemetry::init_logging(config.common.logging.as_ref())?;
    telemetry::init_metrics(config.common.metrics.as_ref())?;

    config.updater.apply_env(|name| std::env::var(name).ok())?;
    let credentials = Credentials::from_env()?;

    // Requests are served one task at a time; updates never run in parallel.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    tracing::info!("Starting tagbump");
    runtime.block_on(image_updater::run(
        config.updater,
        credentials,
        shutdown_signal(),
    ))?;
    tracing::info!("Stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
