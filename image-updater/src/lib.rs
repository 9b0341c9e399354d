pub mod config;
pub mod errors;
pub mod image;
pub mod metrics_defs;
pub mod platform;
pub mod railway;
pub mod replicas;
pub mod request;
pub mod response;
pub mod service;
pub mod updater;

#[cfg(test)]
mod testutils;

use config::{Config, Credentials};
use errors::UpdaterError;
use platform::PlatformError;
use railway::RailwayClient;
use service::UpdaterService;
use shared::http::run_http_service;
use std::future::Future;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum RunError {
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ValidationError),
    #[error("could not create platform client: {0}")]
    Client(#[from] PlatformError),
    #[error("server error: {0}")]
    Server(#[from] UpdaterError),
}

/// Serves the updater until `shutdown` resolves.
pub async fn run<F>(config: Config, credentials: Credentials, shutdown: F) -> Result<(), RunError>
where
    F: Future<Output = ()>,
{
    config.validate()?;
    shared::metrics_defs::describe_all(metrics_defs::ALL_METRICS);

    let client = RailwayClient::new(&config.platform, credentials)?;
    tracing::info!(api_url = %config.platform.api_url, "Using deployment platform API");

    let service = UpdaterService::new(Arc::new(client));
    run_http_service(
        &config.listener.host,
        config.listener.port,
        service,
        shutdown,
    )
    .await?;

    Ok(())
}
