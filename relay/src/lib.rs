pub mod config;
pub mod devices;
pub mod lambda;
pub mod metrics_defs;
pub mod service;
pub mod upstream;

use config::{Listener, RelayConfig};
use service::{DiscoveryHandler, RelayService};
use shared::http::{run_http_service, serve_http};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(thiserror::Error, Debug)]
pub enum RelayError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Upstream(#[from] upstream::UpstreamError),
    #[error("lambda runtime error: {0}")]
    Lambda(String),
}

fn build_handler(config: &RelayConfig) -> Result<Arc<DiscoveryHandler>, RelayError> {
    if config.api_token.is_none() {
        tracing::warn!(
            "{} is not set, the device listing is served without authentication",
            config::INBOUND_TOKEN_ENV
        );
    }
    Ok(Arc::new(DiscoveryHandler::new(config)?))
}

/// Runs the relay as a standalone HTTP server until `shutdown` resolves.
pub async fn run<F>(
    listener: &Listener,
    config: &RelayConfig,
    shutdown: F,
) -> Result<(), RelayError>
where
    F: Future<Output = ()>,
{
    listener.validate()?;
    let service = RelayService::new(build_handler(config)?);
    tracing::info!(tailnet = %config.upstream.tailnet, "starting relay");
    run_http_service(&listener.host, listener.port, service, shutdown).await
}

/// Like [`run`], on a listener the caller already bound.
pub async fn run_on<F>(
    listener: TcpListener,
    config: &RelayConfig,
    shutdown: F,
) -> Result<(), RelayError>
where
    F: Future<Output = ()>,
{
    let service = RelayService::new(build_handler(config)?);
    serve_http(listener, service, shutdown).await
}

/// Runs the relay as an AWS Lambda HTTP handler.
pub async fn run_lambda(config: &RelayConfig) -> Result<(), RelayError> {
    tracing::info!(tailnet = %config.upstream.tailnet, "starting relay in lambda");
    lambda::serve(build_handler(config)?).await
}
