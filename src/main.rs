pub mod api;
pub mod config;
pub mod data_structures;
pub mod error;
pub mod trend;
pub mod upstream;

#[cfg(test)]
mod test_support;

use crate::data_structures::AppState;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let app_config = config::AppConfig::load()?;

    // Initialize tracing with node_name in all logs
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    // Set a global span with node_name for all subsequent logs
    let _span = tracing::info_span!("node", name = %app_config.node_name).entered();

    tracing::info!("Starting cryptotrend-proxy");
    tracing::info!(environment = %app_config.environment, port = app_config.port, "Loaded configuration");
    tracing::info!(
        news_api = %app_config.upstream.news_api_url,
        market_api = %app_config.upstream.market_api_url,
        timeout_secs = app_config.upstream.timeout.as_secs(),
        "Configured upstream APIs"
    );
    if app_config.upstream.uses_placeholder_token() {
        tracing::warn!("CRYPTOPANIC_API_KEY is not set; /news will fail upstream authentication");
    }

    let app_state = AppState::new(&app_config)?;
    let app = api::router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], app_config.port));
    tracing::info!(%addr, "Server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(?e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, gracefully stopping");
}
