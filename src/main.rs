use anyhow::{Context, Result};
use clap::Parser;
use openerz_mcp::config::ServerConfig;
use openerz_mcp::mcp::Dispatcher;
use openerz_mcp::router::create_app_router;
use openerz_mcp::state::AppState;
use openerz_mcp::tools::{create_registry, OpenErzClient, TecdottirClient, UpstreamClient};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::parse();
    init_tracing(config.verbose);
    config.validate()?;

    let stations = config.stations();
    let calendar = OpenErzClient::new(
        UpstreamClient::new("OpenERZ", config.upstream_timeout())
            .context("failed to build OpenERZ HTTP client")?,
        &config.openerz_api_url,
    );
    let weather = TecdottirClient::new(
        UpstreamClient::new("Tecdottir", config.upstream_timeout())
            .context("failed to build Tecdottir HTTP client")?,
        &config.tecdottir_api_url,
        stations.clone(),
    );

    let registry = create_registry(Arc::new(calendar), Arc::new(weather))?;
    info!(
        tools = registry.len(),
        stations = %stations.join(","),
        openerz = %config.openerz_api_url,
        tecdottir = %config.tecdottir_api_url,
        "Tool registry ready"
    );

    // Initialize application state
    let dispatcher = Dispatcher::new(Arc::new(registry), config.call_timeout());
    let state = Arc::new(AppState::new(dispatcher));

    // Build application router with all routes and middleware
    let app = create_app_router(state);

    // Start the server
    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "openerz_mcp=debug,tower_http=debug"
    } else {
        "openerz_mcp=info,tower_http=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
