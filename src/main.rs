use std::error::Error;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use pgwebsocket::adapters::postgres::PostgresConnector;
use pgwebsocket::adapters::websocket::{bridge_router, BridgeState};
use pgwebsocket::application::{CommandRegistry, ListenHooks, SessionCoordinator};
use pgwebsocket::config::AppConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    // RUST_LOG takes precedence over the configured filter
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));
    if config.is_production() {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!("pgwebsocket v{}", env!("CARGO_PKG_VERSION"));

    let channels = config.bridge.listen_channels_list();
    if !channels.is_empty() {
        tracing::info!(channels = ?channels, "sessions will listen on channels");
    }

    let coordinator = SessionCoordinator::new(
        Arc::new(PostgresConnector::new(&config.database)),
        Arc::new(CommandRegistry::new()),
        Arc::new(ListenHooks::new(channels)),
    )
    .with_keepalive_interval(config.bridge.keepalive_interval());

    let app = bridge_router(&config.server.path)
        .layer(TraceLayer::new_for_http())
        .with_state(BridgeState::new(Arc::new(coordinator)));

    let addr = config.server.socket_addr()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, path = %config.server.path, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
