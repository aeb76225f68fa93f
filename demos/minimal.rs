//! Minimal bridge.
//!
//! ```text
//! $ PGWEBSOCKET__DATABASE__URL=postgres://postgres@localhost/postgres \
//!     cargo run --example minimal
//! $ wscat --connect localhost:9000/
//! > ["SELECT pg_notify(%s, %s);", "clients", "hi"]
//! < hi
//! > ["test", "hi"]
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::net::TcpListener;

use pgwebsocket::adapters::postgres::PostgresConnector;
use pgwebsocket::adapters::websocket::{bridge_router, BridgeState};
use pgwebsocket::application::{CommandRegistry, SessionCoordinator};
use pgwebsocket::config::AppConfig;
use pgwebsocket::domain::foundation::BridgeError;
use pgwebsocket::ports::{CommandHandler, DatabaseConnection, SessionHooks};

struct ListenClients;

#[async_trait]
impl SessionHooks for ListenClients {
    async fn on_connect(&self, conn: &dyn DatabaseConnection) -> Result<(), BridgeError> {
        tracing::info!("client connected");
        conn.execute("LISTEN clients;", &[]).await?;
        Ok(())
    }
}

/// Swallows `["test", ...]` without touching the database.
struct Test;

#[async_trait]
impl CommandHandler for Test {
    async fn handle(&self, _conn: &dyn DatabaseConnection, args: &[Value]) -> Result<bool, BridgeError> {
        tracing::debug!(args = ?args, "test command");
        Ok(true)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("debug").init();

    let config = AppConfig::load()?;
    config.validate()?;

    let mut registry = CommandRegistry::new();
    registry.register("test", Test);

    let coordinator = SessionCoordinator::new(
        Arc::new(PostgresConnector::new(&config.database)),
        Arc::new(registry),
        Arc::new(ListenClients),
    );
    let app = bridge_router("/").with_state(BridgeState::new(Arc::new(coordinator)));

    let listener = TcpListener::bind(("0.0.0.0", 9000)).await?;
    tracing::info!("listening on 0.0.0.0:9000");
    axum::serve(listener, app).await?;
    Ok(())
}
