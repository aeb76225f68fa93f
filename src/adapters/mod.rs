//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the session engine to external systems:
//! - `postgres` - `tokio-postgres` connector (production)
//! - `memory` - scripted in-memory database (tests, demos)
//! - `websocket` - axum WebSocket transport

pub mod memory;
pub mod postgres;
pub mod websocket;

pub use memory::{InMemoryDatabase, ScriptedResponse};
pub use postgres::PostgresConnector;
pub use websocket::{bridge_router, BridgeState};
