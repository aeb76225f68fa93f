//! pgwebsocket - bridge WebSocket clients to PostgreSQL
//!
//! Each client connection gets its own database connection. Inbound JSON
//! arrays are either intercepted by a registered command handler or run
//! as parameterised SQL, with every non-empty first column streamed back
//! as one text frame. Notifications received on the connection (via
//! `LISTEN`) are forwarded to the client verbatim.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
