//! WebSocket adapter - the client-facing transport.
//!
//! ```text
//!  client ──ws──► axum upgrade ──► SessionCoordinator ──► DatabaseConnection
//!         ◄─ws──  OutboundWriter ◄── OutboundQueue ◄──────┘
//! ```

pub mod handler;

pub use handler::{bridge_router, inbound_frame, outbound_message, ws_handler, BridgeState};
