//! Application layer - the per-session engine.
//!
//! This layer wires the domain protocol to the ports: it owns the session
//! lifecycle, dispatches inbound messages to command handlers or the
//! database, and funnels every outbound frame through a single writer.

mod command_registry;
mod event_forwarder;
mod keepalive;
mod listen_hooks;
mod outbound;
mod result_streamer;
mod session_coordinator;

pub use command_registry::CommandRegistry;
pub use event_forwarder::EventForwarder;
pub use keepalive::{KeepalivePulse, DEFAULT_KEEPALIVE_INTERVAL};
pub use listen_hooks::{quote_identifier, ListenHooks};
pub use outbound::{OutboundQueue, OutboundWriter};
pub use result_streamer::{ResultStreamer, StreamSummary};
pub use session_coordinator::{CloseReason, SessionCoordinator, SessionSummary};
