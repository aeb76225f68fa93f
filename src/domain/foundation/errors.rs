//! Error types shared by the bridge.

use thiserror::Error;

use crate::ports::DatabaseError;

/// Errors raised while validating domain rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

impl ValidationError {
    /// Creates an invalid transition error.
    pub fn invalid_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        ValidationError::InvalidTransition {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Errors surfaced while serving a bridged session.
///
/// Inside the receive loop every variant is turned into a single
/// `{"error": <Display>}` frame and the session carries on. Only
/// connect-time failures end a session with an error.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The inbound frame is not a JSON array with a leading string.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The statement's placeholders do not line up with its arguments.
    #[error("{0}")]
    InvalidStatement(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Raised by an application command handler.
    #[error("{0}")]
    Handler(String),

    /// Raised by an on-connect or on-disconnect hook.
    #[error("{0}")]
    Hook(String),

    /// The outbound writer has gone away; nothing more can reach the client.
    #[error("outbound stream closed")]
    OutboundClosed,
}

impl BridgeError {
    /// Wraps any displayable error raised by a command handler.
    pub fn handler(err: impl std::fmt::Display) -> Self {
        BridgeError::Handler(err.to_string())
    }

    /// Wraps any displayable error raised by a session hook.
    pub fn hook(err: impl std::fmt::Display) -> Self {
        BridgeError::Hook(err.to_string())
    }
}
