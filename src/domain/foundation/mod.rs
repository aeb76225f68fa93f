//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, the state machine trait and the error types
//! that form the vocabulary of the bridge.

mod errors;
mod ids;
mod state_machine;

pub use errors::{BridgeError, ValidationError};
pub use ids::SessionId;
pub use state_machine::StateMachine;
