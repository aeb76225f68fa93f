//! Domain layer containing the bridge vocabulary.
//!
//! # Module Organization
//!
//! - `foundation` - Identifiers, state machine trait, error types
//! - `protocol` - Wire frames, inbound message decoding, statement parameters
//! - `session` - Session lifecycle state

pub mod foundation;
pub mod protocol;
pub mod session;
