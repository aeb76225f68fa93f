//! Session lifecycle types.

mod state;

pub use state::SessionState;
