//! SessionState enum for tracking the lifecycle of a bridged session.

use serde::Serialize;
use std::fmt;

use crate::domain::foundation::StateMachine;

/// Lifecycle state of one client session.
///
/// ```text
/// Connecting ──► Active ──► Closing ──► Closed
///      │                       ▲
///      └───────────────────────┘  (connect-time failure)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Connecting,
    Active,
    Closing,
    Closed,
}

impl StateMachine for SessionState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SessionState::*;
        matches!(
            (self, target),
            (Connecting, Active) | (Connecting, Closing) | (Active, Closing) | (Closing, Closed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SessionState::*;
        match self {
            Connecting => vec![Active, Closing],
            Active => vec![Closing],
            Closing => vec![Closed],
            Closed => vec![],
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Connecting => "Connecting",
            SessionState::Active => "Active",
            SessionState::Closing => "Closing",
            SessionState::Closed => "Closed",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_connecting() {
        assert_eq!(SessionState::default(), SessionState::Connecting);
    }

    #[test]
    fn happy_path_is_valid() {
        let state = SessionState::Connecting
            .transition_to(SessionState::Active)
            .and_then(|s| s.transition_to(SessionState::Closing))
            .and_then(|s| s.transition_to(SessionState::Closed));
        assert_eq!(state, Ok(SessionState::Closed));
    }

    #[test]
    fn connect_failure_skips_active() {
        assert!(SessionState::Connecting.can_transition_to(&SessionState::Closing));
    }

    #[test]
    fn closed_is_terminal() {
        assert!(SessionState::Closed.is_terminal());
        assert!(SessionState::Closed
            .transition_to(SessionState::Active)
            .is_err());
    }

    #[test]
    fn active_cannot_skip_closing() {
        assert!(!SessionState::Active.can_transition_to(&SessionState::Closed));
    }

    #[test]
    fn can_transition_to_is_consistent_with_valid_transitions() {
        for state in [
            SessionState::Connecting,
            SessionState::Active,
            SessionState::Closing,
            SessionState::Closed,
        ] {
            for target in state.valid_transitions() {
                assert!(state.can_transition_to(&target), "{} -> {}", state, target);
            }
        }
    }
}
