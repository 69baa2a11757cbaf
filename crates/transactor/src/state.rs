//! Transaction session state machine.

use serde::{Deserialize, Serialize};

/// The state of a transaction session owned by a coordinator.
///
/// State transitions:
/// ```text
/// NotStarted ──► Active ──┬──► Committed
///                         └──► RolledBack
/// ```
///
/// Disposal is tracked by the coordinator itself so the terminal outcome
/// stays observable after release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SessionState {
    /// No session has been started yet.
    #[default]
    NotStarted,

    /// A session is open and accepting writes.
    Active,

    /// The session was committed (terminal state).
    Committed,

    /// The session was rolled back (terminal state).
    RolledBack,
}

impl SessionState {
    /// Returns true if a session can be started from this state.
    pub fn can_begin(&self) -> bool {
        matches!(self, SessionState::NotStarted)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Committed | SessionState::RolledBack)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::NotStarted => "NotStarted",
            SessionState::Active => "Active",
            SessionState::Committed => "Committed",
            SessionState::RolledBack => "RolledBack",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
