//! Orchestration run state machine.

use serde::{Deserialize, Serialize};

/// The state of an orchestration run.
///
/// State transitions:
/// ```text
/// Idle ──► Running ──┬──► Committed
///                    └──► RolledBack
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum RunState {
    /// The run has not started yet.
    #[default]
    Idle,

    /// Steps are executing inside the transaction.
    Running,

    /// Every step succeeded and the transaction committed (terminal state).
    Committed,

    /// The run failed and the transaction was rolled back (terminal state).
    RolledBack,
}

impl RunState {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Committed | RunState::RolledBack)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "Idle",
            RunState::Running => "Running",
            RunState::Committed => "Committed",
            RunState::RolledBack => "RolledBack",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
