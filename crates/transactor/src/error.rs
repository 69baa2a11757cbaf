use thiserror::Error;

use crate::state::SessionState;

/// Errors raised by an underlying transactional resource.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A write violated a constraint when it was pushed to the resource.
    #[error("Constraint violation ({constraint}): {detail}")]
    Constraint { constraint: String, detail: String },

    /// The session was already committed or rolled back.
    #[error("Session is closed")]
    SessionClosed,

    /// The resource could not perform the operation.
    #[error("Resource unavailable: {0}")]
    Unavailable(String),
}

/// Errors raised by the transaction coordinator.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// An operation was invoked in a state that does not allow it.
    #[error("Invalid transaction usage: cannot {operation} while session is {state}")]
    Usage {
        operation: &'static str,
        state: SessionState,
    },

    /// An operation was invoked after the coordinator was released.
    #[error("Coordinator already released: cannot {operation}")]
    Released { operation: &'static str },

    /// The underlying resource failed.
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// Commit failed. The session was rolled back; `rollback` holds the
    /// error of that rollback attempt if it failed as well.
    #[error("Commit failed: {source}{}", rollback_suffix(.rollback))]
    CommitFailed {
        #[source]
        source: ResourceError,
        rollback: Option<ResourceError>,
    },
}

impl CoordinatorError {
    /// Returns true for errors caused by calling the coordinator incorrectly.
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            CoordinatorError::Usage { .. } | CoordinatorError::Released { .. }
        )
    }
}

fn rollback_suffix(rollback: &Option<ResourceError>) -> String {
    match rollback {
        Some(e) => format!(" (rollback also failed: {e})"),
        None => String::new(),
    }
}

/// Result type for resource operations.
pub type Result<T> = std::result::Result<T, ResourceError>;
