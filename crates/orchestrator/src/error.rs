//! Orchestration error types.

use thiserror::Error;
use transactor::{CoordinatorError, ResourceError};

/// Failure reported by a step.
///
/// Every variant aborts the run; there is no non-fatal channel. A step that
/// wants to tolerate a problem must handle it internally and return `Ok`.
#[derive(Debug, Error)]
pub enum StepError {
    /// A business rule was violated.
    #[error("{0}")]
    Domain(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The shared session rejected a read or write.
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// The step observed cancellation and stopped.
    #[error("Step cancelled")]
    Cancelled,
}

impl StepError {
    /// Wraps a domain error, keeping it available for downcasting.
    pub fn domain(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        StepError::Domain(err.into())
    }

    /// Returns the domain error if it is of type `E`.
    pub fn downcast_domain<E: std::error::Error + 'static>(&self) -> Option<&E> {
        match self {
            StepError::Domain(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

/// Failure of an orchestration run. The run was rolled back.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A step failed; later steps did not run.
    #[error("Step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: StepError,
    },

    /// Cancellation was observed before the named stage.
    #[error("Run cancelled before {stage}")]
    Cancelled { stage: String },

    /// The transaction could not be started, flushed or committed.
    #[error("Transaction error: {0}")]
    Transaction(#[from] CoordinatorError),

    /// The run failed and the rollback that followed failed too.
    #[error("{primary}; rollback also failed: {rollback}")]
    RollbackFailed {
        #[source]
        primary: Box<OrchestratorError>,
        rollback: CoordinatorError,
    },
}

impl OrchestratorError {
    /// Returns the error that caused the run to fail.
    pub fn primary(&self) -> &OrchestratorError {
        match self {
            OrchestratorError::RollbackFailed { primary, .. } => primary.primary(),
            other => other,
        }
    }

    /// Returns the name of the step that failed, if a step caused the failure.
    pub fn failed_step(&self) -> Option<&str> {
        match self.primary() {
            OrchestratorError::StepFailed { step, .. } => Some(step),
            _ => None,
        }
    }

    /// Returns the step error, if a step caused the failure.
    pub fn step_error(&self) -> Option<&StepError> {
        match self.primary() {
            OrchestratorError::StepFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Returns the rollback error reported alongside the primary failure.
    pub fn rollback_error(&self) -> Option<&CoordinatorError> {
        match self {
            OrchestratorError::RollbackFailed { rollback, .. } => Some(rollback),
            _ => None,
        }
    }

    /// Returns true if the run was stopped by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.primary(),
            OrchestratorError::Cancelled { .. }
                | OrchestratorError::StepFailed {
                    source: StepError::Cancelled,
                    ..
                }
        )
    }
}

/// Convenience type alias for orchestration results.
pub type Result<T> = std::result::Result<T, OrchestratorError>;
