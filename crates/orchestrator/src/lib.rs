//! Step orchestration under a single atomic transaction.
//!
//! An [`Orchestrator`] runs an explicit, ordered list of [`Step`]s against
//! shared request data. All steps write through one session owned by a
//! [`transactor::TransactionCoordinator`]:
//! 1. Begin the transaction
//! 2. Execute each step in order, stopping at the first failure
//! 3. Flush, then commit
//!
//! Any failure (or cancellation) rolls the whole run back. The coordinator
//! is released on every exit path.

pub mod error;
pub mod orchestrator;
pub mod state;
pub mod step;

pub use error::{OrchestratorError, StepError};
pub use orchestrator::{Orchestrator, RunReport};
pub use state::RunState;
pub use step::Step;
pub use tokio_util::sync::CancellationToken;
