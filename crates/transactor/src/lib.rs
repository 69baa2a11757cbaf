//! Transaction coordination over a single transactional resource.
//!
//! A [`TransactionCoordinator`] owns the begin/flush/commit/rollback/release
//! cycle of one session opened on a [`TransactionalResource`]. Two resources
//! are provided:
//! - [`InMemoryResource`] for tests and local runs
//! - [`PostgresResource`] backed by a `sqlx` connection pool

pub mod coordinator;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod resource;
pub mod state;

pub use coordinator::TransactionCoordinator;
pub use error::{CoordinatorError, ResourceError, Result};
pub use memory::{InMemoryResource, InMemorySession, ResourceOp};
pub use postgres::{PgSession, PostgresResource};
pub use resource::{RecordSession, RecordSessionExt, TransactionalResource};
pub use state::SessionState;
