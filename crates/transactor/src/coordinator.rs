//! Transaction coordinator owning one session's lifecycle.

use crate::error::{CoordinatorError, ResourceError};
use crate::resource::TransactionalResource;
use crate::state::SessionState;

/// Single authority over one session's begin/flush/commit/rollback/release
/// cycle.
///
/// A coordinator drives at most one session. Every operation takes
/// `&mut self`, so two operations can never be in flight on the same
/// coordinator. `commit` is strict and fails on a finalized session, while
/// `rollback` is a no-op when there is nothing to roll back.
///
/// Callers should always finish with [`release`](Self::release). A
/// coordinator dropped while its session is still active abandons the
/// session through [`TransactionalResource::abandon`].
pub struct TransactionCoordinator<R: TransactionalResource> {
    resource: R,
    session: Option<R::Session>,
    state: SessionState,
    flushed: bool,
    released: bool,
}

impl<R: TransactionalResource> TransactionCoordinator<R> {
    /// Creates a coordinator over the given resource. No session is opened.
    pub fn new(resource: R) -> Self {
        Self {
            resource,
            session: None,
            state: SessionState::NotStarted,
            flushed: false,
            released: false,
        }
    }

    /// Returns the state of the coordinated session.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true iff a session exists and has not been finalized.
    pub fn is_active(&self) -> bool {
        !self.released && self.state == SessionState::Active
    }

    /// Returns true once [`release`](Self::release) has run.
    pub fn is_released(&self) -> bool {
        self.released
    }

    fn ensure_not_released(&self, operation: &'static str) -> Result<(), CoordinatorError> {
        if self.released {
            return Err(CoordinatorError::Released { operation });
        }
        Ok(())
    }

    fn ensure_active(&self, operation: &'static str) -> Result<(), CoordinatorError> {
        self.ensure_not_released(operation)?;
        if self.state != SessionState::Active {
            return Err(CoordinatorError::Usage {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    /// Returns the handle of the active session.
    ///
    /// Handing out the handle assumes new writes, so the next commit
    /// flushes again.
    pub fn session(&mut self) -> Result<&mut R::Session, CoordinatorError> {
        self.ensure_active("access session")?;
        self.flushed = false;
        self.session.as_mut().ok_or(CoordinatorError::Usage {
            operation: "access session",
            state: self.state,
        })
    }

    /// Starts the session.
    #[tracing::instrument(skip(self))]
    pub async fn begin(&mut self) -> Result<(), CoordinatorError> {
        self.ensure_not_released("begin")?;
        if !self.state.can_begin() {
            return Err(CoordinatorError::Usage {
                operation: "begin",
                state: self.state,
            });
        }

        let session = self.resource.begin().await?;
        self.session = Some(session);
        self.state = SessionState::Active;
        self.flushed = false;
        tracing::debug!("transaction started");
        Ok(())
    }

    /// Pushes pending writes to the resource without ending the transaction.
    #[tracing::instrument(skip(self))]
    pub async fn flush(&mut self) -> Result<(), CoordinatorError> {
        self.ensure_active("flush")?;
        if let Some(session) = self.session.as_mut() {
            self.resource.flush(session).await?;
        }
        self.flushed = true;
        Ok(())
    }

    /// Flushes if writes may be pending, then commits the session.
    ///
    /// If the resource fails, the session is rolled back before the failure
    /// is returned and ends up `RolledBack` whether or not that rollback
    /// succeeds.
    #[tracing::instrument(skip(self))]
    pub async fn commit(&mut self) -> Result<(), CoordinatorError> {
        self.ensure_active("commit")?;
        let Some(session) = self.session.as_mut() else {
            return Err(CoordinatorError::Usage {
                operation: "commit",
                state: self.state,
            });
        };

        if !self.flushed {
            let flushed = self.resource.flush(session).await;
            if let Err(e) = flushed {
                return Err(self.abort_commit(e).await);
            }
        }

        let committed = self.resource.commit(session).await;
        match committed {
            Ok(()) => {
                self.state = SessionState::Committed;
                tracing::info!("transaction committed");
                Ok(())
            }
            Err(e) => Err(self.abort_commit(e).await),
        }
    }

    async fn abort_commit(&mut self, source: ResourceError) -> CoordinatorError {
        metrics::counter!("transaction_commit_failures").increment(1);
        tracing::warn!(error = %source, "commit failed, rolling back");

        let rollback = match self.session.as_mut() {
            Some(session) => self.resource.rollback(session).await.err(),
            None => None,
        };
        self.state = SessionState::RolledBack;

        if let Some(ref e) = rollback {
            tracing::error!(error = %e, "rollback after failed commit also failed");
        }
        CoordinatorError::CommitFailed { source, rollback }
    }

    /// Rolls the session back.
    ///
    /// A no-op when no session is active. If the resource fails, the session
    /// is still considered `RolledBack` and the error is returned.
    #[tracing::instrument(skip(self))]
    pub async fn rollback(&mut self) -> Result<(), CoordinatorError> {
        self.ensure_not_released("rollback")?;
        if self.state != SessionState::Active {
            tracing::debug!(state = %self.state, "rollback skipped: no active session");
            return Ok(());
        }

        let result = match self.session.as_mut() {
            Some(session) => self.resource.rollback(session).await,
            None => Ok(()),
        };
        self.state = SessionState::RolledBack;

        match result {
            Ok(()) => {
                tracing::warn!("transaction rolled back");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "rollback failed");
                Err(e.into())
            }
        }
    }

    /// Rolls back an active session, then disposes it.
    ///
    /// Safe to call more than once; later calls are no-ops. Every other
    /// operation fails with a lifecycle error afterwards.
    pub async fn release(&mut self) -> Result<(), CoordinatorError> {
        if self.released {
            return Ok(());
        }
        let result = self.rollback().await;
        self.released = true;
        self.session = None;
        result
    }
}

impl<R: TransactionalResource> Drop for TransactionCoordinator<R> {
    fn drop(&mut self) {
        if self.state == SessionState::Active
            && let Some(session) = self.session.take()
        {
            tracing::warn!("coordinator dropped with an active session, abandoning it");
            self.resource.abandon(session);
            self.state = SessionState::RolledBack;
        }
    }
}
