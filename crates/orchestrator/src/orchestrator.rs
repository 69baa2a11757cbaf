//! Orchestrator sequencing steps under one coordinated transaction.

use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use transactor::{TransactionCoordinator, TransactionalResource};

use crate::error::{OrchestratorError, Result};
use crate::state::RunState;
use crate::step::Step;

/// Summary of a committed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Final state of the run.
    pub state: RunState,
    /// Names of the executed steps, in execution order.
    pub steps: Vec<String>,
    /// Wall-clock time of the run.
    #[serde(rename = "duration_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
}

fn serialize_millis<S: serde::Serializer>(
    duration: &Duration,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_u128(duration.as_millis())
}

/// Runs an ordered list of steps against shared data, all or nothing.
///
/// Each call to [`process_request`](Self::process_request) is an independent
/// run with its own coordinator and session, so runs may execute
/// concurrently. Steps within one run execute strictly in order.
pub struct Orchestrator<R, D>
where
    R: TransactionalResource,
    D: Send,
{
    resource: R,
    steps: Vec<Box<dyn Step<D, R::Session>>>,
}

impl<R, D> Orchestrator<R, D>
where
    R: TransactionalResource + Clone,
    D: Send,
{
    /// Creates an orchestrator over an already-ordered list of steps.
    pub fn new(resource: R, steps: Vec<Box<dyn Step<D, R::Session>>>) -> Self {
        Self { resource, steps }
    }

    /// Appends a step after the ones already registered.
    pub fn with_step(mut self, step: impl Step<D, R::Session> + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    /// Returns the registered step names, in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    /// Returns the transactional resource runs are executed against.
    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Runs every step against `data` inside one transaction.
    ///
    /// On success the transaction is committed and a report returned. On any
    /// failure (a step error, a flush or commit error, or cancellation) the
    /// transaction is rolled back and the original failure returned; if that
    /// rollback fails as well, both are returned together.
    ///
    /// `cancel` is checked before every step, before `flush` and before
    /// `commit`. Once started, flush, commit and rollback run to completion:
    /// an interrupted commit would leave its outcome unknown, and rollback
    /// always runs, even for a cancelled run.
    #[tracing::instrument(skip_all, fields(steps = self.steps.len()))]
    pub async fn process_request(
        &self,
        data: &mut D,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        metrics::counter!("orchestration_runs_total").increment(1);
        let started = Instant::now();

        let mut coordinator = TransactionCoordinator::new(self.resource.clone());
        let outcome = self.run(&mut coordinator, data, cancel).await;
        let outcome = match outcome {
            Ok(steps) => Ok(steps),
            Err(err) => Err(Self::abort(&mut coordinator, err).await),
        };

        if let Err(e) = coordinator.release().await {
            tracing::error!(error = %e, "coordinator release failed");
        }

        let duration = started.elapsed();
        metrics::histogram!("orchestration_duration_seconds").record(duration.as_secs_f64());

        match outcome {
            Ok(steps) => {
                metrics::counter!("orchestration_committed").increment(1);
                tracing::info!(
                    state = %RunState::Committed,
                    duration_ms = duration.as_millis() as u64,
                    "run committed"
                );
                Ok(RunReport {
                    state: RunState::Committed,
                    steps,
                    duration,
                })
            }
            Err(err) => {
                metrics::counter!("orchestration_rolled_back").increment(1);
                tracing::warn!(
                    state = %RunState::RolledBack,
                    error = %err,
                    "run rolled back"
                );
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        coordinator: &mut TransactionCoordinator<R>,
        data: &mut D,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>> {
        coordinator.begin().await?;
        tracing::debug!(state = %RunState::Running, "run started");

        let mut completed = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            if cancel.is_cancelled() {
                return Err(OrchestratorError::Cancelled {
                    stage: format!("step '{}'", step.name()),
                });
            }

            tracing::debug!(step = step.name(), "step started");
            let session = coordinator.session()?;
            step.execute(session, data, cancel)
                .await
                .map_err(|source| OrchestratorError::StepFailed {
                    step: step.name().to_string(),
                    source,
                })?;
            completed.push(step.name().to_string());
        }

        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled {
                stage: "flush".to_string(),
            });
        }
        coordinator.flush().await?;

        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled {
                stage: "commit".to_string(),
            });
        }
        coordinator.commit().await?;

        Ok(completed)
    }

    /// Rolls back after a failure, keeping `err` as the primary cause.
    async fn abort(
        coordinator: &mut TransactionCoordinator<R>,
        err: OrchestratorError,
    ) -> OrchestratorError {
        match coordinator.rollback().await {
            Ok(()) => err,
            Err(rollback) => {
                tracing::error!(error = %err, rollback_error = %rollback, "rollback failed");
                OrchestratorError::RollbackFailed {
                    primary: Box::new(err),
                    rollback,
                }
            }
        }
    }
}
