use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::StepError;

/// One unit of domain work executed inside the shared transaction.
///
/// `D` is the shared request data and `S` the session handle of the
/// transactional resource. A step writes through the session it is given and
/// may mutate declared fields of the data; it never sees the coordinator, so
/// it cannot flush, commit or roll back.
///
/// Returning an error aborts and rolls back the whole run, whichever step
/// produced it. A failure that must not roll the run back (a best-effort
/// notification, say) has to be handled inside the step.
#[async_trait]
pub trait Step<D, S>: Send + Sync
where
    D: Send,
    S: Send,
{
    /// Name used in logs and failure reports.
    fn name(&self) -> &str;

    /// Performs the step's work.
    ///
    /// Cancellation is checked by the orchestrator between steps; a
    /// long-running step may also check `cancel` and return
    /// [`StepError::Cancelled`].
    async fn execute(
        &self,
        session: &mut S,
        data: &mut D,
        cancel: &CancellationToken,
    ) -> Result<(), StepError>;
}
