//! HTTP route handlers.

pub mod health;
pub mod inventory;
pub mod metrics;
pub mod orders;

use serde::de::DeserializeOwned;
use transactor::{RecordSession, RecordSessionExt, TransactionCoordinator, TransactionalResource};

use crate::error::ApiError;

/// Reads one committed record through a short-lived session.
///
/// The session is rolled back and released before returning.
pub(crate) async fn read_record<R, T>(
    resource: &R,
    collection: &str,
    key: &str,
) -> Result<Option<T>, ApiError>
where
    R: TransactionalResource + Clone,
    R::Session: RecordSession,
    T: DeserializeOwned + Send,
{
    let mut coordinator = TransactionCoordinator::new(resource.clone());
    coordinator.begin().await?;

    let fetched = match coordinator.session() {
        Ok(session) => session
            .fetch_as::<T>(collection, key)
            .await
            .map_err(ApiError::from),
        Err(e) => Err(ApiError::from(e)),
    };
    let released = coordinator.release().await;

    let record = fetched?;
    released?;
    Ok(record)
}
