use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Result;

/// An underlying resource that hands out transactional sessions.
///
/// The resource is the only thing allowed to finalize a session. Code that
/// performs domain work receives the `Session` handle alone, so it can write
/// through the session but never commit or roll it back.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait TransactionalResource: Send + Sync {
    /// Connection-bound transaction handle.
    type Session: Send;

    /// Opens a connection-bound transaction.
    async fn begin(&self) -> Result<Self::Session>;

    /// Pushes buffered writes to the resource without ending the transaction.
    ///
    /// Deferred constraints are checked here, so a violation surfaces before
    /// the irreversible commit.
    async fn flush(&self, session: &mut Self::Session) -> Result<()>;

    /// Makes every write of the session durable.
    async fn commit(&self, session: &mut Self::Session) -> Result<()>;

    /// Discards every write of the session.
    async fn rollback(&self, session: &mut Self::Session) -> Result<()>;

    /// Drops a session that was never finalized.
    ///
    /// Called from synchronous cleanup paths where no rollback can be
    /// awaited. Implementations must leave no write of the session visible.
    fn abandon(&self, session: Self::Session) {
        drop(session);
    }
}

/// Keyed JSON records reachable through an open session.
///
/// Records live in named collections. Reads observe the session's own
/// unflushed writes.
#[async_trait]
pub trait RecordSession: Send {
    /// Reads a record, returning None if it does not exist.
    async fn fetch(&mut self, collection: &str, key: &str) -> Result<Option<serde_json::Value>>;

    /// Reads a record the session intends to overwrite.
    ///
    /// Until the session ends, no other session may commit a different value
    /// for the record. Implementations either lock it or reject the later
    /// flush/commit with [`ResourceError::Constraint`](crate::ResourceError::Constraint).
    async fn fetch_for_update(
        &mut self,
        collection: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>>;

    /// Inserts a new record.
    ///
    /// A duplicate key is reported when the write is flushed or committed.
    async fn insert(&mut self, collection: &str, key: &str, value: serde_json::Value)
    -> Result<()>;

    /// Inserts a record or replaces an existing one.
    async fn upsert(&mut self, collection: &str, key: &str, value: serde_json::Value)
    -> Result<()>;
}

/// Extension trait providing typed convenience methods for record sessions.
#[async_trait]
pub trait RecordSessionExt: RecordSession {
    /// Reads and deserializes a record.
    async fn fetch_as<T>(&mut self, collection: &str, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.fetch(collection, key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Reads and deserializes a record the session intends to overwrite.
    async fn fetch_for_update_as<T>(&mut self, collection: &str, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.fetch_for_update(collection, key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    /// Serializes and inserts a record.
    async fn insert_as<T>(&mut self, collection: &str, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(value)?;
        self.insert(collection, key, value).await
    }

    /// Serializes and upserts a record.
    async fn upsert_as<T>(&mut self, collection: &str, key: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(value)?;
        self.upsert(collection, key, value).await
    }
}

// Blanket implementation for all RecordSession implementations
impl<S: RecordSession + ?Sized> RecordSessionExt for S {}
