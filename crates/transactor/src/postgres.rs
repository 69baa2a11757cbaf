use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::{RecordSession, ResourceError, Result, TransactionalResource};

/// PostgreSQL-backed transactional resource.
///
/// Each session is a pooled `sqlx` transaction. Records live in the
/// `records` table whose primary key is deferred, so duplicate keys surface
/// on flush (`SET CONSTRAINTS ALL IMMEDIATE`) or on commit.
#[derive(Clone)]
pub struct PostgresResource {
    pool: PgPool,
}

impl PostgresResource {
    /// Creates a new PostgreSQL resource.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// A session on a [`PostgresResource`].
pub struct PgSession {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    /// Returns the connection of the open transaction.
    ///
    /// Steps may run arbitrary queries on it; finalizing the transaction is
    /// reserved to the resource.
    pub fn connection(&mut self) -> Result<&mut PgConnection> {
        self.tx.as_deref_mut().ok_or(ResourceError::SessionClosed)
    }
}

/// Maps a deferred-constraint failure to a constraint violation.
fn map_constraint(e: sqlx::Error) -> ResourceError {
    if let sqlx::Error::Database(ref db_err) = e
        && let Some(constraint) = db_err.constraint()
    {
        return ResourceError::Constraint {
            constraint: constraint.to_string(),
            detail: db_err.message().to_string(),
        };
    }
    ResourceError::Database(e)
}

#[async_trait]
impl TransactionalResource for PostgresResource {
    type Session = PgSession;

    async fn begin(&self) -> Result<PgSession> {
        let tx = self.pool.begin().await?;
        Ok(PgSession { tx: Some(tx) })
    }

    async fn flush(&self, session: &mut PgSession) -> Result<()> {
        let conn = session.connection()?;

        sqlx::query("SET CONSTRAINTS ALL IMMEDIATE")
            .execute(&mut *conn)
            .await
            .map_err(map_constraint)?;

        // Later writes in the same session are deferred again
        sqlx::query("SET CONSTRAINTS ALL DEFERRED")
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    async fn commit(&self, session: &mut PgSession) -> Result<()> {
        let tx = session.tx.take().ok_or(ResourceError::SessionClosed)?;
        // A failed commit drops the transaction, which rolls it back.
        tx.commit().await.map_err(map_constraint)
    }

    async fn rollback(&self, session: &mut PgSession) -> Result<()> {
        match session.tx.take() {
            Some(tx) => Ok(tx.rollback().await?),
            // Already finalized by a failed commit
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RecordSession for PgSession {
    async fn fetch(&mut self, collection: &str, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.connection()?;
        let value = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT value FROM records WHERE collection = $1 AND key = $2",
        )
        .bind(collection)
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(value)
    }

    async fn fetch_for_update(
        &mut self,
        collection: &str,
        key: &str,
    ) -> Result<Option<serde_json::Value>> {
        let conn = self.connection()?;
        // Blocks until concurrent holders of the row commit or roll back
        let value = sqlx::query_scalar::<_, serde_json::Value>(
            "SELECT value FROM records WHERE collection = $1 AND key = $2 FOR UPDATE",
        )
        .bind(collection)
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(value)
    }

    async fn insert(&mut self, collection: &str, key: &str, value: serde_json::Value) -> Result<()> {
        let conn = self.connection()?;
        sqlx::query("INSERT INTO records (collection, key, value) VALUES ($1, $2, $3)")
            .bind(collection)
            .bind(key)
            .bind(value)
            .execute(&mut *conn)
            .await
            .map_err(map_constraint)?;

        Ok(())
    }

    async fn upsert(&mut self, collection: &str, key: &str, value: serde_json::Value) -> Result<()> {
        let conn = self.connection()?;

        // ON CONFLICT cannot use a deferrable key as arbiter
        let updated = sqlx::query(
            r#"
            UPDATE records SET value = $3, updated_at = now()
            WHERE collection = $1 AND key = $2
            "#,
        )
        .bind(collection)
        .bind(key)
        .bind(&value)
        .execute(&mut *conn)
        .await?;

        if updated.rows_affected() == 0 {
            sqlx::query("INSERT INTO records (collection, key, value) VALUES ($1, $2, $3)")
                .bind(collection)
                .bind(key)
                .bind(value)
                .execute(&mut *conn)
                .await
                .map_err(map_constraint)?;
        }

        Ok(())
    }
}
