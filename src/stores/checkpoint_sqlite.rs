/*!
SQLite Checkpoint Store

This module provides the `SqliteCheckpointStore` async implementation of the
[`CheckpointStore`] trait defined in `stores/checkpoint.rs`.

## Behavior

- One row per key in `backfill_checkpoints`; the job uses the single
  well-known key [`CHECKPOINT_KEY`].
- Values are decimal run-id strings so they stay legible in ad-hoc queries.
- Every `set` refreshes `expires_at`; `get` deletes and ignores expired rows,
  so an abandoned backfill restarts from the beginning after the TTL.

## Database Schema

- `backfill_checkpoints.key` ← checkpoint key
- `backfill_checkpoints.value` ← decimal string of the last processed run id
- `backfill_checkpoints.expires_at` ← RFC 3339 expiry timestamp
*/

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use crate::stores::checkpoint::{
    CHECKPOINT_KEY, CHECKPOINT_TTL, CheckpointError, CheckpointStore, Result,
};
use crate::types::RunId;

/// SQLite-backed [`CheckpointStore`].
pub struct SqliteCheckpointStore {
    /// Shared SQLite connection pool.
    pool: Arc<SqlitePool>,
    key: String,
    ttl: Duration,
}

impl std::fmt::Debug for SqliteCheckpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCheckpointStore")
            .field("key", &self.key)
            .finish()
    }
}

impl SqliteCheckpointStore {
    /// Connect (or create) a SQLite database at `database_url` and initialize
    /// the schema.
    #[must_use = "store must be used to persist the checkpoint"]
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| CheckpointError::Backend {
                message: format!("connect error: {e}"),
            })?;
        let store = Self::from_pool(Arc::new(pool));
        store.init_schema().await?;
        Ok(store)
    }

    /// Wrap an existing pool (shared with the flow store).
    #[must_use]
    pub fn from_pool(pool: Arc<SqlitePool>) -> Self {
        Self {
            pool,
            key: CHECKPOINT_KEY.to_string(),
            ttl: CHECKPOINT_TTL,
        }
    }

    /// Override the TTL (expiry tests use sub-second values).
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Create the checkpoint table if it does not exist. Safe to call
    /// multiple times.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS backfill_checkpoints (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                expires_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| CheckpointError::Backend {
            message: format!("schema init: {e}"),
        })?;
        Ok(())
    }

    fn expires_at(&self) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero())
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    #[instrument(skip(self), err)]
    async fn get(&self) -> Result<Option<RunId>> {
        let row = sqlx::query(
            "SELECT value, expires_at FROM backfill_checkpoints WHERE key = ?1",
        )
        .bind(&self.key)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| CheckpointError::Backend {
            message: format!("select checkpoint: {e}"),
        })?;

        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at: DateTime<Utc> =
            row.try_get("expires_at")
                .map_err(|e| CheckpointError::Backend {
                    message: format!("expires_at read: {e}"),
                })?;
        if expires_at <= Utc::now() {
            self.clear().await?;
            return Ok(None);
        }

        let value: String = row.get("value");
        let id = value
            .parse::<i64>()
            .map_err(|_| CheckpointError::Parse { value })?;
        Ok(Some(RunId::new(id)))
    }

    #[instrument(skip(self), err)]
    async fn set(&self, id: RunId) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO backfill_checkpoints (key, value, expires_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at
            "#,
        )
        .bind(&self.key)
        .bind(id.to_string())
        .bind(self.expires_at())
        .execute(&*self.pool)
        .await
        .map_err(|e| CheckpointError::Backend {
            message: format!("upsert checkpoint: {e}"),
        })?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM backfill_checkpoints WHERE key = ?1")
            .bind(&self.key)
            .execute(&*self.pool)
            .await
            .map_err(|e| CheckpointError::Backend {
                message: format!("delete checkpoint: {e}"),
            })?;
        Ok(())
    }
}
