//! The [`CheckpointStore`] trait and its in-memory implementation.
//!
//! The checkpoint is a single persisted scalar: the id of the last fully
//! processed run. It is overwritten after every run, so a re-run of an
//! interrupted job resumes at the next higher id and already-processed runs
//! are skipped. Values carry a bounded time-to-live; a checkpoint older than
//! [`CHECKPOINT_TTL`] reads back as absent and the job starts from scratch.
//!
//! The job assumes exclusive ownership of the checkpoint key. Concurrent
//! invocations are unsupported and would race on it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

use crate::types::RunId;

/// Well-known key the job checkpoints under.
pub const CHECKPOINT_KEY: &str = "path_backfill_highpoint";

/// How long a checkpoint stays valid. A backfill abandoned for longer than
/// this restarts from the beginning.
pub const CHECKPOINT_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Errors surfaced by checkpoint stores.
#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointError {
    #[error("checkpoint backend error: {message}")]
    #[diagnostic(
        code(pathfill::checkpoint::backend),
        help("Check that the checkpoint store is reachable.")
    )]
    Backend { message: String },

    #[error("stored checkpoint value is not a run id: {value:?}")]
    #[diagnostic(
        code(pathfill::checkpoint::parse),
        help("Checkpoint values are decimal run ids; clear the key to start over.")
    )]
    Parse { value: String },
}

pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Key-value persistence of the last processed run id.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// The last processed run id, or `None` when no (unexpired) checkpoint
    /// exists.
    async fn get(&self) -> Result<Option<RunId>>;

    /// Record `id` as the last processed run, resetting the TTL.
    async fn set(&self, id: RunId) -> Result<()>;

    /// Drop the checkpoint so the next run starts from the beginning.
    async fn clear(&self) -> Result<()>;
}

/// Volatile [`CheckpointStore`] for tests and development.
#[derive(Debug)]
pub struct InMemoryCheckpointStore {
    slot: Mutex<Option<(RunId, DateTime<Utc>)>>,
    ttl: Duration,
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCheckpointStore {
    #[must_use]
    pub fn new() -> Self {
        Self::with_ttl(CHECKPOINT_TTL)
    }

    /// Override the TTL (expiry tests use sub-second values).
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            ttl,
        }
    }

    fn expires_at(&self) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::zero())
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn get(&self) -> Result<Option<RunId>> {
        let mut slot = self.slot.lock().unwrap();
        match *slot {
            Some((id, expires_at)) if expires_at > Utc::now() => Ok(Some(id)),
            Some(_) => {
                // Expired: behave as if never set.
                *slot = None;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, id: RunId) -> Result<()> {
        *self.slot.lock().unwrap() = Some((id, self.expires_at()));
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.slot.lock().unwrap() = None;
        Ok(())
    }
}
