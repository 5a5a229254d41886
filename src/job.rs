//! The resumable backfill job.
//!
//! [`BackfillJob::run`] walks every run of every active flow, rebuilds its
//! path from historical step records, and persists the result, advancing a
//! checkpoint after each run so an interrupted job resumes where it stopped.
//!
//! # Failure model
//!
//! Two kinds of failure, no middle ground:
//!
//! - A configuration error (an action node without an exit id) aborts before
//!   any mutation.
//! - Any store failure mid-run propagates and halts the job. The checkpoint
//!   holds the last committed run id, so a re-run resumes correctly; there is
//!   no per-run retry, backoff, or quarantine — resumability substitutes for
//!   retry.
//!
//! # Ordering
//!
//! Runs are processed in strictly ascending id order. That ordering is what
//! makes the checkpoint a valid resume marker: every run at or below it is
//! fully processed.

use miette::Diagnostic;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument};

use crate::path::{ExitMapError, NodeExitMap, build_path, trim_path};
use crate::persistence::{PersistenceError, encode_path};
use crate::progress::ProgressEstimator;
use crate::stores::{CheckpointError, CheckpointStore, FlowStore, StoreError};
use crate::types::RunId;

/// Runs fetched per batch. Large enough to amortize query round-trips,
/// small enough to keep a batch's records in memory.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Errors that can halt a backfill.
#[derive(Debug, Error, Diagnostic)]
pub enum BackfillError {
    /// The flow definitions are incomplete; nothing was written.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Configuration(#[from] ExitMapError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Summary of a completed backfill.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackfillReport {
    /// Runs that were in scope for this invocation.
    pub runs_total: u64,
    /// Runs whose path was written.
    pub runs_updated: u64,
    /// Runs whose path exceeded the cap and was trimmed.
    pub paths_trimmed: u64,
    /// Checkpoint found at startup, if the job resumed.
    pub resumed_from: Option<RunId>,
    /// Wall-clock duration of the whole job.
    pub elapsed: Duration,
}

/// Resumable batch backfill of run paths.
///
/// The job owns nothing but its collaborators: a [`FlowStore`] for records
/// and the path write, and a [`CheckpointStore`] for the resume marker.
///
/// # Examples
///
/// ```rust
/// use pathfill::job::BackfillJob;
/// use pathfill::stores::{InMemoryCheckpointStore, InMemoryFlowStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), pathfill::job::BackfillError> {
/// let flows = InMemoryFlowStore::new();
/// let checkpoint = InMemoryCheckpointStore::new();
/// let report = BackfillJob::new(&flows, &checkpoint).run().await?;
/// assert_eq!(report.runs_updated, 0);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BackfillJob<'a, S, C> {
    store: &'a S,
    checkpoint: &'a C,
    batch_size: usize,
}

impl<'a, S, C> BackfillJob<'a, S, C>
where
    S: FlowStore,
    C: CheckpointStore,
{
    #[must_use]
    pub fn new(store: &'a S, checkpoint: &'a C) -> Self {
        Self {
            store,
            checkpoint,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Override the batch size (clamped to at least 1).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Run the backfill to completion.
    ///
    /// Side effects: each eligible run's path is written exactly once, and
    /// the checkpoint advances after every run. Progress is logged per batch.
    ///
    /// # Errors
    ///
    /// [`BackfillError::Configuration`] before any mutation when the flow
    /// definitions are incomplete; otherwise the first store error
    /// encountered, with the checkpoint left at the last committed run.
    #[instrument(skip(self), err)]
    pub async fn run(&self) -> Result<BackfillReport, BackfillError> {
        let action_nodes = self.store.load_action_nodes().await?;
        if action_nodes.is_empty() {
            info!("no action nodes found, nothing to backfill");
            return Ok(BackfillReport::default());
        }
        info!(count = action_nodes.len(), "found action nodes");

        // Fail-fast: refuse to start against incomplete flow definitions.
        let exits = NodeExitMap::from_action_nodes(&action_nodes)?;

        let resumed_from = self.checkpoint.get().await?;
        if let Some(highpoint) = resumed_from {
            info!(%highpoint, "resuming from previous highpoint");
        }

        info!("fetching runs that need to be backfilled");
        let run_ids = self.store.run_ids_after(resumed_from).await?;
        let total = run_ids.len() as u64;
        info!(count = total, "found runs that need to be backfilled");

        let progress = ProgressEstimator::start(total);
        let mut updated: u64 = 0;
        let mut trimmed: u64 = 0;

        for id_batch in run_ids.chunks(self.batch_size) {
            let batch = self.store.fetch_runs(id_batch).await?;

            for run in &batch {
                let mut path = build_path(&run.steps, &exits);
                if trim_path(&mut path) {
                    trimmed += 1;
                }
                let path_json = encode_path(&path)?;
                self.store.write_path(run.id, &path_json).await?;

                // Committed: everything at or below run.id is now done.
                self.checkpoint.set(run.id).await?;
            }

            updated += batch.len() as u64;
            let snap = progress.snapshot(updated);
            let eta = snap
                .eta
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string());
            info!(
                processed = snap.processed,
                total = snap.total,
                per_sec = %format!("{:.2}", snap.per_sec),
                est_finish = %eta,
                "updated runs"
            );
        }

        let elapsed = progress.elapsed();
        info!(
            elapsed_mins = elapsed.as_secs() / 60,
            paths_trimmed = trimmed,
            "run path backfill completed"
        );

        Ok(BackfillReport {
            runs_total: total,
            runs_updated: updated,
            paths_trimmed: trimmed,
            resumed_from,
            elapsed,
        })
    }
}
