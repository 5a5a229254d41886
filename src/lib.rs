//! # Pathfill: Resumable Flow-Run Path Backfill
//!
//! Pathfill rebuilds the "path" of historical flow runs — the ordered,
//! capped sequence of visited nodes with arrival timestamps and exit markers
//! — from raw step records, and persists it back onto each run. Progress is
//! checkpointed after every run, so an interrupted job resumes at the next
//! unprocessed run instead of starting over.
//!
//! ## Core Concepts
//!
//! - **Runs**: One execution instance of a flow, with ordered step records
//! - **Steps**: One historical visit to a node (rule or action)
//! - **Paths**: Capped `{node, arrived, exit}` summaries of a run's history
//! - **Checkpoint**: Persisted id of the last fully processed run
//! - **Stores**: Pluggable record and checkpoint backends (in-memory, SQLite)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pathfill::job::BackfillJob;
//! use pathfill::stores::{SqliteCheckpointStore, SqliteFlowStore};
//!
//! # async fn example() -> miette::Result<()> {
//! let flows = SqliteFlowStore::connect("sqlite://flows.db").await?;
//! let checkpoint = SqliteCheckpointStore::connect("sqlite://flows.db").await?;
//!
//! let report = BackfillJob::new(&flows, &checkpoint).run().await?;
//! println!(
//!     "updated {} runs, trimmed {} paths",
//!     report.runs_updated, report.paths_trimmed
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure Model
//!
//! A configuration error (an action node without an exit id) aborts before
//! any mutation. Any later store failure halts the job with the checkpoint at
//! the last committed run; re-running resumes from there. There is no per-run
//! retry — resumability substitutes for it.
//!
//! ## Module Guide
//!
//! - [`types`] - Identifier types (`RunId`, `NodeId`, `ExitId`, `StepKind`)
//! - [`records`] - Read-only input record structs
//! - [`path`] - Path construction, the length cap, and trimming
//! - [`persistence`] - Serde models and the persisted path wire format
//! - [`stores`] - `FlowStore`/`CheckpointStore` traits and their backends
//! - [`progress`] - Throughput and ETA estimation for progress logs
//! - [`config`] - Environment-resolved configuration
//! - [`job`] - The `BackfillJob` orchestration

pub mod config;
pub mod job;
pub mod path;
pub mod persistence;
pub mod progress;
pub mod records;
pub mod stores;
pub mod types;

pub use config::BackfillConfig;
pub use job::{BackfillError, BackfillJob, BackfillReport};
pub use path::{PATH_MAX_STEPS, PathEntry};
pub use types::{ExitId, NodeId, RunId, StepKind};
