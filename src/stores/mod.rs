//! Pluggable record and checkpoint stores for the backfill job.
//!
//! The job itself is store-agnostic: it reads flow-execution records through
//! [`FlowStore`] and persists its resume marker through [`CheckpointStore`].
//! Both traits ship with an in-memory implementation (testing and
//! development) and a SQLite implementation (durable, behind the `sqlite`
//! feature).
//!
//! # Architecture
//!
//! - **[`FlowStore`]** - Read-only record lookups plus the single path write
//! - **[`CheckpointStore`]** - Key-value get/set of the last processed run id
//! - **[`InMemoryFlowStore`]** / **[`InMemoryCheckpointStore`]** - Volatile
//!   backends that also count writes and fetches for tests
//! - **[`SqliteFlowStore`]** / **[`SqliteCheckpointStore`]** - sqlx-backed
//!   durable backends

pub mod checkpoint;
#[cfg(feature = "sqlite")]
pub mod checkpoint_sqlite;
pub mod flow;
#[cfg(feature = "sqlite")]
pub mod flow_sqlite;

pub use checkpoint::{
    CHECKPOINT_KEY, CHECKPOINT_TTL, CheckpointError, CheckpointStore, InMemoryCheckpointStore,
};
#[cfg(feature = "sqlite")]
pub use checkpoint_sqlite::SqliteCheckpointStore;
pub use flow::{FlowStore, InMemoryFlowStore, StoreError};
#[cfg(feature = "sqlite")]
pub use flow_sqlite::SqliteFlowStore;
