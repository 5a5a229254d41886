//! The [`FlowStore`] trait and its in-memory implementation.
//!
//! A `FlowStore` gives the job its three read-only lookups (action nodes, run
//! ids, runs with steps) and the single write it performs (the serialized
//! path, as a partial update). Implementations guarantee:
//!
//! - `run_ids_after` returns only runs of active flows, ascending.
//! - `fetch_runs` returns steps ordered by arrival time.
//! - `write_path` touches the path field only, never other run columns.

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::records::{ActionNode, FlowRun, StepRecord};
use crate::types::RunId;

/// Errors surfaced by flow record stores.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("store backend error: {message}")]
    #[diagnostic(
        code(pathfill::store::backend),
        help("Check that the database is reachable and the schema is initialized.")
    )]
    Backend { message: String },

    #[error("stored record could not be decoded: {message}")]
    #[diagnostic(
        code(pathfill::store::decode),
        help("The row does not match the expected column shape; inspect the offending table.")
    )]
    Decode { message: String },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Record source and path writer for the backfill job.
///
/// The trait is deliberately minimal: the job needs exactly these four
/// operations and nothing else about the surrounding schema.
#[async_trait]
pub trait FlowStore: Send + Sync {
    /// All action nodes from the flow definitions.
    async fn load_action_nodes(&self) -> Result<Vec<ActionNode>>;

    /// Ids of runs belonging to active flows, ascending. When `after` is
    /// given, only ids strictly greater than it are returned (resume
    /// semantics).
    async fn run_ids_after(&self, after: Option<RunId>) -> Result<Vec<RunId>>;

    /// Bulk-fetch the given runs with their steps pre-ordered by arrival
    /// time. One backend round-trip per batch, never one per run.
    async fn fetch_runs(&self, ids: &[RunId]) -> Result<Vec<FlowRun>>;

    /// Persist a run's serialized path. Partial update: only the path field
    /// changes.
    async fn write_path(&self, id: RunId, path_json: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct InMemoryFlowState {
    action_nodes: Vec<ActionNode>,
    // run id -> (active flow?, steps, written path)
    runs: FxHashMap<i64, SeededRun>,
    fetched: Vec<RunId>,
    writes: u64,
}

#[derive(Debug, Default)]
struct SeededRun {
    active: bool,
    steps: Vec<StepRecord>,
    path: Option<String>,
}

/// Volatile [`FlowStore`] used in tests and development.
///
/// Besides the trait surface it records which run ids were fetched and how
/// many path writes happened, so tests can assert resume and idempotence
/// behavior directly.
#[derive(Debug, Default)]
pub struct InMemoryFlowStore {
    state: Mutex<InMemoryFlowState>,
}

impl InMemoryFlowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the seeded action nodes.
    pub fn set_action_nodes(&self, nodes: Vec<ActionNode>) {
        self.state.lock().unwrap().action_nodes = nodes;
    }

    /// Seed one run. `active` marks the owning flow's active flag.
    pub fn insert_run(&self, id: RunId, active: bool, steps: Vec<StepRecord>) {
        self.state.lock().unwrap().runs.insert(
            id.as_i64(),
            SeededRun {
                active,
                steps,
                path: None,
            },
        );
    }

    /// The path written for `id`, if any.
    #[must_use]
    pub fn path_of(&self, id: RunId) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .runs
            .get(&id.as_i64())
            .and_then(|r| r.path.clone())
    }

    /// Total number of `write_path` calls observed.
    #[must_use]
    pub fn write_count(&self) -> u64 {
        self.state.lock().unwrap().writes
    }

    /// Every run id passed to `fetch_runs`, in call order.
    #[must_use]
    pub fn fetched_ids(&self) -> Vec<RunId> {
        self.state.lock().unwrap().fetched.clone()
    }
}

#[async_trait]
impl FlowStore for InMemoryFlowStore {
    async fn load_action_nodes(&self) -> Result<Vec<ActionNode>> {
        Ok(self.state.lock().unwrap().action_nodes.clone())
    }

    async fn run_ids_after(&self, after: Option<RunId>) -> Result<Vec<RunId>> {
        let state = self.state.lock().unwrap();
        let floor = after.map(|id| id.as_i64());
        let mut ids: Vec<i64> = state
            .runs
            .iter()
            .filter(|(id, run)| run.active && floor.is_none_or(|f| **id > f))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        Ok(ids.into_iter().map(RunId::new).collect())
    }

    async fn fetch_runs(&self, ids: &[RunId]) -> Result<Vec<FlowRun>> {
        let mut state = self.state.lock().unwrap();
        state.fetched.extend_from_slice(ids);
        let mut runs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(seeded) = state.runs.get(&id.as_i64()) {
                let mut steps = seeded.steps.clone();
                steps.sort_by_key(|s| s.arrived_on);
                runs.push(FlowRun { id: *id, steps });
            }
        }
        Ok(runs)
    }

    async fn write_path(&self, id: RunId, path_json: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let run = state
            .runs
            .get_mut(&id.as_i64())
            .ok_or_else(|| StoreError::Backend {
                message: format!("unknown run {id}"),
            })?;
        run.path = Some(path_json.to_string());
        state.writes += 1;
        Ok(())
    }
}
