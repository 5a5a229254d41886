//! Read-only input records the backfill job consumes.
//!
//! These are statically-typed projections of the store's tables, carrying only
//! the fields the job needs. They are produced by a [`FlowStore`] and never
//! mutated; the single output field (`path` on a run) is written back through
//! [`FlowStore::write_path`] rather than through these structs.
//!
//! [`FlowStore`]: crate::stores::FlowStore
//! [`FlowStore::write_path`]: crate::stores::FlowStore::write_path

use chrono::{DateTime, Utc};

use crate::types::{ExitId, NodeId, RunId, StepKind};

/// One action node from the flow definitions: the node id and the exit taken
/// when leaving it.
///
/// A `None` exit is a data-integrity defect in the source tables; the job
/// refuses to start when it sees one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionNode {
    pub node: NodeId,
    pub exit: Option<ExitId>,
}

/// One historical visit to a node during a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StepRecord {
    /// The node that was visited.
    pub node: NodeId,
    /// Rule step or action step.
    pub kind: StepKind,
    /// The matching rule exit, present only on rule steps.
    pub rule_exit: Option<ExitId>,
    /// When the run arrived at this node.
    pub arrived_on: DateTime<Utc>,
}

/// One execution instance of a flow, with its steps in ascending arrival
/// order.
///
/// Stores guarantee the step ordering; the job relies on it and does not
/// re-sort.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowRun {
    pub id: RunId,
    pub steps: Vec<StepRecord>,
}
