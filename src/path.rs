//! Path construction and trimming.
//!
//! A *path* is the ordered, capped summary of a run's history: one entry per
//! visited node with the arrival timestamp and, where resolvable, the exit
//! taken. This module is pure — it turns step records into path entries and
//! enforces the length cap; serialization lives in [`crate::persistence`] and
//! I/O in [`crate::stores`].
//!
//! # Exit resolution
//!
//! - Rule steps carry their own exit (`rule_exit` on the step record).
//! - Action steps resolve their exit through the [`NodeExitMap`] built from
//!   the flow definitions.
//! - An unresolvable exit leaves the entry's `exit` field empty; it is not an
//!   error at this stage.
//!
//! # Examples
//!
//! ```rust
//! use chrono::Utc;
//! use pathfill::path::{NodeExitMap, PATH_MAX_STEPS, build_path};
//! use pathfill::records::{ActionNode, StepRecord};
//! use pathfill::types::{ExitId, NodeId, StepKind};
//!
//! let node = NodeId::random();
//! let exit = ExitId::random();
//! let map = NodeExitMap::from_action_nodes(&[ActionNode { node, exit: Some(exit) }]).unwrap();
//!
//! let steps = [StepRecord {
//!     node,
//!     kind: StepKind::Action,
//!     rule_exit: None,
//!     arrived_on: Utc::now(),
//! }];
//! let path = build_path(&steps, &map);
//! assert_eq!(path.len(), 1);
//! assert_eq!(path[0].exit, Some(exit));
//! assert!(PATH_MAX_STEPS >= path.len());
//! ```

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::records::{ActionNode, StepRecord};
use crate::types::{ExitId, NodeId};

/// Maximum number of entries kept in a persisted path.
///
/// Paths longer than this are trimmed to their most recent entries before
/// being written.
pub const PATH_MAX_STEPS: usize = 100;

/// One entry in a run's path: a visited node, when the run arrived there, and
/// the exit taken (when resolvable).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathEntry {
    pub node: NodeId,
    pub arrived_on: DateTime<Utc>,
    pub exit: Option<ExitId>,
}

/// Raised when the flow definitions are not in a state the backfill can run
/// against.
#[derive(Debug, Error, Diagnostic)]
pub enum ExitMapError {
    /// An action node has no exit id. The source data must be repaired before
    /// the job can run; starting anyway would persist incomplete paths.
    #[error("action node {node} has no exit id")]
    #[diagnostic(
        code(pathfill::path::missing_exit),
        help("Migrate the flow definitions forward so every action node carries an exit id.")
    )]
    MissingExit { node: NodeId },
}

/// Lookup table from action node id to the exit taken when leaving it.
///
/// Built once, up front, from every action node in the store. Construction is
/// fail-fast: a single node without an exit id aborts the whole job before it
/// writes anything.
#[derive(Clone, Debug, Default)]
pub struct NodeExitMap {
    exits: FxHashMap<NodeId, ExitId>,
}

impl NodeExitMap {
    /// Build the map from all action nodes.
    ///
    /// # Errors
    ///
    /// Returns [`ExitMapError::MissingExit`] naming the first node found
    /// without an exit id.
    pub fn from_action_nodes(nodes: &[ActionNode]) -> Result<Self, ExitMapError> {
        let mut exits = FxHashMap::default();
        for action in nodes {
            let exit = action
                .exit
                .ok_or(ExitMapError::MissingExit { node: action.node })?;
            exits.insert(action.node, exit);
        }
        Ok(Self { exits })
    }

    /// Exit for `node`, if the map knows one.
    #[must_use]
    pub fn exit_for(&self, node: NodeId) -> Option<ExitId> {
        self.exits.get(&node).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.exits.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exits.is_empty()
    }
}

/// Build a run's path from its steps, in the order given.
///
/// Callers pass steps already sorted by arrival time (the store contract);
/// the output preserves that order one-to-one. The result is untrimmed — see
/// [`trim_path`].
#[must_use]
pub fn build_path(steps: &[StepRecord], exits: &NodeExitMap) -> Vec<PathEntry> {
    steps
        .iter()
        .map(|step| {
            let exit = if step.kind.is_rule() {
                step.rule_exit
            } else {
                exits.exit_for(step.node)
            };
            PathEntry {
                node: step.node,
                arrived_on: step.arrived_on,
                exit,
            }
        })
        .collect()
}

/// Trim a path to the most recent [`PATH_MAX_STEPS`] entries.
///
/// Drops the oldest entries, keeping the retained suffix in its original
/// order. Returns `true` when anything was dropped so callers can count
/// trimmed runs.
pub fn trim_path(path: &mut Vec<PathEntry>) -> bool {
    if path.len() > PATH_MAX_STEPS {
        path.drain(..path.len() - PATH_MAX_STEPS);
        true
    } else {
        false
    }
}
