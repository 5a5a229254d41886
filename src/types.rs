//! Core identifier types for the pathfill backfill job.
//!
//! This module defines the fundamental types used throughout the crate to
//! identify runs, nodes, and exits in flow-execution history. These are the
//! domain concepts every other module speaks in.
//!
//! # Key Types
//!
//! - [`RunId`]: Identifies one execution instance of a flow
//! - [`NodeId`]: Identifies a node in a flow graph
//! - [`ExitId`]: Identifies the edge taken when leaving a node
//! - [`StepKind`]: Discriminates decision ("rule") steps from action steps
//!
//! # Examples
//!
//! ```rust
//! use pathfill::types::{RunId, StepKind};
//!
//! let run = RunId::new(42);
//! assert_eq!(run.to_string(), "42");
//! assert_eq!(run.as_i64(), 42);
//!
//! // Persisted string form round-trips
//! let kind = StepKind::Rule;
//! assert_eq!(StepKind::decode(kind.encode()), Some(StepKind::Rule));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one execution instance of a flow.
///
/// Run ids are assigned by the record store in insertion order, which is what
/// makes "strictly greater than the checkpoint" a valid resume predicate.
///
/// # Examples
///
/// ```rust
/// use pathfill::types::RunId;
///
/// let id = RunId::new(7);
/// assert!(id < RunId::new(8));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(i64);

impl RunId {
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RunId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifies a node in a flow graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    #[must_use]
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a fresh random node id (fixtures and tests).
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for NodeId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Identifies the edge taken when leaving a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExitId(Uuid);

impl ExitId {
    #[must_use]
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Generate a fresh random exit id (fixtures and tests).
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ExitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ExitId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Discriminates the two kinds of step a run can record.
///
/// Rule steps carry their own exit reference (the rule that matched); action
/// steps resolve their exit through the node-exit map built from the flow
/// definitions.
///
/// # Persistence
///
/// `StepKind` supports serialization through both serde and the
/// [`encode`](Self::encode)/[`decode`](Self::decode) methods used by the
/// durable store backends.
///
/// # Examples
///
/// ```rust
/// use pathfill::types::StepKind;
///
/// assert_eq!(StepKind::Rule.encode(), "rule");
/// assert_eq!(StepKind::decode("action"), Some(StepKind::Action));
/// assert_eq!(StepKind::decode("bogus"), None);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// A visit to a decision node; the step records which rule exit matched.
    Rule,
    /// A visit to an action node; the exit comes from the flow definition.
    Action,
}

impl StepKind {
    /// Encode a StepKind into its persisted string form.
    #[must_use]
    pub fn encode(&self) -> &'static str {
        match self {
            StepKind::Rule => "rule",
            StepKind::Action => "action",
        }
    }

    /// Decode a persisted string form back into a StepKind.
    ///
    /// Returns `None` for unrecognized forms; durable stores treat that as a
    /// decode error rather than guessing.
    #[must_use]
    pub fn decode(s: &str) -> Option<Self> {
        match s {
            "rule" => Some(StepKind::Rule),
            "action" => Some(StepKind::Action),
            _ => None,
        }
    }

    /// Returns `true` if this is a [`Rule`](Self::Rule) step.
    #[must_use]
    pub fn is_rule(&self) -> bool {
        matches!(self, Self::Rule)
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.encode())
    }
}
