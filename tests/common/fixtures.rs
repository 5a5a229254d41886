#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use pathfill::records::{ActionNode, StepRecord};
use pathfill::types::{ExitId, NodeId, StepKind};

pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

pub fn action_node(node: NodeId, exit: ExitId) -> ActionNode {
    ActionNode {
        node,
        exit: Some(exit),
    }
}

pub fn rule_step(node: NodeId, exit: ExitId, at: i64) -> StepRecord {
    StepRecord {
        node,
        kind: StepKind::Rule,
        rule_exit: Some(exit),
        arrived_on: ts(at),
    }
}

pub fn action_step(node: NodeId, at: i64) -> StepRecord {
    StepRecord {
        node,
        kind: StepKind::Action,
        rule_exit: None,
        arrived_on: ts(at),
    }
}

/// `n` action steps over one node, arriving one second apart.
pub fn action_steps(node: NodeId, n: usize) -> Vec<StepRecord> {
    (0..n).map(|i| action_step(node, i as i64)).collect()
}
