/*!
Persistence primitives for serializing/deserializing run paths (used by the
store backends and by anything else that needs the on-disk path shape).

Design Goals:
- Provide explicit serde-friendly structs decoupled from the in-memory
  [`PathEntry`] representation.
- Keep conversion logic localized (From / TryFrom impls) so store code is
  lean and declarative.
- Pin the wire format: a path persists as a JSON array of objects with keys
  `node_uuid`, `arrived_on` (RFC 3339), and `exit_uuid` (omitted when the
  exit was unresolvable).

This module intentionally does NOT perform I/O. It is pure data
transformation and (de)serialization glue.
*/

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::path::PathEntry;
use crate::types::{ExitId, NodeId};

/// Persisted shape of a single path entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersistedPathEntry {
    pub node_uuid: NodeId,
    /// RFC 3339 string form of the arrival time (keeps `chrono::DateTime`
    /// out of the serialized shape).
    pub arrived_on: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_uuid: Option<ExitId>,
}

/// Conversion and serialization errors for persisted path models.
#[derive(Debug, Error, Diagnostic)]
pub enum PersistenceError {
    #[error("JSON serialization/deserialization failed: {source}")]
    #[diagnostic(
        code(pathfill::persistence::serde),
        help("Ensure the JSON structure matches the persisted path entry shape.")
    )]
    Serde {
        #[from]
        source: serde_json::Error,
    },

    #[error("invalid arrived_on timestamp: {value}")]
    #[diagnostic(
        code(pathfill::persistence::timestamp),
        help("arrived_on must be an RFC 3339 timestamp.")
    )]
    Timestamp { value: String },
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

impl From<&PathEntry> for PersistedPathEntry {
    fn from(entry: &PathEntry) -> Self {
        PersistedPathEntry {
            node_uuid: entry.node,
            arrived_on: entry.arrived_on.to_rfc3339(),
            exit_uuid: entry.exit,
        }
    }
}

impl TryFrom<PersistedPathEntry> for PathEntry {
    type Error = PersistenceError;

    fn try_from(p: PersistedPathEntry) -> Result<Self> {
        let arrived_on = DateTime::parse_from_rfc3339(&p.arrived_on)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| PersistenceError::Timestamp {
                value: p.arrived_on.clone(),
            })?;
        Ok(PathEntry {
            node: p.node_uuid,
            arrived_on,
            exit: p.exit_uuid,
        })
    }
}

/// Serialize a path to its wire form.
pub fn encode_path(path: &[PathEntry]) -> Result<String> {
    let persisted: Vec<PersistedPathEntry> = path.iter().map(PersistedPathEntry::from).collect();
    Ok(serde_json::to_string(&persisted)?)
}

/// Deserialize a path from its wire form.
pub fn decode_path(json: &str) -> Result<Vec<PathEntry>> {
    let persisted: Vec<PersistedPathEntry> = serde_json::from_str(json)?;
    persisted.into_iter().map(PathEntry::try_from).collect()
}
