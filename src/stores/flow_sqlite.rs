/*!
SQLite Flow Store

This module provides the `SqliteFlowStore` async implementation of the
[`FlowStore`] trait defined in `stores/flow.rs`.

## Behavior

- Schema initialization is idempotent (`CREATE TABLE IF NOT EXISTS`) and runs
  on connect; pools handed in through [`SqliteFlowStore::from_pool`] are
  assumed to point at an initialized database (call
  [`SqliteFlowStore::init_schema`] if not).
- Run-id scans join the flows table and return only runs of active flows, in
  ascending id order.
- Batch fetches issue exactly two queries per batch (runs, then steps) and
  group steps in memory, keeping per-run round-trips off the hot path.
- Path writes update the `path` column only.

## Design Goals

- Keep this module focused on database I/O; pure path serialization lives in
  the persistence module.
- Map every backend failure into [`StoreError::Backend`] with enough context
  to name the failing statement.

## Database Schema

- `flows(id, is_active)` — flow definitions; only the active flag matters
  here.
- `action_nodes(node_uuid, exit_uuid)` — action nodes and their exits.
- `runs(id, flow_id, path)` — one row per execution; `path` is the output
  column.
- `steps(id, run_id, node_uuid, kind, rule_exit_uuid, arrived_on)` — one row
  per node visit; `kind` is the encoded [`StepKind`] and `arrived_on` an
  RFC 3339 timestamp.
*/

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use sqlx::{Row, SqlitePool, sqlite::SqliteRow};
use tracing::instrument;
use uuid::Uuid;

use crate::records::{ActionNode, FlowRun, StepRecord};
use crate::stores::flow::{FlowStore, Result, StoreError};
use crate::types::{ExitId, NodeId, RunId, StepKind};

/// SQLite-backed [`FlowStore`].
pub struct SqliteFlowStore {
    /// Shared SQLite connection pool.
    pool: Arc<SqlitePool>,
}

impl std::fmt::Debug for SqliteFlowStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteFlowStore").finish()
    }
}

impl SqliteFlowStore {
    /// Connect (or create) a SQLite database at `database_url` and initialize
    /// the schema. Example URL: `"sqlite://flows.db"`.
    #[must_use = "store must be used to read records"]
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("connect error: {e}"),
            })?;
        let store = Self::from_pool(Arc::new(pool));
        store.init_schema().await?;
        Ok(store)
    }

    /// Wrap an existing pool (shared with other stores).
    #[must_use]
    pub fn from_pool(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Create the record tables if they do not exist. Safe to call multiple
    /// times.
    pub async fn init_schema(&self) -> Result<()> {
        for statement in [
            r#"
            CREATE TABLE IF NOT EXISTS flows (
                id INTEGER PRIMARY KEY,
                is_active INTEGER NOT NULL DEFAULT 1
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS action_nodes (
                node_uuid TEXT PRIMARY KEY,
                exit_uuid TEXT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY,
                flow_id INTEGER NOT NULL REFERENCES flows(id),
                path TEXT
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_runs_flow ON runs(flow_id)
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS steps (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id INTEGER NOT NULL REFERENCES runs(id),
                node_uuid TEXT NOT NULL,
                kind TEXT NOT NULL,
                rule_exit_uuid TEXT,
                arrived_on TEXT NOT NULL
            )
            "#,
            r#"
            CREATE INDEX IF NOT EXISTS idx_steps_run_arrived ON steps(run_id, arrived_on)
            "#,
        ] {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| StoreError::Backend {
                    message: format!("schema init: {e}"),
                })?;
        }
        Ok(())
    }
}

fn parse_uuid(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| StoreError::Decode {
        message: format!("{column} {value:?}: {e}"),
    })
}

fn step_from_row(row: &SqliteRow) -> Result<StepRecord> {
    let node: String = row.get("node_uuid");
    let kind: String = row.get("kind");
    let rule_exit: Option<String> = row.get("rule_exit_uuid");
    let arrived_on: DateTime<Utc> = row.try_get("arrived_on").map_err(|e| StoreError::Decode {
        message: format!("arrived_on: {e}"),
    })?;

    let kind = StepKind::decode(&kind).ok_or_else(|| StoreError::Decode {
        message: format!("unknown step kind {kind:?}"),
    })?;
    let rule_exit = rule_exit
        .map(|v| parse_uuid("rule_exit_uuid", &v).map(ExitId::new))
        .transpose()?;

    Ok(StepRecord {
        node: NodeId::new(parse_uuid("node_uuid", &node)?),
        kind,
        rule_exit,
        arrived_on,
    })
}

/// `?, ?, ...` fragment for an `IN` clause over `n` ids.
fn placeholders(n: usize) -> String {
    let mut s = String::with_capacity(n * 3);
    for i in 0..n {
        if i > 0 {
            s.push_str(", ");
        }
        s.push('?');
    }
    s
}

#[async_trait]
impl FlowStore for SqliteFlowStore {
    #[instrument(skip(self), err)]
    async fn load_action_nodes(&self) -> Result<Vec<ActionNode>> {
        let rows = sqlx::query("SELECT node_uuid, exit_uuid FROM action_nodes")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("select action nodes: {e}"),
            })?;

        let mut nodes = Vec::with_capacity(rows.len());
        for row in rows {
            let node: String = row.get("node_uuid");
            let exit: Option<String> = row.get("exit_uuid");
            nodes.push(ActionNode {
                node: NodeId::new(parse_uuid("node_uuid", &node)?),
                exit: exit
                    .map(|v| parse_uuid("exit_uuid", &v).map(ExitId::new))
                    .transpose()?,
            });
        }
        Ok(nodes)
    }

    #[instrument(skip(self), err)]
    async fn run_ids_after(&self, after: Option<RunId>) -> Result<Vec<RunId>> {
        let query = match after {
            Some(floor) => sqlx::query(
                r#"
                SELECT r.id FROM runs r
                JOIN flows f ON f.id = r.flow_id
                WHERE f.is_active = 1 AND r.id > ?1
                ORDER BY r.id
                "#,
            )
            .bind(floor.as_i64()),
            None => sqlx::query(
                r#"
                SELECT r.id FROM runs r
                JOIN flows f ON f.id = r.flow_id
                WHERE f.is_active = 1
                ORDER BY r.id
                "#,
            ),
        };
        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("select run ids: {e}"),
            })?;
        Ok(rows
            .iter()
            .map(|row| RunId::new(row.get::<i64, _>("id")))
            .collect())
    }

    #[instrument(skip(self, ids), fields(batch = ids.len()), err)]
    async fn fetch_runs(&self, ids: &[RunId]) -> Result<Vec<FlowRun>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let marks = placeholders(ids.len());

        let run_sql = format!("SELECT id FROM runs WHERE id IN ({marks}) ORDER BY id");
        let mut run_query = sqlx::query(&run_sql);
        for id in ids {
            run_query = run_query.bind(id.as_i64());
        }
        let run_rows = run_query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("select runs: {e}"),
            })?;

        let step_sql = format!(
            "SELECT run_id, node_uuid, kind, rule_exit_uuid, arrived_on \
             FROM steps WHERE run_id IN ({marks}) ORDER BY run_id, arrived_on, id"
        );
        let mut step_query = sqlx::query(&step_sql);
        for id in ids {
            step_query = step_query.bind(id.as_i64());
        }
        let step_rows = step_query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("select steps: {e}"),
            })?;

        let mut steps_by_run: FxHashMap<i64, Vec<StepRecord>> = FxHashMap::default();
        for row in &step_rows {
            let run_id: i64 = row.get("run_id");
            steps_by_run
                .entry(run_id)
                .or_default()
                .push(step_from_row(row)?);
        }

        Ok(run_rows
            .iter()
            .map(|row| {
                let id: i64 = row.get("id");
                FlowRun {
                    id: RunId::new(id),
                    steps: steps_by_run.remove(&id).unwrap_or_default(),
                }
            })
            .collect())
    }

    #[instrument(skip(self, path_json), err)]
    async fn write_path(&self, id: RunId, path_json: &str) -> Result<()> {
        sqlx::query("UPDATE runs SET path = ?1 WHERE id = ?2")
            .bind(path_json)
            .bind(id.as_i64())
            .execute(&*self.pool)
            .await
            .map_err(|e| StoreError::Backend {
                message: format!("update path: {e}"),
            })?;
        Ok(())
    }
}
