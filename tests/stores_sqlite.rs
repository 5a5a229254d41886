#![cfg(feature = "sqlite")]

use std::sync::Arc;

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use pathfill::job::BackfillJob;
use pathfill::persistence::decode_path;
use pathfill::stores::{
    CheckpointStore, FlowStore, SqliteCheckpointStore, SqliteFlowStore,
};
use pathfill::types::{ExitId, NodeId, RunId, StepKind};

mod common;
use common::*;

async fn memory_pool() -> Arc<SqlitePool> {
    Arc::new(
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("connect sqlite memory"),
    )
}

async fn seed_flow(pool: &SqlitePool, id: i64, active: bool) {
    sqlx::query("INSERT INTO flows (id, is_active) VALUES (?1, ?2)")
        .bind(id)
        .bind(active as i64)
        .execute(pool)
        .await
        .expect("insert flow");
}

async fn seed_run(pool: &SqlitePool, id: i64, flow_id: i64) {
    sqlx::query("INSERT INTO runs (id, flow_id) VALUES (?1, ?2)")
        .bind(id)
        .bind(flow_id)
        .execute(pool)
        .await
        .expect("insert run");
}

async fn seed_step(
    pool: &SqlitePool,
    run_id: i64,
    node: NodeId,
    kind: StepKind,
    rule_exit: Option<ExitId>,
    at: i64,
) {
    sqlx::query(
        "INSERT INTO steps (run_id, node_uuid, kind, rule_exit_uuid, arrived_on) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
    )
    .bind(run_id)
    .bind(node.to_string())
    .bind(kind.encode())
    .bind(rule_exit.map(|e| e.to_string()))
    .bind(ts(at))
    .execute(pool)
    .await
    .expect("insert step");
}

async fn seed_action_node(pool: &SqlitePool, node: NodeId, exit: Option<ExitId>) {
    sqlx::query("INSERT INTO action_nodes (node_uuid, exit_uuid) VALUES (?1, ?2)")
        .bind(node.to_string())
        .bind(exit.map(|e| e.to_string()))
        .execute(pool)
        .await
        .expect("insert action node");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_ids_skip_inactive_flows_and_respect_the_floor() {
    let pool = memory_pool().await;
    let store = SqliteFlowStore::from_pool(Arc::clone(&pool));
    store.init_schema().await.expect("schema");

    seed_flow(&pool, 1, true).await;
    seed_flow(&pool, 2, false).await;
    seed_run(&pool, 10, 1).await;
    seed_run(&pool, 11, 2).await; // inactive flow, never in scope
    seed_run(&pool, 12, 1).await;
    seed_run(&pool, 13, 1).await;

    let all = store.run_ids_after(None).await.expect("scan");
    assert_eq!(
        all,
        vec![RunId::new(10), RunId::new(12), RunId::new(13)]
    );

    let resumed = store
        .run_ids_after(Some(RunId::new(12)))
        .await
        .expect("scan after");
    assert_eq!(resumed, vec![RunId::new(13)]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn fetched_runs_carry_steps_in_arrival_order() {
    let pool = memory_pool().await;
    let store = SqliteFlowStore::from_pool(Arc::clone(&pool));
    store.init_schema().await.expect("schema");

    seed_flow(&pool, 1, true).await;
    seed_run(&pool, 20, 1).await;
    seed_run(&pool, 21, 1).await;

    let node = NodeId::random();
    // Inserted out of order on purpose.
    seed_step(&pool, 20, node, StepKind::Action, None, 30).await;
    seed_step(&pool, 20, node, StepKind::Action, None, 10).await;
    seed_step(&pool, 20, node, StepKind::Action, None, 20).await;

    let runs = store
        .fetch_runs(&[RunId::new(20), RunId::new(21)])
        .await
        .expect("fetch");
    assert_eq!(runs.len(), 2);

    assert_eq!(runs[0].id, RunId::new(20));
    let arrivals: Vec<_> = runs[0].steps.iter().map(|s| s.arrived_on).collect();
    assert_eq!(arrivals, vec![ts(10), ts(20), ts(30)]);

    // A run without steps still comes back, empty.
    assert_eq!(runs[1].id, RunId::new(21));
    assert!(runs[1].steps.is_empty());

    assert!(store.fetch_runs(&[]).await.expect("empty fetch").is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn write_path_updates_only_the_path_column() {
    let pool = memory_pool().await;
    let store = SqliteFlowStore::from_pool(Arc::clone(&pool));
    store.init_schema().await.expect("schema");

    seed_flow(&pool, 3, true).await;
    seed_run(&pool, 30, 3).await;
    seed_run(&pool, 31, 3).await;

    store.write_path(RunId::new(30), "[]").await.expect("write");

    let row = sqlx::query("SELECT flow_id, path FROM runs WHERE id = 30")
        .fetch_one(&*pool)
        .await
        .expect("select");
    assert_eq!(row.get::<i64, _>("flow_id"), 3);
    assert_eq!(row.get::<Option<String>, _>("path"), Some("[]".to_string()));

    // The neighboring run is untouched.
    let row = sqlx::query("SELECT path FROM runs WHERE id = 31")
        .fetch_one(&*pool)
        .await
        .expect("select");
    assert_eq!(row.get::<Option<String>, _>("path"), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn action_nodes_load_with_and_without_exits() {
    let pool = memory_pool().await;
    let store = SqliteFlowStore::from_pool(Arc::clone(&pool));
    store.init_schema().await.expect("schema");

    let with_exit = NodeId::random();
    let without_exit = NodeId::random();
    let exit = ExitId::random();
    seed_action_node(&pool, with_exit, Some(exit)).await;
    seed_action_node(&pool, without_exit, None).await;

    let mut nodes = store.load_action_nodes().await.expect("load");
    nodes.sort_by_key(|n| n.exit.is_none());
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0].node, with_exit);
    assert_eq!(nodes[0].exit, Some(exit));
    assert_eq!(nodes[1].node, without_exit);
    assert_eq!(nodes[1].exit, None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn backfill_runs_end_to_end_against_sqlite() {
    let pool = memory_pool().await;
    let flows = SqliteFlowStore::from_pool(Arc::clone(&pool));
    flows.init_schema().await.expect("schema");
    let checkpoint = SqliteCheckpointStore::from_pool(Arc::clone(&pool));
    checkpoint.init_schema().await.expect("schema");

    let action = NodeId::random();
    let exit = ExitId::random();
    let rule = NodeId::random();
    let rule_exit = ExitId::random();
    seed_action_node(&pool, action, Some(exit)).await;

    seed_flow(&pool, 1, true).await;
    seed_run(&pool, 1, 1).await;
    seed_step(&pool, 1, rule, StepKind::Rule, Some(rule_exit), 1).await;
    seed_step(&pool, 1, action, StepKind::Action, None, 2).await;

    let report = BackfillJob::new(&flows, &checkpoint)
        .run()
        .await
        .expect("backfill");
    assert_eq!(report.runs_updated, 1);
    assert_eq!(report.paths_trimmed, 0);

    let row = sqlx::query("SELECT path FROM runs WHERE id = 1")
        .fetch_one(&*pool)
        .await
        .expect("select");
    let path = decode_path(&row.get::<String, _>("path")).expect("decode");
    assert_eq!(path.len(), 2);
    assert_eq!(path[0].node, rule);
    assert_eq!(path[0].exit, Some(rule_exit));
    assert_eq!(path[1].node, action);
    assert_eq!(path[1].exit, Some(exit));

    assert_eq!(checkpoint.get().await.expect("get"), Some(RunId::new(1)));
}
