use pathfill::job::{BackfillError, BackfillJob};
use pathfill::path::PATH_MAX_STEPS;
use pathfill::persistence::decode_path;
use pathfill::records::ActionNode;
use pathfill::stores::{CheckpointStore, InMemoryCheckpointStore, InMemoryFlowStore};
use pathfill::types::{ExitId, NodeId, RunId};

mod common;
use common::*;

fn stores() -> (InMemoryFlowStore, InMemoryCheckpointStore) {
    (InMemoryFlowStore::new(), InMemoryCheckpointStore::new())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_exit_aborts_before_any_write() {
    let (flows, checkpoint) = stores();
    flows.set_action_nodes(vec![
        action_node(NodeId::random(), ExitId::random()),
        ActionNode {
            node: NodeId::random(),
            exit: None,
        },
    ]);
    flows.insert_run(RunId::new(1), true, action_steps(NodeId::random(), 3));

    let err = BackfillJob::new(&flows, &checkpoint).run().await.unwrap_err();
    assert!(matches!(err, BackfillError::Configuration(_)));

    assert_eq!(flows.write_count(), 0);
    assert_eq!(checkpoint.get().await.expect("get"), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn paths_are_rebuilt_and_checkpoint_advances() {
    let (flows, checkpoint) = stores();
    let node_a = NodeId::random();
    let node_b = NodeId::random();
    let exit_1 = ExitId::random();
    let exit_2 = ExitId::random();

    flows.set_action_nodes(vec![action_node(node_b, exit_2)]);
    flows.insert_run(
        RunId::new(1),
        true,
        vec![rule_step(node_a, exit_1, 1), action_step(node_b, 2)],
    );

    let report = BackfillJob::new(&flows, &checkpoint)
        .run()
        .await
        .expect("backfill");

    assert_eq!(report.runs_total, 1);
    assert_eq!(report.runs_updated, 1);
    assert_eq!(report.paths_trimmed, 0);
    assert_eq!(report.resumed_from, None);

    let path = decode_path(&flows.path_of(RunId::new(1)).expect("path written")).expect("decode");
    assert_eq!(path.len(), 2);
    assert_eq!(path[0].node, node_a);
    assert_eq!(path[0].arrived_on, ts(1));
    assert_eq!(path[0].exit, Some(exit_1));
    assert_eq!(path[1].node, node_b);
    assert_eq!(path[1].arrived_on, ts(2));
    assert_eq!(path[1].exit, Some(exit_2));

    assert_eq!(checkpoint.get().await.expect("get"), Some(RunId::new(1)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlong_runs_are_trimmed_and_counted() {
    let (flows, checkpoint) = stores();
    let node = NodeId::random();
    let exit = ExitId::random();

    flows.set_action_nodes(vec![action_node(node, exit)]);
    flows.insert_run(RunId::new(1), true, action_steps(node, 150));
    flows.insert_run(RunId::new(2), true, action_steps(node, 100));

    let report = BackfillJob::new(&flows, &checkpoint)
        .run()
        .await
        .expect("backfill");
    assert_eq!(report.runs_updated, 2);
    assert_eq!(report.paths_trimmed, 1);

    let long = decode_path(&flows.path_of(RunId::new(1)).expect("path")).expect("decode");
    assert_eq!(long.len(), PATH_MAX_STEPS);
    // The 50 earliest steps are gone; the retained tail keeps its order.
    assert_eq!(long[0].arrived_on, ts(50));
    assert_eq!(long[PATH_MAX_STEPS - 1].arrived_on, ts(149));

    let exact = decode_path(&flows.path_of(RunId::new(2)).expect("path")).expect("decode");
    assert_eq!(exact.len(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn second_invocation_writes_nothing() {
    let (flows, checkpoint) = stores();
    let node = NodeId::random();
    flows.set_action_nodes(vec![action_node(node, ExitId::random())]);
    for id in 1..=3 {
        flows.insert_run(RunId::new(id), true, action_steps(node, 2));
    }

    let first = BackfillJob::new(&flows, &checkpoint)
        .run()
        .await
        .expect("first run");
    assert_eq!(first.runs_updated, 3);
    assert_eq!(flows.write_count(), 3);

    let second = BackfillJob::new(&flows, &checkpoint)
        .run()
        .await
        .expect("second run");
    assert_eq!(second.runs_total, 0);
    assert_eq!(second.runs_updated, 0);
    assert_eq!(second.resumed_from, Some(RunId::new(3)));
    assert_eq!(flows.write_count(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn resume_skips_runs_at_or_below_the_checkpoint() {
    let (flows, checkpoint) = stores();
    let node = NodeId::random();
    flows.set_action_nodes(vec![action_node(node, ExitId::random())]);
    for id in 1..=5 {
        flows.insert_run(RunId::new(id), true, action_steps(node, 1));
    }
    checkpoint.set(RunId::new(3)).await.expect("seed checkpoint");

    let report = BackfillJob::new(&flows, &checkpoint)
        .run()
        .await
        .expect("backfill");
    assert_eq!(report.resumed_from, Some(RunId::new(3)));
    assert_eq!(report.runs_updated, 2);

    // Skipped runs were neither fetched nor written.
    let fetched = flows.fetched_ids();
    assert_eq!(fetched, vec![RunId::new(4), RunId::new(5)]);
    assert_eq!(flows.path_of(RunId::new(3)), None);
    assert!(flows.path_of(RunId::new(4)).is_some());
    assert!(flows.path_of(RunId::new(5)).is_some());

    assert_eq!(checkpoint.get().await.expect("get"), Some(RunId::new(5)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn inactive_flows_are_out_of_scope() {
    let (flows, checkpoint) = stores();
    let node = NodeId::random();
    flows.set_action_nodes(vec![action_node(node, ExitId::random())]);
    flows.insert_run(RunId::new(1), false, action_steps(node, 2));
    flows.insert_run(RunId::new(2), true, action_steps(node, 2));

    let report = BackfillJob::new(&flows, &checkpoint)
        .run()
        .await
        .expect("backfill");
    assert_eq!(report.runs_updated, 1);
    assert_eq!(flows.path_of(RunId::new(1)), None);
    assert!(flows.path_of(RunId::new(2)).is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn no_action_nodes_means_nothing_to_backfill() {
    let (flows, checkpoint) = stores();
    flows.insert_run(RunId::new(1), true, action_steps(NodeId::random(), 2));

    let report = BackfillJob::new(&flows, &checkpoint)
        .run()
        .await
        .expect("backfill");
    assert_eq!(report.runs_total, 0);
    assert_eq!(report.runs_updated, 0);
    assert_eq!(flows.write_count(), 0);
    assert_eq!(checkpoint.get().await.expect("get"), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn small_batches_cover_every_run_in_order() {
    let (flows, checkpoint) = stores();
    let node = NodeId::random();
    flows.set_action_nodes(vec![action_node(node, ExitId::random())]);
    for id in 1..=5 {
        flows.insert_run(RunId::new(id), true, action_steps(node, 1));
    }

    let report = BackfillJob::new(&flows, &checkpoint)
        .with_batch_size(2)
        .run()
        .await
        .expect("backfill");
    assert_eq!(report.runs_updated, 5);

    let fetched = flows.fetched_ids();
    assert_eq!(
        fetched,
        (1..=5).map(RunId::new).collect::<Vec<_>>()
    );
    assert_eq!(checkpoint.get().await.expect("get"), Some(RunId::new(5)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runs_without_steps_get_an_empty_path() {
    let (flows, checkpoint) = stores();
    let node = NodeId::random();
    flows.set_action_nodes(vec![action_node(node, ExitId::random())]);
    flows.insert_run(RunId::new(1), true, vec![]);

    let report = BackfillJob::new(&flows, &checkpoint)
        .run()
        .await
        .expect("backfill");
    assert_eq!(report.runs_updated, 1);
    assert_eq!(flows.path_of(RunId::new(1)), Some("[]".to_string()));
}
