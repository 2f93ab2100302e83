//! Tests for cell lifecycle operations.
//!
//! Validates creation with declared containers, lookup cross-checks against
//! the requested hierarchy, state transitions and purge.

use cellvisor::{
    Cell, ContainerSpec, Controller, Error, ErrorKind, MemoryRunner, Op, Realm, ResourceKind,
    ResourceState, Space, Stack,
};
use std::sync::Arc;

fn setup() -> (Arc<MemoryRunner>, Controller) {
    let runner = Arc::new(MemoryRunner::new());
    let controller = Controller::with_defaults(runner.clone());
    (runner, controller)
}

async fn stack(controller: &Controller) {
    controller.create_realm(&Realm::new("r")).await.unwrap();
    controller.create_space(&Space::new("r", "s")).await.unwrap();
    controller
        .create_stack(&Stack::new("r", "s", "t"))
        .await
        .unwrap();
}

fn cell_with(ids: &[&str]) -> Cell {
    ids.iter().fold(Cell::new("r", "s", "t", "c"), |cell, id| {
        cell.with_container(ContainerSpec::new("r", "s", "t", "c", *id).with_image("alpine:3.20"))
    })
}

// =============================================================================
// Create / Get
// =============================================================================

#[tokio::test]
async fn test_create_cell_requires_stack() {
    let (_runner, controller) = setup();

    let err = controller.create_cell(&cell_with(&[])).await.unwrap_err();
    assert!(err.is(ErrorKind::ResourceNotFound));
    assert_eq!(err.to_string(), "stack \"r/s/t\" not found");
}

#[tokio::test]
async fn test_create_cell_twice() {
    let (runner, controller) = setup();
    stack(&controller).await;

    let first = controller.create_cell(&cell_with(&["app"])).await.unwrap();
    assert!(first.created);
    assert!(first.cgroup_created);
    assert!(first.root_container_created);
    assert!(!first.root_container_exists_pre);
    assert_eq!(first.cell.containers.len(), 1);
    assert_eq!(first.cell.state, ResourceState::Pending);

    let second = controller.create_cell(&cell_with(&["app"])).await.unwrap();
    assert!(!second.created);
    assert!(!second.root_container_created);
    assert_eq!(runner.count("create_cell"), 2);
}

#[tokio::test]
async fn test_create_cell_rejects_duplicate_container_ids() {
    let (runner, controller) = setup();
    stack(&controller).await;
    runner.clear_calls();

    let err = controller
        .create_cell(&cell_with(&["app", " app "]))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::DuplicateContainer));
    assert_eq!(err.to_string(), "duplicate container id \"app\" in cell \"c\"");
    assert_eq!(runner.count("create_cell"), 0);
    assert!(runner.calls().is_empty(), "rejected before any runner call");
    assert!(runner.cell("r", "s", "t", "c").is_none());
}

#[tokio::test]
async fn test_cell_name_reported_before_realm() {
    let (runner, controller) = setup();

    let err = controller
        .get_cell(&Cell::new("", "s", "t", " "))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::NameRequired {
            kind: ResourceKind::Cell,
            field: ResourceKind::Cell
        }
    ));
    assert_eq!(err.to_string(), "cell name is required");
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn test_get_missing_cell_skips_existence_checks() {
    let (runner, controller) = setup();

    let result = controller.get_cell(&cell_with(&[])).await.unwrap();
    assert!(!result.metadata_exists);
    assert!(!result.cgroup_exists);
    assert!(!result.root_container_exists);
    assert_eq!(runner.count("exists_cgroup"), 0);
    assert_eq!(runner.count("exists_cell_root_container"), 0);
}

#[tokio::test]
async fn test_get_cell_realm_mismatch() {
    let (runner, controller) = setup();
    runner.insert_cell_at("r", "s", "t", Cell::new("other", "s", "t", "c"));

    let err = controller
        .get_cell(&Cell::new("r", "s", "t", "c"))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Mismatch));
    let msg = err.to_string();
    assert!(msg.contains("realm"), "{msg}");
    assert!(msg.contains("\"r\""), "{msg}");
    assert!(msg.contains("\"other\""), "{msg}");
}

#[tokio::test]
async fn test_get_cell_stack_mismatch() {
    let (runner, controller) = setup();
    runner.insert_cell_at("r", "s", "t", Cell::new("r", "s", "blue", "c"));

    let err = controller
        .start_cell(&Cell::new("r", "s", "t", "c"))
        .await
        .unwrap_err();
    match err {
        Error::Mismatch {
            field,
            requested,
            found,
            ..
        } => {
            assert_eq!(field, ResourceKind::Stack);
            assert_eq!(requested, "t");
            assert_eq!(found, "blue");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(runner.count("start_cell"), 0);
}

#[tokio::test]
async fn test_list_cells_filters() {
    let (_runner, controller) = setup();
    stack(&controller).await;
    controller
        .create_cell(&Cell::new("r", "s", "t", "a"))
        .await
        .unwrap();
    controller
        .create_cell(&Cell::new("r", "s", "t", "b"))
        .await
        .unwrap();

    assert_eq!(controller.list_cells("r", "s", "t").await.unwrap().len(), 2);
    assert_eq!(controller.list_cells("", "", "").await.unwrap().len(), 2);
    assert!(controller.list_cells("r", "s", "x").await.unwrap().is_empty());
}

// =============================================================================
// Start / Stop / Kill
// =============================================================================

#[tokio::test]
async fn test_start_stop_cell_persist_state() {
    let (runner, controller) = setup();
    stack(&controller).await;
    controller.create_cell(&cell_with(&["app"])).await.unwrap();

    let started = controller.start_cell(&cell_with(&[])).await.unwrap();
    assert!(started.started);
    assert_eq!(started.cell.state, ResourceState::Ready);
    let stored = runner.cell("r", "s", "t", "c").unwrap();
    assert_eq!(stored.state, ResourceState::Ready);
    assert_eq!(stored.containers.len(), 1, "stored containers are kept");

    let stopped = controller.stop_cell(&cell_with(&[])).await.unwrap();
    assert!(stopped.stopped);
    assert_eq!(
        runner.cell("r", "s", "t", "c").unwrap().state,
        ResourceState::Pending
    );
}

#[tokio::test]
async fn test_kill_ready_cell() {
    let (runner, controller) = setup();
    stack(&controller).await;
    controller.create_cell(&cell_with(&["app"])).await.unwrap();
    controller.start_cell(&cell_with(&[])).await.unwrap();

    let result = controller.kill_cell(&cell_with(&[])).await.unwrap();
    assert!(result.killed);
    assert_eq!(result.cell.state, ResourceState::Stopped);
    assert_eq!(runner.count("kill_cell"), 1);
    assert_eq!(
        runner.cell("r", "s", "t", "c").unwrap().state,
        ResourceState::Stopped
    );
}

#[tokio::test]
async fn test_kill_cell_failure_leaves_state() {
    let (runner, controller) = setup();
    stack(&controller).await;
    controller.create_cell(&cell_with(&[])).await.unwrap();
    runner.fail("kill_cell", "task not found");

    let err = controller.kill_cell(&cell_with(&[])).await.unwrap_err();
    assert!(err.is_op(Op::Kill(ResourceKind::Cell)));
    assert!(err.to_string().starts_with("failed to kill cell containers"));
    assert_eq!(runner.count("update_cell_metadata"), 0);
    assert_eq!(
        runner.cell("r", "s", "t", "c").unwrap().state,
        ResourceState::Pending
    );
}

#[tokio::test]
async fn test_start_missing_cell() {
    let (_runner, controller) = setup();

    let err = controller.start_cell(&cell_with(&[])).await.unwrap_err();
    assert_eq!(err.to_string(), "cell \"r/s/t/c\" not found");
}

#[tokio::test]
async fn test_metadata_update_failure() {
    let (runner, controller) = setup();
    stack(&controller).await;
    controller.create_cell(&cell_with(&[])).await.unwrap();
    runner.fail("update_cell_metadata", "etcd timeout");

    let err = controller.start_cell(&cell_with(&[])).await.unwrap_err();
    assert!(err.is_op(Op::UpdateMetadata(ResourceKind::Cell)));
    assert_eq!(runner.count("start_cell"), 1);
}

// =============================================================================
// Delete / Purge
// =============================================================================

#[tokio::test]
async fn test_delete_cell_reports_containers() {
    let (runner, controller) = setup();
    stack(&controller).await;
    controller
        .create_cell(&cell_with(&["web", "worker"]))
        .await
        .unwrap();

    let result = controller.delete_cell(&cell_with(&[])).await.unwrap();
    assert_eq!(result.containers_deleted, 2);
    assert_eq!(result.deleted, vec!["containers", "metadata", "cgroup"]);
    assert!(runner.cell("r", "s", "t", "c").is_none());
}

#[tokio::test]
async fn test_delete_empty_cell() {
    let (_runner, controller) = setup();
    stack(&controller).await;
    controller.create_cell(&cell_with(&[])).await.unwrap();

    let result = controller.delete_cell(&cell_with(&[])).await.unwrap();
    assert_eq!(result.containers_deleted, 0);
    assert_eq!(result.deleted, vec!["metadata", "cgroup"]);
}

/// Runner calls made by `delete_cell(doc)` on a fresh `r/s/t/c` holding `app`.
async fn delete_calls(doc: Cell) -> Vec<String> {
    let (runner, controller) = setup();
    stack(&controller).await;
    controller.create_cell(&cell_with(&["app"])).await.unwrap();
    runner.clear_calls();

    controller.delete_cell(&doc).await.unwrap();
    runner.calls()
}

#[tokio::test]
async fn test_padded_identity_deletes_same_cell() {
    let plain = delete_calls(Cell::new("r", "s", "t", "c")).await;
    let padded = delete_calls(Cell::new(" r ", "\ts", "t  ", "\nc ")).await;
    assert!(!plain.is_empty());
    assert_eq!(plain, padded);
}

#[tokio::test]
async fn test_padded_identity_kills_same_cell() {
    let (runner, controller) = setup();
    stack(&controller).await;
    controller.create_cell(&cell_with(&["app"])).await.unwrap();

    runner.clear_calls();
    controller
        .kill_cell(&Cell::new("r", "s", "t", "c"))
        .await
        .unwrap();
    let plain = runner.calls();

    runner.clear_calls();
    controller
        .kill_cell(&Cell::new("  r", "s ", " t ", "c\t"))
        .await
        .unwrap();
    assert_eq!(runner.calls(), plain);
}

#[tokio::test]
async fn test_purge_cell() {
    let (runner, controller) = setup();
    stack(&controller).await;
    controller.create_cell(&cell_with(&["app"])).await.unwrap();

    let result = controller.purge_cell(&cell_with(&[])).await.unwrap();
    assert!(result.metadata_existed);
    assert!(result.cell_deleted);
    assert!(result.purge_succeeded);
    assert_eq!(result.deleted, vec!["containers", "metadata", "cgroup"]);
    assert_eq!(runner.count("purge_cell"), 1);
}

#[tokio::test]
async fn test_purge_cell_failure() {
    let (runner, controller) = setup();
    runner.fail("purge_cell", "veth busy");

    let err = controller.purge_cell(&cell_with(&[])).await.unwrap_err();
    assert!(!err.partial.metadata_existed);
    assert!(!err.partial.purge_succeeded);
    assert_eq!(err.partial.purged, vec!["purge-error:runtime error: veth busy"]);
    assert_eq!(err.partial.cell.state, ResourceState::Unknown);
}

#[tokio::test]
async fn test_result_serializes_camel_case() {
    let (_runner, controller) = setup();
    stack(&controller).await;

    let result = controller.create_cell(&cell_with(&["app"])).await.unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["created"], true);
    assert_eq!(json["rootContainerCreated"], true);
    assert_eq!(json["cell"]["state"], "Pending");
    assert_eq!(json["cell"]["containers"][0]["image"], "alpine:3.20");
}
