//! Tests for space and stack lifecycle operations.

use cellvisor::{
    Cell, Controller, ErrorKind, MemoryRunner, Op, Realm, ResourceKind, Space, Stack,
};
use std::sync::Arc;

fn setup() -> (Arc<MemoryRunner>, Controller) {
    let runner = Arc::new(MemoryRunner::new());
    let controller = Controller::with_defaults(runner.clone());
    (runner, controller)
}

/// Realm `r`, space `s`, stack `t` and the given cells.
async fn hierarchy(controller: &Controller, cells: &[&str]) {
    controller.create_realm(&Realm::new("r")).await.unwrap();
    controller.create_space(&Space::new("r", "s")).await.unwrap();
    controller
        .create_stack(&Stack::new("r", "s", "t"))
        .await
        .unwrap();
    for name in cells {
        controller
            .create_cell(&Cell::new("r", "s", "t", *name))
            .await
            .unwrap();
    }
}

// =============================================================================
// Space
// =============================================================================

#[tokio::test]
async fn test_create_space_requires_realm() {
    let (runner, controller) = setup();

    let err = controller
        .create_space(&Space::new("r", "s"))
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::ResourceNotFound));
    assert_eq!(err.to_string(), "realm \"r\" not found");
    assert_eq!(runner.count("create_space"), 0);
}

#[tokio::test]
async fn test_create_space_twice() {
    let (_runner, controller) = setup();
    controller.create_realm(&Realm::new("r")).await.unwrap();

    let first = controller.create_space(&Space::new("r", "s")).await.unwrap();
    assert!(first.created);
    assert!(first.network_created);
    assert!(first.cgroup_created);

    let second = controller
        .create_space(&Space::new(" r", "s "))
        .await
        .unwrap();
    assert!(!second.created);
    assert!(!second.network_created);
    assert_eq!(second.space.path(), "r/s");
}

#[tokio::test]
async fn test_space_validation_order() {
    let (_runner, controller) = setup();

    let err = controller.get_space(&Space::new("", "")).await.unwrap_err();
    assert_eq!(err.to_string(), "space name is required");

    let err = controller.get_space(&Space::new("", "s")).await.unwrap_err();
    assert_eq!(err.to_string(), "realm name is required for space");
}

#[tokio::test]
async fn test_get_space_reports_network() {
    let (_runner, controller) = setup();
    hierarchy(&controller, &[]).await;

    let result = controller.get_space(&Space::new("r", "s")).await.unwrap();
    assert!(result.metadata_exists);
    assert!(result.cgroup_exists);
    assert!(result.network_exists);
}

#[tokio::test]
async fn test_delete_space_strict_with_stack() {
    let (_runner, controller) = setup();
    hierarchy(&controller, &[]).await;

    let err = controller
        .delete_space(&Space::new("r", "s"), false, false)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("space \"s\" has 1 stack(s)"));
}

#[tokio::test]
async fn test_delete_space_force_skips_listing() {
    let (runner, controller) = setup();
    hierarchy(&controller, &["c1"]).await;
    runner.clear_calls();

    let result = controller
        .delete_space(&Space::new("r", "s"), true, false)
        .await
        .unwrap();
    assert_eq!(result.deleted, vec!["metadata", "cgroup", "network"]);
    assert!(result.network_deleted);
    assert_eq!(runner.count("list_stacks"), 0);
    assert_eq!(runner.count("delete_stack"), 0);
    assert_eq!(runner.count("delete_space"), 1);
}

#[tokio::test]
async fn test_delete_space_cascade_reaches_cells() {
    let (runner, controller) = setup();
    hierarchy(&controller, &["c1", "c2"]).await;

    let result = controller
        .delete_space(&Space::new("r", "s"), false, true)
        .await
        .unwrap();
    assert_eq!(result.deleted, vec!["stack:t", "metadata", "cgroup", "network"]);
    assert!(result.network_deleted);
    assert_eq!(runner.count("delete_cell"), 2);
    assert_eq!(runner.count("delete_stack"), 1);
    assert!(runner.cell("r", "s", "t", "c1").is_none());
}

#[tokio::test]
async fn test_delete_space_cascade_nested_failure() {
    let (runner, controller) = setup();
    hierarchy(&controller, &["c1"]).await;
    runner.fail("delete_cell", "task still running");

    let err = controller
        .delete_space(&Space::new("r", "s"), false, true)
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::ChildFailed));
    assert!(err.is_op(Op::Delete(ResourceKind::Cell)));
    assert_eq!(err.chain().count(), 4);
    assert_eq!(runner.count("delete_stack"), 0);
    assert_eq!(runner.count("delete_space"), 0);
}

#[tokio::test]
async fn test_list_spaces_filter() {
    let (_runner, controller) = setup();
    controller.create_realm(&Realm::new("a")).await.unwrap();
    controller.create_realm(&Realm::new("b")).await.unwrap();
    controller.create_space(&Space::new("a", "x")).await.unwrap();
    controller.create_space(&Space::new("b", "y")).await.unwrap();

    assert_eq!(controller.list_spaces(" a ").await.unwrap().len(), 1);
    assert_eq!(controller.list_spaces("").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_purge_space_failure() {
    let (runner, controller) = setup();
    hierarchy(&controller, &[]).await;
    runner.fail("purge_space", "bridge in use");

    let err = controller
        .purge_space(&Space::new("r", "s"), true, false)
        .await
        .unwrap_err();
    let report = &err.partial;
    assert!(report.space_deleted);
    assert!(!report.purge_succeeded);
    assert_eq!(report.deleted, vec!["metadata", "cgroup", "network"]);
    let errors: Vec<_> = report
        .purged
        .iter()
        .filter(|p| p.starts_with("purge-error:"))
        .collect();
    assert_eq!(errors.len(), 1);
}

// =============================================================================
// Stack
// =============================================================================

#[tokio::test]
async fn test_create_stack_requires_space() {
    let (_runner, controller) = setup();
    controller.create_realm(&Realm::new("r")).await.unwrap();

    let err = controller
        .create_stack(&Stack::new("r", "s", "t"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "space \"r/s\" not found");
}

#[tokio::test]
async fn test_create_stack_twice() {
    let (_runner, controller) = setup();
    hierarchy(&controller, &[]).await;

    let again = controller
        .create_stack(&Stack::new("r", "s", "t"))
        .await
        .unwrap();
    assert!(!again.created);
    assert!(again.metadata_exists_pre);
    assert!(again.cgroup_exists_post);
}

#[tokio::test]
async fn test_delete_stack_missing() {
    let (_runner, controller) = setup();

    let err = controller
        .delete_stack(&Stack::new("r", "s", "t"), false, false)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "stack \"r/s/t\" not found");
}

#[tokio::test]
async fn test_delete_stack_policy_matrix() {
    // strict with cells
    let (_runner, controller) = setup();
    hierarchy(&controller, &["c1", "c2", "c3"]).await;
    let err = controller
        .delete_stack(&Stack::new("r", "s", "t"), false, false)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("stack \"t\" has 3 cell(s)"));

    // force
    let (runner, controller) = setup();
    hierarchy(&controller, &["c1"]).await;
    runner.clear_calls();
    let result = controller
        .delete_stack(&Stack::new("r", "s", "t"), true, false)
        .await
        .unwrap();
    assert_eq!(result.deleted, vec!["metadata", "cgroup"]);
    assert_eq!(runner.count("list_cells"), 0);

    // cascade, with force ignored
    let (runner, controller) = setup();
    hierarchy(&controller, &["c1", "c2"]).await;
    let result = controller
        .delete_stack(&Stack::new("r", "s", "t"), true, true)
        .await
        .unwrap();
    assert_eq!(result.deleted, vec!["cell:c1", "cell:c2", "metadata", "cgroup"]);
    assert_eq!(runner.count("list_cells"), 1);
}

#[tokio::test]
async fn test_purge_stack_cascade() {
    let (runner, controller) = setup();
    hierarchy(&controller, &["c1"]).await;

    let result = controller
        .purge_stack(&Stack::new("r", "s", "t"), false, true)
        .await
        .unwrap();
    assert!(result.stack_deleted);
    assert!(result.purge_succeeded);
    assert_eq!(result.deleted, vec!["cell:c1", "metadata", "cgroup"]);
    assert_eq!(runner.count("purge_cell"), 1);
    assert!(controller.list_stacks("r", "s").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_purge_stack_without_metadata() {
    let (runner, controller) = setup();

    let result = controller
        .purge_stack(&Stack::new("r", "s", "t"), false, false)
        .await
        .unwrap();
    assert!(!result.metadata_existed);
    assert!(!result.stack_deleted);
    assert!(result.purge_succeeded);
    assert_eq!(runner.count("list_cells"), 0);
    assert_eq!(runner.count("purge_stack"), 1);
}
