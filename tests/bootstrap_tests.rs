//! Tests for bootstrap of the system hierarchy.

use cellvisor::constants::{
    DEFAULT_CELL, DEFAULT_SPACE, DEFAULT_STACK, MANAGED_BY_LABEL, SYSTEM_NAMESPACE, SYSTEM_REALM,
};
use cellvisor::{Controller, ControllerConfig, ErrorKind, MemoryRunner, Op, ResourceKind};
use std::sync::Arc;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

#[tokio::test]
async fn test_bootstrap_twice() {
    init_tracing();
    let runner = Arc::new(MemoryRunner::new());
    let controller = Controller::with_defaults(runner.clone());

    let first = controller.bootstrap().await.unwrap();
    assert!(first.network_defaults_ready);
    assert!(first.realm_created());
    assert!(first.namespace_created());
    assert!(first.space_created());
    assert!(first.space_network_created());
    assert!(first.stack_created());
    assert!(first.cell_created());
    assert!(runner.has_network_defaults());
    assert!(runner.has_namespace(SYSTEM_NAMESPACE));

    let second = controller.bootstrap().await.unwrap();
    assert!(second.network_defaults_ready);
    assert!(!second.realm_created());
    assert!(!second.namespace_created());
    assert!(!second.space_created());
    assert!(!second.space_network_created());
    assert!(!second.stack_created());
    assert!(!second.cell_created());
    assert!(!second.changed());
}

#[tokio::test]
async fn test_bootstrap_default_identities() {
    let runner = Arc::new(MemoryRunner::new());
    let controller = Controller::with_defaults(runner.clone());

    let report = controller.bootstrap().await.unwrap();
    let cell = report.cell.unwrap().cell;
    assert_eq!(
        cell.path(),
        format!("{SYSTEM_REALM}/{DEFAULT_SPACE}/{DEFAULT_STACK}/{DEFAULT_CELL}")
    );

    let realm = runner.realm(SYSTEM_REALM).unwrap();
    assert_eq!(realm.namespace, SYSTEM_NAMESPACE);
    assert_eq!(
        realm.labels.get(MANAGED_BY_LABEL).map(String::as_str),
        Some("cellvisor")
    );
    assert_eq!(runner.count("ensure_realm"), 1);
    assert_eq!(runner.count("create_realm"), 0);
}

#[tokio::test]
async fn test_bootstrap_with_custom_config() {
    let yaml = br#"
systemRealm: infra
defaultSpace: ops
labels:
  team: platform
"#;
    let config = ControllerConfig::from_yaml(yaml).unwrap();
    let runner = Arc::new(MemoryRunner::new());
    let controller = Controller::new(runner.clone(), config);

    controller.bootstrap().await.unwrap();

    let cell = runner.cell("infra", "ops", DEFAULT_STACK, DEFAULT_CELL).unwrap();
    assert_eq!(cell.labels.get("team").map(String::as_str), Some("platform"));
    assert!(cell.labels.contains_key(MANAGED_BY_LABEL));
    // An unset namespace keeps its default.
    assert!(runner.has_namespace(SYSTEM_NAMESPACE));
}

#[tokio::test]
async fn test_bootstrap_tolerates_existing_namespace() {
    let runner = Arc::new(MemoryRunner::new());
    runner.seed_namespace(SYSTEM_NAMESPACE);
    let controller = Controller::with_defaults(runner.clone());

    let report = controller.bootstrap().await.unwrap();
    assert!(report.realm_created());
    assert!(!report.namespace_created());
    assert!(report.cell_created());
}

#[tokio::test]
async fn test_bootstrap_failure_stops_remaining_steps() {
    let runner = Arc::new(MemoryRunner::new());
    runner.fail("ensure_stack", "disk full");
    let controller = Controller::with_defaults(runner.clone());

    let err = controller.bootstrap().await.unwrap_err();
    assert!(err.error.is_op(Op::Ensure(ResourceKind::Stack)));
    assert!(err.partial.realm_created());
    assert!(err.partial.space_created());
    assert!(err.partial.stack.is_none());
    assert!(err.partial.cell.is_none());
    assert_eq!(runner.count("ensure_cell"), 0);
    assert_eq!(runner.count("close"), 1);
}

#[tokio::test]
async fn test_bootstrap_network_defaults_failure() {
    let runner = Arc::new(MemoryRunner::new());
    runner.fail("ensure_network_defaults", "cni config dir read-only");
    let controller = Controller::with_defaults(runner.clone());

    let err = controller.bootstrap().await.unwrap_err();
    assert!(err.error.is_op(Op::NetworkDefaults));
    assert!(err.error.is(ErrorKind::Runtime));
    assert!(!err.partial.network_defaults_ready);
    assert!(err.partial.realm.is_none());
    assert_eq!(
        err.to_string(),
        "failed to prepare network defaults: runtime error: cni config dir read-only"
    );
}
