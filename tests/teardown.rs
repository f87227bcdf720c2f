mod common;

use std::sync::Arc;

use common::{Failure, RecordingExecutor, EVEN_HOST, ODD_HOST};
use lxc_cluster_manager::cluster::{ClusterTopology, TeardownOrchestrator};
use lxc_cluster_manager::errors::{ClusterError, Stage};

fn teardown(executor: &RecordingExecutor) -> TeardownOrchestrator {
    TeardownOrchestrator::from_settings(Arc::new(executor.clone()), &common::settings(3, 10))
}

fn topology() -> ClusterTopology {
    ClusterTopology::parse("198.51.100.10", &["198.51.100.11", "198.51.100.12"]).unwrap()
}

fn stop(name: &str) -> String {
    format!("lxc-info -n {0} -s | grep -q STOPPED || lxc-stop -n {0}", name)
}

fn destroy(name: &str) -> String {
    format!("lxc-destroy -n {}", name)
}

#[tokio::test]
async fn stops_then_destroys_master_then_workers() {
    let executor = RecordingExecutor::new();
    let destroyed = teardown(&executor).destroy_cluster(&topology()).await.unwrap();

    let names: Vec<_> = destroyed.iter().map(|n| n.to_string()).collect();
    assert_eq!(names, ["master-10", "slave-11", "slave-12"]);
    assert_eq!(
        executor.commands(),
        vec![
            stop("master-10"),
            destroy("master-10"),
            stop("slave-11"),
            destroy("slave-11"),
            stop("slave-12"),
            destroy("slave-12"),
        ]
    );

    let hosts: Vec<_> = executor.calls().into_iter().map(|c| c.host).collect();
    assert_eq!(hosts, [EVEN_HOST, EVEN_HOST, ODD_HOST, ODD_HOST, EVEN_HOST, EVEN_HOST]);
    assert!(executor.calls().iter().all(|c| c.user == "root"));
}

#[tokio::test]
async fn failed_stop_aborts_remaining_teardown() {
    let executor = RecordingExecutor::new();
    executor.fail("lxc-stop -n slave-11", 1, Failure::ExitStatus(1));

    let err = teardown(&executor).destroy_cluster(&topology()).await.unwrap_err();

    assert_eq!(err.stage, Stage::StopContainer);
    assert_eq!(
        executor.commands(),
        vec![stop("master-10"), destroy("master-10"), stop("slave-11")]
    );
    assert_eq!(executor.count("slave-12"), 0);
}

#[tokio::test]
async fn failed_destroy_reports_its_stage() {
    let executor = RecordingExecutor::new();
    executor.fail("lxc-destroy -n master-10", 1, Failure::Unreachable);

    let err = teardown(&executor).destroy_cluster(&topology()).await.unwrap_err();

    assert_eq!(err.stage, Stage::DestroyContainer);
    assert!(matches!(err.source, ClusterError::Connectivity { .. }));
    assert_eq!(executor.calls().len(), 2);
}

#[tokio::test]
async fn teardown_does_not_retry() {
    let executor = RecordingExecutor::new();
    executor.fail("lxc-stop -n master-10", 1, Failure::Unreachable);

    assert!(teardown(&executor).destroy_cluster(&topology()).await.is_err());
    assert_eq!(executor.calls().len(), 1);
}

#[tokio::test]
async fn colliding_names_are_rejected_before_any_remote_call() {
    let executor = RecordingExecutor::new();
    let topology = ClusterTopology::parse("198.51.100.10", &["198.51.100.11", "198.51.101.11"]).unwrap();

    let err = teardown(&executor).destroy_cluster(&topology).await.unwrap_err();

    assert_eq!(err.stage, Stage::Plan);
    assert!(matches!(err.source, ClusterError::NamingCollision { .. }));
    assert!(executor.calls().is_empty());
}
