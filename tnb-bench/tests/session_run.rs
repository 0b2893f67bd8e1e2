mod common;
mod mocks;

use common::init_test_logging;
use mocks::{MockHost, ScriptedRunner};
use std::path::PathBuf;
use std::sync::Arc;
use tnb_bench::benchmarks::Direction;
use tnb_bench::{
    BenchmarkError, BenchmarkSession, PoolSelection, PoolStatus, SpaceDecision, SpaceShortfall,
    SweepStatus,
};
use tnb_common::{BenchConfig, DiskInfo, GIB, Iterations, MIB, PoolInfo, SystemInfo};
use tracing::info;

fn small_config() -> BenchConfig {
    let mut config = BenchConfig::default();
    config.per_thread_mib = 64;
    config.pool_iterations = Iterations::ONCE;
    config.disk_iterations = Iterations::ONCE;
    config
}

fn host() -> MockHost {
    MockHost::new(
        SystemInfo::new(4, 8 * GIB),
        vec![
            PoolInfo::new("tank", "/mnt/tank"),
            PoolInfo::new("fast", "/mnt/fast"),
        ],
        vec![
            DiskInfo::new("sda", Some(500 * GIB)),
            DiskInfo::new("sdb", None),
        ],
    )
}

#[tokio::test(start_paused = true)]
async fn test_full_run_pools_then_disks() {
    init_test_logging();
    info!(test = "test_full_run_pools_then_disks", phase = "setup");

    let runner = Arc::new(ScriptedRunner::new());
    let session = BenchmarkSession::new(host(), Arc::clone(&runner), small_config());
    let outcome = session.run(&SpaceDecision::Proceed).await.expect("run");
    let report = &outcome.report;

    info!(
        test = "test_full_run_pools_then_disks",
        phase = "assert",
        pools = report.pools.len(),
        disks = report.disks.len()
    );
    assert_eq!(report.schema_version, "tn-bench/1");
    assert_eq!(report.system.cores, 4);
    assert_eq!(report.pools.len(), 2);
    for pool in &report.pools {
        assert_eq!(pool.status, PoolStatus::Completed);
        assert_eq!(pool.results.len(), 4);
        assert!(pool.all_points_complete());
        assert!(pool.errors.is_empty());
    }
    assert_eq!(
        report.pool("tank").and_then(|p| p.mount_path.clone()),
        Some(PathBuf::from("/mnt/tank/tn-bench"))
    );

    assert_eq!(report.disks.len(), 1);
    assert_eq!(report.disks[0].calibrated_read_volume, 8 * GIB);
    assert_eq!(report.skipped_disks[0].disk, "sdb");

    // Disk reads start only after every pool workload finished.
    let calls = runner.calls();
    let first_disk = calls
        .iter()
        .position(|c| c.path.starts_with("/dev"))
        .expect("disk call");
    assert!(calls[..first_disk].iter().all(|c| c.path.starts_with("/mnt")));
    assert!(calls[first_disk..].iter().all(|c| c.path.starts_with("/dev")));

    let host = session.host();
    assert_eq!(host.ensure_calls(), ["tank", "fast"]);
    assert_eq!(
        host.cleaned(),
        [
            (PathBuf::from("/mnt/tank/tn-bench"), "file_".to_string()),
            (PathBuf::from("/mnt/fast/tn-bench"), "file_".to_string()),
        ]
    );
    assert_eq!(outcome.scratch_pools, ["tank", "fast"]);
    assert!(report.metadata.finished_at >= report.metadata.started_at);

    // The host inventory is kept alongside the results.
    assert_eq!(report.selected_pools, ["tank", "fast"]);
    assert_eq!(
        report
            .inventory
            .pools
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>(),
        ["tank", "fast"]
    );
    assert_eq!(report.inventory.disks.len(), 2);
    assert_eq!(report.inventory.disks[0].capacity_bytes, Some(500 * GIB));
    assert_eq!(report.inventory.disks[1].capacity_bytes, None);

    info!(
        test = "test_full_run_pools_then_disks",
        phase = "complete",
        status = "passed"
    );
}

#[tokio::test(start_paused = true)]
async fn test_named_selection_with_duplicates_and_unknown() {
    init_test_logging();

    let runner = Arc::new(ScriptedRunner::new());
    let mut config = small_config();
    config.disk_benchmark = false;
    let session = BenchmarkSession::new(host(), Arc::clone(&runner), config).with_selection(
        "fast,ghost,fast".parse::<PoolSelection>().expect("selection"),
    );
    let outcome = session.run(&SpaceDecision::Proceed).await.expect("run");

    assert_eq!(outcome.unknown_pools, ["ghost"]);
    assert_eq!(outcome.report.pools.len(), 1);
    assert_eq!(outcome.report.pools[0].pool, "fast");
    assert!(outcome.report.disks.is_empty());
    assert_eq!(outcome.report.selected_pools, ["fast"]);
    assert_eq!(outcome.report.inventory.pools.len(), 2);
    assert_eq!(outcome.report.inventory.disks.len(), 2);
    assert_eq!(session.host().ensure_calls(), ["fast"]);
    assert!(runner.calls().iter().all(|c| c.path.starts_with("/mnt/fast")));
}

#[tokio::test(start_paused = true)]
async fn test_insufficient_space_skip_deletes_dataset() {
    init_test_logging();

    let runner = Arc::new(ScriptedRunner::new());
    let mut config = small_config();
    config.disk_benchmark = false;
    // 2 x 64 MiB x 4 cores = 512 MiB required.
    let host = host().with_available("tank", 100 * MIB);
    let session = BenchmarkSession::new(host, Arc::clone(&runner), config);

    let seen = std::sync::Mutex::new(Vec::new());
    let policy = |s: &SpaceShortfall| {
        seen.lock().unwrap().push(s.clone());
        SpaceDecision::Skip
    };
    let outcome = session.run(&policy).await.expect("run");

    let shortfalls = seen.lock().unwrap().clone();
    assert_eq!(shortfalls.len(), 1);
    assert_eq!(shortfalls[0].pool, "tank");
    assert_eq!(shortfalls[0].required, 512 * MIB);
    assert_eq!(shortfalls[0].available, 100 * MIB);

    let tank = outcome.report.pool("tank").expect("tank");
    assert_eq!(tank.status, PoolStatus::Skipped);
    assert!(tank.results.is_empty());
    assert!(tank.errors[0].contains("insufficient space"));
    assert_eq!(session.host().deleted(), ["tank"]);
    assert_eq!(outcome.scratch_pools, ["fast"]);
    assert!(!runner.calls().iter().any(|c| c.path.starts_with("/mnt/tank")));
    assert_eq!(outcome.report.pool("fast").expect("fast").status, PoolStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn test_insufficient_space_proceed_runs_and_notes_shortfall() {
    init_test_logging();

    let runner = Arc::new(ScriptedRunner::new());
    let mut config = small_config();
    config.disk_benchmark = false;
    let session = BenchmarkSession::new(
        host().with_available("tank", 0),
        Arc::clone(&runner),
        config,
    )
    .with_selection(PoolSelection::Named(vec!["tank".to_string()]));

    let outcome = session.run(&SpaceDecision::Proceed).await.expect("run");
    let tank = outcome.report.pool("tank").expect("tank");
    assert_eq!(tank.status, PoolStatus::Completed);
    assert_eq!(tank.results.len(), 4);
    assert_eq!(tank.errors.len(), 1);
    assert!(session.host().deleted().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_trial_failure_recorded_with_pool_context() {
    init_test_logging();

    let runner = Arc::new(ScriptedRunner::new().failing("/mnt/tank/tn-bench/file_3.dat"));
    let mut config = small_config();
    config.disk_benchmark = false;
    let session = BenchmarkSession::new(host(), Arc::clone(&runner), config)
        .with_selection(PoolSelection::Named(vec!["tank".to_string()]));

    let outcome = session.run(&SpaceDecision::Proceed).await.expect("run");
    let tank = outcome.report.pool("tank").expect("tank");
    assert_eq!(tank.status, PoolStatus::Completed);
    assert!(matches!(
        tank.results[3].status,
        SweepStatus::Incomplete {
            phase: Direction::Write,
            ..
        }
    ));
    assert_eq!(tank.errors.len(), 1);
    assert!(tank.errors[0].contains("pool tank"));
    assert!(tank.errors[0].contains("4 threads"));
    // Workload files are still cleaned up after a failed point.
    assert_eq!(session.host().cleaned().len(), 1);
}

#[tokio::test]
async fn test_inventory_failure_is_fatal() {
    init_test_logging();

    let runner = Arc::new(ScriptedRunner::new());
    let mut host = host();
    host.fail_system_info = true;
    let session = BenchmarkSession::new(host, Arc::clone(&runner), small_config());

    let err = session
        .run(&SpaceDecision::Proceed)
        .await
        .expect_err("inventory failure");
    assert!(err.is_fatal());
    assert!(matches!(
        err,
        BenchmarkError::InventoryUnavailable { what: "system", .. }
    ));
    assert!(runner.calls().is_empty());
    assert!(session.host().ensure_calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_dataset_failure_isolated_to_pool() {
    init_test_logging();

    let runner = Arc::new(ScriptedRunner::new());
    let mut host = host();
    host.fail_ensure.insert("tank".to_string());
    let mut config = small_config();
    config.disk_benchmark = false;
    let session = BenchmarkSession::new(host, Arc::clone(&runner), config);

    let outcome = session.run(&SpaceDecision::Proceed).await.expect("run");
    let tank = outcome.report.pool("tank").expect("tank");
    assert_eq!(tank.status, PoolStatus::Failed);
    assert!(tank.mount_path.is_none());
    assert!(tank.errors[0].contains("scratch dataset creation"));
    assert_eq!(
        outcome.report.pool("fast").expect("fast").status,
        PoolStatus::Completed
    );
    assert_eq!(outcome.scratch_pools, ["fast"]);
}
