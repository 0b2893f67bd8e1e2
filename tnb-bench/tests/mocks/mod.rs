//! Scripted collaborators for deterministic benchmark tests.
//!
//! `ScriptedRunner` sleeps on the tokio clock for `bytes / throughput`, so
//! tests using `start_paused = true` see exact elapsed times. `MockHost`
//! serves a fixed inventory and records every dataset operation.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tnb_bench::benchmarks::{
    Direction, WorkloadFailure, WorkloadOutcome, WorkloadRunner, WorkloadSpec,
};
use tnb_common::{DiskInfo, HostApi, HostError, MIB, PoolInfo, SystemInfo};

/// One recorded runner invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerCall {
    pub direction: Direction,
    pub path: PathBuf,
    pub bytes: u64,
    pub block_size: u64,
}

/// Simulated block-copy tool.
#[derive(Debug)]
pub struct ScriptedRunner {
    /// Bytes per second for every copy.
    pub bytes_per_sec: u64,
    /// Paths whose copies fail with exit status 1.
    pub failing_paths: HashSet<PathBuf>,
    /// Paths whose reads fail; writes to them succeed.
    pub failing_reads: HashSet<PathBuf>,
    pub calls: Mutex<Vec<RunnerCall>>,
}

#[allow(dead_code)]
impl ScriptedRunner {
    /// Every copy moves 1 GiB/s.
    pub fn new() -> Self {
        Self {
            bytes_per_sec: 1024 * MIB,
            failing_paths: HashSet::new(),
            failing_reads: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_throughput(mut self, bytes_per_sec: u64) -> Self {
        self.bytes_per_sec = bytes_per_sec;
        self
    }

    pub fn failing(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing_paths.insert(path.into());
        self
    }

    pub fn failing_reads(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing_reads.insert(path.into());
        self
    }

    pub fn calls(&self) -> Vec<RunnerCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl WorkloadRunner for ScriptedRunner {
    async fn run(&self, spec: WorkloadSpec) -> Result<WorkloadOutcome, WorkloadFailure> {
        self.calls.lock().unwrap().push(RunnerCall {
            direction: spec.direction(),
            path: spec.path().to_path_buf(),
            bytes: spec.byte_count(),
            block_size: spec.block_size(),
        });

        let read_fails =
            spec.direction() == Direction::Read && self.failing_reads.contains(spec.path());
        if read_fails || self.failing_paths.contains(spec.path()) {
            tokio::time::sleep(Duration::from_millis(10)).await;
            return Err(WorkloadFailure {
                path: spec.path().to_path_buf(),
                direction: spec.direction(),
                exit_status: Some(1),
                detail: "dd: failed to open: No such file or directory".to_string(),
            });
        }

        let elapsed = Duration::from_secs_f64(spec.byte_count() as f64 / self.bytes_per_sec as f64);
        tokio::time::sleep(elapsed).await;
        Ok(WorkloadOutcome {
            elapsed,
            bytes: spec.byte_count(),
        })
    }
}

/// In-memory host with a fixed inventory.
#[derive(Debug, Default)]
pub struct MockHost {
    pub system: SystemInfo,
    pub pools: Vec<PoolInfo>,
    pub disks: Vec<DiskInfo>,
    /// Free bytes per pool. Pools not listed have unlimited space.
    pub available: HashMap<String, u64>,
    pub fail_system_info: bool,
    pub fail_ensure: HashSet<String>,
    pub ensure_calls: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub cleaned: Mutex<Vec<(PathBuf, String)>>,
}

#[allow(dead_code)]
impl MockHost {
    pub fn new(system: SystemInfo, pools: Vec<PoolInfo>, disks: Vec<DiskInfo>) -> Self {
        Self {
            system,
            pools,
            disks,
            ..Self::default()
        }
    }

    pub fn with_available(mut self, pool: &str, bytes: u64) -> Self {
        self.available.insert(pool.to_string(), bytes);
        self
    }

    pub fn scratch_path(pool: &PoolInfo) -> PathBuf {
        Path::new(&pool.path).join("tn-bench")
    }

    pub fn ensure_calls(&self) -> Vec<String> {
        self.ensure_calls.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn cleaned(&self) -> Vec<(PathBuf, String)> {
        self.cleaned.lock().unwrap().clone()
    }

    fn pool(&self, name: &str) -> Result<&PoolInfo, HostError> {
        self.pools
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| HostError::NotFound {
                kind: "pool",
                name: name.to_string(),
            })
    }
}

impl HostApi for MockHost {
    async fn system_info(&self) -> Result<SystemInfo, HostError> {
        if self.fail_system_info {
            return Err(HostError::CommandFailed {
                command: "midclt call system.info".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "middleware not running".to_string(),
            });
        }
        Ok(self.system.clone())
    }

    async fn pools(&self) -> Result<Vec<PoolInfo>, HostError> {
        Ok(self.pools.clone())
    }

    async fn disks(&self) -> Result<Vec<DiskInfo>, HostError> {
        Ok(self.disks.clone())
    }

    async fn ensure_scratch_dataset(&self, pool: &str) -> Result<PathBuf, HostError> {
        self.ensure_calls.lock().unwrap().push(pool.to_string());
        if self.fail_ensure.contains(pool) {
            return Err(HostError::CommandFailed {
                command: "midclt call pool.dataset.create".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "pool is read-only".to_string(),
            });
        }
        Ok(Self::scratch_path(self.pool(pool)?))
    }

    async fn available_bytes(&self, pool: &str) -> Result<u64, HostError> {
        self.pool(pool)?;
        Ok(self.available.get(pool).copied().unwrap_or(u64::MAX))
    }

    async fn delete_scratch_dataset(&self, pool: &str) -> Result<(), HostError> {
        self.deleted.lock().unwrap().push(pool.to_string());
        Ok(())
    }

    async fn cleanup_scratch_files(&self, path: &Path, prefix: &str) -> Result<usize, HostError> {
        self.cleaned
            .lock()
            .unwrap()
            .push((path.to_path_buf(), prefix.to_string()));
        Ok(0)
    }
}
