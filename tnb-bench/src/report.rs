//! Report assembly. Pure data, no I/O.

use crate::benchmarks::{DiskCalibration, DiskResult, SkippedDisk, SweepResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tnb_common::{BenchConfig, DiskInfo, PoolInfo, SystemInfo};

/// Schema tag written into every report.
pub const SCHEMA_VERSION: &str = "tn-bench/1";

/// Run timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub total_benchmark_time_minutes: f64,
}

impl RunMetadata {
    pub fn new(started_at: DateTime<Utc>, finished_at: DateTime<Utc>) -> Self {
        let millis = (finished_at - started_at).num_milliseconds().max(0);
        let duration_secs = millis as f64 / 1000.0;
        Self {
            started_at,
            finished_at,
            duration_secs,
            total_benchmark_time_minutes: duration_secs / 60.0,
        }
    }
}

/// What happened to a selected pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    /// The sweep ran. Individual points may still be incomplete.
    Completed,
    /// Not benchmarked, e.g. for lack of space.
    Skipped,
    /// The scratch dataset could not be prepared.
    Failed,
}

/// Sweep results for one pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolReport {
    pub pool: String,
    pub mount_path: Option<PathBuf>,
    pub status: PoolStatus,
    pub results: Vec<SweepResult>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl PoolReport {
    pub fn completed(pool: impl Into<String>, mount_path: PathBuf, results: Vec<SweepResult>) -> Self {
        Self {
            pool: pool.into(),
            mount_path: Some(mount_path),
            status: PoolStatus::Completed,
            results,
            errors: Vec::new(),
        }
    }

    pub fn skipped(pool: impl Into<String>, mount_path: Option<PathBuf>, reason: String) -> Self {
        Self {
            pool: pool.into(),
            mount_path,
            status: PoolStatus::Skipped,
            results: Vec::new(),
            errors: vec![reason],
        }
    }

    pub fn failed(pool: impl Into<String>, mount_path: Option<PathBuf>, error: String) -> Self {
        Self {
            pool: pool.into(),
            mount_path,
            status: PoolStatus::Failed,
            results: Vec::new(),
            errors: vec![error],
        }
    }

    /// Whether every sweep point finished both phases.
    pub fn all_points_complete(&self) -> bool {
        self.results.iter().all(SweepResult::is_complete)
    }
}

/// Host pools and disks as queried at the start of the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub pools: Vec<PoolInfo>,
    pub disks: Vec<DiskInfo>,
}

/// Everything one run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkReport {
    pub schema_version: String,
    pub metadata: RunMetadata,
    pub config: BenchConfig,
    pub system: SystemInfo,
    pub inventory: Inventory,
    /// Pools chosen for the sweep, in run order.
    pub selected_pools: Vec<String>,
    pub pools: Vec<PoolReport>,
    pub disks: Vec<DiskResult>,
    pub skipped_disks: Vec<SkippedDisk>,
}

impl BenchmarkReport {
    pub fn pool(&self, name: &str) -> Option<&PoolReport> {
        self.pools.iter().find(|p| p.pool == name)
    }

    pub fn disk(&self, name: &str) -> Option<&DiskResult> {
        self.disks.iter().find(|d| d.disk == name)
    }
}

/// Collects component results during a run and assembles the report at the end.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    started_at: DateTime<Utc>,
    inventory: Inventory,
    selected_pools: Vec<String>,
    pools: Vec<PoolReport>,
    disks: DiskCalibration,
}

impl ResultAggregator {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            inventory: Inventory::default(),
            selected_pools: Vec::new(),
            pools: Vec::new(),
            disks: DiskCalibration::default(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn set_inventory(&mut self, inventory: Inventory) {
        self.inventory = inventory;
    }

    pub fn set_selected_pools(&mut self, names: Vec<String>) {
        self.selected_pools = names;
    }

    /// Record a pool. A second report for the same pool replaces the first.
    pub fn add_pool(&mut self, report: PoolReport) {
        match self.pools.iter_mut().find(|p| p.pool == report.pool) {
            Some(existing) => *existing = report,
            None => self.pools.push(report),
        }
    }

    pub fn set_disks(&mut self, disks: DiskCalibration) {
        self.disks = disks;
    }

    pub fn finish(
        self,
        finished_at: DateTime<Utc>,
        config: BenchConfig,
        system: SystemInfo,
    ) -> BenchmarkReport {
        BenchmarkReport {
            schema_version: SCHEMA_VERSION.to_string(),
            metadata: RunMetadata::new(self.started_at, finished_at),
            config,
            system,
            inventory: self.inventory,
            selected_pools: self.selected_pools,
            pools: self.pools,
            disks: self.disks.results,
            skipped_disks: self.disks.skipped,
        }
    }
}
