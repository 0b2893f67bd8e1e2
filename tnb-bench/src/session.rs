//! One complete benchmark run over a host.
//!
//! Inventory is queried first and any failure there ends the run. Each
//! selected pool is then prepared, space-checked, swept and cleaned up on its
//! own; a pool that fails does not stop the others. Disk calibration runs only
//! after every pool is done.

use crate::benchmarks::{
    BenchmarkError, DiskCalibrationBenchmark, SweepStatus, ThreadSweepBenchmark, WorkloadRunner,
};
use crate::report::{BenchmarkReport, Inventory, PoolReport, ResultAggregator};
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tnb_common::{BenchConfig, HostApi, PoolInfo};
use tracing::{info, warn};

/// Which pools to benchmark.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PoolSelection {
    #[default]
    All,
    None,
    Named(Vec<String>),
}

impl FromStr for PoolSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "none" => Ok(Self::None),
            "" => Err("pool selection must not be empty".to_string()),
            _ => Ok(Self::Named(
                s.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect(),
            )),
        }
    }
}

impl fmt::Display for PoolSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::None => write!(f, "none"),
            Self::Named(names) => write!(f, "{}", names.join(",")),
        }
    }
}

/// Selected pools in inventory order, plus requested names that do not exist.
pub fn resolve_selection(pools: &[PoolInfo], selection: &PoolSelection) -> (Vec<PoolInfo>, Vec<String>) {
    match selection {
        PoolSelection::All => (pools.to_vec(), Vec::new()),
        PoolSelection::None => (Vec::new(), Vec::new()),
        PoolSelection::Named(names) => {
            let mut selected: Vec<PoolInfo> = Vec::new();
            let mut unknown: Vec<String> = Vec::new();
            for name in names {
                match pools.iter().find(|p| &p.name == name) {
                    Some(pool) if !selected.iter().any(|s| s.name == pool.name) => {
                        selected.push(pool.clone());
                    }
                    Some(_) => {}
                    None if !unknown.contains(name) => unknown.push(name.clone()),
                    None => {}
                }
            }
            (selected, unknown)
        }
    }
}

/// Scratch space a full sweep needs: `2 × per_thread_bytes × cores`.
pub fn required_space(per_thread_bytes: u64, cores: u32) -> u64 {
    per_thread_bytes
        .saturating_mul(2)
        .saturating_mul(u64::from(cores))
}

/// A pool whose scratch dataset has less free space than the sweep needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceShortfall {
    pub pool: String,
    pub threads: u32,
    pub available: u64,
    pub required: u64,
}

impl From<SpaceShortfall> for BenchmarkError {
    fn from(s: SpaceShortfall) -> Self {
        BenchmarkError::InsufficientSpace {
            pool: s.pool,
            threads: s.threads,
            available: s.available,
            required: s.required,
        }
    }
}

/// What to do about a [`SpaceShortfall`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceDecision {
    Proceed,
    Skip,
}

/// Caller hook consulted when a pool is short on space.
pub trait SpacePolicy: Send + Sync {
    fn decide(&self, shortfall: &SpaceShortfall) -> SpaceDecision;
}

impl<F> SpacePolicy for F
where
    F: Fn(&SpaceShortfall) -> SpaceDecision + Send + Sync,
{
    fn decide(&self, shortfall: &SpaceShortfall) -> SpaceDecision {
        self(shortfall)
    }
}

impl SpacePolicy for SpaceDecision {
    fn decide(&self, _shortfall: &SpaceShortfall) -> SpaceDecision {
        *self
    }
}

/// Report plus what the caller may still want to act on.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub report: BenchmarkReport,
    /// Requested pool names not in the inventory.
    pub unknown_pools: Vec<String>,
    /// Pools whose scratch dataset still exists after the run.
    pub scratch_pools: Vec<String>,
}

/// Drives one run: pools first, then disks, then the report.
pub struct BenchmarkSession<H, R> {
    host: H,
    runner: Arc<R>,
    config: BenchConfig,
    selection: PoolSelection,
}

impl<H: HostApi, R: WorkloadRunner> BenchmarkSession<H, R> {
    pub fn new(host: H, runner: Arc<R>, config: BenchConfig) -> Self {
        Self {
            host,
            runner,
            config,
            selection: PoolSelection::All,
        }
    }

    #[must_use]
    pub fn with_selection(mut self, selection: PoolSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub async fn run(&self, policy: &dyn SpacePolicy) -> Result<SessionOutcome, BenchmarkError> {
        let mut aggregator = ResultAggregator::new(Utc::now());

        let system = self
            .host
            .system_info()
            .await
            .map_err(|source| BenchmarkError::InventoryUnavailable {
                what: "system",
                source,
            })?;
        let pools = self
            .host
            .pools()
            .await
            .map_err(|source| BenchmarkError::InventoryUnavailable {
                what: "pool",
                source,
            })?;
        let disks = self
            .host
            .disks()
            .await
            .map_err(|source| BenchmarkError::InventoryUnavailable {
                what: "disk",
                source,
            })?;
        info!(
            cores = system.cores,
            memory_bytes = system.physical_memory_bytes,
            pools = pools.len(),
            disks = disks.len(),
            "Inventory collected"
        );

        let (selected, unknown_pools) = resolve_selection(&pools, &self.selection);
        for name in &unknown_pools {
            warn!(pool = %name, "Requested pool not found, ignoring");
        }
        aggregator.set_selected_pools(selected.iter().map(|p| p.name.clone()).collect());
        aggregator.set_inventory(Inventory {
            pools,
            disks: disks.clone(),
        });

        let sweep = ThreadSweepBenchmark::from_config(Arc::clone(&self.runner), &self.config);
        let mut mounts: HashMap<String, PathBuf> = HashMap::new();
        let mut scratch_pools = Vec::new();

        for pool in &selected {
            let report = self
                .run_pool(pool, system.cores, &sweep, &mut mounts, policy)
                .await;
            if mounts.contains_key(&pool.name) {
                scratch_pools.push(pool.name.clone());
            }
            aggregator.add_pool(report);
        }

        if self.config.disk_benchmark {
            let calibration = DiskCalibrationBenchmark::from_config(Arc::clone(&self.runner), &self.config)
                .run(&disks, system.physical_memory_bytes)
                .await;
            for result in &calibration.results {
                if let Some(failure) = &result.failure {
                    let err = BenchmarkError::WorkloadFailure {
                        target: format!("disk {}", result.disk),
                        failure: failure.clone(),
                    };
                    warn!(error = %err, "Disk calibration incomplete");
                }
            }
            aggregator.set_disks(calibration);
        } else {
            info!("Disk benchmark disabled");
        }

        let report = aggregator.finish(Utc::now(), self.config.clone(), system);
        info!(
            duration_secs = report.metadata.duration_secs,
            pools = report.pools.len(),
            disks = report.disks.len(),
            "Benchmark run complete"
        );
        Ok(SessionOutcome {
            report,
            unknown_pools,
            scratch_pools,
        })
    }

    async fn run_pool(
        &self,
        pool: &PoolInfo,
        cores: u32,
        sweep: &ThreadSweepBenchmark<R>,
        mounts: &mut HashMap<String, PathBuf>,
        policy: &dyn SpacePolicy,
    ) -> PoolReport {
        let name = pool.name.as_str();
        let mount = match mounts.get(name) {
            Some(path) => path.clone(),
            None => match self.host.ensure_scratch_dataset(name).await {
                Ok(path) => {
                    mounts.insert(name.to_string(), path.clone());
                    path
                }
                Err(source) => {
                    let err = BenchmarkError::Host {
                        pool: name.to_string(),
                        operation: "scratch dataset creation",
                        source,
                    };
                    warn!(error = %err, "Skipping pool");
                    return PoolReport::failed(name, None, err.to_string());
                }
            },
        };
        info!(pool = name, path = %mount.display(), "Scratch dataset ready");

        let mut errors = Vec::new();
        let required = required_space(self.config.per_thread_bytes(), cores);
        match self.host.available_bytes(name).await {
            Ok(available) if available >= required => {
                info!(pool = name, available, required, "Sufficient space available");
            }
            Ok(available) => {
                let shortfall = SpaceShortfall {
                    pool: name.to_string(),
                    threads: cores,
                    available,
                    required,
                };
                let decision = policy.decide(&shortfall);
                let err = BenchmarkError::from(shortfall);
                warn!(error = %err, decision = ?decision, "Insufficient space");
                if decision == SpaceDecision::Skip {
                    if let Err(source) = self.host.delete_scratch_dataset(name).await {
                        let err = BenchmarkError::Host {
                            pool: name.to_string(),
                            operation: "scratch dataset deletion",
                            source,
                        };
                        warn!(error = %err, "Could not delete skipped pool's dataset");
                    } else {
                        mounts.remove(name);
                    }
                    return PoolReport::skipped(name, Some(mount), err.to_string());
                }
                errors.push(err.to_string());
            }
            Err(source) => {
                let err = BenchmarkError::Host {
                    pool: name.to_string(),
                    operation: "space query",
                    source,
                };
                warn!(error = %err, "Skipping pool");
                return PoolReport::failed(name, Some(mount), err.to_string());
            }
        }

        let results = sweep.run(&mount, cores).await;
        for point in &results {
            if let SweepStatus::Incomplete { failure, .. } = &point.status {
                let err = BenchmarkError::TrialFailure {
                    pool: name.to_string(),
                    failure: failure.clone(),
                };
                errors.push(err.to_string());
            }
        }

        match self
            .host
            .cleanup_scratch_files(&mount, sweep.file_prefix())
            .await
        {
            Ok(removed) => info!(pool = name, removed, "Cleaned up workload files"),
            Err(source) => {
                let err = BenchmarkError::Host {
                    pool: name.to_string(),
                    operation: "workload file cleanup",
                    source,
                };
                warn!(error = %err, "Cleanup failed");
                errors.push(err.to_string());
            }
        }

        let mut report = PoolReport::completed(name, mount, results);
        report.errors = errors;
        report
    }
}
