//! Concurrent fan-out of workloads for one timed trial.
//!
//! A trial launches one worker per thread, each against its own file, and
//! waits for every worker before computing the aggregate. Elapsed time is the
//! span from the first launch to the last completion; per-worker times are
//! kept for diagnostics only.

use super::workload::{Direction, WorkloadFailure, WorkloadRunner, WorkloadSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tnb_common::MIB;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Inputs for one trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialPlan {
    pub phase: Direction,
    pub thread_count: u32,
    /// Bytes each worker moves.
    pub byte_count: u64,
    pub block_size: u64,
    /// Directory holding the per-worker files.
    pub directory: PathBuf,
    pub file_prefix: String,
    /// Run number within the sweep point, starting at 1.
    pub trial: u32,
}

impl TrialPlan {
    /// `<directory>/<prefix><worker>.dat`
    pub fn worker_path(&self, worker: u32) -> PathBuf {
        self.directory
            .join(format!("{}{}.dat", self.file_prefix, worker))
    }

    /// Nominal bytes moved by all workers together, `None` on overflow.
    pub fn total_bytes(&self) -> Option<u64> {
        u64::from(self.thread_count).checked_mul(self.byte_count)
    }

    /// One spec per worker, in worker order.
    pub fn specs(&self) -> Vec<WorkloadSpec> {
        (0..self.thread_count)
            .map(|worker| {
                let path = self.worker_path(worker);
                match self.phase {
                    Direction::Write => WorkloadSpec::write(path, self.block_size, self.byte_count),
                    Direction::Read => WorkloadSpec::read(path, self.block_size, self.byte_count),
                }
            })
            .collect()
    }
}

/// Aggregate of one trial in which every worker succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub thread_count: u32,
    pub phase: Direction,
    /// Run number, starting at 1.
    pub trial: u32,
    /// First launch to last completion.
    pub elapsed_secs: f64,
    pub total_bytes: u64,
    pub throughput_bytes_per_sec: f64,
    /// Throughput in MiB/s.
    pub throughput_mbps: f64,
    /// Per-worker durations, by worker index.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub worker_elapsed_secs: Vec<f64>,
}

impl TrialResult {
    fn from_span(plan: &TrialPlan, elapsed_secs: f64, total_bytes: u64, workers: Vec<f64>) -> Self {
        let throughput_bytes_per_sec = throughput(total_bytes, elapsed_secs);
        Self {
            thread_count: plan.thread_count,
            phase: plan.phase,
            trial: plan.trial,
            elapsed_secs,
            total_bytes,
            throughput_bytes_per_sec,
            throughput_mbps: throughput_bytes_per_sec / MIB as f64,
            worker_elapsed_secs: workers,
        }
    }

    /// Zero-byte, zero-throughput result for a trial with no workers.
    pub fn degenerate(phase: Direction, trial: u32) -> Self {
        Self {
            thread_count: 0,
            phase,
            trial,
            elapsed_secs: 0.0,
            total_bytes: 0,
            throughput_bytes_per_sec: 0.0,
            throughput_mbps: 0.0,
            worker_elapsed_secs: Vec::new(),
        }
    }
}

/// Bytes per second, zero when nothing was measured.
pub fn throughput(total_bytes: u64, elapsed_secs: f64) -> f64 {
    if total_bytes == 0 || elapsed_secs <= 0.0 {
        return 0.0;
    }
    total_bytes as f64 / elapsed_secs
}

/// A trial in which at least one worker failed. No throughput is derived.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error(
    "{phase} run {trial} at {thread_count} threads failed: {} of {thread_count} workers ({})",
    .failures.len(),
    first_failure(.failures)
)]
pub struct TrialFailure {
    pub thread_count: u32,
    pub phase: Direction,
    pub trial: u32,
    /// Every failed worker, ordered by path.
    pub failures: Vec<WorkloadFailure>,
}

fn first_failure(failures: &[WorkloadFailure]) -> String {
    failures
        .first()
        .map_or_else(String::new, ToString::to_string)
}

impl TrialFailure {
    /// Failure for a trial refused before any worker was launched.
    pub fn rejected(plan: &TrialPlan, detail: impl Into<String>) -> Self {
        Self {
            thread_count: plan.thread_count,
            phase: plan.phase,
            trial: plan.trial,
            failures: vec![WorkloadFailure {
                path: plan.directory.clone(),
                direction: plan.phase,
                exit_status: None,
                detail: detail.into(),
            }],
        }
    }

    pub fn failed_paths(&self) -> Vec<PathBuf> {
        self.failures.iter().map(|f| f.path.clone()).collect()
    }
}

/// Runs all workers of a trial concurrently and joins them.
#[derive(Debug)]
pub struct ParallelTrial<R> {
    runner: Arc<R>,
}

impl<R> Clone for ParallelTrial<R> {
    fn clone(&self) -> Self {
        Self {
            runner: Arc::clone(&self.runner),
        }
    }
}

impl<R: WorkloadRunner> ParallelTrial<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &Arc<R> {
        &self.runner
    }

    /// Launch `plan.thread_count` workers and wait for all of them.
    ///
    /// Every worker is drained even after one fails, so no copy outlives the trial.
    pub async fn run(&self, plan: &TrialPlan) -> Result<TrialResult, TrialFailure> {
        if plan.thread_count == 0 {
            debug!(phase = %plan.phase, trial = plan.trial, "Zero-thread trial, nothing to launch");
            return Ok(TrialResult::degenerate(plan.phase, plan.trial));
        }

        if plan.total_bytes().is_none() {
            warn!(
                phase = %plan.phase,
                threads = plan.thread_count,
                byte_count = plan.byte_count,
                "Trial volume overflows a byte count, not launching"
            );
            return Err(TrialFailure::rejected(
                plan,
                format!(
                    "{} workers of {} bytes overflow a byte count",
                    plan.thread_count, plan.byte_count
                ),
            ));
        }

        // Each spec moves at most byte_count, so the sum is bounded by total_bytes.
        let specs = plan.specs();
        let total_bytes: u64 = specs.iter().map(WorkloadSpec::byte_count).sum();
        let workers = specs.len();

        let mut set = JoinSet::new();
        let mut paths = HashMap::with_capacity(workers);
        let start = Instant::now();
        for (index, spec) in specs.into_iter().enumerate() {
            let runner = Arc::clone(&self.runner);
            let path = spec.path().to_path_buf();
            let handle = set.spawn(async move { (index, runner.run(spec).await) });
            paths.insert(handle.id(), path);
        }

        let mut worker_elapsed = vec![0.0; workers];
        let mut failures = Vec::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, Ok(outcome))) => {
                    worker_elapsed[index] = outcome.elapsed.as_secs_f64();
                }
                Ok((_, Err(failure))) => {
                    warn!(
                        path = %failure.path.display(),
                        threads = plan.thread_count,
                        trial = plan.trial,
                        exit_status = ?failure.exit_status,
                        "Worker failed"
                    );
                    failures.push(failure);
                }
                Err(join_error) => {
                    let path = paths.remove(&join_error.id()).unwrap_or_default();
                    warn!(path = %path.display(), error = %join_error, "Worker task aborted");
                    failures.push(WorkloadFailure {
                        path,
                        direction: plan.phase,
                        exit_status: None,
                        detail: format!("worker task aborted: {join_error}"),
                    });
                }
            }
        }
        let elapsed_secs = start.elapsed().as_secs_f64();

        if !failures.is_empty() {
            failures.sort_by(|a, b| a.path.cmp(&b.path));
            return Err(TrialFailure {
                thread_count: plan.thread_count,
                phase: plan.phase,
                trial: plan.trial,
                failures,
            });
        }

        let result = TrialResult::from_span(plan, elapsed_secs, total_bytes, worker_elapsed);
        debug!(
            phase = %plan.phase,
            threads = plan.thread_count,
            trial = plan.trial,
            elapsed_secs = result.elapsed_secs,
            mbps = result.throughput_mbps,
            "Trial complete"
        );
        Ok(result)
    }
}
