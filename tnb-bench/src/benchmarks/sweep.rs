//! Thread-count sweep over one pool directory.
//!
//! Each sweep point runs the configured number of write trials and then the
//! same number of read trials against the files just written. Points run
//! strictly one after another.

use super::trial::{ParallelTrial, TrialFailure, TrialPlan, TrialResult};
use super::workload::{Direction, WorkloadRunner};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tnb_common::config::bench::{DEFAULT_BLOCK_SIZE_KIB, DEFAULT_PER_THREAD_MIB};
use tnb_common::{BenchConfig, Iterations, KIB, MIB};
use tracing::{info, warn};

pub use tnb_common::config::bench::READ_VOLUME_FACTOR;

/// `[1, cores/4, cores/2, cores]` with floor division. Duplicates and zeros are kept.
pub fn thread_series(cores: u32) -> [u32; 4] {
    [1, cores / 4, cores / 2, cores]
}

/// Outcome of one sweep point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStatus {
    Complete,
    /// A trial in `phase` failed; later trials of the point were not run.
    Incomplete {
        phase: Direction,
        failure: TrialFailure,
    },
    /// Zero-thread point. Trials are recorded without launching workers.
    Degenerate,
}

/// Write and read series for one thread count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub thread_count: u32,
    pub write_trials: Vec<TrialResult>,
    pub read_trials: Vec<TrialResult>,
    /// Mean write MiB/s. Present only when every write trial completed.
    pub average_write_mbps: Option<f64>,
    /// Mean read MiB/s. Present only when every read trial completed.
    pub average_read_mbps: Option<f64>,
    pub iterations: u32,
    pub status: SweepStatus,
}

impl SweepResult {
    pub fn is_complete(&self) -> bool {
        !matches!(self.status, SweepStatus::Incomplete { .. })
    }
}

/// Mean MiB/s over `trials`, only when there are exactly `iterations` of them.
pub fn average_mbps(trials: &[TrialResult], iterations: u32) -> Option<f64> {
    if trials.is_empty() || trials.len() != iterations as usize {
        return None;
    }
    Some(trials.iter().map(|t| t.throughput_mbps).sum::<f64>() / trials.len() as f64)
}

/// Runs the write/read trial series at every point of the thread series.
#[derive(Debug, Clone)]
pub struct ThreadSweepBenchmark<R> {
    trial: ParallelTrial<R>,
    iterations: Iterations,
    per_thread_bytes: u64,
    block_size: u64,
    file_prefix: String,
}

impl<R: WorkloadRunner> ThreadSweepBenchmark<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self {
            trial: ParallelTrial::new(runner),
            iterations: Iterations::default(),
            per_thread_bytes: DEFAULT_PER_THREAD_MIB * MIB,
            block_size: DEFAULT_BLOCK_SIZE_KIB * KIB,
            file_prefix: "file_".to_string(),
        }
    }

    /// Sweep sized from a resolved configuration.
    pub fn from_config(runner: Arc<R>, config: &BenchConfig) -> Self {
        Self::new(runner)
            .with_iterations(config.pool_iterations)
            .with_per_thread_bytes(config.per_thread_bytes())
            .with_block_size(config.block_size_bytes())
            .with_file_prefix(config.file_prefix.clone())
    }

    #[must_use]
    pub fn with_iterations(mut self, iterations: Iterations) -> Self {
        self.iterations = iterations;
        self
    }

    #[must_use]
    pub fn with_per_thread_bytes(mut self, bytes: u64) -> Self {
        self.per_thread_bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_block_size(mut self, bytes: u64) -> Self {
        self.block_size = bytes;
        self
    }

    #[must_use]
    pub fn with_file_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn iterations(&self) -> Iterations {
        self.iterations
    }

    pub fn file_prefix(&self) -> &str {
        &self.file_prefix
    }

    /// Run every point of `thread_series(cores)` in order against `directory`.
    pub async fn run(&self, directory: &Path, cores: u32) -> Vec<SweepResult> {
        let series = thread_series(cores);
        info!(
            path = %directory.display(),
            cores,
            series = ?series,
            iterations = self.iterations.get(),
            "Starting thread sweep"
        );

        let mut results = Vec::with_capacity(series.len());
        for threads in series {
            results.push(self.run_point(directory, threads).await);
        }
        results
    }

    /// Run one sweep point: all write trials, then all read trials.
    pub async fn run_point(&self, directory: &Path, threads: u32) -> SweepResult {
        let iterations = self.iterations.get();

        if threads == 0 {
            warn!(path = %directory.display(), "Zero-thread sweep point, recording empty trials");
            let empty = |phase| {
                (1..=iterations)
                    .map(|trial| TrialResult::degenerate(phase, trial))
                    .collect::<Vec<_>>()
            };
            let write_trials = empty(Direction::Write);
            let read_trials = empty(Direction::Read);
            return SweepResult {
                thread_count: 0,
                average_write_mbps: average_mbps(&write_trials, iterations),
                average_read_mbps: average_mbps(&read_trials, iterations),
                write_trials,
                read_trials,
                iterations,
                status: SweepStatus::Degenerate,
            };
        }

        let write_bytes = self.per_thread_bytes;
        let Some(read_bytes) = self.per_thread_bytes.checked_mul(READ_VOLUME_FACTOR) else {
            // Nothing is written when the read phase cannot be sized.
            let plan = self.plan(directory, threads, Direction::Read, u64::MAX, 1);
            let failure = TrialFailure::rejected(
                &plan,
                format!(
                    "read volume of {READ_VOLUME_FACTOR} x {} bytes overflows a byte count",
                    self.per_thread_bytes
                ),
            );
            warn!(path = %directory.display(), threads, error = %failure, "Sweep point refused");
            return SweepResult {
                thread_count: threads,
                write_trials: Vec::new(),
                read_trials: Vec::new(),
                average_write_mbps: None,
                average_read_mbps: None,
                iterations,
                status: SweepStatus::Incomplete {
                    phase: Direction::Read,
                    failure,
                },
            };
        };

        let write = self
            .run_phase(directory, threads, Direction::Write, write_bytes)
            .await;
        let (write_trials, read_trials, status) = match write {
            (trials, Some(failure)) => (
                trials,
                Vec::new(),
                SweepStatus::Incomplete {
                    phase: Direction::Write,
                    failure,
                },
            ),
            (write_trials, None) => {
                match self
                    .run_phase(directory, threads, Direction::Read, read_bytes)
                    .await
                {
                    (read_trials, Some(failure)) => (
                        write_trials,
                        read_trials,
                        SweepStatus::Incomplete {
                            phase: Direction::Read,
                            failure,
                        },
                    ),
                    (read_trials, None) => (write_trials, read_trials, SweepStatus::Complete),
                }
            }
        };

        let result = SweepResult {
            thread_count: threads,
            average_write_mbps: average_mbps(&write_trials, iterations),
            average_read_mbps: average_mbps(&read_trials, iterations),
            write_trials,
            read_trials,
            iterations,
            status,
        };

        match &result.status {
            SweepStatus::Incomplete { phase, failure } => warn!(
                path = %directory.display(),
                threads,
                phase = %phase,
                trial = failure.trial,
                failed = failure.failures.len(),
                "Sweep point incomplete"
            ),
            _ => info!(
                path = %directory.display(),
                threads,
                write_mbps = result.average_write_mbps.unwrap_or_default(),
                read_mbps = result.average_read_mbps.unwrap_or_default(),
                "Sweep point complete"
            ),
        }
        result
    }

    fn plan(&self, directory: &Path, threads: u32, phase: Direction, byte_count: u64, trial: u32) -> TrialPlan {
        TrialPlan {
            phase,
            thread_count: threads,
            byte_count,
            block_size: self.block_size,
            directory: PathBuf::from(directory),
            file_prefix: self.file_prefix.clone(),
            trial,
        }
    }

    /// Run the phase's trials in order, stopping at the first failure.
    async fn run_phase(
        &self,
        directory: &Path,
        threads: u32,
        phase: Direction,
        byte_count: u64,
    ) -> (Vec<TrialResult>, Option<TrialFailure>) {
        let mut trials = Vec::new();
        for trial in 1..=self.iterations.get() {
            let plan = self.plan(directory, threads, phase, byte_count, trial);
            match self.trial.run(&plan).await {
                Ok(result) => {
                    info!(
                        phase = %phase,
                        threads,
                        trial,
                        mbps = result.throughput_mbps,
                        elapsed_secs = result.elapsed_secs,
                        "Trial finished"
                    );
                    trials.push(result);
                }
                Err(failure) => return (trials, Some(failure)),
            }
        }
        (trials, None)
    }
}
