//! Per-disk raw sequential read, sized to defeat the page and ARC caches.
//!
//! Each disk is read for `min(system memory, disk capacity)` bytes in 4 KiB
//! blocks, one stream at a time, strictly one disk after another.

use super::trial::throughput;
use super::workload::{WorkloadFailure, WorkloadRunner, WorkloadSpec};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tnb_common::{BenchConfig, DiskInfo, Iterations, KIB, MIB};
use tracing::{debug, info, warn};

/// Fixed block size for raw disk reads.
pub const DISK_BLOCK_SIZE: u64 = 4 * KIB;

/// Bytes to read from a disk: the smaller of system memory and disk capacity.
pub fn calibrated_read_volume(memory_bytes: u64, capacity_bytes: u64) -> u64 {
    memory_bytes.min(capacity_bytes)
}

/// Calibration samples for one disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskResult {
    pub disk: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
    /// MiB/s of each completed read, in run order.
    pub runs_mbps: Vec<f64>,
    /// Mean of `runs_mbps`. Absent when a read failed.
    pub average_mbps: Option<f64>,
    pub iterations: u32,
    pub calibrated_read_volume: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<WorkloadFailure>,
}

/// A disk that was not read, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDisk {
    pub disk: String,
    pub reason: String,
}

/// Everything the calibration phase produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiskCalibration {
    pub results: Vec<DiskResult>,
    pub skipped: Vec<SkippedDisk>,
}

/// Reads every disk in turn with a single stream.
#[derive(Debug)]
pub struct DiskCalibrationBenchmark<R> {
    runner: Arc<R>,
    iterations: Iterations,
    device_dir: PathBuf,
}

impl<R: WorkloadRunner> DiskCalibrationBenchmark<R> {
    pub fn new(runner: Arc<R>) -> Self {
        Self {
            runner,
            iterations: Iterations::default(),
            device_dir: PathBuf::from("/dev"),
        }
    }

    pub fn from_config(runner: Arc<R>, config: &BenchConfig) -> Self {
        Self::new(runner)
            .with_iterations(config.disk_iterations)
            .with_device_dir(config.device_dir.clone())
    }

    #[must_use]
    pub fn with_iterations(mut self, iterations: Iterations) -> Self {
        self.iterations = iterations;
        self
    }

    #[must_use]
    pub fn with_device_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.device_dir = dir.into();
        self
    }

    /// Calibrate and read each disk in order.
    pub async fn run(&self, disks: &[DiskInfo], memory_bytes: u64) -> DiskCalibration {
        info!(
            disks = disks.len(),
            memory_bytes,
            iterations = self.iterations.get(),
            "Starting disk calibration"
        );

        let mut calibration = DiskCalibration::default();
        for disk in disks {
            let capacity = match disk.capacity_bytes {
                Some(bytes) if bytes > 0 => bytes,
                _ => {
                    debug!(disk = %disk.name, "Skipping disk with unknown capacity");
                    calibration.skipped.push(SkippedDisk {
                        disk: disk.name.clone(),
                        reason: "unknown or zero capacity".to_string(),
                    });
                    continue;
                }
            };

            let volume = calibrated_read_volume(memory_bytes, capacity);
            if volume < DISK_BLOCK_SIZE {
                calibration.skipped.push(SkippedDisk {
                    disk: disk.name.clone(),
                    reason: format!("read volume of {volume} bytes is below one block"),
                });
                continue;
            }

            calibration.results.push(self.read_disk(disk, volume).await);
        }
        calibration
    }

    async fn read_disk(&self, disk: &DiskInfo, volume: u64) -> DiskResult {
        let iterations = self.iterations.get();
        let device = self.device_dir.join(&disk.name);
        let mut runs_mbps = Vec::with_capacity(iterations as usize);
        let mut failure = None;

        for run in 0..iterations {
            let spec = WorkloadSpec::read(&device, DISK_BLOCK_SIZE, volume);
            match self.runner.run(spec).await {
                Ok(outcome) => {
                    let mbps = throughput(outcome.bytes, outcome.elapsed.as_secs_f64()) / MIB as f64;
                    info!(disk = %disk.name, run = run + 1, mbps, "Disk read finished");
                    runs_mbps.push(mbps);
                }
                Err(e) => {
                    warn!(disk = %disk.name, run = run + 1, error = %e, "Disk read failed");
                    failure = Some(e);
                    break;
                }
            }
        }

        let average_mbps = (failure.is_none() && runs_mbps.len() == iterations as usize)
            .then(|| runs_mbps.iter().sum::<f64>() / runs_mbps.len() as f64);

        DiskResult {
            disk: disk.name.clone(),
            pool: disk.pool.clone(),
            runs_mbps,
            average_mbps,
            iterations,
            calibrated_read_volume: volume,
            failure,
        }
    }
}
