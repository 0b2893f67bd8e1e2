//! Sequential-throughput benchmarks: workloads, parallel trials, thread sweeps
//! and per-disk calibration.

pub mod disk;
pub mod error;
pub mod sweep;
pub mod trial;
pub mod workload;

pub use disk::{
    DISK_BLOCK_SIZE, DiskCalibration, DiskCalibrationBenchmark, DiskResult, SkippedDisk,
    calibrated_read_volume,
};
pub use error::BenchmarkError;
pub use sweep::{
    READ_VOLUME_FACTOR, SweepResult, SweepStatus, ThreadSweepBenchmark, average_mbps,
    thread_series,
};
pub use trial::{ParallelTrial, TrialFailure, TrialPlan, TrialResult, throughput};
pub use workload::{
    DdRunner, Direction, WorkloadFailure, WorkloadOutcome, WorkloadRunner, WorkloadSpec,
};
