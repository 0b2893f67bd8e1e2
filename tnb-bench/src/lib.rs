//! TN-Bench benchmarking core.
//!
//! - [`benchmarks`]: workload runner, parallel trials, thread sweeps, disk calibration
//! - [`report`]: report assembly
//! - [`session`]: one full run over a [`tnb_common::HostApi`]

pub mod benchmarks;
pub mod report;
pub mod session;

pub use benchmarks::{
    BenchmarkError, DdRunner, DiskCalibrationBenchmark, DiskResult, ParallelTrial, SweepResult,
    SweepStatus, ThreadSweepBenchmark, TrialFailure, TrialResult, WorkloadFailure, WorkloadRunner,
    WorkloadSpec,
};
pub use report::{BenchmarkReport, Inventory, PoolReport, PoolStatus, ResultAggregator, SCHEMA_VERSION};
pub use session::{
    BenchmarkSession, PoolSelection, SessionOutcome, SpaceDecision, SpacePolicy, SpaceShortfall,
};
