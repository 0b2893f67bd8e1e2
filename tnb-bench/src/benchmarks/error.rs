//! Benchmark error classification.
//!
//! Only inventory failures end a run. Everything else is scoped to one pool
//! or one disk and is recorded in the report while the run continues.

use super::trial::TrialFailure;
use super::workload::WorkloadFailure;
use tnb_common::HostError;

/// Errors that can occur while running benchmarks.
#[derive(Debug, thiserror::Error)]
pub enum BenchmarkError {
    #[error("{target}: {failure}")]
    WorkloadFailure {
        /// Disk or pool the workload was addressed to.
        target: String,
        #[source]
        failure: WorkloadFailure,
    },

    #[error("pool {pool}: {failure}")]
    TrialFailure {
        pool: String,
        #[source]
        failure: TrialFailure,
    },

    #[error(
        "pool {pool}: insufficient space for {threads} threads: {available} bytes available, {required} bytes required"
    )]
    InsufficientSpace {
        pool: String,
        threads: u32,
        available: u64,
        required: u64,
    },

    #[error("{what} inventory unavailable: {source}")]
    InventoryUnavailable {
        what: &'static str,
        #[source]
        source: HostError,
    },

    #[error("pool {pool}: {operation} failed: {source}")]
    Host {
        pool: String,
        operation: &'static str,
        #[source]
        source: HostError,
    },
}

impl BenchmarkError {
    /// Whether the whole run must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InventoryUnavailable { .. })
    }

    /// Pool or disk this error is scoped to, if any.
    pub fn scope(&self) -> Option<&str> {
        match self {
            Self::WorkloadFailure { target, .. } => Some(target),
            Self::TrialFailure { pool, .. }
            | Self::InsufficientSpace { pool, .. }
            | Self::Host { pool, .. } => Some(pool),
            Self::InventoryUnavailable { .. } => None,
        }
    }
}
