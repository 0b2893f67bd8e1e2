//! Single sequential I/O operations delegated to an external block-copy tool.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::debug;

/// Which way bytes flow relative to `path`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Random bytes into the file at `path`.
    Write,
    /// The file or device at `path` into the discard sink.
    Read,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write => write!(f, "write"),
            Self::Read => write!(f, "read"),
        }
    }
}

/// One sequential copy. Immutable once built and consumed by a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadSpec {
    path: PathBuf,
    direction: Direction,
    block_size: u64,
    block_count: u64,
}

impl WorkloadSpec {
    /// Write `byte_count` random bytes to `path`.
    pub fn write(path: impl Into<PathBuf>, block_size: u64, byte_count: u64) -> Self {
        Self::new(path.into(), Direction::Write, block_size, byte_count)
    }

    /// Read `byte_count` bytes from `path` and discard them.
    pub fn read(path: impl Into<PathBuf>, block_size: u64, byte_count: u64) -> Self {
        Self::new(path.into(), Direction::Read, block_size, byte_count)
    }

    fn new(path: PathBuf, direction: Direction, block_size: u64, byte_count: u64) -> Self {
        let block_size = block_size.max(1);
        Self {
            path,
            direction,
            block_size,
            block_count: byte_count / block_size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Whole blocks copied. A trailing partial block is not transferred.
    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    /// Bytes the copy moves: `block_count × block_size`.
    pub fn byte_count(&self) -> u64 {
        self.block_count * self.block_size
    }
}

/// Wall-clock result of one completed workload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkloadOutcome {
    pub elapsed: Duration,
    pub bytes: u64,
}

/// One copy that did not complete successfully. Never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{direction} of {path} failed (exit status {}): {detail}", display_status(.exit_status))]
pub struct WorkloadFailure {
    pub path: PathBuf,
    pub direction: Direction,
    /// Process exit code. `None` when the tool could not be started or was killed by a signal.
    pub exit_status: Option<i32>,
    pub detail: String,
}

fn display_status(status: &Option<i32>) -> String {
    status.map_or_else(|| "none".to_string(), |code| code.to_string())
}

/// Runs one [`WorkloadSpec`] to completion.
pub trait WorkloadRunner: Send + Sync + 'static {
    fn run(
        &self,
        spec: WorkloadSpec,
    ) -> impl Future<Output = Result<WorkloadOutcome, WorkloadFailure>> + Send;
}

/// Runner backed by `dd`, invoked directly without a shell.
#[derive(Debug, Clone)]
pub struct DdRunner {
    program: PathBuf,
    random_source: PathBuf,
    discard_sink: PathBuf,
}

impl DdRunner {
    pub fn new(
        program: impl Into<PathBuf>,
        random_source: impl Into<PathBuf>,
        discard_sink: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            random_source: random_source.into(),
            discard_sink: discard_sink.into(),
        }
    }

    /// `dd` arguments for `spec`.
    pub fn args(&self, spec: &WorkloadSpec) -> Vec<String> {
        let (input, output) = match spec.direction() {
            Direction::Write => (self.random_source.as_path(), spec.path()),
            Direction::Read => (spec.path(), self.discard_sink.as_path()),
        };
        vec![
            format!("if={}", input.display()),
            format!("of={}", output.display()),
            format!("bs={}", spec.block_size()),
            format!("count={}", spec.block_count()),
            "status=none".to_string(),
        ]
    }
}

impl Default for DdRunner {
    fn default() -> Self {
        Self::new("dd", "/dev/urandom", "/dev/null")
    }
}

impl WorkloadRunner for DdRunner {
    async fn run(&self, spec: WorkloadSpec) -> Result<WorkloadOutcome, WorkloadFailure> {
        let args = self.args(&spec);
        debug!(
            path = %spec.path().display(),
            direction = %spec.direction(),
            bs = spec.block_size(),
            count = spec.block_count(),
            "Starting workload"
        );

        let start = Instant::now();
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| WorkloadFailure {
                path: spec.path().to_path_buf(),
                direction: spec.direction(),
                exit_status: None,
                detail: format!("failed to start {}: {e}", self.program.display()),
            })?;
        let elapsed = start.elapsed();

        if !output.status.success() {
            return Err(WorkloadFailure {
                path: spec.path().to_path_buf(),
                direction: spec.direction(),
                exit_status: output.status.code(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        debug!(
            path = %spec.path().display(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Workload complete"
        );
        Ok(WorkloadOutcome {
            elapsed,
            bytes: spec.byte_count(),
        })
    }
}
