//! Host collaborators: inventory queries and scratch dataset lifecycle.
//!
//! The benchmark core only talks to the host through [`HostApi`]. Two
//! implementations ship here:
//! - [`MidcltHost`] drives the TrueNAS middleware through `midclt call`.
//! - [`LocalHost`] treats plain directories as pools on any Linux machine.

mod local;
mod midclt;

pub use local::{LocalHost, parse_df_available, parse_pool_spec};
pub use midclt::{
    MidcltHost, parse_available_bytes, parse_disks, parse_pools, parse_size_string,
    parse_system_info, pool_membership,
};

use crate::types::{DiskInfo, PoolInfo, SystemInfo};
use std::future::Future;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised by host collaborators.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with status {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("unexpected output from {command}: {reason}")]
    Parse { command: String, reason: String },

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl HostError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Narrow interface the benchmark core consumes from the host.
pub trait HostApi: Send + Sync {
    /// Core count, physical memory and identity.
    fn system_info(&self) -> impl Future<Output = Result<SystemInfo, HostError>> + Send;

    /// Pools that can host a scratch dataset.
    fn pools(&self) -> impl Future<Output = Result<Vec<PoolInfo>, HostError>> + Send;

    /// Raw disks with their capacities.
    fn disks(&self) -> impl Future<Output = Result<Vec<DiskInfo>, HostError>> + Send;

    /// Create the scratch dataset on `pool` if missing and return its mount path.
    ///
    /// Calling this twice for the same pool returns the same path.
    fn ensure_scratch_dataset(
        &self,
        pool: &str,
    ) -> impl Future<Output = Result<PathBuf, HostError>> + Send;

    /// Free bytes in the scratch dataset of `pool`.
    fn available_bytes(&self, pool: &str) -> impl Future<Output = Result<u64, HostError>> + Send;

    /// Remove the scratch dataset of `pool`.
    fn delete_scratch_dataset(
        &self,
        pool: &str,
    ) -> impl Future<Output = Result<(), HostError>> + Send;

    /// Remove `<prefix>*.dat` workload files under `path`. Returns how many were removed.
    fn cleanup_scratch_files(
        &self,
        path: &Path,
        prefix: &str,
    ) -> impl Future<Output = Result<usize, HostError>> + Send {
        remove_scratch_files(path, prefix)
    }
}

/// Delete workload files named `<prefix>*.dat` directly under `dir`.
pub async fn remove_scratch_files(dir: &Path, prefix: &str) -> Result<usize, HostError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| HostError::io(dir, e))?;
    let mut removed = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| HostError::io(dir, e))?
    {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(prefix) && name.ends_with(".dat") {
            let path = entry.path();
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| HostError::io(&path, e))?;
            debug!(path = %path.display(), "Removed workload file");
            removed += 1;
        }
    }
    Ok(removed)
}
