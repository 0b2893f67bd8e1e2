//! Benchmark run configuration.
//!
//! Values resolve in layers: built-in defaults, an optional TOML file,
//! `TNB_` environment variables, then command-line overrides applied by the
//! binary through [`BenchConfig::set_cli`].

use super::env::{EnvError, EnvParser};
use super::source::{ConfigSource, Sourced};
use crate::types::{KIB, MIB};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default per-thread write budget: 10 GiB.
pub const DEFAULT_PER_THREAD_MIB: u64 = 10_240;
/// Default block size for pool workloads: 1 MiB.
pub const DEFAULT_BLOCK_SIZE_KIB: u64 = 1024;
/// Read trials move this many times the per-thread write budget.
pub const READ_VOLUME_FACTOR: u64 = 2;

/// Errors raised while resolving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid environment configuration: {}", join_env_errors(.0))]
    Env(Vec<EnvError>),

    #[error("iteration count must be 1 or 2, got {0}")]
    InvalidIterations(u32),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

fn join_env_errors(errors: &[EnvError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Trial repetition count. Only one or two repetitions are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Iterations(u8);

impl Iterations {
    pub const ONCE: Self = Self(1);
    pub const TWICE: Self = Self(2);

    pub fn new(count: u32) -> Result<Self, ConfigError> {
        match count {
            1 => Ok(Self::ONCE),
            2 => Ok(Self::TWICE),
            other => Err(ConfigError::InvalidIterations(other)),
        }
    }

    pub fn get(self) -> u32 {
        u32::from(self.0)
    }
}

impl Default for Iterations {
    fn default() -> Self {
        Self::TWICE
    }
}

impl TryFrom<u32> for Iterations {
    type Error = ConfigError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Iterations> for u32 {
    fn from(value: Iterations) -> Self {
        value.get()
    }
}

impl fmt::Display for Iterations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fully resolved configuration for one benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    /// Trials per phase at every sweep point.
    pub pool_iterations: Iterations,
    /// Reads per disk during calibration.
    pub disk_iterations: Iterations,
    /// Write budget per worker thread, in MiB.
    pub per_thread_mib: u64,
    /// Pool workload block size, in KiB.
    pub block_size_kib: u64,
    /// Workload file name prefix; files are `<prefix><index>.dat`.
    pub file_prefix: String,
    /// Scratch dataset name created under each pool.
    pub dataset_name: String,
    /// Record size requested for the scratch dataset.
    pub record_size: String,
    /// Whether the per-disk calibration phase runs at all.
    pub disk_benchmark: bool,
    /// Block-copy program.
    pub dd_path: PathBuf,
    /// Byte generator read by write workloads.
    pub random_source: PathBuf,
    /// Sink written by read workloads.
    pub discard_sink: PathBuf,
    /// Directory holding raw disk device nodes.
    pub device_dir: PathBuf,
    /// Where the JSON report is written.
    pub output: PathBuf,
    #[serde(skip)]
    sources: BTreeMap<&'static str, ConfigSource>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            pool_iterations: Iterations::TWICE,
            disk_iterations: Iterations::TWICE,
            per_thread_mib: DEFAULT_PER_THREAD_MIB,
            block_size_kib: DEFAULT_BLOCK_SIZE_KIB,
            file_prefix: "file_".to_string(),
            dataset_name: "tn-bench".to_string(),
            record_size: "1M".to_string(),
            disk_benchmark: true,
            dd_path: PathBuf::from("dd"),
            random_source: PathBuf::from("/dev/urandom"),
            discard_sink: PathBuf::from("/dev/null"),
            device_dir: PathBuf::from("/dev"),
            output: PathBuf::from("./tn_bench_results.json"),
            sources: BTreeMap::new(),
        }
    }
}

impl BenchConfig {
    /// Resolve defaults, the optional file and the environment, then validate.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let mut parser = EnvParser::new();
        config.apply_env(&mut parser);
        if parser.has_errors() {
            return Err(ConfigError::Env(parser.take_errors()));
        }
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file. Keys absent from the file keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let mut config: Self = toml::from_str(content)?;
        let table: toml::Table = toml::from_str(content)?;
        for key in table.keys() {
            if let Some(field) = Self::field_name(key) {
                config.sources.insert(field, ConfigSource::File);
            }
        }
        Ok(config)
    }

    /// Overlay `TNB_` environment variables. Errors accumulate in `parser`.
    pub fn apply_env(&mut self, parser: &mut EnvParser) {
        let pool_iterations =
            parser.get_u32_range("POOL_ITERATIONS", self.pool_iterations.get(), 1, 2);
        if let Some(n) = self.take("pool_iterations", pool_iterations) {
            self.pool_iterations = Iterations::new(n).unwrap_or_default();
        }

        let disk_iterations =
            parser.get_u32_range("DISK_ITERATIONS", self.disk_iterations.get(), 1, 2);
        if let Some(n) = self.take("disk_iterations", disk_iterations) {
            self.disk_iterations = Iterations::new(n).unwrap_or_default();
        }

        let per_thread_mib =
            parser.get_u64_range(
            "PER_THREAD_MIB",
            self.per_thread_mib,
            1,
            u64::MAX / MIB / READ_VOLUME_FACTOR,
        );
        if let Some(n) = self.take("per_thread_mib", per_thread_mib) {
            self.per_thread_mib = n;
        }

        let block_size_kib =
            parser.get_u64_range("BLOCK_SIZE_KIB", self.block_size_kib, 4, 1024 * 1024);
        if let Some(n) = self.take("block_size_kib", block_size_kib) {
            self.block_size_kib = n;
        }

        let record_size = parser.get_string("RECORD_SIZE", &self.record_size);
        if let Some(v) = self.take("record_size", record_size) {
            self.record_size = v;
        }

        let disk_benchmark = parser.get_bool("DISK_BENCHMARK", self.disk_benchmark);
        if let Some(v) = self.take("disk_benchmark", disk_benchmark) {
            self.disk_benchmark = v;
        }

        let dd_path = parser.get_path("DD_PATH", &self.dd_path.to_string_lossy());
        if let Some(v) = self.take("dd_path", dd_path) {
            self.dd_path = v;
        }

        let output = parser.get_path("OUTPUT", &self.output.to_string_lossy());
        if let Some(v) = self.take("output", output) {
            self.output = v;
        }
    }

    fn take<T>(&mut self, field: &'static str, value: Sourced<T>) -> Option<T> {
        if value.is_env() {
            self.sources.insert(field, ConfigSource::Environment);
        }
        match value.source {
            ConfigSource::Environment => Some(value.value),
            _ => None,
        }
    }

    /// Record that the binary overrode `field` from a command-line flag.
    pub fn set_cli(&mut self, field: &'static str) {
        self.sources.insert(field, ConfigSource::Cli);
    }

    /// Where `field` was resolved from.
    pub fn source_of(&self, field: &str) -> ConfigSource {
        self.sources
            .get(field)
            .copied()
            .unwrap_or(ConfigSource::Default)
    }

    /// Reject values the benchmark cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.per_thread_mib == 0 {
            return Err(ConfigError::Invalid {
                field: "per_thread_mib",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.block_size_kib == 0 {
            return Err(ConfigError::Invalid {
                field: "block_size_kib",
                reason: "must be greater than zero".to_string(),
            });
        }
        let Some(per_thread_bytes) = self.per_thread_mib.checked_mul(MIB) else {
            return Err(ConfigError::Invalid {
                field: "per_thread_mib",
                reason: format!("{} MiB overflows a byte count", self.per_thread_mib),
            });
        };
        if per_thread_bytes.checked_mul(READ_VOLUME_FACTOR).is_none() {
            return Err(ConfigError::Invalid {
                field: "per_thread_mib",
                reason: format!(
                    "{} MiB read {READ_VOLUME_FACTOR} times overflows a byte count",
                    self.per_thread_mib
                ),
            });
        }
        if per_thread_bytes % self.block_size_bytes() != 0 {
            return Err(ConfigError::Invalid {
                field: "block_size_kib",
                reason: format!(
                    "{} KiB does not evenly divide the {} MiB per-thread budget",
                    self.block_size_kib, self.per_thread_mib
                ),
            });
        }
        if self.file_prefix.is_empty() || self.file_prefix.contains('/') {
            return Err(ConfigError::Invalid {
                field: "file_prefix",
                reason: format!("'{}' is not a plain file name prefix", self.file_prefix),
            });
        }
        if self.dataset_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "dataset_name",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Per-thread write budget in bytes.
    pub fn per_thread_bytes(&self) -> u64 {
        self.per_thread_mib * MIB
    }

    /// Pool workload block size in bytes.
    pub fn block_size_bytes(&self) -> u64 {
        self.block_size_kib * KIB
    }

    fn field_name(key: &str) -> Option<&'static str> {
        Some(match key {
            "pool_iterations" => "pool_iterations",
            "disk_iterations" => "disk_iterations",
            "per_thread_mib" => "per_thread_mib",
            "block_size_kib" => "block_size_kib",
            "file_prefix" => "file_prefix",
            "dataset_name" => "dataset_name",
            "record_size" => "record_size",
            "disk_benchmark" => "disk_benchmark",
            "dd_path" => "dd_path",
            "random_source" => "random_source",
            "discard_sink" => "discard_sink",
            "device_dir" => "device_dir",
            "output" => "output",
            _ => return None,
        })
    }
}
