//! Shared types, host collaborators, configuration and logging for TN-Bench.

pub mod config;
pub mod host;
pub mod logging;
pub mod types;

pub use config::{BenchConfig, ConfigError, ConfigSource, Iterations};
pub use host::{HostApi, HostError, LocalHost, MidcltHost};
pub use logging::{LogConfig, LogError, LogFormat, LoggingGuards, init_logging};
pub use types::{DiskInfo, GIB, KIB, MIB, PoolInfo, SystemInfo, TIB};
