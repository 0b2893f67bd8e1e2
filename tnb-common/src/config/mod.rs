//! Configuration system for TN-Bench.
//!
//! - Environment variable parsing with type safety
//! - Optional TOML configuration file
//! - Source tracking for debugging

pub mod bench;
pub mod env;
pub mod source;

pub use bench::{BenchConfig, ConfigError, Iterations};
pub use env::{EnvError, EnvParser};
pub use source::{ConfigSource, Sourced};

#[cfg(test)]
pub(crate) fn env_test_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    ENV_LOCK
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
