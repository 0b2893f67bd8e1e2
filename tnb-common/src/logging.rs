//! Logging initialization shared by the TN-Bench binaries.
//!
//! ```ignore
//! let mut log_config = LogConfig::from_env("info").with_stderr();
//! if verbose {
//!     log_config = log_config.with_level("debug");
//! }
//! let _logging_guards = init_logging(&log_config)?;
//! ```

use crate::config::EnvParser;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum LogError {
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("log file path has no file name: {0}")]
    InvalidFile(PathBuf),

    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Console output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `tnb_bench=debug`.
    pub level: String,
    pub format: LogFormat,
    /// Write console output to stderr instead of stdout.
    pub stderr: bool,
    /// Optional JSON log file, written in the background.
    pub file: Option<PathBuf>,
}

impl LogConfig {
    /// Build from `TNB_LOG_LEVEL`, `TNB_LOG_FORMAT` and `TNB_LOG_FILE`.
    ///
    /// Invalid values fall back to the defaults.
    pub fn from_env(default_level: &str) -> Self {
        let mut parser = EnvParser::new();
        let level = parser.get_log_level("LOG_LEVEL", default_level).value;
        let format = match parser
            .get_string("LOG_FORMAT", "pretty")
            .value
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        let file = parser.get_optional_string("LOG_FILE").value.map(PathBuf::from);
        Self {
            level,
            format,
            stderr: false,
            file,
        }
    }

    #[must_use]
    pub fn with_stderr(mut self) -> Self {
        self.stderr = true;
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            stderr: false,
            file: None,
        }
    }
}

/// Keeps background log writers alive. Drop at process exit to flush.
#[must_use = "dropping the guards stops the background log writer"]
pub struct LoggingGuards {
    _guards: Vec<WorkerGuard>,
}

/// Install the global tracing subscriber.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuards, LogError> {
    let filter = EnvFilter::try_new(&config.level).map_err(|e| LogError::InvalidFilter {
        filter: config.level.clone(),
        reason: e.to_string(),
    })?;

    let mut guards = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let writer = if config.stderr {
        BoxMakeWriter::new(std::io::stderr)
    } else {
        BoxMakeWriter::new(std::io::stdout)
    };
    layers.push(match config.format {
        LogFormat::Pretty => fmt::layer().with_target(false).with_writer(writer).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
    });

    if let Some(path) = &config.file {
        let (dir, name) = split_log_path(path)?;
        std::fs::create_dir_all(&dir).map_err(|source| LogError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        let appender = tracing_appender::rolling::never(&dir, name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        guards.push(guard);
        layers.push(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_file(true)
                .with_line_number(true)
                .with_writer(non_blocking)
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .map_err(|e| LogError::Init(e.to_string()))?;

    Ok(LoggingGuards { _guards: guards })
}

fn split_log_path(path: &Path) -> Result<(PathBuf, std::ffi::OsString), LogError> {
    let name = path
        .file_name()
        .ok_or_else(|| LogError::InvalidFile(path.to_path_buf()))?
        .to_os_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let config = LogConfig::default()
            .with_stderr()
            .with_level("debug")
            .with_format(LogFormat::Json)
            .with_file("/tmp/tnb.log");
        assert!(config.stderr);
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/tnb.log")));
    }

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("logs/run.jsonl")).unwrap();
        assert_eq!(dir, PathBuf::from("logs"));
        assert_eq!(name, "run.jsonl");

        let (dir, _) = split_log_path(Path::new("run.jsonl")).unwrap();
        assert_eq!(dir, PathBuf::from("."));

        assert!(matches!(
            split_log_path(Path::new("/")),
            Err(LogError::InvalidFile(_))
        ));
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let config = LogConfig::default().with_level("tnb_bench=loudest");
        assert!(matches!(
            init_logging(&config),
            Err(LogError::InvalidFilter { .. })
        ));
    }
}
