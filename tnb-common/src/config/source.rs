//! Provenance tracking for configuration values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a configuration value came from, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
    Cli,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::File => write!(f, "config file"),
            Self::Environment => write!(f, "environment"),
            Self::Cli => write!(f, "command line"),
        }
    }
}

/// A value paired with its source and, for environment values, the variable name.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub value: T,
    pub source: ConfigSource,
    pub origin: Option<String>,
}

impl<T> Sourced<T> {
    pub fn default_value(value: T) -> Self {
        Self {
            value,
            source: ConfigSource::Default,
            origin: None,
        }
    }

    pub fn from_env(value: T, var_name: String) -> Self {
        Self {
            value,
            source: ConfigSource::Environment,
            origin: Some(var_name),
        }
    }

    /// True when the value was supplied by the environment.
    pub fn is_env(&self) -> bool {
        self.source == ConfigSource::Environment
    }

    /// The value if it was set explicitly, `None` for defaults.
    pub fn explicit(self) -> Option<T> {
        match self.source {
            ConfigSource::Default => None,
            _ => Some(self.value),
        }
    }
}
