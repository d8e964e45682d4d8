//! Configuration management for the engine
//!
//! This module provides configuration file support with TOML format
//! and sensible defaults. All fields default to values suitable for
//! interactive analytical queries.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Query limits
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Regroup planning options
    #[serde(default)]
    pub regroup: RegroupConfig,

    /// Rendering options for group keys
    #[serde(default)]
    pub rendering: RenderingConfig,
}

/// Limits applied while executing a single query
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    /// Maximum number of groups one query may fan out to
    #[serde(default = "default_group_limit")]
    pub group_limit: usize,
}

/// Regroup planning options
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegroupConfig {
    /// Merge compatible consecutive query regroups before issuing them
    #[serde(default = "default_true")]
    pub optimize_consecutive_queries: bool,
}

/// Rendering options for group keys
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RenderingConfig {
    /// Default chrono format string for time-bucket labels
    #[serde(default = "default_time_format")]
    pub time_format: String,
}

// Default value functions
fn default_group_limit() -> usize {
    1_000_000
}
fn default_true() -> bool {
    true
}
fn default_time_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            limits: LimitsConfig::default(),
            regroup: RegroupConfig::default(),
            rendering: RenderingConfig::default(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            group_limit: default_group_limit(),
        }
    }
}

impl Default for RegroupConfig {
    fn default() -> Self {
        Self {
            optimize_consecutive_queries: true,
        }
    }
}

impl Default for RenderingConfig {
    fn default() -> Self {
        Self {
            time_format: default_time_format(),
        }
    }
}

impl EngineConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Configuration(e.to_string()))
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Configuration(format!("failed to read config file: {}", e)))?;
        Self::from_toml(&contents)
    }
}
