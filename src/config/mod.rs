//! TOML-based engine configuration.
//!
//! Example configuration:
//! ```toml
//! default_dim_set = "CD000"
//! max_depth = 50
//! max_concurrent_fetches = 8
//! dialect = "duckdb"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::sql::Dialect;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Dimension-set assumed for physical metrics whose definition carries
    /// none.
    pub default_dim_set: String,

    /// Recursion ceiling for dependency resolution. The 50 here is the
    /// carried-over business rule; raise it only with domain-owner sign-off.
    pub max_depth: usize,

    /// Bound on concurrently in-flight store fetches per request.
    pub max_concurrent_fetches: usize,

    /// SQL dialect the batch statement targets.
    pub dialect: Dialect,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_dim_set: crate::resolver::DEFAULT_DIM_SET.into(),
            max_depth: crate::resolver::DEFAULT_MAX_DEPTH,
            max_concurrent_fetches: 8,
            dialect: Dialect::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file. Missing keys fall back to
    /// defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}
