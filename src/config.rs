//! Server configuration
//!
//! Loaded from a JSON document such as:
//!
//! ```json
//! { "ports": [1000, 1001], "workers": 1, "history_dir": "." }
//! ```
//!
//! Only `ports` is required. The `--log-level` command-line flag, when
//! given, overrides `log_level` from the file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Default location of the config file
pub const DEFAULT_CONFIG_PATH: &str = "config/config.json";

/// Fully resolved server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Ports to listen on; each gets its own room
    pub ports: Vec<u16>,
    /// Interface to bind
    pub host: String,
    /// Worker threads in the runtime
    pub workers: usize,
    /// Directory holding the per-room history files
    pub history_dir: PathBuf,
    /// Operational log file
    pub log_file: PathBuf,
    /// Log level filter (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ports: Vec::new(),
            host: "0.0.0.0".to_string(),
            workers: 1,
            history_dir: PathBuf::from("."),
            log_file: PathBuf::from("server.log"),
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Read and validate the config file at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Parse and validate a JSON config document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ports.is_empty() {
            return Err(ConfigError::NoPorts);
        }
        if self.workers == 0 {
            return Err(ConfigError::InvalidWorkers);
        }
        Ok(())
    }
}
