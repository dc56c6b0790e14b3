//! Interpreter configuration.
//!
//! Every field has a default, so an empty JSON object is a valid file:
//!
//! ```json
//! { "timer_hz": 60, "stack_limit": 16, "seed": null, "trace": false }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::cpu::timer::DEFAULT_TIMER_HZ;

/// Default call stack depth.
pub const DEFAULT_STACK_LIMIT: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// DT/ST countdown frequency in Hz.
    pub timer_hz: u32,

    /// Maximum number of pending return addresses. `None` never overflows.
    pub stack_limit: Option<usize>,

    /// Seed for RND. `None` seeds from entropy.
    pub seed: Option<u64>,

    /// Log every executed instruction at trace level.
    pub trace: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timer_hz: DEFAULT_TIMER_HZ,
            stack_limit: Some(DEFAULT_STACK_LIMIT),
            seed: None,
            trace: false,
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timer_hz == 0 {
            return Err(ConfigError::Invalid("timer_hz must be at least 1".to_string()));
        }
        if self.stack_limit == Some(0) {
            return Err(ConfigError::Invalid("stack_limit must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Timer period in whole milliseconds.
    pub fn period_ms(&self) -> u64 {
        1000 / u64::from(self.timer_hz.max(1))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("invalid configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
