//! Server configuration
//!
//! Defaults can be overridden by a JSON file named in `LINE_CHAT_CONFIG`;
//! the first command-line argument, when given, overrides the bind address.

use std::{env, fs};

use serde::Deserialize;

use crate::error::AppError;

/// Environment variable holding the optional config file path
pub const CONFIG_ENV: &str = "LINE_CHAT_CONFIG";

/// Default server address
const DEFAULT_ADDR: &str = "0.0.0.0:8000";

/// Per-connection outbound line buffer
const DEFAULT_OUTBOUND_BUFFER: usize = 32;

/// Longest accepted inbound line, in bytes
const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Address the listener binds to
    pub bind_addr: String,
    /// Capacity of each connection's outbound queue
    pub outbound_buffer: usize,
    /// Longest accepted inbound line
    pub max_line_length: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl Config {
    /// Parse a JSON config; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load from the environment and command line
    pub fn load() -> Result<Self, AppError> {
        let mut config = match env::var(CONFIG_ENV) {
            Ok(path) => Self::from_json(&fs::read_to_string(path)?)?,
            Err(_) => Self::default(),
        };

        if let Some(addr) = env::args().nth(1) {
            config.bind_addr = addr;
        }

        Ok(config)
    }

    /// Outbound queue capacity, never zero
    pub fn outbound_capacity(&self) -> usize {
        self.outbound_buffer.max(1)
    }
}
