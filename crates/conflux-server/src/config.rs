//! Process-level environment configuration, following the pattern of
//! `apps/backend/local/runtime/src/config.rs` `Config::from_env` pattern.
//! The per-subsystem env groups (KG, retrieval) are parsed by their own
//! crates' `from_env()`; this only covers what's left (listen port, where
//! blobs live).

use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    /// Filesystem root for the object store, or `None` to keep everything
    /// in-memory for the lifetime of the process.
    pub data_dir: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Config {
            port: env::var("CONFLUX_PORT")
                .or_else(|_| env::var("PORT"))
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("CONFLUX_PORT".to_string()))?,
            data_dir: env::var("CONFLUX_DATA_DIR").ok(),
        })
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(var) => write!(f, "invalid value for: {var}"),
        }
    }
}

impl std::error::Error for ConfigError {}
