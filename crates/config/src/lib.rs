//! # Config - DriftKV store settings
//!
//! Centralized configuration with sensible defaults, a builder, and loading
//! from `DRIFT_*` environment variables.
//!
//! ```text
//! DRIFT_DIR                data directory                 (default: "data")
//! DRIFT_MAX_SEGMENT_SIZE   segment size limit in bytes    (default: 4 MiB)
//! DRIFT_MAX_RECORD_SIZE    encoded record limit in bytes  (default: 1 KiB)
//! DRIFT_MEMTABLE_CAPACITY  memtable entry count           (default: 100)
//! DRIFT_WAL_SYNC           fsync every log append         (default: true)
//! ```

use std::path::PathBuf;

use record::{MAX_RECORD_BYTES, RECORD_OVERHEAD};
use thiserror::Error;

pub const ENV_DIR: &str = "DRIFT_DIR";
pub const ENV_MAX_SEGMENT_SIZE: &str = "DRIFT_MAX_SEGMENT_SIZE";
pub const ENV_MAX_RECORD_SIZE: &str = "DRIFT_MAX_RECORD_SIZE";
pub const ENV_MEMTABLE_CAPACITY: &str = "DRIFT_MEMTABLE_CAPACITY";
pub const ENV_WAL_SYNC: &str = "DRIFT_WAL_SYNC";

/// Smallest usable record limit: a one-byte key with an empty value.
pub const MIN_RECORD_SIZE: usize = RECORD_OVERHEAD + 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("data directory {} does not exist", .0.display())]
    MissingDir(PathBuf),

    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    #[error("{0} must be greater than zero")]
    ZeroLimit(&'static str),

    #[error("max_record_size {value} is outside {min}..={max}")]
    RecordLimitOutOfRange { value: usize, min: usize, max: usize },

    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Settings for one store instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory holding the log and every segment. Must already exist.
    pub dir: PathBuf,

    /// A flush that would grow the active segment past this many bytes seals
    /// it early and continues in a fresh one.
    pub max_segment_size: u64,

    /// Largest accepted encoded record (length prefix, kind, key, `=`, value).
    pub max_record_size: usize,

    /// The memtable is flushed once it holds more entries than this.
    pub memtable_capacity: usize,

    /// `sync_data` after every log append.
    pub wal_sync: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            max_segment_size: 4 * 1024 * 1024,
            max_record_size: 1024,
            memtable_capacity: 100,
            wal_sync: true,
        }
    }
}

impl StoreConfig {
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Defaults with the data directory set to `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ..Self::default()
        }
    }

    /// Loads settings from the `DRIFT_*` environment variables. Unset
    /// variables keep their defaults; set but unparsable ones are errors.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(dir) = lookup(ENV_DIR) {
            cfg.dir = PathBuf::from(dir);
        }
        if let Some(v) = lookup(ENV_MAX_SEGMENT_SIZE) {
            cfg.max_segment_size = parse_var(ENV_MAX_SEGMENT_SIZE, v)?;
        }
        if let Some(v) = lookup(ENV_MAX_RECORD_SIZE) {
            cfg.max_record_size = parse_var(ENV_MAX_RECORD_SIZE, v)?;
        }
        if let Some(v) = lookup(ENV_MEMTABLE_CAPACITY) {
            cfg.memtable_capacity = parse_var(ENV_MEMTABLE_CAPACITY, v)?;
        }
        if let Some(v) = lookup(ENV_WAL_SYNC) {
            cfg.wal_sync = parse_bool(ENV_WAL_SYNC, v)?;
        }
        Ok(cfg)
    }

    /// Checks the limits and that the data directory exists.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_segment_size == 0 {
            return Err(ConfigError::ZeroLimit("max_segment_size"));
        }
        if !(MIN_RECORD_SIZE..=MAX_RECORD_BYTES).contains(&self.max_record_size) {
            return Err(ConfigError::RecordLimitOutOfRange {
                value: self.max_record_size,
                min: MIN_RECORD_SIZE,
                max: MAX_RECORD_BYTES,
            });
        }
        if !self.dir.exists() {
            return Err(ConfigError::MissingDir(self.dir.clone()));
        }
        if !self.dir.is_dir() {
            return Err(ConfigError::NotADirectory(self.dir.clone()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value })
}

fn parse_bool(var: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { var, value }),
    }
}

/// Builder for [`StoreConfig`].
#[derive(Debug, Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.dir = dir.into();
        self
    }

    pub fn max_segment_size(mut self, bytes: u64) -> Self {
        self.config.max_segment_size = bytes;
        self
    }

    pub fn max_record_size(mut self, bytes: usize) -> Self {
        self.config.max_record_size = bytes;
        self
    }

    pub fn memtable_capacity(mut self, entries: usize) -> Self {
        self.config.memtable_capacity = entries;
        self
    }

    pub fn wal_sync(mut self, sync: bool) -> Self {
        self.config.wal_sync = sync;
        self
    }

    pub fn build(self) -> StoreConfig {
        self.config
    }
}
