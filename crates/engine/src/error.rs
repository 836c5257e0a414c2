use std::io;

use config::ConfigError;
use record::RecordError;
use segment::SegmentError;
use thiserror::Error;
use wal::WalError;

/// Errors returned by the store.
///
/// A missing key is not an error: lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("wal error: {0}")]
    Wal(#[from] WalError),

    #[error("segment error: {0}")]
    Segment(#[from] SegmentError),

    #[error("format error: {0}")]
    Format(#[from] RecordError),

    /// The encoded record would exceed the configured `max_record_size`.
    #[error("record of {size} bytes exceeds the {max} byte limit")]
    Capacity { size: usize, max: usize },

    #[error("invalid key: {0}")]
    InvalidKey(&'static str),
}

pub type Result<T> = std::result::Result<T, StoreError>;
