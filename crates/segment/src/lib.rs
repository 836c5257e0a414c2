//! # Segment - immutable on-disk data files
//!
//! When the memtable overflows, its records are appended to the **active**
//! segment, which is then **sealed**: the MD5 of everything written so far is
//! appended as a trailer and the file is never written again (compaction
//! replaces sealed segments, it does not modify them).
//!
//! ## File layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ HEADER (50 bytes)                                            │
//! │ magic "DRIFTSEG" | reserved | version u16 BE | RFC3339 time  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ RECORDS                                                      │
//! │ len u16 BE | kind u8 | key | '=' | value                     │
//! │ ... repeated ...                                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │ TRAILER (16 bytes, sealed segments only)                     │
//! │ MD5 of header + records                                      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Segments are named `<unix-nanos>.sst` after their creation time. The
//! [`Catalog`] keeps the sealed ones in order and hands out
//! [`SegmentEnumerator`]s for newest-to-oldest walks.

use std::io;
use std::path::PathBuf;

use record::RecordError;
use thiserror::Error;

pub mod catalog;
pub mod checksum;
pub mod enumerator;
pub mod header;
pub mod id;
pub mod reader;
pub mod writer;

pub use catalog::{scan_directory, Catalog};
pub use checksum::{content_hash, CHECKSUM_BYTES};
pub use enumerator::{Reference, SegmentEnumerator};
pub use header::{SegmentHeader, HEADER_SIZE};
pub use id::SegmentId;
pub use reader::{
    find_active, find_sealed, has_stale_trailer, is_sealed, load_active, load_sealed, validate,
    EntryMap,
};
pub use writer::{write_sealed, ActiveSegment};

/// Errors raised while reading, writing or validating segments.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed record at offset {offset}: {source}")]
    Record {
        offset: usize,
        #[source]
        source: RecordError,
    },

    #[error("bad segment magic {0:?}")]
    BadMagic(Vec<u8>),

    #[error("unsupported segment version {0}")]
    UnsupportedVersion(u16),

    #[error("unparsable header timestamp {0:?}")]
    BadTimestamp(String),

    #[error("segment of {len} bytes is smaller than the {min} byte minimum")]
    TooSmall { len: u64, min: u64 },

    /// The trailer does not match the content. This is a validation error;
    /// the segment is still readable.
    #[error("checksum mismatch in {}", path.display())]
    ChecksumMismatch { path: PathBuf },
}
