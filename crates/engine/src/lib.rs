//! # Engine - DriftKV storage engine
//!
//! Ties the [`memtable`], [`wal`] and [`segment`] crates together into an
//! embedded, log-structured key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                    STORE                      │
//! │                                               │
//! │ write.rs → log append → Memtable insert       │
//! │              |                                │
//! │              |  (over capacity?)              │
//! │              |            yes                 │
//! │              v                                │
//! │           flush() → active segment → seal     │
//! │              |                                │
//! │              |  (sealed count > 10?)          │
//! │              |            yes                 │
//! │              v                                │
//! │           compact() → one sealed segment      │
//! │                                               │
//! │ read.rs → Memtable → active → sealed (newest  │
//! │           first, first match wins)            │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                              |
//! |----------------|------------------------------------------------------|
//! | `lib.rs`       | `Store` struct, `open`, `close`, `stats`, `Debug`    |
//! | [`manager`]    | `SegmentManager`: log, active segment, catalog, flush |
//! | [`recovery`]   | startup scan, log replay, segment validation         |
//! | `write`        | `set()`, `del()`, `force_flush()`                     |
//! | `read`         | `get()`                                              |
//! | [`compaction`] | merge all sealed segments into one                   |
//! | [`error`]      | `StoreError`                                         |
//!
//! ## Concurrency
//!
//! One `parking_lot::RwLock` guards the memtable and the segment manager.
//! `get` takes the read lock, so reads run in parallel with each other but
//! never overlap a write, flush or compaction. `Store` is `Send + Sync`; share
//! it with an `Arc`.
//!
//! ## Crash Safety
//!
//! Every write is appended to the log **before** the memtable sees it. The
//! log is only truncated after the flushed segments are sealed and synced. On
//! startup the log is copied onto the active segment, so nothing acknowledged
//! is lost.

pub mod compaction;
pub mod error;
pub mod manager;
mod read;
pub mod recovery;
mod write;

use std::fmt;
use std::path::Path;

use config::StoreConfig;
use memtable::Memtable;
use parking_lot::RwLock;
use segment::SegmentId;

pub use compaction::{CompactionOutcome, COMPACTION_THRESHOLD};
pub use error::{Result, StoreError};
pub use manager::{SegmentManager, LOG_FILE};
pub use recovery::RecoveryReport;

/// State guarded by the store lock.
pub(crate) struct StoreState {
    pub(crate) mem: Memtable,
    pub(crate) segments: SegmentManager,
}

impl StoreState {
    /// Drains the memtable into segments and compacts if due.
    pub(crate) fn flush(&mut self) -> Result<Vec<SegmentId>> {
        let sealed = self.segments.flush(&mut self.mem)?;
        if !sealed.is_empty() {
            self.segments.maybe_compact();
        }
        Ok(sealed)
    }
}

/// The key-value store.
///
/// # Write Path
///
/// 1. Reject keys that are empty or contain `=`, and records larger than
///    `max_record_size`, before anything is written.
/// 2. Append the record to the log (synced when `wal_sync` is on).
/// 3. Insert it into the memtable.
/// 4. If the memtable now holds more than `memtable_capacity` entries, flush
///    it into a sealed segment and compact if more than
///    [`COMPACTION_THRESHOLD`] segments are sealed.
///
/// # Read Path
///
/// 1. The memtable.
/// 2. The active segment, parsed to EOF.
/// 3. Sealed segments from newest to oldest, each parsed up to its trailer.
///
/// The first entry found wins; a tombstone means the key is absent.
pub struct Store {
    pub(crate) state: RwLock<StoreState>,
    pub(crate) config: StoreConfig,
    pub(crate) recovery: RecoveryReport,
}

/// Point-in-time counters, see [`Store::stats`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub memtable_entries: usize,
    pub memtable_bytes: usize,
    pub active_segment: Option<SegmentId>,
    pub active_bytes: u64,
    pub sealed_segments: usize,
    pub corrupt_segments: usize,
    pub log_bytes: u64,
}

impl Store {
    /// Opens the store in `config.dir`, recovering whatever a previous run
    /// left behind.
    ///
    /// # Errors
    ///
    /// A config error if the directory does not exist or a limit is out of
    /// range; I/O, log or segment errors if recovery fails.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let (segments, recovery) = SegmentManager::initialize(&config)?;
        let mem = Memtable::new(config.memtable_capacity);
        Ok(Self {
            state: RwLock::new(StoreState { mem, segments }),
            config,
            recovery,
        })
    }

    /// Opens a store in `dir` with default limits.
    pub fn open_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::open(StoreConfig::new(dir.as_ref()))
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// What startup recovered.
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.recovery
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let state = self.state.read();
        Ok(StoreStats {
            memtable_entries: state.mem.len(),
            memtable_bytes: state.mem.approx_size(),
            active_segment: state.segments.active_id(),
            active_bytes: state.segments.active_len(),
            sealed_segments: state.segments.sealed_count(),
            corrupt_segments: state.segments.corrupt_segments().len(),
            log_bytes: state.segments.wal.len()?,
        })
    }

    /// Ids of the sealed segments, oldest first.
    pub fn sealed_segments(&self) -> Vec<SegmentId> {
        self.state.read().segments.catalog().ids().to_vec()
    }

    /// Recomputes the checksum of a sealed segment.
    pub fn validate_segment(&self, id: SegmentId) -> Result<()> {
        self.state.read().segments.validate(id)
    }

    /// Merges every segment into one regardless of how many are sealed.
    pub fn compact(&self) -> Result<Option<CompactionOutcome>> {
        self.state.write().segments.compact()
    }

    /// Flushes pending writes and closes the store.
    pub fn close(self) -> Result<()> {
        let mut state = self.state.write();
        if !state.mem.is_empty() {
            state.flush()?;
        }
        state.segments.wal.sync_to_disk()?;
        Ok(())
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Store")
            .field("dir", &self.config.dir)
            .field("max_segment_size", &self.config.max_segment_size)
            .field("max_record_size", &self.config.max_record_size)
            .field("wal_sync", &self.config.wal_sync)
            .field("memtable_entries", &state.mem.len())
            .field("memtable_capacity", &state.mem.capacity())
            .field("active_segment", &state.segments.active_id())
            .field("sealed_segments", &state.segments.sealed_count())
            .finish()
    }
}

/// Best-effort flush on drop.
///
/// Errors cannot be propagated from `drop`; the data is still in the log and
/// is recovered on the next open.
impl Drop for Store {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if !state.mem.is_empty() {
            if let Err(e) = state.flush() {
                tracing::warn!(error = %e, "flush on drop failed");
            }
        }
    }
}

#[cfg(test)]
mod tests;
