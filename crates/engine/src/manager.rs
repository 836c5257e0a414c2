//! Segment manager: owns the data directory, the write-ahead log, the active
//! segment and the catalog of sealed segments.
//!
//! Everything here runs under the store's write lock, except the lookups,
//! which only need `&self` and run under the read lock.

use std::path::{Path, PathBuf};

use memtable::Memtable;
use record::Entry;
use segment::{ActiveSegment, Catalog, EntryMap, SegmentId, CHECKSUM_BYTES, HEADER_SIZE};
use wal::WalWriter;

use crate::error::Result;

/// Name of the write-ahead log inside the data directory.
pub const LOG_FILE: &str = "log";

pub struct SegmentManager {
    pub(crate) dir: PathBuf,
    pub(crate) wal: WalWriter,
    /// `None` only transiently, while a segment is being rotated.
    pub(crate) active: Option<ActiveSegment>,
    pub(crate) catalog: Catalog,
    /// Sealed segments whose trailer did not validate at startup, or that
    /// failed to parse during compaction.
    pub(crate) corrupt: Vec<SegmentId>,
    /// Set when a sealed segment failed to parse during compaction; keeps
    /// flushes from retrying a merge that cannot succeed.
    pub(crate) compaction_stalled: bool,
    /// Highest id ever handed out, so new ids keep increasing.
    pub(crate) last_id: Option<SegmentId>,
    pub(crate) max_segment_size: u64,
}

impl SegmentManager {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn active_id(&self) -> Option<SegmentId> {
        self.active.as_ref().map(ActiveSegment::id)
    }

    /// Size of the active segment in bytes, header included.
    pub fn active_len(&self) -> u64 {
        self.active.as_ref().map_or(0, ActiveSegment::len)
    }

    pub fn sealed_count(&self) -> usize {
        self.catalog.len()
    }

    pub fn corrupt_segments(&self) -> &[SegmentId] {
        &self.corrupt
    }

    pub fn segment_path(&self, id: SegmentId) -> PathBuf {
        id.path_in(&self.dir)
    }

    // -------------------- Segment lifecycle --------------------

    /// Creates a new active segment named after the current time.
    pub(crate) fn create_segment(&mut self) -> Result<SegmentId> {
        debug_assert!(self.active.is_none(), "previous active segment not sealed");
        let id = self.next_id();
        self.active = Some(ActiveSegment::create(&self.dir, id)?);
        Ok(id)
    }

    pub(crate) fn next_id(&mut self) -> SegmentId {
        let id = SegmentId::next_after(self.last_id);
        self.last_id = Some(id);
        id
    }

    fn ensure_active(&mut self) -> Result<&mut ActiveSegment> {
        let active = match self.active.take() {
            Some(active) => active,
            None => {
                let id = self.next_id();
                ActiveSegment::create(&self.dir, id)?
            }
        };
        Ok(self.active.insert(active))
    }

    /// Appends pre-encoded records to the active segment, creating one if
    /// needed.
    pub(crate) fn append_active(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.ensure_active()?.append(bytes)?;
        Ok(())
    }

    /// Appends one record to the write-ahead log.
    pub(crate) fn append_log(&mut self, entry: &Entry) -> Result<()> {
        self.wal.append(entry)?;
        Ok(())
    }

    /// Seals the active segment and records it in the catalog.
    ///
    /// Returns `None` if there was no active segment.
    pub(crate) fn seal(&mut self) -> Result<Option<SegmentId>> {
        let Some(active) = self.active.take() else {
            return Ok(None);
        };
        let id = active.seal()?;
        self.catalog.push(id);
        Ok(Some(id))
    }

    /// Drains `mem` into segments.
    ///
    /// The records are appended to the active segment, which is then sealed
    /// and replaced by a fresh one. If the batch would push a segment past
    /// `max_segment_size` the segment is sealed early and the rest continues
    /// in a new one; a single record never spans segments. Only after every
    /// segment is sealed is the log truncated and the memtable cleared.
    ///
    /// Returns the ids that were sealed.
    pub(crate) fn flush(&mut self, mem: &mut Memtable) -> Result<Vec<SegmentId>> {
        let active_empty = self.active.as_ref().map_or(true, ActiveSegment::is_empty);
        if mem.is_empty() && active_empty {
            return Ok(Vec::new());
        }

        let mut sealed = Vec::new();
        let mut batch = Vec::with_capacity(mem.approx_size());
        for (_, entry) in mem.iter() {
            let active_len = self.ensure_active()?.len();
            let projected =
                active_len + (batch.len() + entry.encoded_len() + CHECKSUM_BYTES) as u64;
            let has_content = active_len > HEADER_SIZE as u64 || !batch.is_empty();
            if projected > self.max_segment_size && has_content {
                self.append_active(&batch)?;
                batch.clear();
                sealed.extend(self.seal()?);
                self.create_segment()?;
            }
            entry.encode_into(&mut batch)?;
        }

        self.append_active(&batch)?;
        sealed.extend(self.seal()?);
        self.create_segment()?;

        self.wal.truncate()?;
        let flushed = mem.len();
        mem.clear();

        tracing::info!(
            entries = flushed,
            segments = sealed.len(),
            sealed_total = self.catalog.len(),
            "flushed memtable"
        );
        Ok(sealed)
    }

    // -------------------- Reads --------------------

    /// Looks `key` up in the active segment, then in sealed segments from
    /// newest to oldest. The first hit wins, tombstones included.
    pub(crate) fn find(&self, key: &[u8]) -> Result<Option<Entry>> {
        if let Some(entry) = self.read_active(key)? {
            return Ok(Some(entry));
        }
        for id in self.catalog.newest_first() {
            if let Some(entry) = self.read_sealed(id, key)? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Parses the active segment from its header to EOF.
    pub(crate) fn read_active(&self, key: &[u8]) -> Result<Option<Entry>> {
        match &self.active {
            Some(active) if !active.is_empty() => Ok(segment::find_active(active.path(), key)?),
            _ => Ok(None),
        }
    }

    /// Parses a sealed segment, stopping before its trailer.
    pub(crate) fn read_sealed(&self, id: SegmentId, key: &[u8]) -> Result<Option<Entry>> {
        Ok(segment::find_sealed(&self.segment_path(id), key)?)
    }

    /// Every entry of a sealed segment.
    pub fn load_segment(&self, id: SegmentId) -> Result<EntryMap> {
        Ok(segment::load_sealed(&self.segment_path(id))?)
    }

    /// Every entry of the active segment.
    pub fn load_active(&self) -> Result<EntryMap> {
        match &self.active {
            Some(active) => Ok(segment::load_active(active.path())?),
            None => Ok(EntryMap::new()),
        }
    }

    /// Recomputes a sealed segment's checksum.
    pub fn validate(&self, id: SegmentId) -> Result<()> {
        segment::validate(&self.segment_path(id))?;
        Ok(())
    }
}
