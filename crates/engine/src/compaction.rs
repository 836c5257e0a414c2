/// Compaction: merges every sealed segment into a single new one.
///
/// Sources are merged oldest to newest so later values win. Tombstones are
/// dropped along with the keys they delete: every older segment is part of
/// the merge, so nothing is left for them to shadow. The memtable is not part
/// of compaction and keeps its own tombstones.
///
/// The active segment is folded in as well (sealed first when it holds
/// records), so the fresh active segment created afterwards is newer than the
/// compacted output both by name and by modification time.
use std::fs;
use std::io;
use std::path::Path;

use segment::{EntryMap, SegmentError, SegmentId};

use crate::error::{Result, StoreError};
use crate::manager::SegmentManager;

/// Number of sealed segments above which a flush triggers compaction.
pub const COMPACTION_THRESHOLD: usize = 10;

/// Summary of one compaction run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionOutcome {
    /// Sealed segments merged and deleted.
    pub merged_segments: usize,
    /// Live keys written to the output.
    pub live_keys: usize,
    /// Keys dropped because their newest entry was a tombstone.
    pub dropped_tombstones: usize,
    /// The new sealed segment.
    pub output: SegmentId,
}

impl SegmentManager {
    /// Compacts if more than [`COMPACTION_THRESHOLD`] segments are sealed.
    ///
    /// A failure here leaves every segment in place; it is logged and the
    /// next flush tries again. After a source turned out to be malformed the
    /// automatic trigger stays off until a manual compaction succeeds.
    pub(crate) fn maybe_compact(&mut self) -> Option<CompactionOutcome> {
        if self.catalog.len() <= COMPACTION_THRESHOLD {
            return None;
        }
        if self.compaction_stalled {
            tracing::debug!(
                sealed = self.catalog.len(),
                "skipping compaction until the malformed segment is dealt with"
            );
            return None;
        }
        match self.compact() {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "compaction failed");
                None
            }
        }
    }

    /// Merges every sealed segment (and the active one) into one.
    ///
    /// Returns `None` when there is nothing on disk to compact.
    pub(crate) fn compact(&mut self) -> Result<Option<CompactionOutcome>> {
        self.compact_with(|path| fs::remove_file(path))
    }

    /// [`compact`](Self::compact) with the source deletion supplied by the
    /// caller.
    pub(crate) fn compact_with<F>(&mut self, remove: F) -> Result<Option<CompactionOutcome>>
    where
        F: FnMut(&Path) -> io::Result<()>,
    {
        // Parse everything up front so a malformed source aborts before any
        // file is touched.
        let mut merged = EntryMap::new();
        for id in self.catalog.ids().to_vec() {
            match self.load_segment(id) {
                Ok(entries) => merged.extend(entries),
                Err(e) => {
                    if is_malformed(&e) {
                        tracing::warn!(
                            segment = %id,
                            error = %e,
                            "malformed segment blocks compaction"
                        );
                        if !self.corrupt.contains(&id) {
                            self.corrupt.push(id);
                        }
                        self.compaction_stalled = true;
                    }
                    return Err(e);
                }
            }
        }
        let active_has_records = self.active.as_ref().map_or(false, |a| !a.is_empty());
        if active_has_records {
            merged.extend(self.load_active()?);
        }

        if self.catalog.is_empty() && !active_has_records {
            return Ok(None);
        }

        match self.active.take() {
            Some(active) if !active.is_empty() => {
                let id = active.seal()?;
                self.catalog.push(id);
            }
            Some(active) => active.discard()?,
            None => {}
        }

        let mut records = Vec::new();
        let mut tombstones = Vec::new();
        let mut live_keys = 0;
        let mut dropped_tombstones = 0;
        for entry in merged.values() {
            if entry.is_tombstone() {
                entry.encode_into(&mut tombstones)?;
                dropped_tombstones += 1;
                continue;
            }
            entry.encode_into(&mut records)?;
            live_keys += 1;
        }

        let output = self.next_id();
        segment::write_sealed(&self.dir, output, &records)?;

        let sources = self.catalog.replace(vec![output]);
        self.retire_sources(&sources, output, &tombstones, remove)?;
        self.compaction_stalled = false;
        self.create_segment()?;

        let outcome = CompactionOutcome {
            merged_segments: sources.len(),
            live_keys,
            dropped_tombstones,
            output,
        };
        tracing::info!(
            merged = outcome.merged_segments,
            live_keys,
            dropped_tombstones,
            output = %output,
            "compacted segments"
        );
        Ok(Some(outcome))
    }

    /// Deletes the compacted `sources`.
    ///
    /// A source that cannot be deleted stays in the catalog, older than
    /// `output`. Its keys are shadowed by `output` except the ones whose
    /// tombstones were dropped, so those tombstones are written to a sealed
    /// segment newer than `output`.
    fn retire_sources<F>(
        &mut self,
        sources: &[SegmentId],
        output: SegmentId,
        tombstones: &[u8],
        mut remove: F,
    ) -> Result<()>
    where
        F: FnMut(&Path) -> io::Result<()>,
    {
        let mut leftovers = Vec::new();
        for &id in sources {
            match remove(&self.segment_path(id)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        segment = %id,
                        error = %e,
                        "could not delete compacted segment"
                    );
                    leftovers.push(id);
                }
            }
        }
        self.corrupt.retain(|id| leftovers.contains(id));
        if leftovers.is_empty() {
            return Ok(());
        }

        leftovers.push(output);
        self.catalog.replace(leftovers);
        if !tombstones.is_empty() {
            let id = self.next_id();
            segment::write_sealed(&self.dir, id, tombstones)?;
            self.catalog.push(id);
            tracing::info!(segment = %id, "kept dropped tombstones next to undeleted sources");
        }
        Ok(())
    }
}

/// `true` for errors caused by the content of a segment rather than by I/O.
fn is_malformed(err: &StoreError) -> bool {
    matches!(
        err,
        StoreError::Segment(
            SegmentError::Record { .. }
                | SegmentError::BadMagic(_)
                | SegmentError::UnsupportedVersion(_)
                | SegmentError::BadTimestamp(_)
                | SegmentError::TooSmall { .. }
        )
    )
}
