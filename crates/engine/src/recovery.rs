/// Cold start: rebuilding the segment manager from the data directory.
///
/// The newest segment on disk is resumed as the active segment unless it
/// already carries a trailer, valid or not. The write-ahead log is then
/// copied onto the active segment, synced and truncated, and every sealed
/// segment is validated. Checksum mismatches are reported but not fatal; the
/// segment stays readable.
use std::fs;
use std::io;
use std::path::Path;

use config::StoreConfig;
use segment::{scan_directory, ActiveSegment, Catalog, SegmentError, SegmentId};
use wal::{Replay, WalReader, WalWriter};

use crate::error::Result;
use crate::manager::{SegmentManager, LOG_FILE};

/// What startup found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Complete records copied from the log onto the active segment.
    pub replayed_records: usize,
    /// Bytes of a partial record dropped from the end of the log.
    pub torn_bytes: usize,
    /// Unsealed segment left by the previous run and resumed as active.
    pub resumed_active: Option<SegmentId>,
    /// Sealed segments whose trailer did not match their content.
    pub corrupt_segments: Vec<SegmentId>,
}

impl SegmentManager {
    /// Opens the data directory named by `config`.
    ///
    /// Fails with a config error if the directory does not exist.
    pub(crate) fn initialize(config: &StoreConfig) -> Result<(Self, RecoveryReport)> {
        config.validate()?;
        let dir = config.dir.clone();
        let mut report = RecoveryReport::default();

        let mut ids = scan_directory(&dir)?;
        let last_id = ids.iter().max().copied();

        let mut active = None;
        while let Some(&newest) = ids.last() {
            let path = newest.path_in(&dir);
            if segment::is_sealed(&path)? {
                break;
            }
            if segment::has_stale_trailer(&path)? {
                tracing::warn!(
                    segment = %newest,
                    "newest segment has a damaged trailer; keeping it sealed"
                );
                break;
            }
            ids.pop();
            if let Some(resumed) = resume_active(&dir, newest)? {
                report.resumed_active = Some(resumed.id());
                active = Some(resumed);
                break;
            }
        }

        let wal_path = dir.join(LOG_FILE);
        let replay = read_log(&wal_path)?;
        let wal = WalWriter::create(&wal_path, config.wal_sync)?;

        let mut mgr = SegmentManager {
            dir,
            wal,
            active,
            catalog: Catalog::new(),
            corrupt: Vec::new(),
            compaction_stalled: false,
            last_id,
            max_segment_size: config.max_segment_size,
        };
        if mgr.active.is_none() {
            mgr.create_segment()?;
        }

        if !replay.bytes.is_empty() {
            mgr.append_active(&replay.bytes)?;
            if let Some(active) = mgr.active.as_mut() {
                active.sync()?;
            }
        }
        if replay.records > 0 || replay.torn_bytes > 0 {
            mgr.wal.truncate()?;
        }
        report.replayed_records = replay.records;
        report.torn_bytes = replay.torn_bytes;

        report.corrupt_segments = validate_all(&mgr.dir, &ids)?;
        mgr.corrupt = report.corrupt_segments.clone();
        mgr.catalog = Catalog::from_ids(ids);

        tracing::info!(
            dir = %mgr.dir.display(),
            sealed = mgr.catalog.len(),
            active = ?mgr.active_id(),
            replayed = report.replayed_records,
            corrupt = report.corrupt_segments.len(),
            "opened store"
        );
        Ok((mgr, report))
    }
}

/// Reopens an unsealed segment. A file too short to hold a header was left by
/// a crash during creation and is removed.
fn resume_active(dir: &Path, id: SegmentId) -> Result<Option<ActiveSegment>> {
    match ActiveSegment::open(dir, id) {
        Ok(active) => Ok(Some(active)),
        Err(SegmentError::TooSmall { len, .. }) => {
            tracing::warn!(segment = %id, len, "removing segment without a complete header");
            fs::remove_file(id.path_in(dir))?;
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Reads the complete-record prefix of the log. A missing log is empty.
fn read_log(path: &Path) -> Result<Replay> {
    let mut reader = match WalReader::open(path) {
        Ok(r) => r,
        Err(wal::WalError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
            return Ok(Replay::default())
        }
        Err(e) => return Err(e.into()),
    };
    Ok(reader.replay(|_| {})?)
}

/// Checks the trailer of every sealed segment, returning the ones that fail.
pub(crate) fn validate_all(dir: &Path, ids: &[SegmentId]) -> Result<Vec<SegmentId>> {
    let mut corrupt = Vec::new();
    for &id in ids {
        match segment::validate(&id.path_in(dir)) {
            Ok(()) => {}
            Err(e @ (SegmentError::ChecksumMismatch { .. } | SegmentError::TooSmall { .. })) => {
                tracing::warn!(segment = %id, error = %e, "segment failed validation");
                corrupt.push(id);
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(corrupt)
}
