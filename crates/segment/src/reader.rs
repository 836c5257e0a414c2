//! Parsing of segment files.
//!
//! Active and sealed segments differ only in their tail: a sealed segment
//! ends with a 16-byte content hash that must never be read as records, an
//! active segment has no trailer and is parsed to EOF. The two cases are kept
//! as separate entry points so neither can be mistaken for the other.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use record::{complete_prefix_len, Entry, RecordIter};

use crate::checksum::{trailer_matches, CHECKSUM_BYTES};
use crate::header::{SegmentHeader, HEADER_SIZE};
use crate::SegmentError;

/// Latest entry per key within one segment.
pub type EntryMap = BTreeMap<Vec<u8>, Entry>;

/// Record region of an active segment: header to EOF.
pub fn active_region(bytes: &[u8]) -> Result<&[u8], SegmentError> {
    SegmentHeader::from_bytes(bytes)?;
    Ok(&bytes[HEADER_SIZE..])
}

/// Record region of a sealed segment: header to 16 bytes before EOF.
pub fn sealed_region(bytes: &[u8]) -> Result<&[u8], SegmentError> {
    let min = (HEADER_SIZE + CHECKSUM_BYTES) as u64;
    if (bytes.len() as u64) < min {
        return Err(SegmentError::TooSmall {
            len: bytes.len() as u64,
            min,
        });
    }
    SegmentHeader::from_bytes(bytes)?;
    Ok(&bytes[HEADER_SIZE..bytes.len() - CHECKSUM_BYTES])
}

/// Decodes every record of `region` into a map; later records win.
///
/// Stops at the first malformed record.
pub fn parse_records(region: &[u8]) -> Result<EntryMap, SegmentError> {
    let mut map = EntryMap::new();
    let mut iter = RecordIter::new(region);
    loop {
        let offset = iter.offset();
        match iter.next() {
            Some(Ok(entry)) => {
                map.insert(entry.key.clone(), entry);
            }
            Some(Err(source)) => return Err(SegmentError::Record { offset, source }),
            None => return Ok(map),
        }
    }
}

/// Finds the last entry for `key` in `region`.
///
/// Best effort: a malformed record ends the scan with whatever was found
/// before it, so a damaged segment can still answer for its intact prefix.
pub fn find_in_region(region: &[u8], key: &[u8], path: &Path) -> Option<Entry> {
    let mut found = None;
    let mut iter = RecordIter::new(region);
    loop {
        let offset = iter.offset();
        match iter.next() {
            Some(Ok(entry)) => {
                if entry.key == key {
                    found = Some(entry);
                }
            }
            Some(Err(e)) => {
                tracing::warn!(
                    path = %path.display(),
                    offset,
                    error = %e,
                    "malformed record; ignoring rest of segment"
                );
                return found;
            }
            None => return found,
        }
    }
}

/// Loads every entry of the active segment at `path`.
pub fn load_active(path: &Path) -> Result<EntryMap, SegmentError> {
    let bytes = fs::read(path)?;
    parse_records(active_region(&bytes)?)
}

/// Loads every entry of the sealed segment at `path`.
pub fn load_sealed(path: &Path) -> Result<EntryMap, SegmentError> {
    let bytes = fs::read(path)?;
    parse_records(sealed_region(&bytes)?)
}

/// Looks `key` up in the active segment at `path`.
pub fn find_active(path: &Path, key: &[u8]) -> Result<Option<Entry>, SegmentError> {
    let bytes = fs::read(path)?;
    Ok(find_in_region(active_region(&bytes)?, key, path))
}

/// Looks `key` up in the sealed segment at `path`.
pub fn find_sealed(path: &Path, key: &[u8]) -> Result<Option<Entry>, SegmentError> {
    let bytes = fs::read(path)?;
    Ok(find_in_region(sealed_region(&bytes)?, key, path))
}

/// Recomputes the content hash of the sealed segment at `path` and compares
/// it with the stored trailer.
pub fn validate(path: &Path) -> Result<(), SegmentError> {
    let bytes = fs::read(path)?;
    let min = (HEADER_SIZE + CHECKSUM_BYTES) as u64;
    if (bytes.len() as u64) < min {
        return Err(SegmentError::TooSmall {
            len: bytes.len() as u64,
            min,
        });
    }
    if trailer_matches(&bytes) {
        Ok(())
    } else {
        Err(SegmentError::ChecksumMismatch {
            path: path.to_path_buf(),
        })
    }
}

/// `true` if the file at `path` ends with a valid content hash.
///
/// Used at startup to tell a sealed segment from an active one.
pub fn is_sealed(path: &Path) -> Result<bool, SegmentError> {
    let bytes = fs::read(path)?;
    Ok(bytes.len() >= HEADER_SIZE + CHECKSUM_BYTES && trailer_matches(&bytes))
}

/// `true` if the file at `path` is shaped like a sealed segment whose trailer
/// no longer matches its content.
///
/// Its records end on a boundary exactly [`CHECKSUM_BYTES`] before EOF and
/// those last bytes do not decode as records. An active segment cut short by
/// a crash ends in the middle of a record instead. Call only after
/// [`is_sealed`] said no.
pub fn has_stale_trailer(path: &Path) -> Result<bool, SegmentError> {
    let bytes = fs::read(path)?;
    if bytes.len() < HEADER_SIZE + CHECKSUM_BYTES || SegmentHeader::from_bytes(&bytes).is_err() {
        return Ok(false);
    }
    let body = &bytes[HEADER_SIZE..];
    let (records, tail) = body.split_at(body.len() - CHECKSUM_BYTES);
    let tail_is_records =
        complete_prefix_len(tail) == tail.len() && RecordIter::new(tail).all(|r| r.is_ok());
    Ok(complete_prefix_len(records) == records.len() && !tail_is_records)
}
