use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// File extension of segment files.
pub const SEGMENT_EXT: &str = "sst";

/// Identifier of a segment: the nanosecond UNIX timestamp of its creation.
///
/// The file for segment `n` is `<dir>/<n>.sst`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SegmentId(pub u64);

impl SegmentId {
    /// A fresh id from the wall clock, strictly greater than `after`.
    ///
    /// The clock may repeat or step backwards; ids never do.
    pub fn next_after(after: Option<SegmentId>) -> SegmentId {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);
        match after {
            Some(prev) if now <= prev.0 => SegmentId(prev.0.saturating_add(1)),
            _ => SegmentId(now),
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, SEGMENT_EXT)
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }

    /// Parses `<digits>.sst`; anything else is not a segment.
    pub fn from_file_name(name: &str) -> Option<SegmentId> {
        let stem = name.strip_suffix(".sst")?;
        if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        stem.parse().ok().map(SegmentId)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
