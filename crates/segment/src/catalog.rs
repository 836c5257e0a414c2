//! In-memory list of sealed segments.
//!
//! The catalog replaces directory listings on the read path: it is built once
//! at startup by [`scan_directory`] and afterwards kept in step with every
//! seal and compaction.

use std::fs;
use std::path::Path;
use std::time::SystemTime;

use crate::enumerator::{Reference, SegmentEnumerator};
use crate::{SegmentError, SegmentId};

/// Sealed segment ids, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    ids: Vec<SegmentId>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from ids already in oldest-to-newest order.
    pub fn from_ids(ids: Vec<SegmentId>) -> Self {
        Self { ids }
    }

    /// Records a newly sealed segment as the newest.
    pub fn push(&mut self, id: SegmentId) {
        self.ids.push(id);
    }

    /// Swaps in a whole new list (after compaction), returning the old one.
    pub fn replace(&mut self, ids: Vec<SegmentId>) -> Vec<SegmentId> {
        std::mem::replace(&mut self.ids, ids)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Ids oldest first.
    pub fn ids(&self) -> &[SegmentId] {
        &self.ids
    }

    /// Walks sealed segments strictly older than `reference`, newest first.
    pub fn enumerate_from(&self, reference: Reference) -> SegmentEnumerator<'_> {
        SegmentEnumerator::new(&self.ids, reference)
    }

    /// Walks every sealed segment, newest first.
    pub fn newest_first(&self) -> SegmentEnumerator<'_> {
        self.enumerate_from(Reference::Active)
    }
}

/// Lists every segment file in `dir`, oldest first.
///
/// Files are ordered by modification time, ties broken by id. A warning is
/// logged when that order disagrees with the order of the ids themselves,
/// which means a file was touched after creation or the clock moved.
/// Leftover `.sst.tmp` files from an interrupted write are removed.
pub fn scan_directory(dir: &Path) -> Result<Vec<SegmentId>, SegmentError> {
    let mut found: Vec<(SystemTime, SegmentId)> = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };

        if name.ends_with(".sst.tmp") {
            tracing::warn!(path = %path.display(), "removing incomplete segment");
            let _ = fs::remove_file(&path);
            continue;
        }

        if let Some(id) = SegmentId::from_file_name(name) {
            let mtime = entry.metadata()?.modified()?;
            found.push((mtime, id));
        }
    }

    found.sort();
    let ids: Vec<SegmentId> = found.into_iter().map(|(_, id)| id).collect();

    if ids.windows(2).any(|w| w[0] > w[1]) {
        tracing::warn!(
            segments = ids.len(),
            "segment modification times disagree with their names; using modification order"
        );
    }

    Ok(ids)
}
