use crate::SegmentId;

/// Starting point of an enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    /// The active segment, which is newer than every sealed one.
    Active,
    /// A sealed segment.
    Sealed(SegmentId),
}

/// Yields the sealed segments older than a reference, nearest first.
///
/// Exhaustion is signalled by `None`. A reference that is not in the catalog
/// has no known predecessors, so the enumerator starts out exhausted.
#[derive(Debug, Clone)]
pub struct SegmentEnumerator<'a> {
    ids: &'a [SegmentId],
    /// Index one past the next id to yield.
    cursor: usize,
}

impl<'a> SegmentEnumerator<'a> {
    pub fn new(ids: &'a [SegmentId], reference: Reference) -> Self {
        let cursor = match reference {
            Reference::Active => ids.len(),
            Reference::Sealed(id) => ids.iter().position(|&s| s == id).unwrap_or(0),
        };
        Self { ids, cursor }
    }
}

impl Iterator for SegmentEnumerator<'_> {
    type Item = SegmentId;

    fn next(&mut self) -> Option<SegmentId> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.ids[self.cursor])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.cursor, Some(self.cursor))
    }
}

impl ExactSizeIterator for SegmentEnumerator<'_> {}
