//! # Memtable
//!
//! Bounded in-memory buffer of the most recent, not-yet-flushed writes.
//!
//! Each key maps to its latest [`Entry`], either a put or a tombstone. The
//! table is bounded by an **entry count**: once [`Memtable::is_over_capacity`]
//! reports `true` the engine drains it into a segment. Keys are kept sorted so
//! every flush writes a sorted run.
//!
//! Nothing here touches the disk. After a crash the contents are recovered
//! from the write-ahead log.

use std::collections::BTreeMap;

use record::Entry;

#[derive(Debug)]
pub struct Memtable {
    map: BTreeMap<Vec<u8>, Entry>,
    capacity: usize,
    /// Sum of the encoded sizes of all entries currently held.
    approx_size: usize,
}

impl Memtable {
    /// Creates an empty table that reports overflow once it holds more than
    /// `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            map: BTreeMap::new(),
            capacity,
            approx_size: 0,
        }
    }

    /// Inserts an entry; the newest write for a key always wins.
    pub fn insert(&mut self, entry: Entry) {
        let size = entry.encoded_len();
        if let Some(old) = self.map.insert(entry.key.clone(), entry) {
            self.approx_size = self.approx_size.saturating_sub(old.encoded_len());
        }
        self.approx_size += size;
    }

    /// Returns the entry for `key`, tombstones included.
    pub fn get(&self, key: &[u8]) -> Option<&Entry> {
        self.map.get(key)
    }

    /// Ordered iterator over `(key, entry)`.
    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &Entry)> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// `true` once the table holds more entries than its capacity.
    pub fn is_over_capacity(&self) -> bool {
        self.map.len() > self.capacity
    }

    /// Total encoded size of every entry, in bytes.
    pub fn approx_size(&self) -> usize {
        self.approx_size
    }

    /// Removes all entries (after a successful flush).
    pub fn clear(&mut self) {
        self.map.clear();
        self.approx_size = 0;
    }
}
