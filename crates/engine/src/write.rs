/// Write path: `set()`, `del()` and `force_flush()`.
///
/// Every mutation is validated first, so a rejected write changes nothing.
/// Accepted writes are appended to the log, then applied to the memtable;
/// when the memtable goes over capacity it is flushed into a sealed segment.
use record::{encoded_len, Entry, SEPARATOR};
use segment::SegmentId;

use crate::error::{Result, StoreError};
use crate::{Store, StoreState};

impl Store {
    /// Inserts or replaces a key (the `SET` command).
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidKey`] for an empty key or one containing `=`,
    /// [`StoreError::Capacity`] if the encoded record is larger than
    /// `max_record_size`. In both cases nothing is written.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        check_key(key)?;
        self.check_size(key, value)?;

        let mut state = self.state.write();
        state.apply(Entry::put(key.to_vec(), value.to_vec()))
    }

    /// Deletes a key (the `DEL` command), returning the value it held.
    ///
    /// If the key has no live value, `None` is returned and nothing is
    /// written. Otherwise a tombstone carrying the old value is recorded.
    pub fn del(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        check_key(key)?;

        let mut state = self.state.write();
        let old = match state.lookup(key)? {
            Some(entry) if !entry.is_tombstone() => entry.value,
            _ => return Ok(None),
        };
        self.check_size(key, &old)?;

        state.apply(Entry::tombstone(key.to_vec(), old.clone()))?;
        Ok(Some(old))
    }

    /// Flushes the memtable (and anything already in the active segment)
    /// into sealed segments, returning their ids.
    pub fn force_flush(&self) -> Result<Vec<SegmentId>> {
        self.state.write().flush()
    }

    fn check_size(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let size = encoded_len(key.len(), value.len());
        let max = self.config.max_record_size;
        if size > max {
            return Err(StoreError::Capacity { size, max });
        }
        Ok(())
    }
}

impl StoreState {
    /// Logs `entry`, applies it to the memtable and flushes on overflow.
    fn apply(&mut self, entry: Entry) -> Result<()> {
        self.segments.append_log(&entry)?;
        self.mem.insert(entry);

        if self.mem.is_over_capacity() {
            self.flush()?;
        }
        Ok(())
    }
}

fn check_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey("key must not be empty"));
    }
    if key.contains(&SEPARATOR) {
        return Err(StoreError::InvalidKey("key must not contain '='"));
    }
    Ok(())
}
