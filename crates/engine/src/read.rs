/// Read path: `get()`.
///
/// The memtable is checked first (freshest data, tombstones included), then
/// the active segment, then sealed segments from newest to oldest through a
/// fresh enumerator over the catalog. The first entry found wins; a tombstone
/// shadows every older value.
use record::Entry;

use crate::error::Result;
use crate::{Store, StoreState};

impl StoreState {
    /// The newest entry for `key` anywhere in the store, tombstones included.
    pub(crate) fn lookup(&self, key: &[u8]) -> Result<Option<Entry>> {
        if let Some(entry) = self.mem.get(key) {
            return Ok(Some(entry.clone()));
        }
        self.segments.find(key)
    }
}

impl Store {
    /// Looks up a key, returning its value if it is present and not deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment cannot be read.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let state = self.state.read();
        Ok(state
            .lookup(key)?
            .and_then(|entry| entry.live_value().map(<[u8]>::to_vec)))
    }
}
