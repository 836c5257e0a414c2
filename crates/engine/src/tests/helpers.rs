use std::fs;
use std::path::Path;

use config::StoreConfig;

use crate::{Result, Store};

pub fn count_sst_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|ext| ext == "sst")
                .unwrap_or(false)
        })
        .count()
}

pub fn config_with_capacity(dir: &Path, capacity: usize) -> StoreConfig {
    StoreConfig::builder()
        .dir(dir)
        .memtable_capacity(capacity)
        .wal_sync(false)
        .build()
}

pub fn open_with_capacity(dir: &Path, capacity: usize) -> Result<Store> {
    Store::open(config_with_capacity(dir, capacity))
}

/// Drops the store without the flush `Drop` would do, as if the process died.
pub fn crash(store: Store) {
    std::mem::forget(store);
}

pub fn log_len(dir: &Path) -> u64 {
    fs::metadata(dir.join(crate::LOG_FILE))
        .map(|m| m.len())
        .unwrap_or(0)
}
