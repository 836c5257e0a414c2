use super::helpers::{crash, open_with_capacity};
use anyhow::Result;
use record::Entry;
use tempfile::tempdir;

// --------------------- Layer precedence ---------------------

#[test]
fn memtable_shadows_sealed_segments() -> Result<()> {
    let dir = tempdir()?;
    let store = open_with_capacity(dir.path(), 100)?;

    store.set(b"k", b"old")?;
    store.force_flush()?;
    store.set(b"k", b"new")?;

    assert_eq!(store.get(b"k")?, Some(b"new".to_vec()));
    Ok(())
}

#[test]
fn memtable_tombstone_shadows_sealed_value() -> Result<()> {
    let dir = tempdir()?;
    let store = open_with_capacity(dir.path(), 100)?;

    store.set(b"k", b"v")?;
    store.force_flush()?;
    assert_eq!(store.del(b"k")?, Some(b"v".to_vec()));

    assert!(store.get(b"k")?.is_none());
    Ok(())
}

#[test]
fn newest_sealed_segment_wins() -> Result<()> {
    let dir = tempdir()?;
    let store = open_with_capacity(dir.path(), 100)?;

    for v in ["v1", "v2", "v3"] {
        store.set(b"k", v.as_bytes())?;
        store.force_flush()?;
    }
    assert_eq!(store.sealed_segments().len(), 3);
    assert_eq!(store.get(b"k")?, Some(b"v3".to_vec()));
    Ok(())
}

#[test]
fn sealed_tombstone_shadows_older_segment() -> Result<()> {
    let dir = tempdir()?;
    let store = open_with_capacity(dir.path(), 100)?;

    store.set(b"k", b"v")?;
    store.force_flush()?;
    store.del(b"k")?;
    store.force_flush()?;

    assert_eq!(store.stats()?.memtable_entries, 0);
    assert!(store.get(b"k")?.is_none());
    assert_eq!(store.del(b"k")?, None);
    Ok(())
}

#[test]
fn lookup_walks_back_to_oldest_segment() -> Result<()> {
    let dir = tempdir()?;
    let store = open_with_capacity(dir.path(), 100)?;

    store.set(b"first", b"1")?;
    store.force_flush()?;
    for i in 0..5 {
        store.set(format!("filler{i}").as_bytes(), b"x")?;
        store.force_flush()?;
    }

    assert_eq!(store.get(b"first")?, Some(b"1".to_vec()));
    assert!(store.get(b"never")?.is_none());
    Ok(())
}

// --------------------- Active segment ---------------------

#[test]
fn replayed_records_are_read_from_active_segment() -> Result<()> {
    let dir = tempdir()?;
    {
        let store = open_with_capacity(dir.path(), 100)?;
        store.set(b"a", b"1")?;
        store.set(b"b", b"2")?;
        crash(store);
    }

    let store = open_with_capacity(dir.path(), 100)?;
    let stats = store.stats()?;
    assert_eq!(stats.memtable_entries, 0);
    assert_eq!(stats.sealed_segments, 0);
    assert!(stats.active_bytes > segment::HEADER_SIZE as u64);

    assert_eq!(store.get(b"a")?, Some(b"1".to_vec()));
    assert_eq!(store.get(b"b")?, Some(b"2".to_vec()));
    Ok(())
}

#[test]
fn active_segment_shadows_sealed_segments() -> Result<()> {
    let dir = tempdir()?;
    {
        let store = open_with_capacity(dir.path(), 100)?;
        store.set(b"k", b"sealed")?;
        store.force_flush()?;
        store.set(b"k", b"active")?;
        crash(store);
    }

    let store = open_with_capacity(dir.path(), 100)?;
    assert_eq!(store.sealed_segments().len(), 1);
    assert_eq!(store.get(b"k")?, Some(b"active".to_vec()));
    Ok(())
}

#[test]
fn last_record_of_active_segment_is_read_in_full() -> Result<()> {
    // A value longer than the 16-byte trailer: reading the active segment as
    // if it were sealed would cut it off.
    let dir = tempdir()?;
    let value = b"0123456789abcdefghij".to_vec();
    {
        let store = open_with_capacity(dir.path(), 100)?;
        store.set(b"tail", &value)?;
        crash(store);
    }

    let store = open_with_capacity(dir.path(), 100)?;
    assert_eq!(store.get(b"tail")?, Some(value));
    Ok(())
}

#[test]
fn trailer_of_sealed_segment_is_never_read_as_record() -> Result<()> {
    let dir = tempdir()?;
    let store = open_with_capacity(dir.path(), 100)?;

    store.set(b"tail", b"v")?;
    let sealed = store.force_flush()?;
    let entries = store.state.read().segments.load_segment(sealed[0])?;
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries.get(b"tail".as_slice()),
        Some(&Entry::put(b"tail".to_vec(), b"v".to_vec()))
    );
    assert_eq!(store.get(b"tail")?, Some(b"v".to_vec()));
    Ok(())
}

// --------------------- Concurrent reads ---------------------

#[test]
fn readers_share_the_lock() -> Result<()> {
    use std::sync::Arc;
    use std::thread;

    let dir = tempdir()?;
    let store = Arc::new(open_with_capacity(dir.path(), 8)?);
    for i in 0..40 {
        store.set(format!("k{i}").as_bytes(), format!("v{i}").as_bytes())?;
    }

    let guard = store.state.read();
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || store.get(b"k7").unwrap())
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), Some(b"v7".to_vec()));
    }
    drop(guard);
    Ok(())
}
