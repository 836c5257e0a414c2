use super::*;
use std::fs;
use std::io::Cursor;
use tempfile::tempdir;

// -------------------- Helpers --------------------

fn put(key: &[u8], value: &[u8]) -> Entry {
    Entry::put(key.to_vec(), value.to_vec())
}

fn replay_all(path: &Path) -> Result<(Vec<Entry>, Replay), WalError> {
    let mut reader = WalReader::open(path)?;
    let mut entries = Vec::new();
    let replay = reader.replay(|e| entries.push(e))?;
    Ok((entries, replay))
}

fn replay_from_bytes(data: &[u8]) -> Result<(Vec<Entry>, Replay), WalError> {
    let mut reader = WalReader::from_reader(Cursor::new(data.to_vec()));
    let mut entries = Vec::new();
    let replay = reader.replay(|e| entries.push(e))?;
    Ok((entries, replay))
}

// -------------------- Basic write & replay --------------------

#[test]
fn write_and_replay_puts_and_tombstones() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log");

    {
        let mut w = WalWriter::create(&path, true).unwrap();
        w.append(&put(b"k", b"v1")).unwrap();
        w.append(&put(b"k2", b"v2")).unwrap();
        w.append(&Entry::tombstone(b"k".to_vec(), b"v1".to_vec()))
            .unwrap();
    }

    let (entries, replay) = replay_all(&path).unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0], put(b"k", b"v1"));
    assert_eq!(entries[1], put(b"k2", b"v2"));
    assert!(entries[2].is_tombstone());
    assert_eq!(entries[2].value, b"v1");

    assert_eq!(replay.records, 3);
    assert_eq!(replay.torn_bytes, 0);
    assert_eq!(replay.bytes, fs::read(&path).unwrap());
}

#[test]
fn log_bytes_are_plain_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log");

    let mut w = WalWriter::create(&path, false).unwrap();
    w.append(&put(b"a", b"1")).unwrap();

    assert_eq!(fs::read(&path).unwrap(), vec![0, 3, 0, b'a', b'=', b'1']);
    assert_eq!(w.len().unwrap(), 6);
}

#[test]
fn replay_empty_log() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log");
    WalWriter::create(&path, false).unwrap();

    let (entries, replay) = replay_all(&path).unwrap();
    assert!(entries.is_empty());
    assert_eq!(replay, Replay::default());
}

#[test]
fn reopen_appends_after_existing_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log");

    {
        let mut w = WalWriter::create(&path, true).unwrap();
        w.append(&put(b"a", b"1")).unwrap();
    }
    {
        let mut w = WalWriter::create(&path, true).unwrap();
        w.append(&put(b"b", b"2")).unwrap();
    }

    let (entries, _) = replay_all(&path).unwrap();
    let keys: Vec<_> = entries.iter().map(|e| e.key.clone()).collect();
    assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
}

#[test]
fn value_with_separator_survives_replay() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log");

    let mut w = WalWriter::create(&path, true).unwrap();
    w.append(&put(b"url", b"q=1&r=2")).unwrap();
    drop(w);

    let (entries, _) = replay_all(&path).unwrap();
    assert_eq!(entries[0].value, b"q=1&r=2");
}

// -------------------- Torn tail & corruption --------------------

#[test]
fn torn_tail_is_discarded() {
    let mut data = put(b"a", b"1").encode().unwrap();
    let whole = data.len();
    let next = put(b"b", b"22").encode().unwrap();
    data.extend_from_slice(&next[..3]);

    let (entries, replay) = replay_from_bytes(&data).unwrap();
    assert_eq!(entries, vec![put(b"a", b"1")]);
    assert_eq!(replay.records, 1);
    assert_eq!(replay.torn_bytes, 3);
    assert_eq!(replay.bytes.len(), whole);
}

#[test]
fn lone_length_byte_is_torn() {
    let (entries, replay) = replay_from_bytes(&[0]).unwrap();
    assert!(entries.is_empty());
    assert_eq!(replay.torn_bytes, 1);
    assert!(replay.bytes.is_empty());
}

#[test]
fn corrupt_complete_record_reports_offset() {
    let mut data = put(b"a", b"1").encode().unwrap();
    // Complete record with kind byte 9.
    data.extend_from_slice(&[0, 3, 9, b'k', b'=']);

    let err = replay_from_bytes(&data).unwrap_err();
    match err {
        WalError::Corrupt { offset, source } => {
            assert_eq!(offset, 6);
            assert_eq!(source, RecordError::UnknownKind(9));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn replay_callback_sees_records_before_corruption() {
    let mut data = put(b"a", b"1").encode().unwrap();
    data.extend_from_slice(&[0, 2, 0, b'x']);

    let mut seen = Vec::new();
    let mut reader = WalReader::from_reader(Cursor::new(data));
    assert!(reader.replay(|e| seen.push(e)).is_err());
    assert_eq!(seen, vec![put(b"a", b"1")]);
}

// -------------------- Encoding errors --------------------

#[test]
fn key_with_separator_is_not_written() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log");

    let mut w = WalWriter::create(&path, true).unwrap();
    let err = w.append(&put(b"a=b", b"v")).unwrap_err();
    assert!(matches!(err, WalError::Encode(RecordError::SeparatorInKey)));
    assert_eq!(w.len().unwrap(), 0);
}

// -------------------- Truncate --------------------

#[test]
fn truncate_empties_log_and_appends_continue() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log");

    let mut w = WalWriter::create(&path, true).unwrap();
    for i in 0..10 {
        w.append(&put(format!("k{i}").as_bytes(), b"v")).unwrap();
    }
    assert!(w.len().unwrap() > 0);

    w.truncate().unwrap();
    assert_eq!(w.len().unwrap(), 0);
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);

    w.append(&put(b"after", b"truncate")).unwrap();
    drop(w);

    let (entries, _) = replay_all(&path).unwrap();
    assert_eq!(entries, vec![put(b"after", b"truncate")]);
}

#[test]
fn sync_to_disk_keeps_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log");

    let mut w = WalWriter::create(&path, false).unwrap();
    w.append(&put(b"a", b"1")).unwrap();
    w.sync_to_disk().unwrap();

    let (entries, _) = replay_all(&path).unwrap();
    assert_eq!(entries.len(), 1);
}

// -------------------- Partial writes --------------------

#[test]
fn stray_partial_frame_is_cut_before_next_append() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log");

    let mut w = WalWriter::create(&path, true).unwrap();
    w.append(&put(b"a", b"1")).unwrap();

    // A write that died after the first few bytes of the next record.
    let mut torn = Vec::new();
    put(b"bbbb", b"2222").encode_into(&mut torn).unwrap();
    let mut f = OpenOptions::new().append(true).open(&path).unwrap();
    f.write_all(&torn[..5]).unwrap();
    drop(f);

    w.append(&put(b"c", b"3")).unwrap();
    drop(w);

    let (entries, replay) = replay_all(&path).unwrap();
    assert_eq!(entries, vec![put(b"a", b"1"), put(b"c", b"3")]);
    assert_eq!(replay.torn_bytes, 0);
}

#[test]
fn reopened_writer_keeps_existing_tail() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log");

    let mut w = WalWriter::create(&path, true).unwrap();
    w.append(&put(b"a", b"1")).unwrap();
    drop(w);

    let mut w = WalWriter::create(&path, true).unwrap();
    w.append(&put(b"b", b"2")).unwrap();
    drop(w);

    let (entries, _) = replay_all(&path).unwrap();
    assert_eq!(entries, vec![put(b"a", b"1"), put(b"b", b"2")]);
}
