//! # Record - on-disk entry codec
//!
//! Every mutation in DriftKV is stored as a single length-prefixed record. The
//! same encoding is used in the write-ahead log and inside segment files, so
//! replaying the log onto a segment is a plain byte copy.
//!
//! ## Binary Record Format
//!
//! ```text
//! [len: u16 BE][kind: u8][key bytes]['='][value bytes]
//! ```
//!
//! `len` counts everything after itself: the kind byte, the key, the `=`
//! separator and the value. `kind` is `0` for a put and `1` for a tombstone.
//!
//! Decoding splits the body on the **first** `=`, so a key must never contain
//! the separator. Values may contain it.
//!
//! ## Example
//!
//! ```rust
//! use record::{decode, Entry};
//!
//! let entry = Entry::put(b"name".to_vec(), b"alice".to_vec());
//! let bytes = entry.encode().unwrap();
//! let (decoded, used) = decode(&bytes).unwrap();
//! assert_eq!(decoded, entry);
//! assert_eq!(used, bytes.len());
//! ```

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use thiserror::Error;

/// Separator byte between key and value (ASCII `=`).
pub const SEPARATOR: u8 = b'=';

/// Size of the big-endian length prefix.
pub const LEN_PREFIX_BYTES: usize = 2;

/// Bytes a record adds on top of its key and value: length prefix, kind byte
/// and separator.
pub const RECORD_OVERHEAD: usize = LEN_PREFIX_BYTES + 1 + 1;

/// Largest body (`kind + key + '=' + value`) the `u16` prefix can describe.
pub const MAX_BODY_BYTES: usize = u16::MAX as usize;

/// Largest complete record, prefix included.
pub const MAX_RECORD_BYTES: usize = LEN_PREFIX_BYTES + MAX_BODY_BYTES;

/// Whether an entry carries a live value or marks its key as deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// A live key-value pair.
    Put,
    /// A deletion marker. The entry still carries the value that was deleted.
    Tombstone,
}

impl EntryKind {
    /// Wire representation of this kind.
    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            EntryKind::Put => 0,
            EntryKind::Tombstone => 1,
        }
    }

    /// Parses a kind byte.
    pub fn from_byte(b: u8) -> Result<Self, RecordError> {
        match b {
            0 => Ok(EntryKind::Put),
            1 => Ok(EntryKind::Tombstone),
            other => Err(RecordError::UnknownKind(other)),
        }
    }
}

/// Errors raised while encoding or decoding a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The buffer ends before the record does.
    #[error("truncated record: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },

    /// The declared body length is zero, so there is not even a kind byte.
    #[error("record body is empty")]
    EmptyBody,

    /// The body contains no `=` separator.
    #[error("record has no '=' separator")]
    MissingSeparator,

    /// The kind byte is neither put nor tombstone.
    #[error("unknown record kind {0}")]
    UnknownKind(u8),

    /// The key contains the separator and could not be decoded back.
    #[error("key contains the '=' separator")]
    SeparatorInKey,

    /// The body does not fit the 16-bit length prefix.
    #[error("record body of {len} bytes exceeds the {max} byte limit")]
    TooLarge { len: usize, max: usize },
}

/// A single key/value/kind tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub kind: EntryKind,
}

impl Entry {
    /// Creates a live entry.
    pub fn put(key: Vec<u8>, value: Vec<u8>) -> Self {
        Self {
            key,
            value,
            kind: EntryKind::Put,
        }
    }

    /// Creates a tombstone remembering the value it deletes.
    pub fn tombstone(key: Vec<u8>, deleted_value: Vec<u8>) -> Self {
        Self {
            key,
            value: deleted_value,
            kind: EntryKind::Tombstone,
        }
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.kind == EntryKind::Tombstone
    }

    /// Returns the live value, or `None` for a tombstone.
    #[must_use]
    pub fn live_value(&self) -> Option<&[u8]> {
        match self.kind {
            EntryKind::Put => Some(&self.value),
            EntryKind::Tombstone => None,
        }
    }

    /// Total encoded size of this entry, length prefix included.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        encoded_len(self.key.len(), self.value.len())
    }

    /// Appends the encoded record to `out`.
    ///
    /// On error `out` is left untouched.
    pub fn encode_into(&self, out: &mut Vec<u8>) -> Result<(), RecordError> {
        if self.key.contains(&SEPARATOR) {
            return Err(RecordError::SeparatorInKey);
        }
        let body_len = self.encoded_len() - LEN_PREFIX_BYTES;
        if body_len > MAX_BODY_BYTES {
            return Err(RecordError::TooLarge {
                len: body_len,
                max: MAX_BODY_BYTES,
            });
        }

        out.reserve(self.encoded_len());
        // Writes into a Vec cannot fail.
        let _ = out.write_u16::<BigEndian>(body_len as u16);
        out.push(self.kind.as_byte());
        out.extend_from_slice(&self.key);
        out.push(SEPARATOR);
        out.extend_from_slice(&self.value);
        Ok(())
    }

    /// Encodes this entry into a fresh buffer.
    pub fn encode(&self) -> Result<Vec<u8>, RecordError> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out)?;
        Ok(out)
    }
}

/// Encoded size of a record with the given key and value lengths.
#[must_use]
pub fn encoded_len(key_len: usize, value_len: usize) -> usize {
    RECORD_OVERHEAD + key_len + value_len
}

/// Decodes one record from the front of `buf`.
///
/// Returns the entry and the number of bytes it occupied.
pub fn decode(buf: &[u8]) -> Result<(Entry, usize), RecordError> {
    if buf.len() < LEN_PREFIX_BYTES {
        return Err(RecordError::Truncated {
            needed: LEN_PREFIX_BYTES,
            available: buf.len(),
        });
    }
    let body_len = BigEndian::read_u16(&buf[..LEN_PREFIX_BYTES]) as usize;
    let total = LEN_PREFIX_BYTES + body_len;
    if total > buf.len() {
        return Err(RecordError::Truncated {
            needed: total,
            available: buf.len(),
        });
    }
    if body_len == 0 {
        return Err(RecordError::EmptyBody);
    }

    let body = &buf[LEN_PREFIX_BYTES..total];
    let kind = EntryKind::from_byte(body[0])?;
    let rest = &body[1..];
    let sep = rest
        .iter()
        .position(|&b| b == SEPARATOR)
        .ok_or(RecordError::MissingSeparator)?;

    let entry = Entry {
        key: rest[..sep].to_vec(),
        value: rest[sep + 1..].to_vec(),
        kind,
    };
    Ok((entry, total))
}

/// Length of the longest prefix of `buf` made only of whole records.
///
/// Only length prefixes are inspected; the bodies are not validated. Used to
/// cut a torn tail left behind by a crash in the middle of an append.
#[must_use]
pub fn complete_prefix_len(buf: &[u8]) -> usize {
    let mut pos = 0;
    while pos + LEN_PREFIX_BYTES <= buf.len() {
        let body_len = BigEndian::read_u16(&buf[pos..pos + LEN_PREFIX_BYTES]) as usize;
        let next = pos + LEN_PREFIX_BYTES + body_len;
        if next > buf.len() {
            break;
        }
        pos = next;
    }
    pos
}

/// Iterator over back-to-back records in a byte slice.
///
/// Yields `Err` once and then stops if a record fails to decode.
pub struct RecordIter<'a> {
    buf: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> RecordIter<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            failed: false,
        }
    }

    /// Byte offset of the next record to decode.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.pos
    }
}

impl Iterator for RecordIter<'_> {
    type Item = Result<Entry, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.buf.len() {
            return None;
        }
        match decode(&self.buf[self.pos..]) {
            Ok((entry, used)) => {
                self.pos += used;
                Some(Ok(entry))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
