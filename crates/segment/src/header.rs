//! Fixed-size segment header.
//!
//! ```text
//! offset  size  field
//! 0       8     magic "DRIFTSEG"
//! 8       8     reserved (zero)
//! 16      2     version (u16 BE)
//! 18      20    creation time, RFC3339 UTC "YYYY-MM-DDTHH:MM:SSZ"
//! 38      12    reserved (zero)
//! ```

use std::io::{Read, Write};

use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, SubsecRound, Utc};

use crate::SegmentError;

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 50;

/// Magic bytes at the start of every segment file.
pub const MAGIC: [u8; 8] = *b"DRIFTSEG";

/// Current on-disk format version.
pub const VERSION: u16 = 1;

pub const VERSION_OFFSET: usize = 16;
pub const TIMESTAMP_OFFSET: usize = 18;
pub const TIMESTAMP_LEN: usize = 20;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Parsed segment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    created: DateTime<Utc>,
}

impl SegmentHeader {
    /// Header stamped with `created`, truncated to whole seconds.
    pub fn new(created: DateTime<Utc>) -> Self {
        Self {
            created: created.trunc_subsecs(0),
        }
    }

    /// Header stamped with the current time.
    pub fn now() -> Self {
        Self::new(Utc::now())
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    /// On-disk size of a header.
    #[must_use]
    pub const fn size() -> usize {
        HEADER_SIZE
    }

    /// Serializes the header into its fixed 50-byte form.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[..MAGIC.len()].copy_from_slice(&MAGIC);
        BigEndian::write_u16(&mut buf[VERSION_OFFSET..TIMESTAMP_OFFSET], VERSION);

        let stamp = self.created.format(TIMESTAMP_FORMAT).to_string();
        let stamp = stamp.as_bytes();
        let n = stamp.len().min(TIMESTAMP_LEN);
        buf[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + n].copy_from_slice(&stamp[..n]);
        buf
    }

    /// Writes the header to `w`.
    pub fn write_to<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        w.write_all(&self.to_bytes())
    }

    /// Reads exactly [`HEADER_SIZE`] bytes from `r` and parses them.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, SegmentError> {
        let mut buf = [0u8; HEADER_SIZE];
        r.read_exact(&mut buf)?;
        Self::from_bytes(&buf)
    }

    /// Parses a header from the front of `buf`.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, SegmentError> {
        if buf.len() < HEADER_SIZE {
            return Err(SegmentError::TooSmall {
                len: buf.len() as u64,
                min: HEADER_SIZE as u64,
            });
        }
        if buf[..MAGIC.len()] != MAGIC {
            return Err(SegmentError::BadMagic(buf[..MAGIC.len()].to_vec()));
        }
        let version = BigEndian::read_u16(&buf[VERSION_OFFSET..TIMESTAMP_OFFSET]);
        if version != VERSION {
            return Err(SegmentError::UnsupportedVersion(version));
        }

        let raw = &buf[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + TIMESTAMP_LEN];
        let text = std::str::from_utf8(raw)
            .map_err(|_| SegmentError::BadTimestamp(String::from_utf8_lossy(raw).into_owned()))?;
        let created = DateTime::parse_from_rfc3339(text)
            .map_err(|_| SegmentError::BadTimestamp(text.to_string()))?
            .with_timezone(&Utc);

        Ok(Self { created })
    }
}
