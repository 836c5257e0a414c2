use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use record::complete_prefix_len;

use crate::checksum::content_hash;
use crate::header::{SegmentHeader, HEADER_SIZE};
use crate::{SegmentError, SegmentId};

/// The single writable segment.
///
/// An active segment is a header followed by records and has **no** trailer.
/// [`seal`](ActiveSegment::seal) appends the content hash and consumes the
/// handle; nothing is ever appended to a sealed segment.
#[derive(Debug)]
pub struct ActiveSegment {
    id: SegmentId,
    path: PathBuf,
    file: File,
    len: u64,
}

impl ActiveSegment {
    /// Creates `<dir>/<id>.sst` and writes a fresh header.
    ///
    /// Fails if the file already exists.
    pub fn create(dir: &Path, id: SegmentId) -> Result<Self, SegmentError> {
        let path = id.path_in(dir);
        let mut file = OpenOptions::new()
            .create_new(true)
            .read(true)
            .append(true)
            .open(&path)?;
        SegmentHeader::now().write_to(&mut file)?;
        file.sync_data()?;
        sync_dir(dir);

        tracing::debug!(segment = %id, "created active segment");
        Ok(Self {
            id,
            path,
            file,
            len: HEADER_SIZE as u64,
        })
    }

    /// Reopens an existing, unsealed segment for appending.
    ///
    /// A partially written tail record is cut off so that later appends stay
    /// aligned on record boundaries.
    pub fn open(dir: &Path, id: SegmentId) -> Result<Self, SegmentError> {
        let path = id.path_in(dir);
        let bytes = fs::read(&path)?;
        SegmentHeader::from_bytes(&bytes)?;

        let body = &bytes[HEADER_SIZE..];
        let complete = complete_prefix_len(body);
        let len = (HEADER_SIZE + complete) as u64;

        let file = OpenOptions::new().read(true).append(true).open(&path)?;
        if complete < body.len() {
            tracing::warn!(
                segment = %id,
                torn_bytes = body.len() - complete,
                "active segment ends with a partial record; truncating"
            );
            file.set_len(len)?;
            file.sync_all()?;
        }

        Ok(Self { id, path, file, len })
    }

    /// Appends pre-encoded records.
    ///
    /// Bytes past the last successful append are cut first, and a failed
    /// write is cut back, so the file always ends on a record boundary.
    pub fn append(&mut self, records: &[u8]) -> Result<(), SegmentError> {
        let on_disk = self.file.metadata()?.len();
        if on_disk > self.len {
            tracing::warn!(
                segment = %self.id,
                stray_bytes = on_disk - self.len,
                "active segment has bytes past its last record; cutting them"
            );
            self.file.set_len(self.len)?;
        }

        if let Err(e) = self.file.write_all(records) {
            if let Err(undo) = self.file.set_len(self.len) {
                tracing::error!(
                    segment = %self.id,
                    error = %undo,
                    "could not cut failed segment append"
                );
            }
            return Err(e.into());
        }
        self.len += records.len() as u64;
        Ok(())
    }

    /// Flushes appended data to stable storage.
    pub fn sync(&mut self) -> Result<(), SegmentError> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Appends the MD5 of the file's current bytes, syncs and closes it.
    ///
    /// The hash is computed over the bytes read back from disk, so whatever
    /// was appended before (including replayed log content) is covered.
    pub fn seal(mut self) -> Result<SegmentId, SegmentError> {
        self.file.flush()?;
        let content = fs::read(&self.path)?;
        let hash = content_hash(&content);
        self.file.write_all(&hash)?;
        self.file.sync_all()?;

        tracing::debug!(
            segment = %self.id,
            bytes = content.len() + hash.len(),
            "sealed segment"
        );
        Ok(self.id)
    }

    /// Deletes the segment file without sealing it.
    pub fn discard(self) -> Result<(), SegmentError> {
        let ActiveSegment { id, path, file, .. } = self;
        drop(file);
        fs::remove_file(&path)?;
        tracing::debug!(segment = %id, "discarded active segment");
        Ok(())
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total file size in bytes, header included.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Bytes of records appended after the header.
    pub fn record_bytes(&self) -> u64 {
        self.len - HEADER_SIZE as u64
    }

    /// `true` if the segment holds no records.
    pub fn is_empty(&self) -> bool {
        self.record_bytes() == 0
    }
}

/// Writes a complete sealed segment `<dir>/<id>.sst` in one go.
///
/// Data goes to `<id>.sst.tmp` first, is fsynced, then renamed into place.
/// Returns the final file size.
pub fn write_sealed(dir: &Path, id: SegmentId, records: &[u8]) -> Result<u64, SegmentError> {
    let path = id.path_in(dir);
    let tmp_path = path.with_extension("sst.tmp");

    let raw = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&tmp_path)?;
    let mut file = BufWriter::new(raw);

    let header = SegmentHeader::now().to_bytes();
    let mut hasher_input = Vec::with_capacity(HEADER_SIZE + records.len());
    hasher_input.extend_from_slice(&header);
    hasher_input.extend_from_slice(records);
    let hash = content_hash(&hasher_input);

    file.write_all(&hasher_input)?;
    file.write_all(&hash)?;
    file.flush()?;
    file.into_inner().map_err(|e| e.into_error())?.sync_all()?;

    fs::rename(&tmp_path, &path)?;
    sync_dir(dir);

    Ok((hasher_input.len() + hash.len()) as u64)
}

/// Fsyncs a directory so that renames and new entries are durable.
pub(crate) fn sync_dir(dir: &Path) {
    if let Ok(d) = File::open(dir) {
        let _ = d.sync_all();
    }
}
