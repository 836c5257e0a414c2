//! # WAL - Write-Ahead Log
//!
//! Crash-safe durability for the DriftKV store.
//!
//! Every mutation is encoded as a [`record`] and appended to the log **before**
//! the memtable sees it. The log uses exactly the segment record encoding with
//! no header and no checksum trailer, so at startup its contents can be copied
//! straight onto the active segment. After every successful flush the log is
//! truncated to zero bytes.
//!
//! ```text
//! [len: u16 BE][kind: u8][key]['='][value]   repeated
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use record::Entry;
//! use wal::{WalReader, WalWriter};
//!
//! let mut w = WalWriter::create("log", true).unwrap();
//! w.append(&Entry::put(b"hello".to_vec(), b"world".to_vec())).unwrap();
//! drop(w);
//!
//! let mut r = WalReader::open("log").unwrap();
//! let replay = r.replay(|e| println!("{:?}", e)).unwrap();
//! assert_eq!(replay.records, 1);
//! ```

use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use record::{complete_prefix_len, Entry, RecordError, RecordIter};
use thiserror::Error;

/// Errors that can occur during WAL operations.
#[derive(Debug, Error)]
pub enum WalError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// An entry could not be encoded.
    #[error("cannot encode record: {0}")]
    Encode(#[from] RecordError),

    /// A complete record in the log failed to decode.
    #[error("corrupt record at offset {offset}: {source}")]
    Corrupt {
        offset: usize,
        #[source]
        source: RecordError,
    },
}

/// Append-only WAL writer.
///
/// Records are encoded into a reusable buffer and written with a single
/// `write_all`. When `sync` is `true`, every append is followed by
/// `sync_data()` so the record is on stable storage before the call returns.
///
/// The writer remembers where the last complete record ends. A write that
/// fails part-way is cut back to that point, and any stray bytes found past
/// it before the next append are cut as well, so the log always ends on a
/// record boundary and later records stay replayable.
pub struct WalWriter {
    path: PathBuf,
    /// `None` only between a truncate and the next reopen.
    file: Option<File>,
    sync: bool,
    buf: Vec<u8>,
    /// Offset just past the last fully written record.
    end: u64,
}

impl WalWriter {
    /// Opens (or creates) a WAL file in append mode.
    ///
    /// # Arguments
    ///
    /// * `path` - file system path for the WAL (created if it does not exist).
    /// * `sync` - if true, every `append` call is followed by `fsync`.
    pub fn create<P: AsRef<Path>>(path: P, sync: bool) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        let file = Self::open_append(&path)?;
        let end = file.metadata()?.len();
        Ok(Self {
            path,
            file: Some(file),
            sync,
            buf: Vec::with_capacity(256),
            end,
        })
    }

    fn open_append(path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)
    }

    /// Returns the open handle, reopening (and creating) the file if needed.
    fn handle(&mut self) -> io::Result<&mut File> {
        let file = match self.file.take() {
            Some(f) => f,
            None => Self::open_append(&self.path)?,
        };
        Ok(self.file.insert(file))
    }

    /// Encodes `entry` and appends it to the log.
    ///
    /// On error nothing of `entry` is left in the log.
    pub fn append(&mut self, entry: &Entry) -> Result<(), WalError> {
        self.buf.clear();
        entry.encode_into(&mut self.buf)?;

        if self.file.is_none() {
            self.file = Some(Self::open_append(&self.path)?);
        }
        if let Some(file) = self.file.as_mut() {
            self.end = Self::write_frame(file, &self.buf, self.end, self.sync)?;
        }
        Ok(())
    }

    /// Appends `frame` after the record boundary at `end` and returns the new
    /// boundary.
    fn write_frame(file: &mut File, frame: &[u8], end: u64, sync: bool) -> Result<u64, WalError> {
        let on_disk = file.metadata()?.len();
        let end = if on_disk > end {
            tracing::warn!(
                stray_bytes = on_disk - end,
                offset = end,
                "wal has bytes past its last record; cutting them"
            );
            file.set_len(end)?;
            end
        } else {
            on_disk
        };

        let written = file
            .write_all(frame)
            .and_then(|()| file.flush())
            .and_then(|()| if sync { file.sync_data() } else { Ok(()) });
        if let Err(e) = written {
            if let Err(undo) = file.set_len(end) {
                tracing::error!(error = %undo, offset = end, "could not cut failed wal append");
            }
            return Err(e.into());
        }
        Ok(end + frame.len() as u64)
    }

    /// Forces all written data to disk via `sync_all()`.
    pub fn sync_to_disk(&mut self) -> Result<(), WalError> {
        let file = self.handle()?;
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    /// Drops every record: truncates the file to zero bytes and reopens it
    /// in append mode.
    pub fn truncate(&mut self) -> Result<(), WalError> {
        self.file = None;
        let f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        f.sync_all()?;
        drop(f);
        self.end = 0;
        self.file = Some(Self::open_append(&self.path)?);
        Ok(())
    }

    /// Current size of the log in bytes.
    pub fn len(&self) -> Result<u64, WalError> {
        match &self.file {
            Some(f) => Ok(f.metadata()?.len()),
            None => match std::fs::metadata(&self.path) {
                Ok(m) => Ok(m.len()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(0),
                Err(e) => Err(e.into()),
            },
        }
    }
}

/// Outcome of a replay.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Replay {
    /// The complete-record prefix of the log, byte for byte.
    pub bytes: Vec<u8>,
    /// Number of records in `bytes`.
    pub records: usize,
    /// Bytes of a partially written tail record that were discarded.
    pub torn_bytes: usize,
}

/// Sequential WAL reader.
///
/// Generic over any `Read` implementor so tests can replay from an in-memory
/// buffer. A truncated tail record (crash mid-append) is treated as a clean
/// end of log; every complete record before it is still returned.
pub struct WalReader<R: Read> {
    rdr: BufReader<R>,
}

impl WalReader<File> {
    /// Opens an existing WAL file for replay.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<WalReader<File>, WalError> {
        Ok(WalReader::from_reader(File::open(path)?))
    }
}

impl<R: Read> WalReader<R> {
    pub fn from_reader(reader: R) -> Self {
        WalReader {
            rdr: BufReader::new(reader),
        }
    }

    /// Replays every complete record, calling `apply` for each one in log
    /// order.
    ///
    /// # Termination
    ///
    /// - **Clean EOF** -> `Ok` with `torn_bytes == 0`.
    /// - **Truncated tail** -> `Ok` after yielding all complete records;
    ///   the partial bytes are counted in `torn_bytes`.
    /// - **Malformed complete record** -> `Err(WalError::Corrupt)`.
    /// - **I/O error** -> `Err(WalError::Io)`.
    pub fn replay<F>(&mut self, mut apply: F) -> Result<Replay, WalError>
    where
        F: FnMut(Entry),
    {
        let mut raw = Vec::new();
        self.rdr.read_to_end(&mut raw)?;

        let complete = complete_prefix_len(&raw);
        let torn_bytes = raw.len() - complete;
        if torn_bytes > 0 {
            tracing::warn!(
                torn_bytes,
                valid_bytes = complete,
                "wal ends with a partial record; discarding tail"
            );
        }
        raw.truncate(complete);

        let mut records = 0;
        let mut iter = RecordIter::new(&raw);
        loop {
            let offset = iter.offset();
            match iter.next() {
                Some(Ok(entry)) => {
                    records += 1;
                    apply(entry);
                }
                Some(Err(source)) => return Err(WalError::Corrupt { offset, source }),
                None => break,
            }
        }

        Ok(Replay {
            bytes: raw,
            records,
            torn_bytes,
        })
    }
}

#[cfg(test)]
mod tests;
