//! # DataFile — append-only segment files
//!
//! A data file is one segment of the UndertowKV log: a contiguous
//! concatenation of encoded [`record::Record`] frames in write order,
//! named by its zero-padded integer id (`000000042.data`).
//!
//! ## Modes
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ ACTIVE  (exactly one per engine)                             │
//! │   append()  → write handle, offset advances per frame        │
//! │   read_at() → seek + bounded read on a separate file handle  │
//! │   next()    → sequential scan cursor                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │ FROZEN  (all older segments)                                 │
//! │   append()  → ReadOnly error                                 │
//! │   read_at() → slice of a shared memory map                   │
//! │   next()    → sequential scan cursor (recovery replay)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The active file is never memory-mapped: a map is only safe once the
//! underlying bytes are immutable, which is exactly the frozen state.
//! The engine relies on this split — positioned reads against the file it
//! is still appending to go through the plain handle.

use memmap2::Mmap;
use parking_lot::Mutex;
use record::{Decoder, Encoder, Record, RecordError};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension of segment files within a store directory.
pub const DATAFILE_EXT: &str = "data";

/// Errors produced by data file operations.
#[derive(Debug, Error)]
pub enum DataFileError {
    /// A write or sync was attempted on a frozen data file.
    #[error("read only data file")]
    ReadOnly,

    /// A positioned read found fewer bytes than the directory promised.
    #[error("short read at offset {offset}: wanted {want} bytes, got {got}")]
    ShortRead {
        /// Byte offset the read started at.
        offset: u64,
        /// Bytes requested.
        want: u64,
        /// Bytes actually available.
        got: u64,
    },

    /// A codec failure while encoding or decoding a frame.
    #[error(transparent)]
    Record(#[from] RecordError),

    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Returns the on-disk file name for a segment id, e.g. `000000007.data`.
#[must_use]
pub fn filename(id: u32) -> String {
    format!("{:09}.{}", id, DATAFILE_EXT)
}

/// One append-only segment file, active or frozen.
pub struct DataFile {
    id: u32,
    path: PathBuf,
    /// Write handle; `None` marks the file frozen.
    writer: Option<File>,
    /// Reusable frame encoder (scratch buffer survives across appends).
    enc: Encoder,
    /// Sequential scan cursor, used by recovery replay.
    scan: Decoder<File>,
    /// Handle for positioned reads on the **active** file, wrapped in a
    /// `Mutex` so `read_at` works through `&self`.
    reads: Mutex<BufReader<File>>,
    /// Memory map for positioned reads on **frozen** files. Absent for
    /// active files and for zero-length frozen files (mapping an empty
    /// file is an error on most platforms).
    mmap: Option<Mmap>,
    /// Logical byte length: sum of all encoded frames.
    offset: u64,
    max_key_size: u32,
    max_value_size: u64,
}

impl DataFile {
    /// Opens (creating if absent) the segment `id` under `dir` for append.
    ///
    /// The logical offset starts at the current file length, so appending
    /// to an existing file continues where it left off.
    pub fn active(
        dir: &Path,
        id: u32,
        max_key_size: u32,
        max_value_size: u64,
    ) -> Result<Self, DataFileError> {
        let path = dir.join(filename(id));
        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let offset = writer.metadata()?.len();

        Ok(Self {
            id,
            writer: Some(writer),
            enc: Encoder::new(),
            scan: Decoder::new(File::open(&path)?, max_key_size, max_value_size),
            reads: Mutex::new(BufReader::new(File::open(&path)?)),
            mmap: None,
            path,
            offset,
            max_key_size,
            max_value_size,
        })
    }

    /// Opens the segment `id` under `dir` read-only, memory-mapping it for
    /// random access.
    ///
    /// # Safety of the map
    ///
    /// `Mmap::map` is `unsafe` because a concurrent writer could mutate the
    /// mapped bytes. Frozen segments are immutable for the lifetime of the
    /// engine (the engine owns every handle and only ever appends to the
    /// single active file), so the map cannot observe a mutation.
    pub fn frozen(
        dir: &Path,
        id: u32,
        max_key_size: u32,
        max_value_size: u64,
    ) -> Result<Self, DataFileError> {
        let path = dir.join(filename(id));
        let file = File::open(&path)?;
        let offset = file.metadata()?.len();
        let mmap = if offset > 0 {
            Some(unsafe { Mmap::map(&file)? })
        } else {
            None
        };

        Ok(Self {
            id,
            writer: None,
            enc: Encoder::new(),
            scan: Decoder::new(File::open(&path)?, max_key_size, max_value_size),
            reads: Mutex::new(BufReader::new(file)),
            mmap,
            path,
            offset,
            max_key_size,
            max_value_size,
        })
    }

    /// The integer id this segment is named by.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current logical byte length.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.offset
    }

    /// `true` once the file has been opened frozen.
    #[must_use]
    pub fn is_readonly(&self) -> bool {
        self.writer.is_none()
    }

    /// Appends one record, returning `(offset_before_write, encoded_len)`.
    ///
    /// The frame is written in a single `write_all`; if it fails the
    /// logical offset does not advance, so a later retry or recovery scan
    /// sees a consistent prefix.
    ///
    /// # Errors
    ///
    /// [`DataFileError::ReadOnly`] on a frozen file, otherwise any codec or
    /// I/O failure.
    pub fn append(&mut self, record: &Record) -> Result<(u64, u64), DataFileError> {
        let writer = self.writer.as_mut().ok_or(DataFileError::ReadOnly)?;
        let offset = self.offset;
        let n = self.enc.encode(record, writer)?;
        self.offset += n;
        Ok((offset, n))
    }

    /// Reads the record whose frame starts at `offset` and spans `size`
    /// bytes, as previously returned by [`DataFile::append`].
    ///
    /// Frozen files serve the read from the memory map; the active file
    /// seeks its plain read handle. Either way the frame is fetched in one
    /// bounded read and parsed with [`record::decode_exact`].
    ///
    /// # Errors
    ///
    /// [`DataFileError::ShortRead`] if fewer than `size` bytes are
    /// available at `offset`; codec errors if the bytes do not parse.
    pub fn read_at(&self, offset: u64, size: u64) -> Result<Record, DataFileError> {
        // Bound the request by the logical length before allocating
        // anything; `size` comes from the key directory and a corrupt
        // snapshot must not be able to demand an absurd buffer.
        let available = self.offset.saturating_sub(offset);
        if available < size {
            return Err(DataFileError::ShortRead {
                offset,
                want: size,
                got: available,
            });
        }

        if self.writer.is_none() {
            let mmap = self.mmap.as_deref().unwrap_or(&[]);
            let frame = &mmap[offset as usize..(offset + size) as usize];
            return Ok(record::decode_exact(
                frame,
                self.max_key_size,
                self.max_value_size,
            )?);
        }

        let mut rdr = self.reads.lock();
        rdr.seek(SeekFrom::Start(offset))?;

        let mut frame = vec![0u8; size as usize];
        let mut filled = 0;
        while filled < frame.len() {
            match rdr.read(&mut frame[filled..]) {
                Ok(0) => {
                    return Err(DataFileError::ShortRead {
                        offset,
                        want: size,
                        got: filled as u64,
                    })
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(DataFileError::Io(e)),
            }
        }

        Ok(record::decode_exact(
            &frame,
            self.max_key_size,
            self.max_value_size,
        )?)
    }

    /// Returns the next record from the sequential scan cursor together
    /// with the bytes consumed, or `Ok(None)` at a clean end of log.
    ///
    /// A partial trailing frame surfaces as
    /// [`RecordError::Truncated`]; recovery decides whether the
    /// segment's position in the log makes that tolerable.
    pub fn next(&mut self) -> Result<Option<(Record, u64)>, DataFileError> {
        Ok(self.scan.read_record()?)
    }

    /// Forces appended frames to stable storage.
    ///
    /// # Errors
    ///
    /// [`DataFileError::ReadOnly`] on a frozen file.
    pub fn sync(&self) -> Result<(), DataFileError> {
        let writer = self.writer.as_ref().ok_or(DataFileError::ReadOnly)?;
        writer.sync_all()?;
        Ok(())
    }

    /// Closes the file, syncing the write handle first when active.
    ///
    /// Read resources (handles, memory map) are released on drop either
    /// way; dropping without `close` skips only the final sync.
    pub fn close(self) -> Result<(), DataFileError> {
        if let Some(writer) = &self.writer {
            writer.sync_all()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for DataFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataFile")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("size", &self.offset)
            .field("readonly", &self.is_readonly())
            .finish()
    }
}

#[cfg(test)]
mod tests;
