//! Read path: `get()` and `has()`.
//!
//! A point lookup is one directory probe plus one positioned read of the
//! full record frame — the directory entry carries the encoded length, so
//! no second read is ever needed. Frozen segments serve the read from
//! their memory map; only the active segment goes through a file handle.

use crate::error::{Error, Result};
use crate::{Engine, Inner};
use keydir::DirEntry;
use record::Record;

impl Engine {
    /// Returns the value stored under `key`.
    ///
    /// The CRC32 carried in the record is verified against the value bytes
    /// on every call. Verification runs after the engine lock is released
    /// — the record bytes are copied out first, so nothing engine-owned is
    /// borrowed across the boundary.
    ///
    /// # Errors
    ///
    /// - [`Error::KeyNotFound`] — no live record for `key`.
    /// - [`Error::ChecksumMismatch`] — the stored value is corrupt. The
    ///   directory entry is deliberately retained so an operator can
    ///   inspect the offending segment and offset.
    /// - [`Error::DataFile`] — the positioned read failed.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let inner = self.inner.lock();
        let entry = match inner.keydir.get(key) {
            Some(e) => *e,
            None => return Err(Error::KeyNotFound),
        };
        let record = inner.read_entry(&entry)?;
        drop(inner);

        let computed = record.computed_checksum();
        if computed != record.checksum {
            return Err(Error::ChecksumMismatch {
                stored: record.checksum,
                computed,
            });
        }
        Ok(record.value)
    }

    /// Returns `true` if `key` has a live record. Directory lookup only —
    /// no disk I/O and no checksum verification.
    #[must_use]
    pub fn has(&self, key: &[u8]) -> bool {
        self.inner.lock().keydir.contains(key)
    }
}

impl Inner {
    /// Dispatches a positioned read to the segment a directory entry
    /// points at.
    pub(crate) fn read_entry(&self, entry: &DirEntry) -> Result<Record> {
        let df = if entry.file_id == self.curr.id() {
            &self.curr
        } else {
            self.datafiles.get(&entry.file_id).ok_or_else(|| {
                // The directory never points at a segment the engine does
                // not hold; reaching this is an internal invariant breach.
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("data file {} missing from frozen set", entry.file_id),
                ))
            })?
        };
        df.read_at(entry.offset, entry.size)
            .map_err(Error::at(entry.file_id, entry.offset))
    }
}
