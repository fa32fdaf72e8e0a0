//! Write path: `put()`, `delete()`, `delete_all()`, `sync()`, and segment
//! rollover.
//!
//! All mutations flow through [`Inner::append`]: one framed record is
//! appended to the active segment, and only after the append succeeds is
//! the key directory touched. A reader can therefore never find a key
//! whose record is not fully on disk.

use crate::error::{Error, Result};
use crate::{Config, Engine, Inner};
use datafile::DataFile;
use keydir::DirEntry;
use record::Record;
use std::path::Path;
use tracing::debug;

impl Engine {
    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyKey`] / [`Error::KeyTooLarge`] /
    ///   [`Error::ValueTooLarge`] — admission failures; nothing is written.
    /// - [`Error::EmptyValue`] — zero-length values are indistinguishable
    ///   from tombstones in the record format and are rejected.
    /// - [`Error::DataFile`] — the append failed; the directory keeps its
    ///   previous entry for the key.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        if value.is_empty() {
            return Err(Error::EmptyValue);
        }
        if value.len() as u64 > self.config.max_value_size {
            return Err(Error::ValueTooLarge {
                size: value.len(),
                max: self.config.max_value_size,
            });
        }

        let mut inner = self.inner.lock();
        let record = Record::new(key.to_vec(), value.to_vec());
        let entry = inner.append(&record, &self.path, &self.config)?;
        inner.keydir.insert(key.to_vec(), entry);
        Ok(())
    }

    /// Deletes `key` by appending a tombstone record.
    ///
    /// Idempotent: deleting an absent key still succeeds (and still
    /// appends one tombstone — the log, not the directory, is the source
    /// of truth during replay).
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.check_key(key)?;

        let mut inner = self.inner.lock();
        let record = Record::tombstone(key.to_vec());
        inner.append(&record, &self.path, &self.config)?;
        inner.keydir.remove(key);
        Ok(())
    }

    /// Deletes every live key.
    ///
    /// Tombstones are appended in directory traversal order. The operation
    /// is **not atomic on disk**: if an append fails, traversal stops, the
    /// error is returned, tombstones already appended remain in the log,
    /// and the directory is left exactly as it was before the call. Only
    /// after every tombstone lands is the directory cleared.
    pub fn delete_all(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let keys: Vec<Vec<u8>> = inner.keydir.keys().cloned().collect();
        for key in keys {
            inner.append(&Record::tombstone(key), &self.path, &self.config)?;
        }
        inner.keydir.clear();
        Ok(())
    }

    /// Forces the active segment to stable storage.
    ///
    /// Durability barrier: every write that completed before this call is
    /// durable once it returns successfully.
    pub fn sync(&self) -> Result<()> {
        let inner = self.inner.lock();
        inner
            .curr
            .sync()
            .map_err(Error::at(inner.curr.id(), inner.curr.size()))
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }
        if key.len() as u64 > u64::from(self.config.max_key_size) {
            return Err(Error::KeyTooLarge {
                size: key.len(),
                max: self.config.max_key_size,
            });
        }
        Ok(())
    }
}

impl Inner {
    /// Shared append path: roll the active segment if it has outgrown the
    /// threshold, append the record, and fsync when the store runs in
    /// sync mode. Returns the directory entry locating the new record.
    pub(crate) fn append(
        &mut self,
        record: &Record,
        path: &Path,
        config: &Config,
    ) -> Result<DirEntry> {
        // Strictly greater: a segment may exceed the threshold by up to
        // one record's encoded length.
        if self.curr.size() > config.max_datafile_size {
            self.roll(path, config)?;
        }

        let file_id = self.curr.id();
        let (offset, size) = self
            .curr
            .append(record)
            .map_err(Error::at(file_id, self.curr.size()))?;

        if config.sync {
            self.curr.sync().map_err(Error::at(file_id, offset))?;
        }

        Ok(DirEntry {
            file_id,
            offset,
            size,
        })
    }

    /// Freezes the active segment and starts a new one at `id + 1`.
    ///
    /// The old file is synced before the frozen (memory-mapped) view is
    /// taken, and nothing is swapped until both the frozen view and the
    /// new active file exist — a failure partway leaves the current
    /// active segment fully usable.
    fn roll(&mut self, path: &Path, config: &Config) -> Result<()> {
        let old_id = self.curr.id();
        debug!(
            file_id = old_id,
            size = self.curr.size(),
            "rolling active data file"
        );

        self.curr
            .sync()
            .map_err(Error::at(old_id, self.curr.size()))?;
        let frozen = DataFile::frozen(path, old_id, config.max_key_size, config.max_value_size)
            .map_err(Error::at(old_id, 0))?;
        let next = DataFile::active(path, old_id + 1, config.max_key_size, config.max_value_size)
            .map_err(Error::at(old_id + 1, 0))?;

        let old = std::mem::replace(&mut self.curr, next);
        old.close().map_err(Error::at(old_id, frozen.size()))?;
        self.datafiles.insert(old_id, frozen);
        Ok(())
    }
}
