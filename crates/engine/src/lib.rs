//! # Engine - UndertowKV Storage Engine
//!
//! The central orchestrator that ties together the [`record`], [`datafile`],
//! and [`keydir`] crates into a complete Bitcask-style key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   ENGINE                      │
//! │                                               │
//! │ write.rs → active file append → keydir insert │
//! │              |                                │
//! │              |  (size > max_datafile_size?)   │
//! │              |            yes                 │
//! │              v                                │
//! │           roll() → freeze, open id+1          │
//! │                                               │
//! │ read.rs → keydir lookup → positioned read     │
//! │              → CRC32 verify → value           │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module        | Purpose                                                 |
//! |---------------|---------------------------------------------------------|
//! | [`lib.rs`]    | `Engine` struct, open, accessors, `Debug`, close/`Drop` |
//! | [`recovery`]  | segment discovery, snapshot load, log replay            |
//! | [`write`]     | `put()`, `delete()`, `delete_all()`, `sync()`, rollover |
//! | [`read`]      | `get()`, `has()`                                        |
//! | [`snapshot`]  | key directory snapshot codec (`<store>/index`)          |
//! | [`config`]    | `config.json` load/merge/persist                        |
//!
//! ## On-disk layout
//!
//! ```text
//! <store>/
//!   000000000.data   segment files, one per rollover, id order = age
//!   000000001.data
//!   ...
//!   index            key directory snapshot (written on clean close)
//!   config.json      persisted size limits + sync mode
//! ```
//!
//! ## Crash Safety
//!
//! Every mutation is one framed record appended to the active segment
//! **before** the key directory is updated, so readers never observe a key
//! whose record is not fully on disk. Recovery replays segments in id
//! order, tolerating a truncated record only at the tail of the last
//! segment (a crash mid-append); truncation anywhere else refuses to open.
//! The recovered tail segment stays frozen and a fresh active segment is
//! allocated at `last_id + 1` — the engine never appends to a possibly
//! torn file.
//!
//! ## Concurrency
//!
//! Single-writer, serialized-reader: one engine-wide mutex guards the
//! active file, the frozen file map, and the key directory. Every public
//! operation acquires it at entry, so the handle is `&self` and can be
//! shared across threads. This trades read scalability for correctness by
//! construction.

mod config;
mod error;
mod read;
mod recovery;
mod snapshot;
mod write;

pub use config::{
    Config, Options, CONFIG_FILENAME, DEFAULT_MAX_DATAFILE_SIZE, DEFAULT_MAX_KEY_SIZE,
    DEFAULT_MAX_VALUE_SIZE,
};
pub use error::{Error, Result};
pub use snapshot::INDEX_FILENAME;

use datafile::DataFile;
use keydir::KeyDir;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A Bitcask-style embedded key-value store.
///
/// # Write Path
///
/// 1. Admission: key/value sizes checked against the [`Config`] bounds.
/// 2. One record framed and appended to the active segment (rolling it
///    first if it has grown past `max_datafile_size`).
/// 3. The key directory is updated to point at the new record.
///
/// # Read Path
///
/// 1. Key directory lookup — one ordered-map probe, no I/O.
/// 2. A single positioned read of the full frame (memory map for frozen
///    segments, plain handle for the active one).
/// 3. CRC32 verification of the value bytes.
///
/// # Recovery
///
/// On [`Engine::open`] the store directory is scanned for segments; the
/// directory is loaded from the `index` snapshot when one exists, else
/// rebuilt by replaying every segment in id order.
pub struct Engine {
    path: PathBuf,
    config: Config,
    inner: Mutex<Inner>,
    /// Set once [`Engine::close`] has run, so `Drop` does not repeat the
    /// shutdown work.
    closed: bool,
}

/// Mutable state guarded by the engine-wide mutex.
pub(crate) struct Inner {
    /// The single segment receiving appends.
    pub(crate) curr: DataFile,
    /// Frozen segments by id. Every id here is strictly less than
    /// `curr.id()`.
    pub(crate) datafiles: BTreeMap<u32, DataFile>,
    /// Live key → newest record location.
    pub(crate) keydir: KeyDir,
}

impl Engine {
    /// Opens the store at `path` with the persisted configuration (or
    /// defaults for a fresh store), performing full recovery.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, Options::new())
    }

    /// Opens the store at `path`, layering `options` over the persisted
    /// configuration and writing the merged result back before recovery.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created, `config.json` is
    /// malformed, any segment is unreadable, or any record outside the
    /// last segment's tail is invalid or truncated.
    pub fn open_with<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;

        let config_path = path.join(CONFIG_FILENAME);
        let mut config = if config_path.exists() {
            Config::load(&config_path)?
        } else {
            Config::default()
        };
        options.apply(&mut config);
        config.save(&config_path)?;

        let inner = recovery::recover(&path, &config)?;

        Ok(Self {
            path,
            config,
            inner: Mutex::new(inner),
            closed: false,
        })
    }

    /// The store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The effective configuration this store was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().keydir.len()
    }

    /// `true` if no key is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().keydir.is_empty()
    }

    /// Closes the store: snapshots the key directory to `<store>/index`,
    /// syncs the active segment, and releases every file handle and map.
    ///
    /// Dropping the engine without calling `close` performs the same work
    /// best-effort, swallowing errors.
    pub fn close(mut self) -> Result<()> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let inner = self.inner.get_mut();
        snapshot::save(&inner.keydir, &self.path.join(INDEX_FILENAME))?;
        inner
            .curr
            .sync()
            .map_err(Error::at(inner.curr.id(), inner.curr.size()))?;
        self.closed = true;
        debug!(path = %self.path.display(), "store closed");
        Ok(())
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Engine")
            .field("path", &self.path)
            .field("config", &self.config)
            .field("active_id", &inner.curr.id())
            .field("active_size", &inner.curr.size())
            .field("frozen_count", &inner.datafiles.len())
            .field("keys", &inner.keydir.len())
            .finish()
    }
}

/// Best-effort close on drop.
///
/// Errors are silently ignored because `Drop` cannot propagate them — the
/// log itself is already durable, so the worst case is a reopen that pays
/// for a full replay instead of a snapshot load.
impl Drop for Engine {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests;
