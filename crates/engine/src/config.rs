//! Store configuration, persisted as `config.json` in the store directory.
//!
//! The file is the durable source of truth for the size limits a store was
//! created with: the record codec validates against these bounds during
//! recovery, so reopening a store with different limits than it was
//! written with would misclassify valid records as corrupt. `open` loads
//! the persisted config when present, layers the caller's [`Options`] over
//! it, and persists the result back before recovery runs.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

/// Name of the config file within the store directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// Default segment rollover threshold: 1 MiB.
pub const DEFAULT_MAX_DATAFILE_SIZE: u64 = 1 << 20;
/// Default maximum key size: 64 bytes.
pub const DEFAULT_MAX_KEY_SIZE: u32 = 64;
/// Default maximum value size: 64 KiB.
pub const DEFAULT_MAX_VALUE_SIZE: u64 = 1 << 16;

/// Durable store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Size threshold (bytes) past which the active segment is frozen and
    /// a new one is started. The comparison is strictly greater-than, so a
    /// segment may exceed this by up to one record's encoded length.
    pub max_datafile_size: u64,
    /// Maximum key size in bytes.
    pub max_key_size: u32,
    /// Maximum value size in bytes.
    pub max_value_size: u64,
    /// If `true`, every put is followed by fsync before it returns.
    pub sync: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_datafile_size: DEFAULT_MAX_DATAFILE_SIZE,
            max_key_size: DEFAULT_MAX_KEY_SIZE,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            sync: false,
        }
    }
}

impl Config {
    /// Loads a config from `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Persists the config to `path`, fsyncing before returning.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut f = File::create(path)?;
        f.write_all(&serde_json::to_vec_pretty(self)?)?;
        f.sync_all()?;
        Ok(())
    }
}

/// Caller-supplied overrides applied over the persisted config at open.
///
/// Only fields that were explicitly set are applied; everything else keeps
/// the value loaded from `config.json` (or the default for a fresh store).
///
/// ```rust
/// use engine::Options;
///
/// let opts = Options::new().max_key_size(128).sync(true);
/// # let _ = opts;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Options {
    max_datafile_size: Option<u64>,
    max_key_size: Option<u32>,
    max_value_size: Option<u64>,
    sync: Option<bool>,
}

impl Options {
    /// No overrides; the persisted config (or defaults) win.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the segment rollover threshold in bytes.
    #[must_use]
    pub fn max_datafile_size(mut self, bytes: u64) -> Self {
        self.max_datafile_size = Some(bytes);
        self
    }

    /// Overrides the maximum key size in bytes.
    #[must_use]
    pub fn max_key_size(mut self, bytes: u32) -> Self {
        self.max_key_size = Some(bytes);
        self
    }

    /// Overrides the maximum value size in bytes.
    #[must_use]
    pub fn max_value_size(mut self, bytes: u64) -> Self {
        self.max_value_size = Some(bytes);
        self
    }

    /// Overrides whether every put is followed by fsync.
    #[must_use]
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = Some(sync);
        self
    }

    pub(crate) fn apply(&self, config: &mut Config) {
        if let Some(v) = self.max_datafile_size {
            config.max_datafile_size = v;
        }
        if let Some(v) = self.max_key_size {
            config.max_key_size = v;
        }
        if let Some(v) = self.max_value_size {
            config.max_value_size = v;
        }
        if let Some(v) = self.sync {
            config.sync = v;
        }
    }
}
