//! Unified error type for store operations.
//!
//! Component crates surface their own structured errors
//! ([`record::RecordError`], [`datafile::DataFileError`]); the engine wraps
//! them with the context a caller or operator needs — which key was asked
//! for, which segment and offset misbehaved. There is no retry and no
//! self-healing: a store that cannot parse its own logs refuses to open.

use datafile::DataFileError;
use std::io;
use thiserror::Error;

/// Result type alias using the engine [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the public store API.
#[derive(Debug, Error)]
pub enum Error {
    /// `get` on a key with no live record. Expected, surfaced directly.
    #[error("key not found")]
    KeyNotFound,

    /// A zero-length key was submitted.
    #[error("empty key")]
    EmptyKey,

    /// A zero-length value was submitted. The record format encodes
    /// deletions as empty values, so empty values are not storable as
    /// live data.
    #[error("empty value (zero-length values are not storable)")]
    EmptyValue,

    /// The key exceeds the configured `max_key_size`.
    #[error("key too large: {size} bytes (max {max})")]
    KeyTooLarge {
        /// Submitted key length.
        size: usize,
        /// Configured maximum.
        max: u32,
    },

    /// The value exceeds the configured `max_value_size`.
    #[error("value too large: {size} bytes (max {max})")]
    ValueTooLarge {
        /// Submitted value length.
        size: usize,
        /// Configured maximum.
        max: u64,
    },

    /// A record read back from disk failed CRC32 verification. The
    /// directory entry is retained for operator diagnosis.
    #[error("checksum mismatch: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch {
        /// Checksum carried in the record frame.
        stored: u32,
        /// Checksum recomputed over the value bytes read.
        computed: u32,
    },

    /// A data file operation failed; context names the segment and offset.
    #[error("data file {file_id} at offset {offset}: {source}")]
    DataFile {
        /// Id of the offending segment.
        file_id: u32,
        /// Byte offset within the segment.
        offset: u64,
        /// The underlying failure.
        #[source]
        source: DataFileError,
    },

    /// The directory snapshot declares a key longer than `max_key_size`.
    #[error("snapshot contains oversized key: {size} bytes (max {max})")]
    SnapshotOversizedKey {
        /// Declared key length.
        size: u32,
        /// Configured maximum.
        max: u32,
    },

    /// The directory snapshot ends inside a tuple.
    #[error("snapshot truncated")]
    SnapshotTruncated,

    /// `config.json` failed to parse or serialize.
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    /// An underlying filesystem error outside any particular segment.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Wraps a data file failure with its segment id and offset.
    pub(crate) fn at(file_id: u32, offset: u64) -> impl FnOnce(DataFileError) -> Error {
        move |source| Error::DataFile {
            file_id,
            offset,
            source,
        }
    }
}
