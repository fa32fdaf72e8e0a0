//! # Record — log record framing
//!
//! Every mutation in UndertowKV is one framed record appended to a data
//! file. This crate owns the wire format: encoding a `(key, value)` pair
//! into a frame, and decoding frames back out of a byte stream or a
//! pre-sliced buffer.
//!
//! ## Binary Record Format
//!
//! ```text
//! [key_len: u32 BE][value_len: u64 BE][key ...][value ...][crc32: u32 BE]
//! ```
//!
//! The CRC32 (IEEE) covers **only the value bytes** — not the key and not
//! the length prefix. A record with `value_len == 0` is a **tombstone**
//! marking the key as deleted; tombstones therefore carry a CRC of the
//! empty byte string.
//!
//! ## Decoding discipline
//!
//! The decoder distinguishes three terminal conditions that recovery cares
//! about:
//!
//! - **End of log** — EOF exactly at a record boundary. Not an error;
//!   [`Decoder::read_record`] returns `Ok(None)`.
//! - **Truncated record** — EOF inside a frame (e.g. a crash mid-append).
//!   Returned as [`RecordError::Truncated`] so the caller can decide
//!   whether the position in the log makes it tolerable.
//! - **Invalid record** — a length prefix that violates the configured
//!   bounds (`key_len == 0`, or either length above its maximum). Always
//!   an error; sizes are validated *before* any allocation so a corrupt
//!   prefix cannot trigger a huge `Vec` reservation.
//!
//! ## Example
//!
//! ```rust
//! use record::{Decoder, Encoder, Record};
//! use std::io::Cursor;
//!
//! let mut buf = Vec::new();
//! let mut enc = Encoder::new();
//! enc.encode(&Record::new(b"hello".to_vec(), b"world".to_vec()), &mut buf).unwrap();
//!
//! let mut dec = Decoder::new(Cursor::new(buf), 64, 65536);
//! let (rec, n) = dec.read_record().unwrap().unwrap();
//! assert_eq!(rec.value, b"world");
//! assert_eq!(n, rec.encoded_len());
//! ```

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::io::{self, BufReader, Read, Write};
use thiserror::Error;

/// Bytes of the `key_len` prefix field.
pub const KEY_LEN_BYTES: usize = 4;
/// Bytes of the `value_len` prefix field.
pub const VALUE_LEN_BYTES: usize = 8;
/// Bytes of the trailing CRC32 field.
pub const CHECKSUM_BYTES: usize = 4;
/// Total bytes of the fixed length prefix (`key_len` + `value_len`).
pub const PREFIX_BYTES: usize = KEY_LEN_BYTES + VALUE_LEN_BYTES;

/// Errors produced while encoding or decoding records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The key length prefix is zero or exceeds the configured maximum.
    #[error("invalid key size {size} (max {max})")]
    InvalidKeySize {
        /// The key length read from the prefix.
        size: u32,
        /// The configured `max_key_size`.
        max: u32,
    },

    /// The value length prefix exceeds the configured maximum.
    #[error("invalid value size {size} (max {max})")]
    InvalidValueSize {
        /// The value length read from the prefix.
        size: u64,
        /// The configured `max_value_size`.
        max: u64,
    },

    /// The stream ended inside a frame (crash mid-append).
    #[error("truncated record")]
    Truncated,

    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// One log record: a key, a value, and the CRC32 of the value.
///
/// An empty value marks a **tombstone** — the record format has no separate
/// delete flag, which is why zero-length values are not storable as live
/// data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// The lookup key. Never empty in a well-formed record.
    pub key: Vec<u8>,
    /// The payload. Empty for tombstones.
    pub value: Vec<u8>,
    /// CRC32 (IEEE) of the value bytes as read from (or written to) disk.
    pub checksum: u32,
}

impl Record {
    /// Builds a record, computing the value checksum.
    pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
        let checksum = crc32fast::hash(&value);
        Self {
            key,
            value,
            checksum,
        }
    }

    /// Builds a tombstone record for `key`.
    pub fn tombstone(key: Vec<u8>) -> Self {
        Self::new(key, Vec::new())
    }

    /// Returns `true` if this record marks a deletion.
    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.value.is_empty()
    }

    /// Total on-disk size of this record's frame.
    #[must_use]
    pub fn encoded_len(&self) -> u64 {
        (PREFIX_BYTES + self.key.len() + self.value.len() + CHECKSUM_BYTES) as u64
    }

    /// Recomputes the CRC32 of the value bytes currently held.
    ///
    /// Compare against [`Record::checksum`] to detect corruption; the codec
    /// itself never verifies, that is the reader's call to make.
    #[must_use]
    pub fn computed_checksum(&self) -> u32 {
        crc32fast::hash(&self.value)
    }
}

/// Record encoder with a reusable scratch buffer.
///
/// Each frame is assembled in the internal buffer and handed to the writer
/// in a single `write_all` call, so a crash can never leave a half-frame
/// from a *partially issued* write (a torn write at the OS level is still
/// possible and handled by the decoder's truncation path).
#[derive(Debug, Default)]
pub struct Encoder {
    /// Scratch buffer, cleared but not deallocated between records.
    buf: Vec<u8>,
}

impl Encoder {
    /// Creates an encoder with a small pre-sized scratch buffer.
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(256),
        }
    }

    /// Serializes `record` and writes the full frame to `w`.
    ///
    /// Returns the number of bytes written (the record's encoded length).
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Io`] if the write fails. Nothing is written
    /// on a serialization failure; a failed `write_all` leaves the caller's
    /// offset bookkeeping untouched.
    pub fn encode<W: Write>(&mut self, record: &Record, w: &mut W) -> Result<u64, RecordError> {
        self.buf.clear();

        self.buf.write_u32::<BigEndian>(record.key.len() as u32)?;
        self.buf.write_u64::<BigEndian>(record.value.len() as u64)?;
        self.buf.extend_from_slice(&record.key);
        self.buf.extend_from_slice(&record.value);
        self.buf.write_u32::<BigEndian>(record.checksum)?;

        w.write_all(&self.buf)?;
        Ok(self.buf.len() as u64)
    }
}

/// Streaming record decoder over any `Read` implementor.
///
/// Used for sequential scans during recovery. Real files go through
/// `Decoder<File>`; tests supply in-memory buffers (`Cursor<Vec<u8>>`).
pub struct Decoder<R: Read> {
    rdr: BufReader<R>,
    max_key_size: u32,
    max_value_size: u64,
}

impl<R: Read> Decoder<R> {
    /// Constructs a decoder enforcing the given size bounds.
    pub fn new(reader: R, max_key_size: u32, max_value_size: u64) -> Self {
        Self {
            rdr: BufReader::new(reader),
            max_key_size,
            max_value_size,
        }
    }

    /// Reads the next record from the stream.
    ///
    /// Returns `Ok(Some((record, consumed)))` on success, where `consumed`
    /// is the full frame length, or `Ok(None)` at a clean end of log.
    ///
    /// # Errors
    ///
    /// - [`RecordError::Truncated`] — EOF inside a frame.
    /// - [`RecordError::InvalidKeySize`] / [`RecordError::InvalidValueSize`]
    ///   — prefix out of bounds.
    /// - [`RecordError::Io`] — any other read failure.
    pub fn read_record(&mut self) -> Result<Option<(Record, u64)>, RecordError> {
        // The prefix is read byte-exact so that "no bytes at all" (end of
        // log) and "some bytes then EOF" (truncated) stay distinguishable.
        let mut prefix = [0u8; PREFIX_BYTES];
        let mut filled = 0;
        while filled < PREFIX_BYTES {
            match self.rdr.read(&mut prefix[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(RecordError::Io(e)),
            }
        }
        if filled == 0 {
            return Ok(None);
        }
        if filled < PREFIX_BYTES {
            return Err(RecordError::Truncated);
        }

        let key_len = BigEndian::read_u32(&prefix[..KEY_LEN_BYTES]);
        let value_len = BigEndian::read_u64(&prefix[KEY_LEN_BYTES..]);
        validate_sizes(key_len, value_len, self.max_key_size, self.max_value_size)?;

        // Key + value + checksum in one bounded read. The bounds check
        // above caps the allocation.
        let body_len = key_len as usize + value_len as usize + CHECKSUM_BYTES;
        let mut body = vec![0u8; body_len];
        match self.rdr.read_exact(&mut body) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(RecordError::Truncated);
            }
            Err(e) => return Err(RecordError::Io(e)),
        }

        let record = split_body(body, key_len as usize);
        let consumed = (PREFIX_BYTES + body_len) as u64;
        Ok(Some((record, consumed)))
    }
}

/// Decodes a buffer already known to contain exactly one encoded record.
///
/// This is the positioned-read path: the caller learned the frame length
/// from the key directory and read that many bytes in one call, so no
/// further I/O is needed here.
///
/// # Errors
///
/// - [`RecordError::Truncated`] — the buffer is shorter than its own
///   prefix declares.
/// - [`RecordError::InvalidKeySize`] / [`RecordError::InvalidValueSize`]
///   — prefix out of bounds.
pub fn decode_exact(
    buf: &[u8],
    max_key_size: u32,
    max_value_size: u64,
) -> Result<Record, RecordError> {
    if buf.len() < PREFIX_BYTES {
        return Err(RecordError::Truncated);
    }
    let key_len = BigEndian::read_u32(&buf[..KEY_LEN_BYTES]);
    let value_len = BigEndian::read_u64(&buf[KEY_LEN_BYTES..PREFIX_BYTES]);
    validate_sizes(key_len, value_len, max_key_size, max_value_size)?;

    let body_len = key_len as usize + value_len as usize + CHECKSUM_BYTES;
    let Some(body) = buf.get(PREFIX_BYTES..PREFIX_BYTES + body_len) else {
        return Err(RecordError::Truncated);
    };
    Ok(split_body(body.to_vec(), key_len as usize))
}

fn validate_sizes(
    key_len: u32,
    value_len: u64,
    max_key_size: u32,
    max_value_size: u64,
) -> Result<(), RecordError> {
    if key_len == 0 || key_len > max_key_size {
        return Err(RecordError::InvalidKeySize {
            size: key_len,
            max: max_key_size,
        });
    }
    if value_len > max_value_size {
        return Err(RecordError::InvalidValueSize {
            size: value_len,
            max: max_value_size,
        });
    }
    Ok(())
}

/// Splits a record body (`key | value | checksum`) into its parts.
fn split_body(mut body: Vec<u8>, key_len: usize) -> Record {
    let checksum_at = body.len() - CHECKSUM_BYTES;
    let checksum = BigEndian::read_u32(&body[checksum_at..]);
    let value = body[key_len..checksum_at].to_vec();
    body.truncate(key_len);
    Record {
        key: body,
        value,
        checksum,
    }
}
