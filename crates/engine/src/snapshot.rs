//! # Directory snapshot — persisted key directory
//!
//! On clean close the key directory is serialized to `<store>/index` so
//! the next open can skip replaying every segment. The snapshot is purely
//! an optimization: it must be equivalent, up to later writes, to what a
//! full replay would produce, and recovery falls back to replay whenever
//! the file is absent.
//!
//! ## File format
//!
//! A sequence of big-endian tuples with no terminator; end-of-file marks
//! the end:
//!
//! ```text
//! [key_len: u32][key ...][file_id: u32][offset: u64][size: u64]
//! ```
//!
//! ## Crash safety
//!
//! The snapshot is written atomically: serialize into `index.tmp`, fsync,
//! then rename over `index`. A crash mid-save leaves the previous snapshot
//! (or none) in place, and recovery consumes-and-removes the file on load
//! so a snapshot can never outlive the writes that followed it.

use crate::config::Config;
use crate::error::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use keydir::{DirEntry, KeyDir};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Name of the snapshot file within the store directory.
pub const INDEX_FILENAME: &str = "index";

const INDEX_TMP_FILENAME: &str = "index.tmp";

/// Serializes `keydir` to the snapshot file at `path`.
///
/// Entries are written by in-order traversal, so two saves of the same
/// directory produce byte-identical files.
pub(crate) fn save(keydir: &KeyDir, path: &Path) -> Result<()> {
    let tmp_path = path.with_file_name(INDEX_TMP_FILENAME);

    {
        let f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        let mut w = BufWriter::new(f);

        for (key, entry) in keydir.iter() {
            w.write_u32::<BigEndian>(key.len() as u32)?;
            w.write_all(key)?;
            w.write_u32::<BigEndian>(entry.file_id)?;
            w.write_u64::<BigEndian>(entry.offset)?;
            w.write_u64::<BigEndian>(entry.size)?;
        }

        w.flush()?;
        w.get_ref().sync_all()?;
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Loads a snapshot from `path`.
///
/// Returns `Ok(None)` when the file is absent — the caller falls back to
/// full log replay. A present but malformed snapshot is an error
/// ([`Error::SnapshotOversizedKey`] or [`Error::SnapshotTruncated`]), not
/// a silent fallback: a store whose metadata cannot be trusted should not
/// be opened over it.
pub(crate) fn load(path: &Path, config: &Config) -> Result<Option<KeyDir>> {
    let f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Io(e)),
    };
    let mut r = BufReader::new(f);
    let mut keydir = KeyDir::new();

    loop {
        // EOF before a tuple's first field ends the stream; EOF anywhere
        // inside a tuple means the snapshot was cut short.
        let key_len = match read_u32_or_eof(&mut r)? {
            Some(n) => n,
            None => break,
        };
        if key_len > config.max_key_size {
            return Err(Error::SnapshotOversizedKey {
                size: key_len,
                max: config.max_key_size,
            });
        }

        let mut key = vec![0u8; key_len as usize];
        r.read_exact(&mut key).map_err(truncated)?;

        let file_id = r.read_u32::<BigEndian>().map_err(truncated)?;
        let offset = r.read_u64::<BigEndian>().map_err(truncated)?;
        let size = r.read_u64::<BigEndian>().map_err(truncated)?;

        keydir.insert(
            key,
            DirEntry {
                file_id,
                offset,
                size,
            },
        );
    }

    Ok(Some(keydir))
}

fn truncated(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::SnapshotTruncated
    } else {
        Error::Io(e)
    }
}

/// Reads a big-endian u32, distinguishing clean EOF (`Ok(None)`) from a
/// partial field ([`Error::SnapshotTruncated`]).
fn read_u32_or_eof<R: Read>(r: &mut R) -> Result<Option<u32>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    match filled {
        0 => Ok(None),
        4 => Ok(Some(u32::from_be_bytes(buf))),
        _ => Err(Error::SnapshotTruncated),
    }
}
