//! Cold-start recovery: segment discovery, snapshot load, log replay.
//!
//! Recovery rebuilds the in-memory picture from what is on disk:
//!
//! 1. Enumerate `*.data` files and parse their integer ids, ascending.
//! 2. Open every discovered segment frozen (memory-mapped).
//! 3. Load the `index` snapshot if present; otherwise replay every
//!    segment in id order, letting later records win and tombstones
//!    remove.
//! 4. Allocate a **fresh** active segment at `last_id + 1`. The recovered
//!    tail stays frozen — if it ends in a torn record the engine must not
//!    append after it, and allocating a new id sidesteps the question
//!    entirely.
//!
//! A consumed snapshot is removed from disk immediately: it is rewritten
//! on clean close, and deleting it up front means a crash between open
//! and close can never leave a stale snapshot shadowing newer log
//! records.

use crate::error::{Error, Result};
use crate::{snapshot, Config, Inner};
use datafile::{DataFile, DataFileError, DATAFILE_EXT};
use keydir::{DirEntry, KeyDir};
use record::RecordError;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Rebuilds engine state from the store directory.
pub(crate) fn recover(path: &Path, config: &Config) -> Result<Inner> {
    let ids = discover_ids(path)?;

    let mut datafiles = BTreeMap::new();
    for &id in &ids {
        let df = DataFile::frozen(path, id, config.max_key_size, config.max_value_size)
            .map_err(Error::at(id, 0))?;
        datafiles.insert(id, df);
    }

    let index_path = path.join(snapshot::INDEX_FILENAME);
    let (keydir, from_snapshot) = match snapshot::load(&index_path, config)? {
        Some(keydir) => {
            fs::remove_file(&index_path)?;
            (keydir, true)
        }
        None => (replay(&mut datafiles)?, false),
    };

    // Option (b) for the recovered tail: never reuse it, allocate the next
    // id for new appends.
    let next_id = ids.last().map_or(0, |last| last + 1);
    let curr = DataFile::active(path, next_id, config.max_key_size, config.max_value_size)
        .map_err(Error::at(next_id, 0))?;

    info!(
        path = %path.display(),
        segments = ids.len(),
        active_id = next_id,
        keys = keydir.len(),
        from_snapshot,
        "store opened"
    );

    Ok(Inner {
        curr,
        datafiles,
        keydir,
    })
}

/// Lists segment ids found under `path`, ascending.
///
/// Files with the `.data` extension whose stem is not a decimal integer
/// are not ours; they are skipped with a warning rather than failing the
/// open.
fn discover_ids(path: &Path) -> Result<Vec<u32>> {
    let mut ids = Vec::new();
    for entry in fs::read_dir(path)? {
        let p = entry?.path();
        if p.extension().map_or(true, |e| e != DATAFILE_EXT) {
            continue;
        }
        match p.file_stem().and_then(|s| s.to_str()).and_then(|s| s.parse::<u32>().ok()) {
            Some(id) => ids.push(id),
            None => warn!(file = %p.display(), "ignoring non-segment .data file"),
        }
    }
    ids.sort_unstable();
    Ok(ids)
}

/// Synthesizes the key directory by scanning every frozen segment in
/// ascending id order.
///
/// Tombstones remove their key; live records insert `{id, offset, len}`,
/// later records overwriting earlier ones. A truncated record at the tail
/// of the **last** segment is tolerated (crash mid-append); anywhere else
/// it is fatal, because sealed segments must parse cleanly.
fn replay(datafiles: &mut BTreeMap<u32, DataFile>) -> Result<KeyDir> {
    let mut keydir = KeyDir::new();
    let last_id = datafiles.keys().next_back().copied();

    for (&file_id, df) in datafiles.iter_mut() {
        let mut offset = 0u64;
        loop {
            match df.next() {
                Ok(Some((record, n))) => {
                    if record.is_tombstone() {
                        keydir.remove(&record.key);
                    } else {
                        keydir.insert(
                            record.key,
                            DirEntry {
                                file_id,
                                offset,
                                size: n,
                            },
                        );
                    }
                    offset += n;
                }
                Ok(None) => break,
                Err(DataFileError::Record(RecordError::Truncated)) if Some(file_id) == last_id => {
                    warn!(
                        file_id,
                        offset, "tolerating truncated record at tail of last segment"
                    );
                    break;
                }
                Err(e) => {
                    return Err(Error::DataFile {
                        file_id,
                        offset,
                        source: e,
                    })
                }
            }
        }
    }

    Ok(keydir)
}
