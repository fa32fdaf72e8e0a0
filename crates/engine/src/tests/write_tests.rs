use super::helpers::data_file_path;
use crate::*;
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

// --------------------- Basic put / get / delete ---------------------

#[test]
fn put_and_get() -> Result<()> {
    let dir = tempdir()?;
    let engine = Engine::open(dir.path())?;

    engine.put(b"hello", b"world")?;
    assert_eq!(engine.get(b"hello")?, b"world");
    assert_eq!(engine.len(), 1);
    Ok(())
}

#[test]
fn overwrite_key() -> Result<()> {
    let dir = tempdir()?;
    let engine = Engine::open(dir.path())?;

    engine.put(b"k", b"v1")?;
    engine.put(b"k", b"v2")?;
    assert_eq!(engine.get(b"k")?, b"v2");
    assert_eq!(engine.len(), 1);
    Ok(())
}

#[test]
fn delete_removes_key() -> Result<()> {
    let dir = tempdir()?;
    let engine = Engine::open(dir.path())?;

    engine.put(b"k", b"v")?;
    assert!(engine.has(b"k"));

    engine.delete(b"k")?;
    assert!(!engine.has(b"k"));
    assert!(matches!(engine.get(b"k"), Err(Error::KeyNotFound)));
    Ok(())
}

#[test]
fn put_after_delete_resurrects() -> Result<()> {
    let dir = tempdir()?;
    let engine = Engine::open(dir.path())?;

    engine.put(b"k", b"v1")?;
    engine.delete(b"k")?;
    engine.put(b"k", b"v2")?;
    assert_eq!(engine.get(b"k")?, b"v2");
    Ok(())
}

// --------------------- Admission ---------------------

#[test]
fn empty_key_rejected() -> Result<()> {
    let dir = tempdir()?;
    let engine = Engine::open(dir.path())?;

    assert!(matches!(engine.put(b"", b"v"), Err(Error::EmptyKey)));
    assert!(matches!(engine.delete(b""), Err(Error::EmptyKey)));
    Ok(())
}

#[test]
fn empty_value_rejected() -> Result<()> {
    let dir = tempdir()?;
    let engine = Engine::open(dir.path())?;

    assert!(matches!(engine.put(b"k", b""), Err(Error::EmptyValue)));
    assert_eq!(engine.len(), 0);
    Ok(())
}

#[test]
fn oversized_key_rejected_and_log_untouched() -> Result<()> {
    let dir = tempdir()?;
    let engine = Engine::open_with(dir.path(), Options::new().max_key_size(5))?;

    let log_before = fs::read(data_file_path(dir.path(), 0))?;
    assert!(matches!(
        engine.put(b"hello!", b"x"),
        Err(Error::KeyTooLarge { size: 6, max: 5 })
    ));
    assert_eq!(engine.len(), 0);

    // Byte-for-byte: a failed admission writes nothing.
    let log_after = fs::read(data_file_path(dir.path(), 0))?;
    assert_eq!(log_before, log_after);
    Ok(())
}

#[test]
fn oversized_value_rejected() -> Result<()> {
    let dir = tempdir()?;
    let engine = Engine::open_with(dir.path(), Options::new().max_value_size(3))?;

    assert!(matches!(
        engine.put(b"k", b"abcd"),
        Err(Error::ValueTooLarge { size: 4, max: 3 })
    ));
    assert_eq!(engine.len(), 0);
    Ok(())
}

// --------------------- Tombstones ---------------------

#[test]
fn delete_unknown_key_is_idempotent_and_appends_one_tombstone() -> Result<()> {
    let dir = tempdir()?;
    let engine = Engine::open(dir.path())?;

    engine.delete(b"never-existed")?;

    // Exactly one tombstone frame in the active segment.
    let tombstone = record::Record::tombstone(b"never-existed".to_vec());
    let log = fs::read(data_file_path(dir.path(), 0))?;
    assert_eq!(log.len() as u64, tombstone.encoded_len());
    Ok(())
}

#[test]
fn delete_all_empties_the_store() -> Result<()> {
    let dir = tempdir()?;
    let engine = Engine::open(dir.path())?;

    engine.put(b"a", b"1")?;
    engine.put(b"b", b"2")?;
    engine.put(b"c", b"3")?;
    assert_eq!(engine.len(), 3);

    engine.delete_all()?;
    assert_eq!(engine.len(), 0);
    assert!(engine.is_empty());
    assert!(matches!(engine.get(b"a"), Err(Error::KeyNotFound)));

    // The deletions are in the log, not just in memory.
    engine.close()?;
    let engine = Engine::open(dir.path())?;
    assert_eq!(engine.len(), 0);
    Ok(())
}

#[test]
fn delete_all_on_empty_store_is_noop() -> Result<()> {
    let dir = tempdir()?;
    let engine = Engine::open(dir.path())?;
    engine.delete_all()?;
    assert_eq!(engine.len(), 0);
    Ok(())
}

// --------------------- Sync modes ---------------------

#[test]
fn explicit_sync_succeeds() -> Result<()> {
    let dir = tempdir()?;
    let engine = Engine::open(dir.path())?;
    engine.put(b"k", b"v")?;
    engine.sync()?;
    Ok(())
}

#[test]
fn sync_on_every_put_mode() -> Result<()> {
    let dir = tempdir()?;
    let engine = Engine::open_with(dir.path(), Options::new().sync(true))?;
    assert!(engine.config().sync);

    engine.put(b"k", b"v")?;
    assert_eq!(engine.get(b"k")?, b"v");
    Ok(())
}
