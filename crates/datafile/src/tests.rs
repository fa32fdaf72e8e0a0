use super::*;
use record::Record;
use std::fs;
use tempfile::tempdir;

// -------------------- Helpers --------------------

const MAX_KEY: u32 = 64;
const MAX_VALUE: u64 = 65536;

fn active(dir: &Path, id: u32) -> DataFile {
    DataFile::active(dir, id, MAX_KEY, MAX_VALUE).unwrap()
}

fn frozen(dir: &Path, id: u32) -> DataFile {
    DataFile::frozen(dir, id, MAX_KEY, MAX_VALUE).unwrap()
}

fn rec(key: &[u8], value: &[u8]) -> Record {
    Record::new(key.to_vec(), value.to_vec())
}

// -------------------- Naming --------------------

#[test]
fn filenames_are_nine_digit_zero_padded() {
    assert_eq!(filename(0), "000000000.data");
    assert_eq!(filename(7), "000000007.data");
    assert_eq!(filename(123_456_789), "123456789.data");
}

// -------------------- Append --------------------

#[test]
fn append_returns_offset_and_length() {
    let dir = tempdir().unwrap();
    let mut df = active(dir.path(), 0);

    let r1 = rec(b"k1", b"v1");
    let r2 = rec(b"k2", b"longer-value");

    let (off1, n1) = df.append(&r1).unwrap();
    assert_eq!(off1, 0);
    assert_eq!(n1, r1.encoded_len());

    let (off2, n2) = df.append(&r2).unwrap();
    assert_eq!(off2, n1);
    assert_eq!(n2, r2.encoded_len());

    assert_eq!(df.size(), n1 + n2);
}

#[test]
fn size_matches_file_length_after_sync() {
    let dir = tempdir().unwrap();
    let mut df = active(dir.path(), 3);
    df.append(&rec(b"k", b"v")).unwrap();
    df.sync().unwrap();

    let on_disk = fs::metadata(dir.path().join(filename(3))).unwrap().len();
    assert_eq!(df.size(), on_disk);
}

#[test]
fn reopened_active_file_continues_at_tail() {
    let dir = tempdir().unwrap();
    let n1 = {
        let mut df = active(dir.path(), 0);
        let (_, n) = df.append(&rec(b"k1", b"v1")).unwrap();
        df.close().unwrap();
        n
    };

    let mut df = active(dir.path(), 0);
    assert_eq!(df.size(), n1);
    let (off2, _) = df.append(&rec(b"k2", b"v2")).unwrap();
    assert_eq!(off2, n1);
}

// -------------------- Positioned reads --------------------

#[test]
fn read_at_on_active_file() {
    let dir = tempdir().unwrap();
    let mut df = active(dir.path(), 0);

    let r1 = rec(b"alpha", b"one");
    let r2 = rec(b"beta", b"two");
    let (off1, n1) = df.append(&r1).unwrap();
    let (off2, n2) = df.append(&r2).unwrap();

    assert_eq!(df.read_at(off2, n2).unwrap(), r2);
    assert_eq!(df.read_at(off1, n1).unwrap(), r1);
}

#[test]
fn read_at_on_frozen_file_uses_the_map() {
    let dir = tempdir().unwrap();
    let (off, n, r) = {
        let mut df = active(dir.path(), 5);
        let r = rec(b"key", b"mapped-value");
        let (off, n) = df.append(&r).unwrap();
        df.close().unwrap();
        (off, n, r)
    };

    let df = frozen(dir.path(), 5);
    assert!(df.is_readonly());
    assert_eq!(df.read_at(off, n).unwrap(), r);
}

#[test]
fn read_past_end_is_short_read() {
    let dir = tempdir().unwrap();
    let mut df = active(dir.path(), 0);
    let (off, n) = df.append(&rec(b"k", b"v")).unwrap();

    let err = df.read_at(off, n + 10).unwrap_err();
    assert!(matches!(err, DataFileError::ShortRead { got, .. } if got == n));

    df.close().unwrap();
    let df = frozen(dir.path(), 0);
    let err = df.read_at(off, n + 10).unwrap_err();
    assert!(matches!(err, DataFileError::ShortRead { got, .. } if got == n));
}

#[test]
fn empty_frozen_file_short_reads_everything() {
    let dir = tempdir().unwrap();
    active(dir.path(), 9).close().unwrap();

    let df = frozen(dir.path(), 9);
    assert_eq!(df.size(), 0);
    let err = df.read_at(0, 1).unwrap_err();
    assert!(matches!(err, DataFileError::ShortRead { got: 0, .. }));
}

// -------------------- Frozen files reject writes --------------------

#[test]
fn frozen_file_rejects_append_and_sync() {
    let dir = tempdir().unwrap();
    {
        let mut df = active(dir.path(), 0);
        df.append(&rec(b"k", b"v")).unwrap();
        df.close().unwrap();
    }

    let mut df = frozen(dir.path(), 0);
    assert!(matches!(
        df.append(&rec(b"k2", b"v2")).unwrap_err(),
        DataFileError::ReadOnly
    ));
    assert!(matches!(df.sync().unwrap_err(), DataFileError::ReadOnly));
}

// -------------------- Sequential scans --------------------

#[test]
fn scan_yields_records_in_write_order() {
    let dir = tempdir().unwrap();
    let records = vec![
        rec(b"a", b"1"),
        rec(b"b", b"2"),
        Record::tombstone(b"a".to_vec()),
    ];
    {
        let mut df = active(dir.path(), 0);
        for r in &records {
            df.append(r).unwrap();
        }
        df.close().unwrap();
    }

    let mut df = frozen(dir.path(), 0);
    for want in &records {
        let (got, n) = df.next().unwrap().unwrap();
        assert_eq!(&got, want);
        assert_eq!(n, want.encoded_len());
    }
    assert!(df.next().unwrap().is_none());
}

#[test]
fn scan_reports_truncated_tail() {
    let dir = tempdir().unwrap();
    let path = dir.path().join(filename(0));
    {
        let mut df = active(dir.path(), 0);
        df.append(&rec(b"k1", b"v1")).unwrap();
        df.append(&rec(b"k2", b"v2")).unwrap();
        df.close().unwrap();
    }

    // Chop 3 bytes off the second frame.
    let data = fs::read(&path).unwrap();
    fs::write(&path, &data[..data.len() - 3]).unwrap();

    let mut df = frozen(dir.path(), 0);
    assert!(df.next().unwrap().is_some());
    assert!(matches!(
        df.next().unwrap_err(),
        DataFileError::Record(RecordError::Truncated)
    ));
}

#[test]
fn scan_on_empty_file_is_end_of_log() {
    let dir = tempdir().unwrap();
    let mut df = active(dir.path(), 0);
    assert!(df.next().unwrap().is_none());
}
