use std::fs;
use std::path::{Path, PathBuf};

pub fn data_file_path(dir: &Path, id: u32) -> PathBuf {
    dir.join(datafile::filename(id))
}

pub fn count_data_files(dir: &Path) -> usize {
    segment_ids(dir).len()
}

/// Segment ids present in `dir`, ascending.
pub fn segment_ids(dir: &Path) -> Vec<u32> {
    let mut ids: Vec<u32> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|e| e == "data").unwrap_or(false))
        .filter_map(|p| {
            p.file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse().ok())
        })
        .collect();
    ids.sort_unstable();
    ids
}
