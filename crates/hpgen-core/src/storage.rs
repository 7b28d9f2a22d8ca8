//! Storage helpers: log directory management.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Prefix shared by all event file names.
pub const EVENT_FILE_PREFIX: &str = "events.out.tfevents.";

// ─── Directory helpers ────────────────────────────────────────────────────────

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// Remove every regular file directly inside `dir`. Sub-directories stay.
pub fn clear_dir(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn is_event_file(path: &Path) -> bool {
    path.is_file()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(EVENT_FILE_PREFIX))
}

/// Event files directly inside `dir`, sorted by name.
pub fn list_event_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files = vec![];
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if is_event_file(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Directories at or below `dir` that hold event files, sorted.
pub fn list_log_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = vec![];
    collect_log_dirs(dir, &mut dirs)?;
    dirs.sort();
    Ok(dirs)
}

fn collect_log_dirs(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    if !list_event_files(dir)?.is_empty() {
        out.push(dir.to_path_buf());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            collect_log_dirs(&entry.path(), out)?;
        }
    }
    Ok(())
}
