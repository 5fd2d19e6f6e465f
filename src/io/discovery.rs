//! Discovery of pending files in a stage directory

use crate::io::result_artifact::is_result_artifact;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// List primary artifact files waiting in `dir`, sorted by name
///
/// Companion hash files, result artifacts, hidden files and sub-directories
/// are skipped. A missing directory has nothing pending.
pub fn pending_files(dir: &Path, hash_extension: &str) -> io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() {
            continue;
        }
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        let companion = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(hash_extension))
            .unwrap_or(false);
        if hidden || companion || is_result_artifact(&path) {
            continue;
        }
        files.push(path);
    }

    files.sort();
    log::debug!("Found {} pending files in {}", files.len(), dir.display());
    Ok(files)
}
