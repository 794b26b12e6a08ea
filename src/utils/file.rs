//! File utilities shared by ingestion and persistence.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::IndexError;

/// Lowercased extension including the leading dot (".txt"), or "" if none.
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// File name used as the chunk `source`.
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// Check that `path` is an existing regular file no larger than `max_size`.
///
/// Returns the file size on success.
pub fn validate_file(path: &Path, max_size: u64) -> Result<u64, IndexError> {
    let metadata = fs::metadata(path)
        .map_err(|_| IndexError::FileNotFound(path.display().to_string()))?;

    if !metadata.is_file() {
        return Err(IndexError::NotAFile(path.display().to_string()));
    }

    if metadata.len() > max_size {
        return Err(IndexError::FileTooLarge {
            path: path.display().to_string(),
            size: metadata.len(),
            max: max_size,
        });
    }

    Ok(metadata.len())
}

/// Whether the extension of `path` is in `supported` (entries like ".txt").
pub fn has_supported_extension(path: &Path, supported: &[String]) -> bool {
    let ext = file_extension(path);
    supported.iter().any(|s| s.eq_ignore_ascii_case(&ext))
}

/// Expand files and directories into the supported files below them, sorted.
pub fn collect_files(paths: &[PathBuf], supported: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path).follow_links(false).into_iter().flatten() {
                let entry_path = entry.path();
                if entry_path.is_file() && has_supported_extension(entry_path, supported) {
                    files.push(entry_path.to_path_buf());
                }
            }
        } else {
            files.push(path.clone());
        }
    }

    files.sort();
    files.dedup();
    files
}

/// Write `bytes` to `path` through a sibling temp file and a rename, so a
/// reader never observes a half-written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(&tmp_path, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp_path);
    })
}

/// Remove a file or directory tree; a missing path is not an error.
pub fn remove_path(path: &Path) -> io::Result<()> {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
