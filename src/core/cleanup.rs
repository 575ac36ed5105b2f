//! Startup housekeeping for leftover download files
//!
//! Files are removed right after delivery, so anything left in a download
//! directory at startup belongs to a job that died with the previous process.

use std::path::{Path, PathBuf};

use fs_err as fs;

/// Directory name that gets wiped
pub const DOWNLOAD_DIR_NAME: &str = "download";

/// Report of a cleanup run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub directories: usize,
    pub removed_entries: usize,
}

/// Walks `root` and removes the contents of every directory named `download`.
///
/// The matched directories themselves are kept. Hidden directories, `target`
/// and symlinks are not descended into. Individual removal failures are
/// logged and skipped.
pub fn clear_download_dirs(root: &Path) -> std::io::Result<CleanupReport> {
    let mut report = CleanupReport::default();
    let mut stack: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if dir == root => return Err(e),
            Err(e) => {
                log::warn!("Skipping unreadable directory: {}", e);
                continue;
            }
        };

        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else { continue };
            if !file_type.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            let path = entry.path();

            if name == DOWNLOAD_DIR_NAME {
                report.directories += 1;
                report.removed_entries += clear_directory(&path);
            } else if !name.starts_with('.') && name != "target" {
                stack.push(path);
            }
        }
    }

    Ok(report)
}

/// Removes everything inside `dir`, returns how many entries went away
pub fn clear_directory(dir: &Path) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Cannot list {}: {}", dir.display(), e);
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let result = match entry.file_type() {
            Ok(t) if t.is_dir() => fs::remove_dir_all(&path),
            _ => fs::remove_file(&path),
        };
        match result {
            Ok(()) => removed += 1,
            Err(e) => log::warn!("Failed to remove leftover {}: {}", path.display(), e),
        }
    }
    removed
}
