//! Rotation of earlier captures out of the output folder.
//!
//! Regular files directly inside the folder move into the first unused
//! `BackUP_NN` subfolder. Subfolders are left alone, and a file that fails
//! to move is logged and skipped.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

pub const BACKUP_PREFIX: &str = "BackUP_";
pub const MAX_BACKUP_FOLDERS: u32 = 999;

/// Moves existing files into a fresh backup folder.
///
/// Returns the backup folder, or `None` when the folder is missing or holds
/// no regular files.
pub fn rotate_existing(folder: &Path) -> Result<Option<PathBuf>> {
    if !folder.is_dir() {
        return Ok(None);
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(folder).with_context(|| format!("Failed to list {}", folder.display()))? {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", folder.display()))?;
        let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
        if is_file {
            files.push(entry.path());
        }
    }

    if files.is_empty() {
        return Ok(None);
    }

    let backup_dir = create_next_backup_folder(folder)?;
    let mut moved = 0usize;

    for src in &files {
        let Some(name) = src.file_name() else {
            continue;
        };
        match fs::rename(src, backup_dir.join(name)) {
            Ok(()) => moved += 1,
            Err(e) => warn!("[Backup] Could not move {}: {}", src.display(), e),
        }
    }

    info!(
        "[Backup] Moved {}/{} files into {}",
        moved,
        files.len(),
        backup_dir.display()
    );
    Ok(Some(backup_dir))
}

/// Name of the n-th backup folder (`BackUP_01`, ..., `BackUP_100`, ...).
pub fn backup_folder_name(n: u32) -> String {
    format!("{}{:02}", BACKUP_PREFIX, n)
}

fn create_next_backup_folder(parent: &Path) -> Result<PathBuf> {
    for n in 1..=MAX_BACKUP_FOLDERS {
        let path = parent.join(backup_folder_name(n));
        if !path.exists() {
            fs::create_dir(&path)
                .with_context(|| format!("Failed to create backup folder {}", path.display()))?;
            return Ok(path);
        }
    }
    bail!(
        "No free backup folder name in {} (checked up to {})",
        parent.display(),
        backup_folder_name(MAX_BACKUP_FOLDERS)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::write(path, b"frame").unwrap();
    }

    #[test]
    fn folder_names_are_two_digit_padded() {
        assert_eq!(backup_folder_name(1), "BackUP_01");
        assert_eq!(backup_folder_name(42), "BackUP_42");
        assert_eq!(backup_folder_name(100), "BackUP_100");
    }

    #[test]
    fn rotates_into_sequential_folders() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.png"));
        touch(&dir.path().join("b.png"));

        let first = rotate_existing(dir.path()).unwrap().unwrap();
        assert_eq!(first, dir.path().join("BackUP_01"));
        assert!(first.join("a.png").is_file());
        assert!(first.join("b.png").is_file());
        assert!(!dir.path().join("a.png").exists());

        touch(&dir.path().join("c.png"));
        let second = rotate_existing(dir.path()).unwrap().unwrap();
        assert_eq!(second, dir.path().join("BackUP_02"));
        assert!(second.join("c.png").is_file());
        // Earlier backup is not touched.
        assert_eq!(fs::read_dir(&first).unwrap().count(), 2);
    }

    #[test]
    fn empty_folder_creates_no_backup() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("keep")).unwrap();
        assert!(rotate_existing(dir.path()).unwrap().is_none());
        assert!(!dir.path().join("BackUP_01").exists());
    }

    #[test]
    fn missing_folder_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(rotate_existing(&dir.path().join("nope")).unwrap().is_none());
    }

    #[test]
    fn does_not_recurse_into_subfolders() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        touch(&nested.join("inner.png"));
        touch(&dir.path().join("top.png"));

        let backup = rotate_existing(dir.path()).unwrap().unwrap();
        assert!(backup.join("top.png").is_file());
        assert!(nested.join("inner.png").is_file());
        assert!(!backup.join("nested").exists());
    }
}
