//! Filesystem utility functions
//!
//! Small helpers shared by the profile editor and the backup store.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Replace a file's content atomically
///
/// Writes to a sibling temp file, copies the permissions of the file being
/// replaced, then renames over it. The parent directory is created if missing.
///
/// # Errors
/// Returns an error if the parent cannot be created or the temp file cannot
/// be written or renamed.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    let temp_path = temp_sibling(path);
    fs::write(&temp_path, content)
        .with_context(|| format!("Failed to write temp file: {:?}", temp_path))?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(&temp_path, metadata.permissions())
            .with_context(|| format!("Failed to copy permissions to {:?}", temp_path))?;
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e).with_context(|| format!("Failed to rename {:?} -> {:?}", temp_path, path));
    }
    Ok(())
}

/// Follow a symlinked dotfile to the file that should actually be edited
///
/// Dotfile managers often link ~/.zshrc into a repository; renaming over the
/// link would replace it with a regular file.
pub fn resolve_link(path: &Path) -> PathBuf {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => {
            fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
        }
        _ => path.to_path_buf(),
    }
}

/// Read a file to a string, treating a missing file as empty
pub fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to read file: {:?}", path)),
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}
