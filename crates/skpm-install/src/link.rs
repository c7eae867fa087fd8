//! Symbolic link helpers.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{InstallError, Result};

/// Point `link` at `target`, replacing whatever is at `link`.
pub fn replace_symlink(target: &Path, link: &Path) -> Result<()> {
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent).map_err(|e| InstallError::io(parent, e))?;
    }
    remove_path(link)?;
    symlink(target, link).map_err(|source| InstallError::SymlinkFailed {
        link: link.to_path_buf(),
        source,
    })
}

/// Remove a file, link or directory tree. Missing paths are fine.
///
/// Links are removed themselves, never followed.
pub fn remove_path(path: &Path) -> Result<()> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(InstallError::io(path, e)),
    };
    let result = if metadata.file_type().is_symlink() {
        remove_link(path)
    } else if metadata.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|e| InstallError::io(path, e))
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    if target.is_dir() {
        std::os::windows::fs::symlink_dir(target, link)
    } else {
        std::os::windows::fs::symlink_file(target, link)
    }
}

#[cfg(unix)]
fn remove_link(link: &Path) -> io::Result<()> {
    fs::remove_file(link)
}

#[cfg(windows)]
fn remove_link(link: &Path) -> io::Result<()> {
    // Directory links must be removed as directories on Windows.
    fs::remove_dir(link).or_else(|_| fs::remove_file(link))
}
