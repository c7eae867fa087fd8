//! Advisory locks and atomic file writes.
//!
//! The content cache and project stores are shared between invocations. Each
//! mutation holds an exclusive `fs2` lock on a `.lock` file in the directory
//! being mutated, and re-checks for an existing entry once the lock is held.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;

use crate::error::{RegistryError, Result};

/// Name of the lock file placed in a locked directory.
pub const LOCK_FILE: &str = ".lock";

/// Exclusive advisory lock on a directory, released on drop.
#[derive(Debug)]
pub struct DirLock {
    file: File,
    path: PathBuf,
}

impl DirLock {
    /// Block until an exclusive lock on `dir` is held.
    pub fn acquire(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| RegistryError::io(dir, e))?;
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| RegistryError::io(&path, e))?;
        file.lock_exclusive().map_err(|e| RegistryError::LockFailed {
            path: path.clone(),
            detail: e.to_string(),
        })?;
        debug!(lock = %path.display(), "acquired");
        Ok(DirLock { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Write `content` to `path` via a sibling temp file and a rename.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| RegistryError::io(parent, e))?;
    }

    let temp_name = format!(
        ".{}.{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default(),
        std::process::id()
    );
    let temp_path = path.with_file_name(temp_name);

    let mut temp_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .map_err(|e| RegistryError::io(&temp_path, e))?;

    temp_file
        .lock_exclusive()
        .map_err(|e| RegistryError::LockFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    temp_file
        .write_all(content)
        .map_err(|e| RegistryError::io(&temp_path, e))?;
    temp_file
        .sync_all()
        .map_err(|e| RegistryError::io(&temp_path, e))?;
    let _ = temp_file.unlock();

    fs::rename(&temp_path, path).map_err(|e| RegistryError::io(path, e))?;
    Ok(())
}

/// Recursively copy the contents of `from` into `to`.
///
/// Symbolic links are copied as the files they point at. Every file is
/// copied, so the copy digests the same as its source.
pub fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to).map_err(|e| RegistryError::io(to, e))?;
    let entries = fs::read_dir(from).map_err(|e| RegistryError::io(from, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| RegistryError::io(from, e))?;
        let source = entry.path();
        let target = to.join(entry.file_name());
        let metadata = fs::metadata(&source).map_err(|e| RegistryError::io(&source, e))?;
        if metadata.is_dir() {
            copy_dir(&source, &target)?;
        } else {
            fs::copy(&source, &target).map_err(|e| RegistryError::io(&source, e))?;
        }
    }
    Ok(())
}
