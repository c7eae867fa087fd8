//! Machine-global content cache.
//!
//! Stores extracted package trees organized by name and version.
//!
//! Layout:
//! ```text
//! <cache_root>/
//!   .lock
//!   <name>/
//!     <version>/    extracted package contents
//! ```
//!
//! An entry that exists is trusted as-is. Entries are extracted and
//! verified in a scratch directory under the cache root and only then
//! renamed into place, so a partial or unverified tree is never visible
//! at its entry path.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::archive::{assert_gzip, extract_tarball};
use crate::client::{RegistryClient, TarballInfo};
use crate::error::{RegistryError, Result};
use crate::integrity::digest_directory;
use crate::lock::DirLock;
use crate::source::Download;

/// Where package archives come from.
pub trait ArchiveSource {
    /// Declared integrity and archive reference for `name@version`.
    fn tarball_info(&self, name: &str, version: &str) -> Result<TarballInfo>;

    /// Fetch the archive at `reference` into `target`.
    fn fetch_archive(&self, reference: &str, target: &Path) -> Result<Download>;
}

impl ArchiveSource for RegistryClient {
    fn tarball_info(&self, name: &str, version: &str) -> Result<TarballInfo> {
        self.get_integrity_and_location(name, version)
    }

    fn fetch_archive(&self, reference: &str, target: &Path) -> Result<Download> {
        self.fetch_tarball(reference, target)
    }
}

/// A content cache backed by the filesystem.
#[derive(Debug, Clone)]
pub struct ContentCache {
    root: PathBuf,
}

impl ContentCache {
    pub fn new(root: PathBuf) -> Self {
        ContentCache { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache directory for `name@version`. Pure.
    pub fn entry_path(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(name).join(version)
    }

    /// Check if a package version is already cached.
    pub fn contains(&self, name: &str, version: &str) -> bool {
        self.entry_path(name, version).is_dir()
    }

    /// Return the cache directory for `name@version`, populating and
    /// verifying it first if it does not exist yet.
    pub fn ensure_package_cached(
        &self,
        source: &dyn ArchiveSource,
        name: &str,
        version: &str,
    ) -> Result<PathBuf> {
        let dest = self.entry_path(name, version);
        if dest.exists() {
            debug!(%name, %version, "cache hit");
            return Ok(dest);
        }

        let _lock = DirLock::acquire(&self.root)?;
        if dest.exists() {
            debug!(%name, %version, "cache populated concurrently");
            return Ok(dest);
        }

        self.populate(source, name, version, &dest)?;
        Ok(dest)
    }

    fn populate(
        &self,
        source: &dyn ArchiveSource,
        name: &str,
        version: &str,
        dest: &Path,
    ) -> Result<()> {
        let info = source.tarball_info(name, version)?;

        // Dropped (and deleted) on every return path.
        let scratch = tempfile::Builder::new()
            .prefix(".scratch-")
            .tempdir_in(&self.root)
            .map_err(|e| RegistryError::io(&self.root, e))?;
        let archive = scratch.path().join("package.tgz");
        let extracted = scratch.path().join("package");

        let download = source.fetch_archive(&info.tarball, &archive)?;
        assert_gzip(&archive, &download.url, download.content_type.as_deref())?;
        extract_tarball(&archive, &extracted)?;

        let actual = digest_directory(&extracted)?;
        if actual != info.integrity {
            return Err(RegistryError::IntegrityMismatch {
                name: name.to_string(),
                version: version.to_string(),
                expected: info.integrity,
                actual,
            });
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| RegistryError::io(parent, e))?;
        }
        fs::rename(&extracted, dest).map_err(|e| RegistryError::io(dest, e))?;
        info!(%name, %version, "cached");
        Ok(())
    }
}
