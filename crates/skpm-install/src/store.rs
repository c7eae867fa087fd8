//! Project-local store.
//!
//! Layout:
//! ```text
//! <project>/.agents/skills/
//!   .store/
//!     .lock
//!     <name>@<version>/    copied from the content cache, never mutated
//!   <name> -> .store/<name>@<version>   (top-level skills only)
//! ```

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use skpm_registry::lock::{copy_dir, DirLock};
use skpm_registry::package_id;
use tracing::{debug, info};

use crate::error::{InstallError, Result};
use crate::link::{remove_path, replace_symlink};

pub fn skills_root(project_root: &Path) -> PathBuf {
    project_root.join(".agents").join("skills")
}

pub fn store_root(project_root: &Path) -> PathBuf {
    skills_root(project_root).join(".store")
}

/// Store entry for `name@version`. Pure.
pub fn store_path(project_root: &Path, name: &str, version: &str) -> PathBuf {
    store_root(project_root).join(package_id(name, version))
}

/// Bare-name alias through which a top-level skill is exposed.
pub fn exposed_path(project_root: &Path, name: &str) -> PathBuf {
    skills_root(project_root).join(name)
}

/// Copy `cached` into the store unless the entry already exists.
pub fn ensure_stored(
    project_root: &Path,
    name: &str,
    version: &str,
    cached: &Path,
) -> Result<PathBuf> {
    let dest = store_path(project_root, name, version);
    if dest.exists() {
        return Ok(dest);
    }

    let root = store_root(project_root);
    let _lock = DirLock::acquire(&root)?;
    if dest.exists() {
        return Ok(dest);
    }

    let staging = root.join(format!(".staging-{}", package_id(name, version)));
    remove_path(&staging)?;
    copy_dir(cached, &staging)?;
    fs::rename(&staging, &dest).map_err(|e| InstallError::io(&dest, e))?;
    debug!(%name, %version, "stored");
    Ok(dest)
}

/// Point the bare-name alias for `name` at its store entry.
pub fn expose(project_root: &Path, name: &str, version: &str) -> Result<PathBuf> {
    let alias = exposed_path(project_root, name);
    replace_symlink(&store_path(project_root, name, version), &alias)?;
    Ok(alias)
}

/// Delete store entries whose `name@version` key is not in `keep`.
///
/// Returns the removed keys.
pub fn prune_store(project_root: &Path, keep: &BTreeSet<String>) -> Result<Vec<String>> {
    let root = store_root(project_root);
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let _lock = DirLock::acquire(&root)?;

    let mut removed = Vec::new();
    let entries = fs::read_dir(&root).map_err(|e| InstallError::io(&root, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| InstallError::io(&root, e))?;
        let key = entry.file_name().to_string_lossy().into_owned();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if !is_dir || key.starts_with('.') || !key.contains('@') || keep.contains(&key) {
            continue;
        }
        remove_path(&entry.path())?;
        info!(package = %key, "removed orphaned store entry");
        removed.push(key);
    }
    removed.sort();
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached_tree(dir: &Path) -> PathBuf {
        let cached = dir.join("cache/core/1.0.0");
        fs::create_dir_all(&cached).unwrap();
        fs::write(cached.join("core.md"), "# core").unwrap();
        cached
    }

    #[test]
    fn store_path_is_deterministic() {
        let root = Path::new("/work/app");
        assert_eq!(
            store_path(root, "core", "1.0.0"),
            PathBuf::from("/work/app/.agents/skills/.store/core@1.0.0")
        );
        assert_eq!(
            exposed_path(root, "core"),
            PathBuf::from("/work/app/.agents/skills/core")
        );
    }

    #[test]
    fn ensure_stored_copies_once() {
        let dir = tempfile::tempdir().unwrap();
        let cached = cached_tree(dir.path());
        let project = dir.path().join("app");

        let dest = ensure_stored(&project, "core", "1.0.0", &cached).unwrap();
        assert_eq!(fs::read_to_string(dest.join("core.md")).unwrap(), "# core");

        fs::write(cached.join("core.md"), "changed").unwrap();
        ensure_stored(&project, "core", "1.0.0", &cached).unwrap();
        assert_eq!(fs::read_to_string(dest.join("core.md")).unwrap(), "# core");
    }

    #[test]
    fn expose_points_alias_at_store() {
        let dir = tempfile::tempdir().unwrap();
        let cached = cached_tree(dir.path());
        let project = dir.path().join("app");
        let dest = ensure_stored(&project, "core", "1.0.0", &cached).unwrap();

        let alias = expose(&project, "core", "1.0.0").unwrap();
        assert_eq!(fs::read_link(&alias).unwrap(), dest);
        assert!(alias.join("core.md").is_file());
    }

    #[test]
    fn prune_keeps_referenced_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cached = cached_tree(dir.path());
        let project = dir.path().join("app");
        ensure_stored(&project, "core", "1.0.0", &cached).unwrap();
        ensure_stored(&project, "core", "2.0.0", &cached).unwrap();
        ensure_stored(&project, "extra", "0.1.0", &cached).unwrap();

        let keep: BTreeSet<String> = ["core@2.0.0".to_string()].into();
        let removed = prune_store(&project, &keep).unwrap();
        assert_eq!(removed, vec!["core@1.0.0", "extra@0.1.0"]);
        assert!(store_path(&project, "core", "2.0.0").is_dir());
        assert!(store_root(&project).join(".lock").is_file());
    }
}
