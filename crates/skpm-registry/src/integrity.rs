//! Content-addressed integrity digests over file trees.
//!
//! A skill's digest is SHA-256 over its files in sorted order. For each
//! relative path (forward slashes, regardless of host) the hasher is fed the
//! UTF-8 path bytes, a single NUL byte and then the raw file bytes. The
//! rendered form is `sha256-<lowercase hex>`.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{RegistryError, Result};

/// Algorithm tag prefixed to every rendered digest.
pub const ALGORITHM: &str = "sha256";

/// A SHA-256 hex digest of a byte string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute the SHA-256 hash of the given data.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex_encode(&hasher.finalize()))
    }

    /// Get the hex string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Encode bytes as lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Normalize a relative path to forward-slash form.
pub fn to_posix(path: &str) -> String {
    path.replace('\\', "/")
}

/// Digest an explicit list of files under `root`.
///
/// The order of `files` does not matter; paths are normalized and sorted
/// before hashing.
pub fn digest<S: AsRef<str>>(root: &Path, files: &[S]) -> Result<String> {
    let mut sorted: Vec<String> = files.iter().map(|f| to_posix(f.as_ref())).collect();
    sorted.sort();

    let mut hasher = Sha256::new();
    for relative in &sorted {
        hasher.update(relative.as_bytes());
        hasher.update([0u8]);
        let full = root.join(relative);
        let contents = fs::read(&full).map_err(|e| RegistryError::io(&full, e))?;
        hasher.update(&contents);
    }

    Ok(format!("{ALGORITHM}-{}", hex_encode(&hasher.finalize())))
}

/// Digest every regular file and symbolic link below `root`.
pub fn digest_directory(root: &Path) -> Result<String> {
    let files = list_files(root)?;
    digest(root, &files)
}

/// Recursively list regular files and symlinks below `root`.
///
/// Returned paths are relative to `root` and use forward slashes. Directory
/// symlinks are reported as entries and not descended into.
pub fn list_files(root: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    walk(root, PathBuf::new(), &mut out)?;
    out.sort();
    Ok(out)
}

fn walk(root: &Path, relative: PathBuf, out: &mut Vec<String>) -> Result<()> {
    let dir = root.join(&relative);
    let entries = fs::read_dir(&dir).map_err(|e| RegistryError::io(&dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| RegistryError::io(&dir, e))?;
        let file_type = entry.file_type().map_err(|e| RegistryError::io(entry.path(), e))?;
        let child = relative.join(entry.file_name());
        if file_type.is_dir() {
            walk(root, child, out)?;
        } else if file_type.is_file() || file_type.is_symlink() {
            out.push(to_posix(&child.to_string_lossy()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, relative: &str, data: &[u8]) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }

    #[test]
    fn hash_format() {
        let hash = ContentHash::compute(b"");
        // SHA-256 of empty is well-known
        assert_eq!(
            hash.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn digest_is_prefixed_hex() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.md", b"alpha");
        let d = digest(dir.path(), &["a.md"]).unwrap();
        assert!(d.starts_with("sha256-"));
        assert_eq!(d.len(), "sha256-".len() + 64);
    }

    #[test]
    fn digest_ignores_input_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.md", b"beta");
        write(dir.path(), "a.md", b"alpha");
        write(dir.path(), "nested/c.md", b"gamma");

        let forward = digest(dir.path(), &["a.md", "b.md", "nested/c.md"]).unwrap();
        let reversed = digest(dir.path(), &["nested/c.md", "b.md", "a.md"]).unwrap();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn digest_matches_documented_layout() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "nested/c.md", b"gamma");
        let posix = digest(dir.path(), &["nested/c.md"]).unwrap();
        let expected = {
            let mut hasher = Sha256::new();
            hasher.update(b"nested/c.md");
            hasher.update([0u8]);
            hasher.update(b"gamma");
            format!("sha256-{}", hex_encode(&hasher.finalize()))
        };
        assert_eq!(posix, expected);
    }

    #[test]
    fn digest_normalizes_backslashes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "nested/c.md", b"gamma");
        assert_eq!(
            digest(dir.path(), &["nested\\c.md"]).unwrap(),
            digest(dir.path(), &["nested/c.md"]).unwrap()
        );
    }

    #[test]
    fn digest_changes_with_content() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.md", b"alpha");
        let before = digest_directory(dir.path()).unwrap();
        write(dir.path(), "a.md", b"tampered");
        let after = digest_directory(dir.path()).unwrap();
        assert_ne!(before, after);
    }

    #[test]
    fn identical_trees_share_a_digest() {
        let left = tempfile::tempdir().unwrap();
        let right = tempfile::tempdir().unwrap();
        // Create in different orders so directory listings differ.
        write(left.path(), "skills/one.md", b"1");
        write(left.path(), "skpm.json", b"{}");
        write(right.path(), "skpm.json", b"{}");
        write(right.path(), "skills/one.md", b"1");

        assert_eq!(
            digest_directory(left.path()).unwrap(),
            digest_directory(right.path()).unwrap()
        );
    }

    #[test]
    fn list_files_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a/b/c.txt", b"x");
        fs::create_dir_all(dir.path().join("empty")).unwrap();
        assert_eq!(list_files(dir.path()).unwrap(), vec!["a/b/c.txt"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_file_hashes_like_its_target() {
        let linked = tempfile::tempdir().unwrap();
        let plain = tempfile::tempdir().unwrap();
        write(linked.path(), "real/doc.md", b"content");
        std::os::unix::fs::symlink(
            linked.path().join("real/doc.md"),
            linked.path().join("alias.md"),
        )
        .unwrap();
        write(plain.path(), "real/doc.md", b"content");
        write(plain.path(), "alias.md", b"content");

        assert_eq!(
            digest_directory(linked.path()).unwrap(),
            digest_directory(plain.path()).unwrap()
        );
    }
}
