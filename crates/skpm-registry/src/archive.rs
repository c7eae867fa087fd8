//! Gzip tarball codec for package archives.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Component, Path};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{RegistryError, Result};
use crate::integrity::to_posix;

/// The two-byte gzip signature.
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

const PREVIEW_READ: usize = 512;
const PREVIEW_CHARS: usize = 200;

/// Fail with [`RegistryError::MalformedArchive`] unless `path` starts with the
/// gzip signature.
///
/// The error carries the source URL, the declared content type and up to 200
/// characters of the payload rendered as text.
pub fn assert_gzip(path: &Path, url: &str, content_type: Option<&str>) -> Result<()> {
    let mut head = Vec::with_capacity(PREVIEW_READ);
    File::open(path)
        .map_err(|e| RegistryError::io(path, e))?
        .take(PREVIEW_READ as u64)
        .read_to_end(&mut head)
        .map_err(|e| RegistryError::io(path, e))?;

    if head.starts_with(&GZIP_MAGIC) {
        return Ok(());
    }

    let preview: String = String::from_utf8_lossy(&head)
        .trim()
        .chars()
        .take(PREVIEW_CHARS)
        .collect();
    Err(RegistryError::MalformedArchive {
        url: url.to_string(),
        content_type: content_type.map(str::to_string),
        preview,
    })
}

/// Unpack a gzip tarball into `dest`.
///
/// Entries with absolute paths or `..` components are rejected.
pub fn extract_tarball(archive: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| RegistryError::io(dest, e))?;
    let file = File::open(archive).map_err(|e| RegistryError::io(archive, e))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));

    for entry in tar.entries().map_err(|e| RegistryError::io(archive, e))? {
        let mut entry = entry.map_err(|e| RegistryError::io(archive, e))?;
        let relative = entry
            .path()
            .map_err(|e| RegistryError::io(archive, e))?
            .into_owned();
        if !is_contained(&relative) {
            return Err(RegistryError::PathEscape {
                path: relative.display().to_string(),
            });
        }
        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| RegistryError::io(dest.join(&relative), e))?;
        if !unpacked {
            return Err(RegistryError::PathEscape {
                path: relative.display().to_string(),
            });
        }
    }
    Ok(())
}

/// Write `files` (relative to `root`) into a gzip tarball at `target`.
///
/// Entries are added in the given order with forward-slash names.
pub fn create_tarball<S: AsRef<str>>(root: &Path, files: &[S], target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| RegistryError::io(parent, e))?;
    }
    let out = File::create(target).map_err(|e| RegistryError::io(target, e))?;
    let mut builder = tar::Builder::new(GzEncoder::new(out, Compression::default()));
    builder.follow_symlinks(true);

    for file in files {
        let name = to_posix(file.as_ref());
        let source = root.join(&name);
        builder
            .append_path_with_name(&source, &name)
            .map_err(|e| RegistryError::io(&source, e))?;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| RegistryError::io(target, e))?;
    encoder.finish().map_err(|e| RegistryError::io(target, e))?;
    Ok(())
}

fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrity::{digest, digest_directory};

    #[test]
    fn roundtrip_preserves_digest() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("pkg");
        fs::create_dir_all(pkg.join("skills")).unwrap();
        fs::write(pkg.join("skpm.json"), r#"{"name":"core","version":"1.0.0"}"#).unwrap();
        fs::write(pkg.join("skills/core.md"), "# Core").unwrap();
        let files = ["skpm.json", "skills/core.md"];

        let tgz = dir.path().join("core.tgz");
        create_tarball(&pkg, &files, &tgz).unwrap();
        assert_gzip(&tgz, "core.tgz", None).unwrap();

        let out = dir.path().join("out");
        extract_tarball(&tgz, &out).unwrap();
        assert_eq!(
            digest_directory(&out).unwrap(),
            digest(&pkg, &files).unwrap()
        );
    }

    #[test]
    fn html_payload_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.tgz");
        let body = format!("  <!DOCTYPE html><html>{}</html>", "x".repeat(400));
        fs::write(&path, &body).unwrap();

        let err = assert_gzip(&path, "https://registry.test/x.tgz", Some("text/html")).unwrap_err();
        match err {
            RegistryError::MalformedArchive {
                url,
                content_type,
                preview,
            } => {
                assert_eq!(url, "https://registry.test/x.tgz");
                assert_eq!(content_type.as_deref(), Some("text/html"));
                assert!(preview.starts_with("<!DOCTYPE html>"));
                assert_eq!(preview.chars().count(), 200);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_payload_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.tgz");
        fs::write(&path, b"").unwrap();
        assert!(matches!(
            assert_gzip(&path, "empty", None),
            Err(RegistryError::MalformedArchive { .. })
        ));
    }

    #[test]
    fn escaping_entry_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let tgz = dir.path().join("evil.tgz");
        {
            let out = File::create(&tgz).unwrap();
            let mut builder = tar::Builder::new(GzEncoder::new(out, Compression::default()));
            let data = b"owned";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            // Bypass the builder's own path validation.
            header.as_old_mut().name[..11].copy_from_slice(b"../evil.txt");
            header.set_cksum();
            builder.append(&header, &data[..]).unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let dest = dir.path().join("dest");
        let err = extract_tarball(&tgz, &dest).unwrap_err();
        assert!(matches!(err, RegistryError::PathEscape { .. }));
        assert!(!dir.path().join("evil.txt").exists());
    }
}
