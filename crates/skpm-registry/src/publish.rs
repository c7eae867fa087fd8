//! Package publishing workflow.
//!
//! Collects the files a manifest declares, digests them, builds the archive
//! at `tarballs/<name>/<version>.tgz` and hands it to the registry: written
//! straight into a local registry directory, or uploaded to a network
//! registry's publish endpoint.

use std::collections::BTreeSet;
use std::path::{Component, Path};
use std::time::Duration;

use chrono::Utc;
use regex::Regex;
use reqwest::blocking::multipart::{Form, Part};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::archive::create_tarball;
use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::error::{RegistryError, Result};
use crate::index::{
    package_index_path, tarball_path, PackageIndex, PackageVersionEntry, RegistryIndex,
    RegistryIndexPackage, ROOT_INDEX,
};
use crate::integrity::{digest, list_files, to_posix};
use crate::lock::{write_atomic, DirLock};
use crate::manifest::{PackageManifest, MANIFEST_FILE};
use crate::source::Locator;
use crate::version::latest_version;

/// Environment variable consulted when no token is passed explicitly.
pub const TOKEN_ENV: &str = "SKPM_PUBLISH_TOKEN";

/// Options for the publish operation.
#[derive(Debug, Clone)]
pub struct PublishOptions {
    /// Collect and hash files but don't write or upload anything.
    pub dry_run: bool,
    /// Bearer token for network registries.
    pub token: Option<String>,
    /// Upload timeout.
    pub timeout: Duration,
}

impl Default for PublishOptions {
    fn default() -> Self {
        PublishOptions {
            dry_run: false,
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// What was (or, for a dry run, would have been) published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishResult {
    pub name: String,
    pub version: String,
    pub registry: String,
    /// Registry directory or publish endpoint written to.
    pub destination: String,
    /// Registry-relative archive path.
    pub tarball: String,
    pub integrity: String,
    pub files: Vec<String>,
    pub dry_run: bool,
}

/// Metadata part of a network publish request.
#[derive(Debug, Serialize)]
struct PublishMetadata<'a> {
    name: &'a str,
    version: &'a str,
    manifest: &'a PackageManifest,
    integrity: &'a str,
    tarball: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct PublishResponse {
    #[serde(default)]
    error: Option<String>,
}

/// Translate a file pattern into an anchored regex.
///
/// `*` matches within one path segment, `**` across segments and `?` one
/// character.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let normalized = to_posix(pattern);
    let mut out = String::from("^");
    let mut chars = normalized.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                while chars.peek() == Some(&'*') {
                    chars.next();
                }
                out.push_str(".*");
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out).map_err(|e| RegistryError::PublishFailed {
        detail: format!("invalid file pattern '{pattern}': {e}"),
    })
}

/// Expand the manifest's `files` patterns against `package_root`.
///
/// Returns a sorted, de-duplicated list that always includes `skpm.json`.
pub fn collect_publish_files(
    package_root: &Path,
    manifest: &PackageManifest,
) -> Result<Vec<String>> {
    let all_files = list_files(package_root)?;
    let mut selected: BTreeSet<String> = BTreeSet::new();

    for pattern in &manifest.files {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            continue;
        }
        let escapes = Path::new(trimmed)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(RegistryError::PathEscape {
                path: trimmed.to_string(),
            });
        }

        let matcher = glob_to_regex(trimmed.trim_start_matches("./"))?;
        let before = selected.len();
        let mut matched = false;
        for file in all_files.iter().filter(|f| matcher.is_match(f)) {
            matched = true;
            selected.insert(file.clone());
        }
        if !matched {
            return Err(RegistryError::PublishFailed {
                detail: format!("no files match pattern: {pattern}"),
            });
        }
        debug!(pattern = trimmed, added = selected.len() - before, "matched");
    }

    selected.insert(MANIFEST_FILE.to_string());
    Ok(selected.into_iter().collect())
}

/// Publish the package at `package_root` to `registry`.
pub fn publish(
    package_root: &Path,
    registry: &str,
    options: &PublishOptions,
) -> Result<PublishResult> {
    let manifest_path = package_root.join(MANIFEST_FILE);
    if !manifest_path.is_file() {
        return Err(RegistryError::PublishFailed {
            detail: format!(
                "missing {MANIFEST_FILE} in {}; publish must run from a package root",
                package_root.display()
            ),
        });
    }
    let manifest = PackageManifest::load(&manifest_path)?;
    let files = collect_publish_files(package_root, &manifest)?;
    let integrity = digest(package_root, &files)?;
    let tarball = tarball_path(&manifest.name, &manifest.version);

    let mut result = PublishResult {
        name: manifest.name.clone(),
        version: manifest.version.clone(),
        registry: registry.to_string(),
        destination: String::new(),
        tarball,
        integrity,
        files,
        dry_run: options.dry_run,
    };

    match Locator::parse(registry)? {
        Locator::Local(root) => {
            result.destination = root.display().to_string();
            if !options.dry_run {
                publish_to_directory(package_root, &root, &manifest, &result)?;
            }
        }
        Locator::Remote(base) => {
            let endpoint = publish_endpoint(&base)?;
            result.destination = endpoint.to_string();
            if !options.dry_run {
                publish_to_endpoint(package_root, &endpoint, &manifest, &result, options)?;
            }
        }
    }

    if !options.dry_run {
        info!(name = %result.name, version = %result.version, registry, "published");
    }
    Ok(result)
}

/// Publish endpoint for a network registry: a leading `registry.` host label
/// becomes `api.` and the path becomes `/api/publish`.
pub fn publish_endpoint(base: &Url) -> Result<Url> {
    let mut url = base.clone();
    if let Some(rest) = base.host_str().and_then(|h| h.strip_prefix("registry.")) {
        let host = format!("api.{rest}");
        url.set_host(Some(&host))
            .map_err(|e| RegistryError::InvalidLocator {
                locator: format!("{base}: {e}"),
            })?;
    }
    url.set_path("/api/publish");
    Ok(url)
}

fn publish_to_directory(
    package_root: &Path,
    registry_root: &Path,
    manifest: &PackageManifest,
    result: &PublishResult,
) -> Result<()> {
    let _lock = DirLock::acquire(registry_root)?;
    let already = || RegistryError::AlreadyPublished {
        name: manifest.name.clone(),
        version: manifest.version.clone(),
    };

    let archive = registry_root.join(&result.tarball);
    if archive.exists() {
        return Err(already());
    }

    let package_index_file = registry_root.join(package_index_path(&manifest.name));
    let mut package_index = read_json_if_exists::<PackageIndex>(&package_index_file)?
        .unwrap_or_else(|| PackageIndex::new(&manifest.name, None));
    if package_index.versions.contains_key(&manifest.version) {
        return Err(already());
    }

    create_tarball(package_root, &result.files, &archive)?;

    let now = Utc::now();
    let description = Some(manifest.description.clone()).filter(|d| !d.is_empty());
    package_index.description = description.clone();
    package_index.versions.insert(
        manifest.version.clone(),
        PackageVersionEntry {
            manifest: manifest.clone(),
            integrity: result.integrity.clone(),
            tarball: result.tarball.clone(),
        },
    );
    package_index.updated_at = Some(now);

    let root_index_file = registry_root.join(ROOT_INDEX);
    let mut root_index = read_json_if_exists::<RegistryIndex>(&root_index_file)?.unwrap_or_default();
    let versions: Vec<String> = package_index.versions.keys().cloned().collect();
    root_index.packages.insert(
        manifest.name.clone(),
        RegistryIndexPackage {
            name: manifest.name.clone(),
            description,
            latest: latest_version(&versions),
            versions,
        },
    );
    root_index.generated_at = Some(now);

    write_json(&package_index_file, &package_index)?;
    write_json(&root_index_file, &root_index)?;
    Ok(())
}

fn publish_to_endpoint(
    package_root: &Path,
    endpoint: &Url,
    manifest: &PackageManifest,
    result: &PublishResult,
    options: &PublishOptions,
) -> Result<()> {
    let token = options
        .token
        .clone()
        .filter(|t| !t.trim().is_empty())
        .or_else(|| std::env::var(TOKEN_ENV).ok().filter(|t| !t.trim().is_empty()))
        .ok_or_else(|| RegistryError::PublishFailed {
            detail: format!("missing publish token; set {TOKEN_ENV} or pass --token"),
        })?;

    let scratch = tempfile::Builder::new()
        .prefix("skpm-publish-")
        .tempdir()
        .map_err(RegistryError::Io)?;
    let archive = scratch.path().join(format!("{}.tgz", manifest.version));
    create_tarball(package_root, &result.files, &archive)?;
    let bytes = std::fs::read(&archive).map_err(|e| RegistryError::io(&archive, e))?;

    let metadata = serde_json::to_string(&PublishMetadata {
        name: &manifest.name,
        version: &manifest.version,
        manifest,
        integrity: &result.integrity,
        tarball: &result.tarball,
    })?;

    let failed = |detail: String| RegistryError::PublishFailed { detail };
    let part = Part::bytes(bytes)
        .file_name(format!("{}.tgz", manifest.version))
        .mime_str("application/gzip")
        .map_err(|e| failed(e.to_string()))?;
    let form = Form::new().text("metadata", metadata).part("tarball", part);

    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("skpm/", env!("CARGO_PKG_VERSION")))
        .timeout(options.timeout)
        .build()
        .map_err(|e| failed(e.to_string()))?;
    debug!(%endpoint, "uploading");
    let response = client
        .post(endpoint.clone())
        .bearer_auth(token)
        .multipart(form)
        .send()
        .map_err(|e| failed(format!("{endpoint}: {e}")))?;

    let status = response.status();
    let body: PublishResponse = response.json().unwrap_or_default();
    if !status.is_success() {
        return Err(failed(format!(
            "HTTP {}: {}",
            status.as_u16(),
            body.error.as_deref().unwrap_or("unknown error")
        )));
    }
    Ok(())
}

fn read_json_if_exists<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = std::fs::read(path).map_err(|e| RegistryError::io(path, e))?;
    Ok(Some(serde_json::from_slice(&bytes)?))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    write_atomic(path, json.as_bytes())
}
