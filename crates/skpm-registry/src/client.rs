//! Registry catalog client.
//!
//! Every catalog document is read through a fetch-with-cache-fallback policy
//! and mirrored under `<registry cache root>/<sha256 of locator>/`:
//! - local registries are read directly and mirrored;
//! - network registries are fetched and the mirror overwritten on success,
//!   while any failure falls back to an existing mirror copy.

use std::cell::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};

use reqwest::Url;
use tracing::{debug, warn};

use crate::archive::assert_gzip;
use crate::config::Settings;
use crate::error::{RegistryError, Result};
use crate::index::{package_index_path, PackageIndex, RegistryIndex, ROOT_INDEX};
use crate::integrity::ContentHash;
use crate::lock::write_atomic;
use crate::manifest::PackageManifest;
use crate::source::{
    copy_local_file, normalize_locator, Download, HttpFetcher, HttpSource, LocalSource, Locator,
    RegistrySource,
};
use crate::version::sort_versions;

/// Declared digest and archive reference for one published version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarballInfo {
    pub integrity: String,
    /// Absolute URL, `file://` URL or registry-relative path.
    pub tarball: String,
}

/// One matching version from [`RegistryClient::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub name: String,
    pub version: String,
    pub manifest: PackageManifest,
}

/// Mirror directory for `locator` under `cache_root`.
pub fn cache_dir_for(cache_root: &Path, locator: &str) -> PathBuf {
    let key = ContentHash::compute(normalize_locator(locator).as_bytes());
    cache_root.join(key.as_str())
}

/// Client for one registry.
pub struct RegistryClient {
    locator: String,
    source: Box<dyn RegistrySource>,
    cache_dir: PathBuf,
    settings: Settings,
    http: OnceCell<HttpFetcher>,
}

impl std::fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryClient")
            .field("locator", &self.locator)
            .field("source", &self.source.describe())
            .field("cache_dir", &self.cache_dir)
            .finish()
    }
}

impl RegistryClient {
    /// Resolve `locator` and prepare a client for it.
    pub fn open(locator: &str, settings: &Settings) -> Result<Self> {
        let normalized = normalize_locator(locator);
        let http = OnceCell::new();
        let source: Box<dyn RegistrySource> = match Locator::parse(&normalized)? {
            Locator::Local(root) => Box::new(LocalSource::new(root)),
            Locator::Remote(base) => {
                let fetcher = HttpFetcher::new(settings.timeout, settings.max_redirects)?;
                let _ = http.set(fetcher.clone());
                Box::new(HttpSource::new(base, fetcher))
            }
        };
        let cache_dir = cache_dir_for(&settings.registry_cache_root, &normalized);
        debug!(locator = %normalized, cache = %cache_dir.display(), "opened registry");
        Ok(RegistryClient {
            locator: normalized,
            source,
            cache_dir,
            settings: settings.clone(),
            http,
        })
    }

    /// Normalized locator string.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Mirror directory for this registry's catalog documents.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Make sure the root catalog has been mirrored at least once.
    pub fn ensure_catalog_available(&self) -> Result<PathBuf> {
        self.fetch_root_catalog()?;
        Ok(self.cache_dir.clone())
    }

    /// Root catalog document.
    pub fn root_index(&self) -> Result<RegistryIndex> {
        let bytes = self.fetch_root_catalog()?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn fetch_root_catalog(&self) -> Result<Vec<u8>> {
        self.fetch_document(ROOT_INDEX).map_err(|err| match err {
            err if err.is_not_found() => RegistryError::RegistryUnreachable {
                locator: self.locator.clone(),
                detail: err.to_string(),
            },
            other => other,
        })
    }

    /// Per-package catalog document.
    pub fn package_index(&self, name: &str) -> Result<PackageIndex> {
        let bytes = self
            .fetch_document(&package_index_path(name))
            .map_err(|err| {
                if err.is_not_found() {
                    RegistryError::PackageNotFound {
                        name: name.to_string(),
                    }
                } else {
                    err
                }
            })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// All package names in the root catalog, sorted.
    pub fn list_package_names(&self) -> Result<Vec<String>> {
        Ok(self.root_index()?.packages.into_keys().collect())
    }

    /// Published versions of `name`: valid versions descending, then invalid
    /// ones lexically.
    pub fn list_package_versions(&self, name: &str) -> Result<Vec<String>> {
        let index = self.package_index(name)?;
        let versions: Vec<&String> = index.versions.keys().collect();
        Ok(sort_versions(&versions))
    }

    /// Manifest recorded for `name@version`.
    pub fn get_manifest(&self, name: &str, version: &str) -> Result<PackageManifest> {
        let mut index = self.package_index(name)?;
        index
            .versions
            .remove(version)
            .map(|entry| entry.manifest)
            .ok_or_else(|| RegistryError::VersionNotFound {
                name: name.to_string(),
                version: version.to_string(),
            })
    }

    /// Declared integrity digest and archive reference for `name@version`.
    pub fn get_integrity_and_location(&self, name: &str, version: &str) -> Result<TarballInfo> {
        let mut index = self.package_index(name)?;
        index
            .versions
            .remove(version)
            .map(|entry| TarballInfo {
                integrity: entry.integrity,
                tarball: entry.tarball,
            })
            .ok_or_else(|| RegistryError::VersionNotFound {
                name: name.to_string(),
                version: version.to_string(),
            })
    }

    /// Fetch the archive at `reference` into `target` and check its gzip
    /// signature.
    pub fn download_tarball(&self, reference: &str, target: &Path) -> Result<Download> {
        let download = self.fetch_tarball(reference, target)?;
        assert_gzip(target, &download.url, download.content_type.as_deref())?;
        Ok(download)
    }

    /// Fetch the archive at `reference` into `target` without inspecting it.
    ///
    /// `reference` may be an absolute URL, a `file://` URL or a path relative
    /// to the registry.
    pub fn fetch_tarball(&self, reference: &str, target: &Path) -> Result<Download> {
        let lower = reference.to_ascii_lowercase();
        let download = if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(reference).map_err(|_| RegistryError::InvalidLocator {
                locator: reference.to_string(),
            })?;
            self.http()?.download(&url, target)?
        } else if reference.starts_with("file://") {
            let path = Url::parse(reference)
                .ok()
                .and_then(|u| u.to_file_path().ok())
                .ok_or_else(|| RegistryError::InvalidLocator {
                    locator: reference.to_string(),
                })?;
            copy_local_file(&path, target)?
        } else {
            self.source.fetch_bytes(reference, target)?
        };
        debug!(url = %download.url, status = download.status, "downloaded archive");
        Ok(download)
    }

    /// Versions whose name or description contains `query`
    /// (case-insensitive). An empty query lists everything.
    pub fn search(&self, query: Option<&str>) -> Result<Vec<SearchHit>> {
        let needle = query.map(str::to_lowercase).unwrap_or_default();
        let mut hits = Vec::new();
        for name in self.list_package_names()? {
            let mut index = self.package_index(&name)?;
            let versions: Vec<&String> = index.versions.keys().collect();
            for version in sort_versions(&versions) {
                let Some(entry) = index.versions.remove(&version) else {
                    continue;
                };
                let manifest = entry.manifest;
                if needle.is_empty()
                    || name.to_lowercase().contains(&needle)
                    || manifest.description.to_lowercase().contains(&needle)
                {
                    hits.push(SearchHit {
                        name: name.clone(),
                        version,
                        manifest,
                    });
                }
            }
        }
        Ok(hits)
    }

    pub(crate) fn http(&self) -> Result<&HttpFetcher> {
        if let Some(fetcher) = self.http.get() {
            return Ok(fetcher);
        }
        let fetcher = HttpFetcher::new(self.settings.timeout, self.settings.max_redirects)?;
        Ok(self.http.get_or_init(|| fetcher))
    }

    fn fetch_document(&self, relative: &str) -> Result<Vec<u8>> {
        let mirror = self.cache_dir.join(relative);
        match self.source.fetch_document(relative) {
            Ok(bytes) => {
                write_atomic(&mirror, &bytes)?;
                debug!(document = relative, "mirrored");
                Ok(bytes)
            }
            Err(err) if self.source.is_local() => Err(err),
            Err(err) => {
                if mirror.is_file() {
                    warn!(
                        document = relative,
                        registry = %self.locator,
                        "fetch failed ({err}), using cached copy"
                    );
                    fs::read(&mirror).map_err(|e| RegistryError::io(&mirror, e))
                } else {
                    Err(err)
                }
            }
        }
    }
}
