//! Registry catalog documents.
//!
//! Layout of a registry (local directory or HTTP base URL):
//! ```text
//! <registry>/
//!   index.json                      root catalog
//!   packages/<name>/index.json      per-package catalog
//!   tarballs/<name>/<version>.tgz   archives
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::manifest::PackageManifest;

/// Relative path of the root catalog.
pub const ROOT_INDEX: &str = "index.json";

/// Relative path of a package's catalog.
pub fn package_index_path(name: &str) -> String {
    format!("packages/{name}/index.json")
}

/// Conventional relative path of a published archive.
pub fn tarball_path(name: &str, version: &str) -> String {
    format!("tarballs/{name}/{version}.tgz")
}

/// Root catalog listing every package name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryIndex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub packages: BTreeMap<String, RegistryIndexPackage>,
}

/// Summary entry for one package in the root catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryIndexPackage {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
    #[serde(default)]
    pub versions: Vec<String>,
}

/// Per-package catalog with one entry per published version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageIndex {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub versions: BTreeMap<String, PackageVersionEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Metadata recorded for one published version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageVersionEntry {
    pub manifest: PackageManifest,
    /// Declared digest, e.g. `sha256-<hex>`.
    pub integrity: String,
    /// Absolute URL, `file://` URL or registry-relative path.
    pub tarball: String,
}

impl PackageIndex {
    /// Create an empty catalog for `name`.
    pub fn new(name: &str, description: Option<String>) -> Self {
        PackageIndex {
            name: name.to_string(),
            description,
            versions: BTreeMap::new(),
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_root_catalog_without_timestamp() {
        let json = r#"{"packages":{"core":{"name":"core","versions":["2.0.0"]}}}"#;
        let index: RegistryIndex = serde_json::from_str(json).unwrap();
        assert!(index.generated_at.is_none());
        assert_eq!(index.packages["core"].versions, vec!["2.0.0"]);
        assert!(index.packages["core"].latest.is_none());
    }

    #[test]
    fn parse_package_catalog() {
        let json = r#"{
            "name": "core",
            "description": "Core skills",
            "versions": {
                "2.0.0": {
                    "manifest": {"name": "core", "version": "2.0.0", "files": []},
                    "integrity": "sha256-abc",
                    "tarball": "tarballs/core/2.0.0.tgz"
                }
            },
            "updatedAt": "2024-05-01T12:00:00Z"
        }"#;
        let index: PackageIndex = serde_json::from_str(json).unwrap();
        let entry = &index.versions["2.0.0"];
        assert_eq!(entry.integrity, "sha256-abc");
        assert_eq!(entry.tarball, tarball_path("core", "2.0.0"));
        assert!(index.updated_at.is_some());
    }

    #[test]
    fn relative_paths() {
        assert_eq!(package_index_path("core"), "packages/core/index.json");
        assert_eq!(tarball_path("core", "1.0.0"), "tarballs/core/1.0.0.tgz");
    }
}
