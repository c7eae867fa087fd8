//! Skill package manifests (`skpm.json`).
//!
//! The manifest is produced and validated by the publishing side; the
//! registry core treats it as read-only metadata keyed by name and version.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};

/// File name of a package manifest at a package root.
pub const MANIFEST_FILE: &str = "skpm.json";

/// Metadata describing one skill version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Dependency name → range expression.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Inclusion patterns, relative to the package root.
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub license: String,
    #[serde(default)]
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<SkillFileMapping>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents: Option<Vec<SkillFileMapping>>,
}

/// A file-category mapping entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillFileMapping {
    pub source: String,
}

impl PackageManifest {
    /// Parse a manifest from JSON text.
    pub fn parse(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a manifest file from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| RegistryError::io(path, e))?;
        Self::parse(&text)
    }

    /// Canonical identity string `name@version`.
    pub fn id(&self) -> String {
        package_id(&self.name, &self.version)
    }
}

/// Canonical identity string for a `(name, version)` pair.
pub fn package_id(name: &str, version: &str) -> String {
    format!("{name}@{version}")
}
