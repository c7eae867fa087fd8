//! Project lockfile (`skpm-lock.json`).

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::lock::write_atomic;
use crate::resolution::{Resolution, ResolvedPackage, RootSpec};

/// File name of the lockfile at a project root.
pub const LOCKFILE_NAME: &str = "skpm-lock.json";

/// Current lockfile format version.
pub const LOCKFILE_VERSION: u32 = 1;

/// Persisted snapshot of a resolved dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    pub lockfile_version: u32,
    /// Registry locator the graph was resolved against.
    pub registry: String,
    pub root: RootSpec,
    /// Keyed by `name@version`.
    #[serde(default)]
    pub packages: BTreeMap<String, ResolvedPackage>,
}

impl Lockfile {
    /// An empty lockfile.
    pub fn new(registry: &str, root: RootSpec) -> Self {
        Lockfile {
            lockfile_version: LOCKFILE_VERSION,
            registry: registry.to_string(),
            root,
            packages: BTreeMap::new(),
        }
    }

    pub fn from_resolution(registry: &str, resolution: Resolution) -> Self {
        Lockfile {
            lockfile_version: LOCKFILE_VERSION,
            registry: registry.to_string(),
            root: resolution.root,
            packages: resolution.packages,
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| RegistryError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Read the lockfile at `path`, or `None` if there is none.
    pub fn read_if_exists(path: &Path) -> Result<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        Self::read(path).map(Some)
    }

    /// Write atomically, with a trailing newline.
    pub fn write(&self, path: &Path) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        write_atomic(path, json.as_bytes())
    }

    /// Locked package for `name`, if any.
    pub fn package(&self, name: &str) -> Option<&ResolvedPackage> {
        self.packages.values().find(|p| p.name == name)
    }

    /// Root skill name → locked version.
    pub fn top_level(&self) -> BTreeMap<String, String> {
        self.root
            .skills
            .keys()
            .filter_map(|name| {
                self.package(name)
                    .map(|p| (name.clone(), p.version.clone()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Lockfile {
        let mut root = RootSpec {
            name: "app".to_string(),
            skills: BTreeMap::new(),
        };
        root.skills.insert("frontend".to_string(), "^1.0.0".to_string());
        let mut lock = Lockfile::new("https://registry.example.test", root);
        for (name, version, deps) in [
            ("frontend", "1.1.0", vec![("core", "^2.0.0", "2.0.0")]),
            ("core", "2.0.0", vec![]),
        ] {
            let package = ResolvedPackage {
                name: name.to_string(),
                version: version.to_string(),
                dependencies: deps
                    .iter()
                    .map(|(d, r, _)| (d.to_string(), r.to_string()))
                    .collect(),
                resolved: deps
                    .iter()
                    .map(|(d, _, v)| (d.to_string(), v.to_string()))
                    .collect(),
                integrity: format!("sha256-{name}"),
            };
            lock.packages.insert(package.id(), package);
        }
        lock
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOCKFILE_NAME);
        let lock = sample();
        lock.write(&path).unwrap();
        assert_eq!(Lockfile::read(&path).unwrap(), lock);
    }

    #[test]
    fn document_uses_camel_case_keys() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["lockfileVersion"], 1);
        assert_eq!(json["root"]["skills"]["frontend"], "^1.0.0");
        assert_eq!(json["packages"]["frontend@1.1.0"]["resolved"]["core"], "2.0.0");
    }

    #[test]
    fn top_level_maps_root_skills_to_versions() {
        let top = sample().top_level();
        assert_eq!(top.len(), 1);
        assert_eq!(top["frontend"], "1.1.0");
    }

    #[test]
    fn missing_lockfile_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Lockfile::read_if_exists(&dir.path().join(LOCKFILE_NAME))
            .unwrap()
            .is_none());
    }
}
