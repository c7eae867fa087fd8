//! Project manifest (`skpm.json` at a project root).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use skpm_registry::lock::write_atomic;
use skpm_registry::{Range, RegistryError, Settings, LOCKFILE_NAME, MANIFEST_FILE};

use crate::error::{InstallError, Result};

/// Top-level skill requirements of a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectManifest {
    pub name: String,
    /// Skill name → range.
    #[serde(default)]
    pub skills: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_targets: Option<Vec<String>>,
}

pub fn manifest_path(project_root: &Path) -> PathBuf {
    project_root.join(MANIFEST_FILE)
}

pub fn lockfile_path(project_root: &Path) -> PathBuf {
    project_root.join(LOCKFILE_NAME)
}

impl ProjectManifest {
    pub fn new(name: &str) -> Self {
        ProjectManifest {
            name: name.to_string(),
            skills: BTreeMap::new(),
            registry: None,
            agent_targets: None,
        }
    }

    /// Load `skpm.json` from `project_root`.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = manifest_path(project_root);
        if !path.is_file() {
            return Err(InstallError::ManifestNotFound { path });
        }
        let text = std::fs::read_to_string(&path).map_err(|e| InstallError::io(&path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn load_if_exists(project_root: &Path) -> Result<Option<Self>> {
        match Self::load(project_root) {
            Ok(manifest) => Ok(Some(manifest)),
            Err(InstallError::ManifestNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Write `skpm.json` into `project_root`.
    pub fn save(&self, project_root: &Path) -> Result<()> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        write_atomic(&manifest_path(project_root), json.as_bytes())?;
        Ok(())
    }
}

/// Nearest directory at or above `start` holding `skpm.json`.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        if manifest_path(&dir).is_file() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Registry to use: explicit override, then the project's own setting, then
/// the tool-wide default.
pub fn resolve_registry(
    registry_override: Option<&str>,
    manifest: Option<&ProjectManifest>,
    settings: &Settings,
) -> String {
    if let Some(explicit) = registry_override.map(str::trim).filter(|r| !r.is_empty()) {
        return explicit.to_string();
    }
    if let Some(registry) = manifest.and_then(|m| m.registry.as_deref()) {
        return registry.to_string();
    }
    settings.registry.clone()
}

/// Split `name@range` (the last `@` separates them; a leading `@` belongs to
/// the name). The range defaults to `*` and is validated.
pub fn parse_skill_spec(spec: &str, explicit_range: Option<&str>) -> Result<(String, String)> {
    let spec = spec.trim();
    let invalid = |detail: &str| InstallError::InvalidSpec {
        spec: spec.to_string(),
        detail: detail.to_string(),
    };
    if spec.is_empty() {
        return Err(invalid("skill name is required"));
    }

    let (name, range) = match spec.rfind('@') {
        Some(at) if at > 0 => {
            if explicit_range.is_some() {
                return Err(invalid("provide a range either with @ or --range, not both"));
            }
            let range = &spec[at + 1..];
            (&spec[..at], if range.is_empty() { "*" } else { range })
        }
        _ => (spec, explicit_range.unwrap_or("*")),
    };

    Range::parse(range).map_err(|e| RegistryError::InvalidRange {
        range: range.to_string(),
        detail: e.to_string(),
    })?;
    Ok((name.to_string(), range.to_string()))
}
