//! `skpm init`: create a project manifest.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use skpm_install::project::manifest_path;
use skpm_install::ProjectManifest;

use super::Invocation;

pub fn run(inv: &Invocation, name: Option<&str>) -> Result<()> {
    let dir = match &inv.project {
        Some(dir) => inv.cwd.join(dir),
        None => inv.cwd.clone(),
    };
    let manifest = create_project(&dir, name)?;
    println!("Created {} for '{}'", manifest_path(&dir).display(), manifest.name);
    Ok(())
}

/// Write an empty `skpm.json` into `dir`. The project name defaults to the
/// directory name.
pub(crate) fn create_project(dir: &Path, name: Option<&str>) -> Result<ProjectManifest> {
    let path = manifest_path(dir);
    if path.exists() {
        bail!("{} already exists", path.display());
    }
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let name = match name {
        Some(name) => name.to_string(),
        None => dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "skills".to_string()),
    };
    let manifest = ProjectManifest::new(&name);
    manifest.save(dir)?;
    Ok(manifest)
}
