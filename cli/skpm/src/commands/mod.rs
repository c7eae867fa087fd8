//! CLI command implementations.

pub mod init;
pub mod project;
pub mod registry;

use std::path::PathBuf;

use anyhow::{bail, Result};
use skpm_install::{find_project_root, resolve_registry, InstallContext, ProjectManifest};
use skpm_registry::Settings;

/// Global flags and environment shared by every command.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub cwd: PathBuf,
    /// `--project`.
    pub project: Option<PathBuf>,
    /// `--registry`.
    pub registry: Option<String>,
    /// `--tool`, possibly comma-separated.
    pub tools: Vec<String>,
    pub json: bool,
    pub settings: Settings,
}

impl Invocation {
    /// Project root: `--project`, else the nearest `skpm.json` upward.
    pub fn project_root(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.project {
            return Ok(self.cwd.join(dir));
        }
        match find_project_root(&self.cwd) {
            Some(dir) => Ok(dir),
            None => bail!("no skpm.json found (run `skpm init` first)"),
        }
    }

    pub fn install_context(&self) -> Result<InstallContext> {
        let mut ctx = InstallContext::new(&self.project_root()?, self.settings.clone())?;
        ctx.registry_override = self.registry.clone();
        ctx.agent_targets = self.tools.clone();
        Ok(ctx)
    }

    /// Registry for read-only queries: flag, then the enclosing project's
    /// setting if there is one, then the configured default.
    pub fn registry(&self) -> Result<String> {
        let manifest = match self.project_root() {
            Ok(root) => ProjectManifest::load_if_exists(&root)?,
            Err(_) => None,
        };
        Ok(resolve_registry(
            self.registry.as_deref(),
            manifest.as_ref(),
            &self.settings,
        ))
    }
}
