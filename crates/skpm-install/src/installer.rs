//! Project-level operations: install, add, remove, update, list and tree.
//!
//! Every operation works on a project root holding `skpm.json` and, once
//! installed, `skpm-lock.json` plus the `.agents/skills` store.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use skpm_registry::{
    format_tree, resolve, ContentCache, Lockfile, RegistryClient, RegistryError, Settings,
};
use tracing::{info, warn};

use crate::error::{InstallError, Result};
use crate::link::remove_path;
use crate::project::{lockfile_path, parse_skill_spec, resolve_registry, ProjectManifest};
use crate::source::RegistryPackageSource;
use crate::store::{ensure_stored, expose, exposed_path, prune_store};
use crate::tools::{link_tool_targets, parse_targets, remove_tool_links};

/// Where and how to install.
#[derive(Debug, Clone)]
pub struct InstallContext {
    /// Absolute project root.
    pub project_root: PathBuf,
    /// `--registry` override.
    pub registry_override: Option<String>,
    /// Explicit tool targets; empty means the manifest's, then auto-detect.
    pub agent_targets: Vec<String>,
    pub settings: Settings,
}

impl InstallContext {
    pub fn new(project_root: &Path, settings: Settings) -> Result<Self> {
        let project_root = project_root
            .canonicalize()
            .map_err(|e| InstallError::io(project_root, e))?;
        Ok(InstallContext {
            project_root,
            registry_override: None,
            agent_targets: Vec::new(),
            settings,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledSkill {
    pub name: String,
    pub version: String,
}

/// Outcome of an install-like operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub registry: String,
    /// Top-level skills, exposed and linked.
    pub installed: Vec<InstalledSkill>,
    /// Every `name@version` present in the store after the install.
    pub stored: Vec<String>,
    /// Tools that received links.
    pub tools: Vec<String>,
    /// Store entries deleted as orphans.
    pub removed: Vec<String>,
}

/// One row of `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListedSkill {
    pub name: String,
    pub range: String,
    /// Locked version, when a lockfile exists.
    pub version: Option<String>,
}

/// Install the project's skills.
///
/// With `frozen`, the existing lockfile is materialised as-is and the
/// resolver is never consulted.
pub fn install(ctx: &InstallContext, frozen: bool) -> Result<InstallReport> {
    let manifest = ProjectManifest::load(&ctx.project_root)?;
    if frozen {
        return install_frozen(ctx, &manifest);
    }

    let registry = resolve_registry(
        ctx.registry_override.as_deref(),
        Some(&manifest),
        &ctx.settings,
    );
    let client = RegistryClient::open(&registry, &ctx.settings)?;
    client.ensure_catalog_available()?;

    let source = RegistryPackageSource::new(&client);
    let resolution = resolve(&manifest.name, &manifest.skills, &source)?;
    let lock = Lockfile::from_resolution(&registry, resolution);
    lock.write(&lockfile_path(&ctx.project_root))?;
    info!(packages = lock.packages.len(), "lockfile written");

    let cache = ContentCache::new(ctx.settings.cache_root.clone());
    materialize(ctx, &manifest, &client, &cache, &lock)
}

fn install_frozen(ctx: &InstallContext, manifest: &ProjectManifest) -> Result<InstallReport> {
    let path = lockfile_path(&ctx.project_root);
    let lock = Lockfile::read_if_exists(&path)?.ok_or(InstallError::LockfileNotFound { path })?;
    if lock.root.skills != manifest.skills {
        warn!("skpm.json differs from the lockfile; installing the locked graph");
    }

    let registry = ctx
        .registry_override
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(&lock.registry)
        .to_string();
    let client = RegistryClient::open(&registry, &ctx.settings)?;
    let cache = ContentCache::new(ctx.settings.cache_root.clone());

    for package in lock.packages.values() {
        let declared = client
            .get_integrity_and_location(&package.name, &package.version)?
            .integrity;
        if declared != package.integrity {
            return Err(RegistryError::IntegrityMismatch {
                name: package.name.clone(),
                version: package.version.clone(),
                expected: package.integrity.clone(),
                actual: declared,
            }
            .into());
        }
    }

    materialize(ctx, manifest, &client, &cache, &lock)
}

/// Cache and store every locked package; expose and link the top-level ones.
fn materialize(
    ctx: &InstallContext,
    manifest: &ProjectManifest,
    client: &RegistryClient,
    cache: &ContentCache,
    lock: &Lockfile,
) -> Result<InstallReport> {
    let targets = if ctx.agent_targets.is_empty() {
        manifest.agent_targets.clone().unwrap_or_default()
    } else {
        ctx.agent_targets.clone()
    };
    parse_targets(&targets)?;

    let mut report = InstallReport {
        registry: client.locator().to_string(),
        installed: Vec::new(),
        stored: Vec::new(),
        tools: Vec::new(),
        removed: Vec::new(),
    };
    let root = &ctx.project_root;

    for (key, package) in &lock.packages {
        let cached = cache.ensure_package_cached(client, &package.name, &package.version)?;
        ensure_stored(root, &package.name, &package.version, &cached)?;
        report.stored.push(key.clone());

        if !lock.root.skills.contains_key(&package.name) {
            continue;
        }
        expose(root, &package.name, &package.version)?;
        for tool in link_tool_targets(root, &package.name, &targets)? {
            let tool = tool.to_string();
            if !report.tools.contains(&tool) {
                report.tools.push(tool);
            }
        }
        info!(name = %package.name, version = %package.version, "installed");
        report.installed.push(InstalledSkill {
            name: package.name.clone(),
            version: package.version.clone(),
        });
    }

    Ok(report)
}

/// Add `spec` (`name` or `name@range`) to the project and install.
///
/// The previous manifest is restored when the install fails.
pub fn add(ctx: &InstallContext, spec: &str, range: Option<&str>) -> Result<InstallReport> {
    let (name, range) = parse_skill_spec(spec, range)?;
    let original = ProjectManifest::load(&ctx.project_root)?;
    let mut updated = original.clone();
    updated.skills.insert(name.clone(), range.clone());
    updated.save(&ctx.project_root)?;

    match install(ctx, false) {
        Ok(report) => {
            info!(%name, %range, "added");
            Ok(report)
        }
        Err(e) => {
            if let Err(restore) = original.save(&ctx.project_root) {
                warn!(error = %restore, "could not restore skpm.json");
            }
            Err(e)
        }
    }
}

/// Remove a top-level skill, reinstall the rest and prune orphaned store
/// entries.
pub fn remove(ctx: &InstallContext, name: &str) -> Result<InstallReport> {
    let mut manifest = ProjectManifest::load(&ctx.project_root)?;
    if manifest.skills.remove(name).is_none() {
        return Err(InstallError::SkillNotInManifest {
            name: name.to_string(),
        });
    }
    manifest.save(&ctx.project_root)?;

    remove_path(&exposed_path(&ctx.project_root, name))?;
    remove_tool_links(&ctx.project_root, name)?;

    let mut report = install(ctx, false)?;
    let lock = Lockfile::read(&lockfile_path(&ctx.project_root))?;
    let keep: BTreeSet<String> = lock.packages.keys().cloned().collect();
    report.removed = prune_store(&ctx.project_root, &keep)?;
    info!(%name, pruned = report.removed.len(), "removed");
    Ok(report)
}

/// Re-resolve from `skpm.json` and reinstall.
pub fn update(ctx: &InstallContext) -> Result<InstallReport> {
    install(ctx, false)
}

/// Top-level skills with their locked versions.
pub fn list(ctx: &InstallContext) -> Result<Vec<ListedSkill>> {
    let manifest = ProjectManifest::load(&ctx.project_root)?;
    let lock = Lockfile::read_if_exists(&lockfile_path(&ctx.project_root))?;
    let skills = match &lock {
        Some(lock) => &lock.root.skills,
        None => &manifest.skills,
    };
    Ok(skills
        .iter()
        .map(|(name, range)| ListedSkill {
            name: name.clone(),
            range: range.clone(),
            version: lock
                .as_ref()
                .and_then(|l| l.package(name))
                .map(|p| p.version.clone()),
        })
        .collect())
}

/// Rendered dependency tree of the locked graph.
pub fn tree(ctx: &InstallContext) -> Result<String> {
    let path = lockfile_path(&ctx.project_root);
    let lock = Lockfile::read_if_exists(&path)?.ok_or(InstallError::LockfileNotFound { path })?;
    Ok(format_tree(&lock))
}
