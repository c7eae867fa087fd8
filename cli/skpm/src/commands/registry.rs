//! Registry CLI commands: search, info, publish.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use skpm_registry::version::latest_version;
use skpm_registry::{publish as publish_package, PublishOptions, RegistryClient};

use super::Invocation;

/// Run `skpm search [query]`.
pub fn search(inv: &Invocation, query: Option<&str>) -> Result<()> {
    let registry = inv.registry()?;
    let client = RegistryClient::open(&registry, &inv.settings)?;
    let hits = client.search(query)?;

    if inv.json {
        let rows: Vec<_> = hits
            .iter()
            .map(|hit| {
                serde_json::json!({
                    "name": hit.name,
                    "version": hit.version,
                    "description": hit.manifest.description,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if hits.is_empty() {
        println!("No skills found.");
        return Ok(());
    }
    for hit in &hits {
        if hit.manifest.description.is_empty() {
            println!("{}@{}", hit.name, hit.version);
        } else {
            println!("{}@{}  {}", hit.name, hit.version, hit.manifest.description);
        }
    }
    Ok(())
}

/// Run `skpm info <name> [--version <version>]`.
pub fn info(inv: &Invocation, name: &str, version: Option<&str>) -> Result<()> {
    let registry = inv.registry()?;
    let client = RegistryClient::open(&registry, &inv.settings)?;
    let versions = client.list_package_versions(name)?;
    let version = match version {
        Some(v) => v.to_string(),
        None => latest_version(&versions)
            .ok_or_else(|| anyhow!("no published versions of {name}"))?,
    };
    let manifest = client.get_manifest(name, &version)?;
    let tarball = client.get_integrity_and_location(name, &version)?;

    if inv.json {
        let doc = serde_json::json!({
            "manifest": manifest,
            "integrity": tarball.integrity,
            "tarball": tarball.tarball,
            "versions": versions,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("{} v{}", manifest.name, manifest.version);
    if !manifest.description.is_empty() {
        println!("{}", manifest.description);
    }
    println!();
    if !manifest.license.is_empty() {
        println!("license:   {}", manifest.license);
    }
    if !manifest.author.is_empty() {
        println!("author:    {}", manifest.author);
    }
    println!("integrity: {}", tarball.integrity);
    println!("versions:  {}", versions.join(", "));
    if !manifest.dependencies.is_empty() {
        println!("dependencies:");
        for (dep, range) in &manifest.dependencies {
            println!("  {dep} {range}");
        }
    }
    Ok(())
}

/// Run `skpm publish [path] [--dry-run] [--token <token>]`.
pub fn publish(
    inv: &Invocation,
    path: Option<&Path>,
    dry_run: bool,
    token: Option<&str>,
) -> Result<()> {
    let package_root = match path {
        Some(path) => inv.cwd.join(path),
        None => inv.cwd.clone(),
    };
    let registry = inv
        .registry
        .clone()
        .unwrap_or_else(|| inv.settings.registry.clone());
    let options = PublishOptions {
        dry_run,
        token: token.map(str::to_string),
        timeout: inv.settings.timeout,
    };

    let result = publish_package(&package_root, &registry, &options)
        .with_context(|| format!("publishing {}", package_root.display()))?;

    if inv.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }
    let verb = if result.dry_run { "Would publish" } else { "Published" };
    println!("{verb} {}@{} to {}", result.name, result.version, result.destination);
    println!("  integrity: {}", result.integrity);
    println!("  tarball:   {}", result.tarball);
    for file in &result.files {
        println!("  {file}");
    }
    Ok(())
}
