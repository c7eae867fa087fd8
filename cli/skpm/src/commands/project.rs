//! Project CLI commands: install, add, remove, update, list, tree.

use anyhow::{Context, Result};
use skpm_install::InstallReport;

use super::Invocation;

/// Run `skpm install [--frozen]`.
pub fn install(inv: &Invocation, frozen: bool) -> Result<()> {
    let ctx = inv.install_context()?;
    let report = skpm_install::install(&ctx, frozen)
        .with_context(|| format!("installing into {}", ctx.project_root.display()))?;
    print_report(&report, inv.json)
}

/// Run `skpm add <name[@range]> [--range <range>]`.
pub fn add(inv: &Invocation, spec: &str, range: Option<&str>) -> Result<()> {
    let ctx = inv.install_context()?;
    let report = skpm_install::add(&ctx, spec, range)
        .with_context(|| format!("adding {spec}"))?;
    print_report(&report, inv.json)
}

/// Run `skpm remove <name>`.
pub fn remove(inv: &Invocation, name: &str) -> Result<()> {
    let ctx = inv.install_context()?;
    let report = skpm_install::remove(&ctx, name)
        .with_context(|| format!("removing {name}"))?;
    print_report(&report, inv.json)
}

/// Run `skpm update`.
pub fn update(inv: &Invocation) -> Result<()> {
    let ctx = inv.install_context()?;
    let report = skpm_install::update(&ctx)?;
    print_report(&report, inv.json)
}

/// Run `skpm list`.
pub fn list(inv: &Invocation) -> Result<()> {
    let ctx = inv.install_context()?;
    let skills = skpm_install::list(&ctx)?;
    if inv.json {
        println!("{}", serde_json::to_string_pretty(&skills)?);
        return Ok(());
    }
    if skills.is_empty() {
        println!("No skills in skpm.json.");
        return Ok(());
    }
    for skill in &skills {
        match &skill.version {
            Some(version) => println!("{}@{} ({})", skill.name, version, skill.range),
            None => println!("{} {} (not installed)", skill.name, skill.range),
        }
    }
    Ok(())
}

/// Run `skpm tree`.
pub fn tree(inv: &Invocation) -> Result<()> {
    let ctx = inv.install_context()?;
    print!("{}", skpm_install::tree(&ctx)?);
    Ok(())
}

fn print_report(report: &InstallReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    for skill in &report.installed {
        println!("+ {}@{}", skill.name, skill.version);
    }
    for key in &report.removed {
        println!("- {key}");
    }
    println!(
        "{} packages in store from {}",
        report.stored.len(),
        report.registry
    );
    if !report.tools.is_empty() {
        println!("Linked for: {}", report.tools.join(", "));
    }
    Ok(())
}
