//! Dependency tree display.
//!
//! Formats a locked dependency graph as a human-readable ASCII tree:
//! ```text
//! my-project
//! ├── frontend v1.1.0
//! │   └── core v2.0.0
//! └── backend v1.0.0
//!     └── core v2.0.0 (shared)
//! ```
//! A package already printed is marked `(shared)` and not expanded again.

use std::collections::HashSet;

use crate::lockfile::Lockfile;
use crate::manifest::package_id;

/// Format the lockfile's graph as a human-readable string.
pub fn format_tree(lock: &Lockfile) -> String {
    let mut out = format!("{}\n", lock.root.name);
    let mut seen = HashSet::new();
    let mut total = 0;

    let top: Vec<(String, String)> = lock.top_level().into_iter().collect();
    let count = top.len();
    for (i, (name, version)) in top.iter().enumerate() {
        format_node(&mut out, lock, name, version, "", i == count - 1, &mut seen, &mut total);
    }

    out.push_str(&format!(
        "\n{total} dependencies ({} unique)\n",
        lock.packages.len()
    ));
    out
}

#[allow(clippy::too_many_arguments)]
fn format_node(
    out: &mut String,
    lock: &Lockfile,
    name: &str,
    version: &str,
    prefix: &str,
    is_last: bool,
    seen: &mut HashSet<String>,
    total: &mut usize,
) {
    *total += 1;
    let connector = if is_last { "└── " } else { "├── " };
    let id = package_id(name, version);
    let first_visit = seen.insert(id.clone());
    let shared_marker = if first_visit { "" } else { " (shared)" };
    out.push_str(&format!("{prefix}{connector}{name} v{version}{shared_marker}\n"));

    if !first_visit {
        return;
    }
    let Some(package) = lock.packages.get(&id) else {
        return;
    };

    let child_prefix = if is_last {
        format!("{prefix}    ")
    } else {
        format!("{prefix}│   ")
    };
    let child_count = package.resolved.len();
    for (i, (child, child_version)) in package.resolved.iter().enumerate() {
        format_node(
            out,
            lock,
            child,
            child_version,
            &child_prefix,
            i == child_count - 1,
            seen,
            total,
        );
    }
}

/// Format a flat list of every locked package.
pub fn format_lock(lock: &Lockfile) -> String {
    let mut out = String::new();
    for package in lock.packages.values() {
        let hash = package
            .integrity
            .strip_prefix("sha256-")
            .map(|h| format!(" (sha256:{:.12})", h))
            .unwrap_or_default();
        out.push_str(&format!("{} v{}{hash}\n", package.name, package.version));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolution::{ResolvedPackage, RootSpec};
    use std::collections::BTreeMap;

    fn package(name: &str, version: &str, deps: &[(&str, &str)]) -> ResolvedPackage {
        ResolvedPackage {
            name: name.to_string(),
            version: version.to_string(),
            dependencies: deps
                .iter()
                .map(|(d, _)| (d.to_string(), "*".to_string()))
                .collect(),
            resolved: deps
                .iter()
                .map(|(d, v)| (d.to_string(), v.to_string()))
                .collect(),
            integrity: format!("sha256-{name}0123456789abcdef"),
        }
    }

    fn lockfile(root: &[&str], packages: Vec<ResolvedPackage>) -> Lockfile {
        let skills: BTreeMap<String, String> =
            root.iter().map(|n| (n.to_string(), "*".to_string())).collect();
        let mut lock = Lockfile::new(
            "file:///registry",
            RootSpec {
                name: "my-project".to_string(),
                skills,
            },
        );
        for p in packages {
            lock.packages.insert(p.id(), p);
        }
        lock
    }

    #[test]
    fn format_nested_tree() {
        let lock = lockfile(
            &["frontend"],
            vec![
                package("frontend", "1.1.0", &[("core", "2.0.0")]),
                package("core", "2.0.0", &[]),
            ],
        );
        let output = format_tree(&lock);
        assert!(output.starts_with("my-project\n"));
        assert!(output.contains("└── frontend v1.1.0"));
        assert!(output.contains("    └── core v2.0.0"));
        assert!(output.contains("2 dependencies (2 unique)"));
    }

    #[test]
    fn shared_dependency_marker() {
        let lock = lockfile(
            &["backend", "frontend"],
            vec![
                package("backend", "1.0.0", &[("core", "2.0.0")]),
                package("frontend", "1.0.0", &[("core", "2.0.0")]),
                package("core", "2.0.0", &[]),
            ],
        );
        let output = format_tree(&lock);
        assert!(output.contains("├── backend v1.0.0"));
        assert!(output.contains("│   └── core v2.0.0\n"));
        assert!(output.contains("    └── core v2.0.0 (shared)"));
        assert!(output.contains("4 dependencies (3 unique)"));
    }

    #[test]
    fn empty_tree() {
        let output = format_tree(&lockfile(&[], Vec::new()));
        assert!(output.contains("my-project"));
        assert!(output.contains("0 unique"));
    }

    #[test]
    fn format_lock_list() {
        let lock = lockfile(&["alpha"], vec![package("alpha", "1.0.0", &[])]);
        let output = format_lock(&lock);
        assert!(output.contains("alpha v1.0.0 (sha256:alpha0123456)"));
    }
}
