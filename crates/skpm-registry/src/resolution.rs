//! Dependency resolution with semantic versioning.
//!
//! Depth-first and requirement-accumulating: every requirement on a name is
//! kept, and the chosen version is always the highest published version that
//! satisfies all of them. When a later requirement rules out a version picked
//! earlier, the package is re-resolved in place. Requirements contributed by
//! the old version are retracted and packages left without any requirement
//! are pruned.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ConflictDetail, RegistryError, Result};
use crate::manifest::{package_id, PackageManifest};
use crate::version::{resolve_best, Range, Version};

/// Package metadata consumed by the resolver.
///
/// The resolver never caches answers itself.
pub trait PackageSource {
    /// Every published version of `name`.
    fn list_versions(&self, name: &str) -> Result<Vec<String>>;

    /// Manifest for `name@version`.
    fn get_manifest(&self, name: &str, version: &str) -> Result<PackageManifest>;

    /// Declared integrity digest for `name@version`.
    fn get_integrity(&self, name: &str, version: &str) -> Result<String>;
}

/// Who asked for a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequirementSource {
    /// The project itself.
    Root,
    /// A resolved package's manifest.
    Package { name: String, version: String },
}

#[derive(Debug, Clone)]
struct Requirement {
    range: Range,
    path: Vec<String>,
    source: RequirementSource,
}

/// One package that survived resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPackage {
    pub name: String,
    pub version: String,
    /// Dependency ranges as declared by the manifest.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    /// Dependency name → chosen version.
    #[serde(default)]
    pub resolved: BTreeMap<String, String>,
    pub integrity: String,
}

impl ResolvedPackage {
    pub fn id(&self) -> String {
        package_id(&self.name, &self.version)
    }
}

/// The project's own requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootSpec {
    pub name: String,
    #[serde(default)]
    pub skills: BTreeMap<String, String>,
}

/// The result of dependency resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub root: RootSpec,
    /// Keyed by `name@version`.
    pub packages: BTreeMap<String, ResolvedPackage>,
}

impl Resolution {
    /// Version chosen for `name`, if any.
    pub fn version_of(&self, name: &str) -> Option<&str> {
        self.packages
            .values()
            .find(|p| p.name == name)
            .map(|p| p.version.as_str())
    }
}

/// Resolve `requirements` (skill name → range) for the project `root_name`.
pub fn resolve(
    root_name: &str,
    requirements: &BTreeMap<String, String>,
    source: &dyn PackageSource,
) -> Result<Resolution> {
    let mut resolver = Resolver::new(requirements.keys().cloned());
    for (name, range) in requirements {
        let path = vec![root_name.to_string(), name.clone()];
        resolver.require(source, name, range, path, RequirementSource::Root)?;
    }
    Ok(resolver.finish(RootSpec {
        name: root_name.to_string(),
        skills: requirements.clone(),
    }))
}

/// Mutable resolution state, borrowed through the recursion.
struct Resolver {
    resolved_versions: HashMap<String, String>,
    requirements: HashMap<String, Vec<Requirement>>,
    in_progress: HashSet<String>,
    root_names: HashSet<String>,
    packages: BTreeMap<String, ResolvedPackage>,
}

impl Resolver {
    fn new(root_names: impl IntoIterator<Item = String>) -> Self {
        Resolver {
            resolved_versions: HashMap::new(),
            requirements: HashMap::new(),
            in_progress: HashSet::new(),
            root_names: root_names.into_iter().collect(),
            packages: BTreeMap::new(),
        }
    }

    fn require(
        &mut self,
        source: &dyn PackageSource,
        name: &str,
        range: &str,
        path: Vec<String>,
        from: RequirementSource,
    ) -> Result<()> {
        let parsed = Range::parse(range).map_err(|e| RegistryError::InvalidRange {
            range: range.to_string(),
            detail: e.to_string(),
        })?;
        self.requirements
            .entry(name.to_string())
            .or_default()
            .push(Requirement {
                range: parsed,
                path: path.clone(),
                source: from,
            });

        if self.in_progress.contains(name) {
            return Err(RegistryError::CyclicDependency { path });
        }

        let ranges: Vec<Range> = self.requirements[name]
            .iter()
            .map(|r| r.range.clone())
            .collect();

        if let Some(current) = self.resolved_versions.get(name) {
            let still_ok = Version::parse(current)
                .map(|v| ranges.iter().all(|r| r.matches(&v)))
                .unwrap_or(false);
            if still_ok {
                debug!(%name, version = %current, "already satisfied");
                return Ok(());
            }
        }

        let available = source.list_versions(name)?;
        let Some(chosen) = resolve_best(&available, &ranges) else {
            return Err(self.unsatisfiable(name, path));
        };

        if let Some(old) = self
            .resolved_versions
            .insert(name.to_string(), chosen.clone())
        {
            info!(%name, from = %old, to = %chosen, "re-resolving");
            self.retract(name, &old);
            self.prune();
        }
        debug!(%name, version = %chosen, "selected");

        self.in_progress.insert(name.to_string());
        let manifest = source.get_manifest(name, &chosen)?;
        let this = RequirementSource::Package {
            name: name.to_string(),
            version: chosen.clone(),
        };
        for (dep, dep_range) in &manifest.dependencies {
            let mut dep_path = path.clone();
            dep_path.push(dep.clone());
            self.require(source, dep, dep_range, dep_path, this.clone())?;
        }

        let resolved = self.resolved_map(&manifest.dependencies);
        let integrity = source.get_integrity(name, &chosen)?;
        self.in_progress.remove(name);

        let package = ResolvedPackage {
            name: name.to_string(),
            version: chosen,
            dependencies: manifest.dependencies,
            resolved,
            integrity,
        };
        self.packages.insert(package.id(), package);
        Ok(())
    }

    fn resolved_map(&self, dependencies: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        dependencies
            .keys()
            .filter_map(|dep| {
                self.resolved_versions
                    .get(dep)
                    .map(|v| (dep.clone(), v.clone()))
            })
            .collect()
    }

    /// Drop `name@version` and every requirement it contributed.
    fn retract(&mut self, name: &str, version: &str) {
        self.packages.remove(&package_id(name, version));
        let gone = RequirementSource::Package {
            name: name.to_string(),
            version: version.to_string(),
        };
        for reqs in self.requirements.values_mut() {
            reqs.retain(|r| r.source != gone);
        }
    }

    /// Remove non-root packages nobody requires any more, until none remain.
    fn prune(&mut self) {
        loop {
            let orphan = self
                .resolved_versions
                .iter()
                .find(|(name, _)| {
                    !self.root_names.contains(*name)
                        && self.requirements.get(*name).map_or(true, Vec::is_empty)
                })
                .map(|(n, v)| (n.clone(), v.clone()));
            let Some((name, version)) = orphan else {
                break;
            };
            debug!(%name, %version, "pruned");
            self.resolved_versions.remove(&name);
            self.requirements.remove(&name);
            self.retract(&name, &version);
        }
    }

    fn unsatisfiable(&self, name: &str, path: Vec<String>) -> RegistryError {
        let reqs = self
            .requirements
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let distinct: BTreeSet<&str> = reqs.iter().map(|r| r.range.as_str()).collect();

        match (reqs.first(), reqs.last()) {
            (Some(first), Some(last)) if distinct.len() >= 2 => {
                RegistryError::ResolutionConflict {
                    conflicts: vec![ConflictDetail {
                        name: name.to_string(),
                        existing_range: first.range.to_string(),
                        new_range: last.range.to_string(),
                        existing_path: first.path.clone(),
                        new_path: last.path.clone(),
                    }],
                }
            }
            _ => RegistryError::NoSatisfyingVersion {
                name: name.to_string(),
                ranges: distinct.into_iter().map(str::to_string).collect(),
                path,
            },
        }
    }

    /// Re-derive every `resolved` map from the final assignment.
    fn finish(mut self, root: RootSpec) -> Resolution {
        let packages = std::mem::take(&mut self.packages)
            .into_iter()
            .filter(|(_, p)| self.resolved_versions.get(&p.name) == Some(&p.version))
            .map(|(id, mut p)| {
                p.resolved = self.resolved_map(&p.dependencies);
                (id, p)
            })
            .collect();
        Resolution { root, packages }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    /// In-memory package source that logs every call.
    #[derive(Default)]
    pub(crate) struct Fixture {
        manifests: BTreeMap<(String, String), PackageManifest>,
        pub(crate) calls: RefCell<Vec<String>>,
    }

    impl Fixture {
        pub(crate) fn with(mut self, name: &str, version: &str, deps: &[(&str, &str)]) -> Self {
            let manifest = PackageManifest {
                name: name.to_string(),
                version: version.to_string(),
                description: String::new(),
                dependencies: deps
                    .iter()
                    .map(|(d, r)| (d.to_string(), r.to_string()))
                    .collect(),
                files: Vec::new(),
                license: String::new(),
                author: String::new(),
                skills: None,
                agents: None,
            };
            self.manifests
                .insert((name.to_string(), version.to_string()), manifest);
            self
        }
    }

    impl PackageSource for Fixture {
        fn list_versions(&self, name: &str) -> Result<Vec<String>> {
            self.calls.borrow_mut().push(format!("list {name}"));
            let versions: Vec<String> = self
                .manifests
                .keys()
                .filter(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .collect();
            if versions.is_empty() {
                return Err(RegistryError::PackageNotFound {
                    name: name.to_string(),
                });
            }
            Ok(versions)
        }

        fn get_manifest(&self, name: &str, version: &str) -> Result<PackageManifest> {
            self.calls
                .borrow_mut()
                .push(format!("manifest {name}@{version}"));
            self.manifests
                .get(&(name.to_string(), version.to_string()))
                .cloned()
                .ok_or_else(|| RegistryError::VersionNotFound {
                    name: name.to_string(),
                    version: version.to_string(),
                })
        }

        fn get_integrity(&self, name: &str, version: &str) -> Result<String> {
            Ok(format!("sha256-{name}-{version}"))
        }
    }

    fn root(reqs: &[(&str, &str)]) -> BTreeMap<String, String> {
        reqs.iter()
            .map(|(n, r)| (n.to_string(), r.to_string()))
            .collect()
    }

    fn ids(resolution: &Resolution) -> Vec<String> {
        resolution.packages.keys().cloned().collect()
    }

    fn assert_no_dangling_edges(resolution: &Resolution) {
        for package in resolution.packages.values() {
            for (dep, version) in &package.resolved {
                assert!(
                    resolution.packages.contains_key(&package_id(dep, version)),
                    "{} points at missing {dep}@{version}",
                    package.id()
                );
            }
        }
    }

    #[test]
    fn transitive_dependency_is_resolved() {
        let source = Fixture::default()
            .with("frontend", "1.1.0", &[("core", "^2.0.0")])
            .with("core", "2.0.0", &[]);

        let result = resolve("app", &root(&[("frontend", "^1.0.0")]), &source).unwrap();
        assert_eq!(ids(&result), vec!["core@2.0.0", "frontend@1.1.0"]);
        assert_eq!(
            result.packages["frontend@1.1.0"].resolved["core"],
            "2.0.0".to_string()
        );
        assert_eq!(result.packages["core@2.0.0"].integrity, "sha256-core-2.0.0");
        assert_eq!(result.root.name, "app");
    }

    #[test]
    fn highest_satisfying_version_wins() {
        let source = Fixture::default()
            .with("core", "2.0.0", &[])
            .with("core", "2.1.0", &[])
            .with("core", "3.0.0", &[]);

        let result = resolve("app", &root(&[("core", "^2.0.0")]), &source).unwrap();
        assert_eq!(result.version_of("core"), Some("2.1.0"));
    }

    #[test]
    fn exact_pin_beats_higher_version() {
        let source = Fixture::default()
            .with("frontend", "1.0.0", &[("core", "2.0.0")])
            .with("core", "2.0.0", &[])
            .with("core", "2.1.0", &[]);

        let result = resolve("app", &root(&[("frontend", "*")]), &source).unwrap();
        assert_eq!(result.version_of("core"), Some("2.0.0"));
        assert_eq!(result.packages["frontend@1.0.0"].resolved["core"], "2.0.0");
    }

    #[test]
    fn independent_packages_take_their_maximum() {
        let source = Fixture::default()
            .with("a", "1.0.0", &[])
            .with("a", "1.4.2", &[])
            .with("a", "2.0.0", &[])
            .with("b", "0.1.0", &[])
            .with("b", "0.1.9", &[])
            .with("b", "0.2.0", &[])
            .with("b", "not-a-version", &[]);

        let result = resolve("app", &root(&[("a", "^1.0.0"), ("b", "~0.1.0")]), &source).unwrap();
        assert_eq!(result.version_of("a"), Some("1.4.2"));
        assert_eq!(result.version_of("b"), Some("0.1.9"));
    }

    #[test]
    fn incompatible_shared_dependency_is_one_conflict() {
        let source = Fixture::default()
            .with("frontend", "1.0.0", &[("shared", "^1.0.0")])
            .with("backend", "1.0.0", &[("shared", "^2.0.0")])
            .with("shared", "1.0.0", &[])
            .with("shared", "2.0.0", &[]);

        let err = resolve(
            "app",
            &root(&[("frontend", "^1.0.0"), ("backend", "^1.0.0")]),
            &source,
        )
        .unwrap_err();

        match err {
            RegistryError::ResolutionConflict { conflicts } => {
                assert_eq!(conflicts.len(), 1);
                let c = &conflicts[0];
                assert_eq!(c.name, "shared");
                // Root requirements are walked in name order: backend first.
                assert_eq!(c.existing_range, "^2.0.0");
                assert_eq!(c.new_range, "^1.0.0");
                assert_eq!(c.existing_path, vec!["app", "backend", "shared"]);
                assert_eq!(c.new_path, vec!["app", "frontend", "shared"]);
            }
            other => panic!("expected conflict, got {other}"),
        }
    }

    #[test]
    fn single_unsatisfied_range_is_not_a_conflict() {
        let source = Fixture::default().with("core", "1.0.0", &[]);
        let err = resolve("app", &root(&[("core", "^5.0.0")]), &source).unwrap_err();
        match err {
            RegistryError::NoSatisfyingVersion { name, ranges, path } => {
                assert_eq!(name, "core");
                assert_eq!(ranges, vec!["^5.0.0"]);
                assert_eq!(path, vec!["app", "core"]);
            }
            other => panic!("expected no satisfying version, got {other}"),
        }
    }

    #[test]
    fn cycle_fails_before_third_level() {
        let source = Fixture::default()
            .with("a", "1.0.0", &[("b", "^1.0.0")])
            .with("b", "1.0.0", &[("a", "^1.0.0")]);

        let err = resolve("app", &root(&[("a", "^1.0.0")]), &source).unwrap_err();
        match err {
            RegistryError::CyclicDependency { path } => {
                assert_eq!(path, vec!["app", "a", "b", "a"]);
            }
            other => panic!("expected cycle, got {other}"),
        }
        assert_eq!(
            *source.calls.borrow(),
            vec!["list a", "manifest a@1.0.0", "list b", "manifest b@1.0.0"]
        );
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let source = Fixture::default().with("a", "1.0.0", &[("a", "*")]);
        let err = resolve("app", &root(&[("a", "^1.0.0")]), &source).unwrap_err();
        assert!(matches!(err, RegistryError::CyclicDependency { .. }));
    }

    #[test]
    fn diamond_shares_one_version() {
        let source = Fixture::default()
            .with("left", "1.0.0", &[("base", "^1.0.0")])
            .with("right", "1.0.0", &[("base", ">=1.1.0")])
            .with("base", "1.0.0", &[])
            .with("base", "1.2.0", &[])
            .with("base", "2.0.0", &[]);

        let result = resolve("app", &root(&[("left", "*"), ("right", "*")]), &source).unwrap();
        assert_eq!(result.version_of("base"), Some("1.2.0"));
        assert_eq!(result.packages.len(), 3);
        assert_no_dangling_edges(&result);
    }

    #[test]
    fn narrowed_requirement_replaces_earlier_pick() {
        // alpha pulls shared@2.0.0 (which pulls legacy); beta then caps shared
        // below 2, forcing shared@1.5.0 and orphaning legacy.
        let source = Fixture::default()
            .with("alpha", "1.0.0", &[("shared", ">=1.0.0")])
            .with("beta", "1.0.0", &[("shared", "<2.0.0")])
            .with("shared", "1.5.0", &[])
            .with("shared", "2.0.0", &[("legacy", "^1.0.0")])
            .with("legacy", "1.0.0", &[]);

        let result = resolve("app", &root(&[("alpha", "^1.0.0"), ("beta", "^1.0.0")]), &source)
            .unwrap();

        assert_eq!(
            ids(&result),
            vec!["alpha@1.0.0", "beta@1.0.0", "shared@1.5.0"]
        );
        assert_eq!(result.packages["alpha@1.0.0"].resolved["shared"], "1.5.0");
        assert_no_dangling_edges(&result);
    }

    #[test]
    fn root_requirements_survive_pruning() {
        let source = Fixture::default()
            .with("alpha", "1.0.0", &[("shared", ">=1.0.0")])
            .with("beta", "1.0.0", &[("shared", "<2.0.0")])
            .with("shared", "1.5.0", &[])
            .with("shared", "2.0.0", &[("legacy", "^1.0.0")])
            .with("legacy", "1.0.0", &[]);

        let result = resolve(
            "app",
            &root(&[("alpha", "^1.0.0"), ("beta", "^1.0.0"), ("legacy", "^1.0.0")]),
            &source,
        )
        .unwrap();

        assert!(result.packages.contains_key("legacy@1.0.0"));
        assert!(!result.packages.contains_key("shared@2.0.0"));
        assert_no_dangling_edges(&result);
    }

    #[test]
    fn invalid_range_is_reported() {
        let source = Fixture::default().with("core", "1.0.0", &[]);
        let err = resolve("app", &root(&[("core", "not a range")]), &source).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidRange { .. }));
    }
}
