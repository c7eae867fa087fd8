//! Project-side installation for skpm.
//!
//! Turns a resolved, cached dependency graph into files an agent tool can
//! read: a copy-once store under `.agents/skills/.store`, a bare-name alias
//! for each top-level skill, and per-tool integration links.
//!
//! # Architecture
//!
//! - **Project**: `skpm.json` and the registry precedence rules
//! - **Store**: immutable `name@version` copies, aliases and orphan pruning
//! - **Tools**: marker detection and link layout per agent tool
//! - **Installer**: install, add, remove, update, list and tree

pub mod error;
pub mod installer;
pub mod link;
pub mod project;
pub mod source;
pub mod store;
pub mod tools;

// Re-exports for convenience.
pub use error::{InstallError, Result};
pub use installer::{
    add, install, list, remove, tree, update, InstallContext, InstallReport, InstalledSkill,
    ListedSkill,
};
pub use project::{find_project_root, parse_skill_spec, resolve_registry, ProjectManifest};
pub use source::RegistryPackageSource;
pub use tools::Tool;
