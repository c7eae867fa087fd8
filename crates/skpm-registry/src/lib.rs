//! Registry core for the skpm skill package manager.
//!
//! Handles catalog access, dependency resolution, content caching and
//! publishing for skills: versioned bundles of files consumed by agent tools.
//! Supports local filesystem and HTTP registries.
//!
//! # Architecture
//!
//! - **Integrity**: deterministic SHA-256 digests over file trees
//! - **Client**: catalog documents and archives, mirrored per registry
//! - **Resolution**: one version per name across the transitive graph
//! - **Cache**: machine-global, verified, immutable extracted packages
//!
//! The resolver only sees the [`PackageSource`] trait and the cache only sees
//! [`ArchiveSource`], so both run against in-memory fixtures in tests.

pub mod archive;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod index;
pub mod integrity;
pub mod lock;
pub mod lockfile;
pub mod manifest;
pub mod publish;
pub mod resolution;
pub mod source;
pub mod tree;
pub mod version;

// Re-exports for convenience.
pub use cache::{ArchiveSource, ContentCache};
pub use client::{RegistryClient, SearchHit, TarballInfo};
pub use config::Settings;
pub use error::{ConflictDetail, RegistryError, Result};
pub use integrity::{digest, digest_directory, ContentHash};
pub use lockfile::{Lockfile, LOCKFILE_NAME};
pub use manifest::{package_id, PackageManifest, MANIFEST_FILE};
pub use publish::{publish, PublishOptions, PublishResult};
pub use resolution::{resolve, PackageSource, Resolution, ResolvedPackage, RootSpec};
pub use tree::{format_lock, format_tree};
pub use version::{parse_range, parse_version, Range, Version};
