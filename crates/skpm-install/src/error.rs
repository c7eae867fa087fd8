//! Install error types.

use std::path::PathBuf;

use skpm_registry::RegistryError;

/// Errors that can occur while installing into a project.
#[derive(Debug, thiserror::Error)]
pub enum InstallError {
    /// Registry, resolution or cache failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The project has no `skpm.json`.
    #[error("missing {}; run 'skpm init' first", path.display())]
    ManifestNotFound { path: PathBuf },

    /// A frozen install or tree view needs a lockfile.
    #[error("missing {}; run 'skpm install' first", path.display())]
    LockfileNotFound { path: PathBuf },

    /// Skill is not a top-level entry of `skpm.json`.
    #[error("skill not found in skpm.json: {name}")]
    SkillNotInManifest { name: String },

    /// A `name@range` argument could not be parsed.
    #[error("invalid skill spec '{spec}': {detail}")]
    InvalidSpec { spec: String, detail: String },

    /// Tool target name is not one of the supported tools.
    #[error("unknown tool target: {name}")]
    UnknownTool { name: String },

    /// Symbolic link creation failed.
    #[error("failed to create symlink at {}: {source}", link.display())]
    SymlinkFailed {
        link: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Filesystem error with the offending path attached.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl InstallError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        InstallError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for install operations.
pub type Result<T> = std::result::Result<T, InstallError>;
