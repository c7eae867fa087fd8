//! Registry error types.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// One pair of incompatible requirements on the same package name.
///
/// `existing_*` describes the first requirement recorded for the name,
/// `new_*` the most recent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictDetail {
    pub name: String,
    pub existing_range: String,
    pub new_range: String,
    pub existing_path: Vec<String>,
    pub new_path: Vec<String>,
}

impl fmt::Display for ConflictDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conflict on '{}': {} ({}) vs {} ({})",
            self.name,
            self.existing_range,
            format_path(&self.existing_path),
            self.new_range,
            format_path(&self.new_path)
        )
    }
}

/// Render a requirement path as `root -> a -> b`.
pub fn format_path(path: &[String]) -> String {
    path.join(" -> ")
}

fn format_conflicts(conflicts: &[ConflictDetail]) -> String {
    conflicts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors that can occur during registry operations.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No candidate version meets the accumulated constraints.
    #[error("no version of '{name}' satisfies {} (required by {})", ranges.join(" and "), format_path(path))]
    NoSatisfyingVersion {
        name: String,
        ranges: Vec<String>,
        path: Vec<String>,
    },

    /// Two or more incompatible ranges pin the same name.
    #[error("dependency resolution failed: {}", format_conflicts(conflicts))]
    ResolutionConflict { conflicts: Vec<ConflictDetail> },

    /// A package requires itself, directly or transitively.
    #[error("cyclic dependency detected: {}", format_path(path))]
    CyclicDependency { path: Vec<String> },

    /// The registry could not be reached and no cached copy exists.
    #[error("registry {locator} is unreachable: {detail}")]
    RegistryUnreachable { locator: String, detail: String },

    /// Package name is not present in the registry.
    #[error("skill not found in registry: {name}")]
    PackageNotFound { name: String },

    /// Requested version is not present in the package catalog.
    #[error("registry metadata missing {name}@{version}")]
    VersionNotFound { name: String, version: String },

    /// Downloaded archive does not start with the gzip signature.
    #[error(
        "downloaded archive is not gzip: url={url} content-type={} preview=\"{preview}\"",
        content_type.as_deref().unwrap_or("unknown")
    )]
    MalformedArchive {
        url: String,
        content_type: Option<String>,
        preview: String,
    },

    /// Cached content digest differs from the catalog's declared digest.
    #[error("integrity check failed for '{name}@{version}': expected {expected}, got {actual}")]
    IntegrityMismatch {
        name: String,
        version: String,
        expected: String,
        actual: String,
    },

    /// Redirect chain exceeded the configured hop limit.
    #[error("too many redirects (limit {limit}) for {url}")]
    TooManyRedirects { url: String, limit: usize },

    /// Request did not finish within the configured timeout.
    #[error("request timed out after {}ms: {url}", timeout.as_millis())]
    RequestTimeout { url: String, timeout: Duration },

    /// Non-2xx HTTP response.
    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    /// Range expression could not be parsed.
    #[error("invalid semver range '{range}': {detail}")]
    InvalidRange { range: String, detail: String },

    /// Registry locator is neither a URL nor a filesystem path.
    #[error("unsupported registry locator: {locator}")]
    InvalidLocator { locator: String },

    /// Archive entry or publish pattern would escape its root.
    #[error("path escapes package root: {path}")]
    PathEscape { path: String },

    /// Publish error.
    #[error("publish failed: {detail}")]
    PublishFailed { detail: String },

    /// Version already exists in the registry.
    #[error("registry already contains {name}@{version}")]
    AlreadyPublished { name: String, version: String },

    /// Advisory lock could not be acquired.
    #[error("failed to lock {}: {detail}", path.display())]
    LockFailed { path: PathBuf, detail: String },

    /// Filesystem error with the offending path attached.
    #[error("I/O error at {}: {source}", path.display())]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Semver parse error.
    #[error("invalid version: {0}")]
    SemverVersion(#[from] semver::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RegistryError {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RegistryError::PathIo {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_renders_both_paths() {
        let err = RegistryError::ResolutionConflict {
            conflicts: vec![ConflictDetail {
                name: "shared".to_string(),
                existing_range: "^1.0.0".to_string(),
                new_range: "^2.0.0".to_string(),
                existing_path: vec!["app".into(), "frontend".into(), "shared".into()],
                new_path: vec!["app".into(), "backend".into(), "shared".into()],
            }],
        };
        let text = err.to_string();
        assert!(text.contains("app -> frontend -> shared"));
        assert!(text.contains("app -> backend -> shared"));
        assert!(text.contains("^1.0.0"));
        assert!(text.contains("^2.0.0"));
    }

    #[test]
    fn cycle_renders_path() {
        let err = RegistryError::CyclicDependency {
            path: vec!["app".into(), "a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "cyclic dependency detected: app -> a -> b -> a");
    }

    #[test]
    fn malformed_archive_defaults_content_type() {
        let err = RegistryError::MalformedArchive {
            url: "https://example.test/x.tgz".to_string(),
            content_type: None,
            preview: "<html>".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("content-type=unknown"));
        assert!(text.contains("https://example.test/x.tgz"));
    }
}
