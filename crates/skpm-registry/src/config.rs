//! Tool-wide settings.
//!
//! Reads `config.toml` from the skpm home directory (`$SKPM_HOME`, else
//! `~/.skpm`). Every key is optional; a missing or malformed file falls back
//! to defaults with a log line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Registry used when neither the command line nor the project names one.
pub const DEFAULT_REGISTRY: &str = "https://registry.skpm.dev";

/// Default network request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Default redirect hop limit.
pub const DEFAULT_MAX_REDIRECTS: usize = 5;

/// Contents of `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConfigFile {
    #[serde(default)]
    pub registry: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_redirects: Option<usize>,
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

/// Effective settings for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Tool home directory.
    pub home: PathBuf,
    /// Default registry locator.
    pub registry: String,
    /// Network request timeout.
    pub timeout: Duration,
    /// Maximum redirect hops per request.
    pub max_redirects: usize,
    /// Root of per-registry catalog mirrors.
    pub registry_cache_root: PathBuf,
    /// Root of the machine-global content cache.
    pub cache_root: PathBuf,
}

impl Settings {
    /// Settings rooted at `home` with no config file applied.
    pub fn with_home(home: &Path) -> Self {
        Settings {
            home: home.to_path_buf(),
            registry: DEFAULT_REGISTRY.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_redirects: DEFAULT_MAX_REDIRECTS,
            registry_cache_root: home.join("registry"),
            cache_root: home.join("cache"),
        }
    }

    /// Load settings from `home/config.toml`, overlaying the file on defaults.
    pub fn load_from(home: &Path) -> Self {
        let mut settings = Settings::with_home(home);
        let config = read_config_file(&home.join("config.toml"));
        if let Some(registry) = config.registry {
            settings.registry = registry;
        }
        if let Some(secs) = config.timeout_secs {
            settings.timeout = Duration::from_secs(secs);
        }
        if let Some(hops) = config.max_redirects {
            settings.max_redirects = hops;
        }
        if let Some(dir) = config.cache_dir {
            settings.cache_root = dir;
        }
        settings
    }

    /// Load settings from the environment and the default home directory.
    pub fn load() -> Self {
        let mut settings = Settings::load_from(&default_home());
        if let Ok(registry) = std::env::var("SKPM_REGISTRY") {
            if !registry.trim().is_empty() {
                settings.registry = registry.trim().to_string();
            }
        }
        settings
    }
}

/// `$SKPM_HOME`, else `~/.skpm`, else `./.skpm`.
pub fn default_home() -> PathBuf {
    if let Some(home) = std::env::var_os("SKPM_HOME") {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .map(|h| h.join(".skpm"))
        .unwrap_or_else(|| PathBuf::from(".skpm"))
}

fn read_config_file(path: &Path) -> ConfigFile {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("no config.toml at {}, using defaults", path.display());
            return ConfigFile::default();
        }
        Err(err) => {
            tracing::warn!("failed to read {}: {err}, using defaults", path.display());
            return ConfigFile::default();
        }
    };

    match toml::from_str::<ConfigFile>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!("failed to parse {}: {err}, using defaults", path.display());
            ConfigFile::default()
        }
    }
}
