//! Configuration file support for ltt.
//!
//! ltt supports two configuration file locations:
//! - Global: `<config dir>/ltt/config.toml` - User-wide defaults
//! - Project: `.ltt/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config.
//!
//! ```toml
//! [backend]
//! computation-backends = ["cu118", "cpu"]
//! any-tag = "cpu"
//!
//! [index]
//! url = "https://download.pytorch.org/whl"
//! channel = "stable"
//!
//! [net]
//! timeout-secs = 30
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::{BackendSet, Channel};
use crate::resolver::candidate::AnyTagPolicy;

/// Default base URL of the backend-partitioned wheel indices.
pub const DEFAULT_INDEX_URL: &str = "https://download.pytorch.org/whl";

/// Default backend-agnostic simple index.
pub const DEFAULT_GENERIC_INDEX_URL: &str = "https://pypi.org/simple";

/// Default JSON API used to read declared dependencies.
pub const DEFAULT_METADATA_URL: &str = "https://pypi.org/pypi";

/// ltt configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend selection settings
    pub backend: BackendConfig,

    /// Index locations
    pub index: IndexConfig,

    /// Network settings
    pub net: NetConfig,
}

/// Backend selection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BackendConfig {
    /// Backends to use instead of hardware detection
    pub computation_backends: Option<BackendSet>,

    /// How untagged, backend-independent wheels are treated
    pub any_tag: Option<AnyTagPolicy>,
}

/// Index locations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IndexConfig {
    /// Base URL of the backend-partitioned indices
    pub url: Option<String>,

    /// Backend-agnostic fallback index
    pub generic_url: Option<String>,

    /// JSON metadata API used when walking dependencies
    pub metadata_url: Option<String>,

    /// Default release channel
    pub channel: Option<Channel>,

    /// LTS release lines, e.g. `["1.8"]`
    pub lts_releases: Option<Vec<String>>,
}

/// Network-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct NetConfig {
    /// HTTP request timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Offline mode (only `file://` locations are read)
    #[serde(default)]
    pub offline: bool,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        // Backend settings
        if other.backend.computation_backends.is_some() {
            self.backend.computation_backends = other.backend.computation_backends;
        }
        if other.backend.any_tag.is_some() {
            self.backend.any_tag = other.backend.any_tag;
        }

        // Index settings
        if other.index.url.is_some() {
            self.index.url = other.index.url;
        }
        if other.index.generic_url.is_some() {
            self.index.generic_url = other.index.generic_url;
        }
        if other.index.metadata_url.is_some() {
            self.index.metadata_url = other.index.metadata_url;
        }
        if other.index.channel.is_some() {
            self.index.channel = other.index.channel;
        }
        if other.index.lts_releases.is_some() {
            self.index.lts_releases = other.index.lts_releases;
        }

        // Net settings
        if other.net.timeout_secs.is_some() {
            self.net.timeout_secs = other.net.timeout_secs;
        }
        if other.net.offline {
            self.net.offline = true;
        }
    }

    /// Base URL of the backend-partitioned indices.
    pub fn index_url(&self) -> &str {
        self.index.url.as_deref().unwrap_or(DEFAULT_INDEX_URL)
    }

    /// Backend-agnostic fallback index.
    pub fn generic_index_url(&self) -> &str {
        self.index
            .generic_url
            .as_deref()
            .unwrap_or(DEFAULT_GENERIC_INDEX_URL)
    }

    /// JSON metadata API.
    pub fn metadata_url(&self) -> &str {
        self.index
            .metadata_url
            .as_deref()
            .unwrap_or(DEFAULT_METADATA_URL)
    }

    /// Policy for untagged wheels.
    pub fn any_tag(&self) -> AnyTagPolicy {
        self.backend.any_tag.unwrap_or_default()
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.ltt/config.toml)
/// 2. Global config (<config dir>/ltt/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            config.merge(Config::load_or_default(global_path));
        }
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global config path (`<config dir>/ltt/config.toml`).
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "ltt").map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Get the project config path (`.ltt/config.toml`).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".ltt").join("config.toml")
}
