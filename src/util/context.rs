//! Global context for ltt operations.
//!
//! Provides centralized access to configuration, paths, and the environment
//! variables that override configuration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::config::{global_config_path, load_config, project_config_path, Config};

/// Comma-separated backends overriding hardware detection.
pub const BACKEND_ENV: &str = "LTT_PYTORCH_COMPUTATION_BACKEND";

/// Release channel override.
pub const CHANNEL_ENV: &str = "LTT_PYTORCH_CHANNEL";

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Merged configuration
    config: Config,
}

impl GlobalContext {
    /// Create a new GlobalContext, loading configuration relative to the
    /// current directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext with a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        let global = global_config_path();
        let config = load_config(global.as_deref(), &project_config_path(&cwd));

        GlobalContext { cwd, config }
    }

    /// Create a GlobalContext from an explicit configuration.
    pub fn with_config(cwd: PathBuf, config: Config) -> Self {
        GlobalContext { cwd, config }
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the merged configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The backend override from the environment, if set and non-empty.
    pub fn env_backends(&self) -> Option<String> {
        non_empty_env(BACKEND_ENV)
    }

    /// The channel override from the environment, if set and non-empty.
    pub fn env_channel(&self) -> Option<String> {
        non_empty_env(CHANNEL_ENV)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_context_reads_project_config() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(".ltt")).unwrap();
        std::fs::write(
            tmp.path().join(".ltt/config.toml"),
            "[index]\nurl = \"file:///srv/wheels\"\n",
        )
        .unwrap();

        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf());
        assert_eq!(ctx.cwd(), tmp.path());
        assert_eq!(ctx.config().index_url(), "file:///srv/wheels");
    }

    #[test]
    fn test_with_config() {
        let mut config = Config::default();
        config.net.offline = true;

        let ctx = GlobalContext::with_config(PathBuf::from("/tmp"), config);
        assert!(ctx.config().net.offline);
        assert_eq!(ctx.cwd(), Path::new("/tmp"));
    }
}
