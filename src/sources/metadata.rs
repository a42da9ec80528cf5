//! Declared-dependency metadata.
//!
//! The family walker needs, for every non-family node, the version a request
//! resolves to and the requirements that version declares. [`PypiMetadata`]
//! reads both from the PyPI JSON API without downloading any artifact.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use url::Url;

use crate::core::{DistributionRequirement, PackageVersion};

/// A materialized walk node: the version a requirement resolved to and its
/// declared dependencies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    pub name: String,
    pub version: Option<PackageVersion>,
    pub dependencies: Vec<DistributionRequirement>,
}

impl Materialized {
    /// A node with nothing further to walk.
    pub fn leaf(name: impl Into<String>) -> Self {
        Materialized {
            name: name.into(),
            version: None,
            dependencies: Vec::new(),
        }
    }
}

/// Resolves a requirement to a version and its declared dependencies.
pub trait MetadataSource: Send + Sync {
    fn materialize(&self, requirement: &DistributionRequirement) -> Result<Materialized>;
}

#[derive(Debug, Deserialize)]
struct ProjectJson {
    info: InfoJson,
    #[serde(default)]
    releases: HashMap<String, Vec<FileJson>>,
}

#[derive(Debug, Deserialize)]
struct InfoJson {
    version: String,
    #[serde(default)]
    requires_dist: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct FileJson {
    #[serde(default)]
    yanked: bool,
}

/// Metadata read from a PyPI-compatible JSON API (`{base}/{name}/json`).
///
/// A `file://` base reads a mirror of that layout from disk, also in
/// offline mode.
#[derive(Debug, Clone)]
pub struct PypiMetadata {
    client: reqwest::blocking::Client,
    base: Url,
    offline: bool,
}

impl PypiMetadata {
    pub fn new(base: &str, timeout: Duration, offline: bool) -> Result<Self> {
        let base = Url::parse(&format!("{}/", base.trim().trim_end_matches('/')))
            .with_context(|| format!("invalid metadata URL `{}`", base))?;
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ltt/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(PypiMetadata {
            client,
            base,
            offline,
        })
    }

    fn get(&self, path: &str) -> Result<ProjectJson> {
        let url = self
            .base
            .join(path)
            .with_context(|| format!("invalid metadata path `{}`", path))?;

        if url.scheme() == "file" {
            return read_local(&url);
        }
        if self.offline {
            bail!("cannot fetch metadata for `{}` in offline mode", path);
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .with_context(|| format!("failed to fetch {}", url))?;

        if !response.status().is_success() {
            bail!("failed to fetch {}: HTTP {}", url, response.status());
        }

        response
            .json()
            .with_context(|| format!("failed to parse metadata from {}", url))
    }
}

impl MetadataSource for PypiMetadata {
    fn materialize(&self, requirement: &DistributionRequirement) -> Result<Materialized> {
        let name = requirement.canonical_name();

        if requirement.url().is_some() {
            tracing::debug!("not expanding direct reference `{}`", requirement);
            return Ok(Materialized::leaf(name));
        }

        let project = self.get(&format!("{}/json", name))?;
        let version = select_release(&project, requirement)
            .with_context(|| format!("no release of `{}` satisfies `{}`", name, requirement))?;

        let requires_dist = if version.to_string() == project.info.version {
            project.info.requires_dist
        } else {
            self.get(&format!("{}/{}/json", name, version))?
                .info
                .requires_dist
        };

        let dependencies = requires_dist
            .unwrap_or_default()
            .iter()
            .filter_map(|raw| match raw.parse::<DistributionRequirement>() {
                Ok(req) => Some(req),
                Err(e) => {
                    tracing::warn!("ignoring dependency of `{}`: {}", name, e);
                    None
                }
            })
            .collect();

        Ok(Materialized {
            name,
            version: Some(version),
            dependencies,
        })
    }
}

/// Read a mirrored JSON document from disk.
fn read_local(url: &Url) -> Result<ProjectJson> {
    let path = url
        .to_file_path()
        .map_err(|_| anyhow::anyhow!("invalid file URL {}", url))?;
    let body = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&body).with_context(|| format!("failed to parse metadata from {}", path.display()))
}

/// The newest non-yanked release satisfying the requirement.
fn select_release(project: &ProjectJson, requirement: &DistributionRequirement) -> Option<PackageVersion> {
    let available: Vec<PackageVersion> = project
        .releases
        .iter()
        .filter(|(_, files)| files.is_empty() || files.iter().any(|f| !f.yanked))
        .filter_map(|(v, _)| v.parse().ok())
        .collect();

    requirement
        .specifiers()
        .filter(&available, |v| v, false)
        .into_iter()
        .max()
        .cloned()
        .or_else(|| {
            // Projects that only publish `info` still describe their latest
            // release.
            let latest: PackageVersion = project.info.version.parse().ok()?;
            (available.is_empty() && requirement.specifiers().contains(&latest)).then_some(latest)
        })
}
