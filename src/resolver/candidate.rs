//! Artifact candidates and their backend tags.
//!
//! The backend a wheel was built for comes from, in order:
//! 1. the local segment of its version (`1.9.0+cu111`)
//! 2. a backend directory in its URL path (`/whl/cu111/torch-1.9.0-...`)
//! 3. nothing: the wheel is backend independent ("any")
//!
//! How "any" is treated is governed by [`AnyTagPolicy`].

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::{BackendSet, ComputationBackend, PackageVersion};
use crate::sources::Link;

/// A backend directory somewhere in a URL path.
static BACKEND_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/(cpu|cu\d+|rocm\d+(?:\.\d+){1,2})/").expect("backend segment pattern is valid")
});

/// Treatment of backend-independent ("any") wheels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnyTagPolicy {
    /// Tag them `cpu`: they only satisfy requests that include CPU.
    #[default]
    Cpu,
    /// They satisfy every requested backend and rank as CPU.
    Universal,
}

/// Where a candidate's backend tag came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagSource {
    Version,
    Url,
    Untagged,
}

/// One discovered wheel of a family distribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Canonical distribution name.
    pub name: String,
    pub version: PackageVersion,
    pub backend: ComputationBackend,
    pub url: Url,
    pub filename: String,
    pub tag_source: TagSource,
    /// Untagged wheel admitted under [`AnyTagPolicy::Universal`].
    pub universal: bool,
}

impl Candidate {
    /// Build a candidate from an index link, or `None` if the link is not a
    /// wheel.
    pub fn from_link(link: &Link, policy: AnyTagPolicy) -> Option<Candidate> {
        let wheel = link.wheel()?;
        let (backend, tag_source) = infer_backend(&wheel.version, &link.url);
        let universal = tag_source == TagSource::Untagged && policy == AnyTagPolicy::Universal;

        Some(Candidate {
            name: wheel.canonical_name(),
            version: wheel.version,
            backend,
            url: link.url.clone(),
            filename: link.filename.clone(),
            tag_source,
            universal,
        })
    }

    /// Whether this candidate may be installed for the requested backends.
    pub fn satisfies(&self, backends: &BackendSet) -> bool {
        self.universal || backends.contains(&self.backend)
    }

    /// Compare by `(backend, base version)`; ties are broken by the full
    /// public version and then the URL so the order is deterministic.
    ///
    /// Only meaningful when the two backends share an accelerator family
    /// (or one is CPU); CUDA is placed below ROCm otherwise.
    pub fn cmp_rank(&self, other: &Self) -> Ordering {
        self.backend
            .sort_key()
            .cmp(&other.backend.sort_key())
            .then_with(|| self.version.cmp_base(&other.version))
            .then_with(|| self.version.cmp_public(&other.version))
            .then_with(|| self.url.as_str().cmp(other.url.as_str()))
    }
}

impl fmt::Display for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.name, self.version.public(), self.backend)
    }
}

/// Resolve the backend tag of a wheel.
///
/// An untagged wheel is reported as CPU with [`TagSource::Untagged`].
pub fn infer_backend(version: &PackageVersion, url: &Url) -> (ComputationBackend, TagSource) {
    if let Some(local) = version.local() {
        match local.parse::<ComputationBackend>() {
            Ok(backend) => return (backend, TagSource::Version),
            Err(_) => tracing::debug!("local segment `{}` of {} is not a backend", local, url),
        }
    }

    let from_url = BACKEND_SEGMENT
        .captures_iter(url.path())
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .last();
    if let Some(backend) = from_url {
        return (backend, TagSource::Url);
    }

    (ComputationBackend::Cpu, TagSource::Untagged)
}
