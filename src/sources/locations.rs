//! Index locations per backend and release channel.
//!
//! | Channel  | Location                               |
//! |----------|----------------------------------------|
//! | stable   | `{base}/{backend}/`                    |
//! | test     | `{base}/test/{backend}/`               |
//! | nightly  | `{base}/nightly/{backend}/`            |
//! | lts      | `{base}/lts/{release}/{backend}/`      |
//!
//! LTS gets one location per (release, backend) pair; the releases are a
//! short literal list (`1.8` by default) rather than anything derived from
//! the backend set.

use anyhow::{bail, Context, Result};
use url::Url;

use crate::core::{BackendSet, Channel};

/// LTS release lines served by default.
pub const DEFAULT_LTS_RELEASES: &[&str] = &["1.8"];

/// The roots that index locations are derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexLocations {
    base: Url,
    generic: Url,
    lts_releases: Vec<String>,
}

impl IndexLocations {
    /// Create locations from a backend-partitioned base and a generic
    /// simple index.
    pub fn new(base: &str, generic: &str) -> Result<Self> {
        Ok(IndexLocations {
            base: parse_root(base)?,
            generic: parse_root(generic)?,
            lts_releases: DEFAULT_LTS_RELEASES.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Replace the LTS release lines.
    pub fn with_lts_releases(mut self, releases: Vec<String>) -> Self {
        self.lts_releases = releases;
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// The backend-agnostic simple index.
    pub fn generic(&self) -> &Url {
        &self.generic
    }

    pub fn lts_releases(&self) -> &[String] {
        &self.lts_releases
    }

    /// Locations for a backend set on a channel, in backend sort order.
    pub fn locations(&self, backends: &BackendSet, channel: Channel) -> Vec<Url> {
        let paths: Vec<String> = match channel {
            Channel::Stable => backends.iter().map(|b| format!("{}/", b)).collect(),
            Channel::Test | Channel::Nightly => backends
                .iter()
                .map(|b| format!("{}/{}/", channel, b))
                .collect(),
            Channel::Lts => self
                .lts_releases
                .iter()
                .flat_map(|release| {
                    backends
                        .iter()
                        .map(move |b| format!("lts/{}/{}/", release, b))
                })
                .collect(),
        };

        paths
            .iter()
            .filter_map(|path| match self.base.join(path) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!("skipping location `{}{}`: {}", self.base, path, e);
                    None
                }
            })
            .collect()
    }
}

/// A free function form of [`IndexLocations::locations`].
pub fn locations(backends: &BackendSet, channel: Channel, roots: &IndexLocations) -> Vec<Url> {
    roots.locations(backends, channel)
}

/// The project page of `canonical_name` below an index location.
pub fn project_page(location: &Url, canonical_name: &str) -> Result<Url> {
    location
        .join(&format!("{}/", canonical_name))
        .with_context(|| format!("invalid project page for `{}` under {}", canonical_name, location))
}

fn parse_root(s: &str) -> Result<Url> {
    let trimmed = s.trim().trim_end_matches('/');
    let url = Url::parse(&format!("{}/", trimmed))
        .with_context(|| format!("invalid index URL `{}`", s))?;
    if url.cannot_be_a_base() {
        bail!("index URL `{}` cannot contain paths", s);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ComputationBackend;

    fn roots() -> IndexLocations {
        IndexLocations::new("https://download.pytorch.org/whl", "https://pypi.org/simple/").unwrap()
    }

    fn set(list: &str) -> BackendSet {
        BackendSet::parse_list(list).unwrap()
    }

    fn strings(urls: Vec<Url>) -> Vec<String> {
        urls.into_iter().map(|u| u.to_string()).collect()
    }

    #[test]
    fn test_stable_locations_sorted() {
        let urls = roots().locations(&set("cu118,cpu,cu102"), Channel::Stable);
        assert_eq!(
            strings(urls),
            vec![
                "https://download.pytorch.org/whl/cpu/",
                "https://download.pytorch.org/whl/cu102/",
                "https://download.pytorch.org/whl/cu118/",
            ]
        );
    }

    #[test]
    fn test_channel_segment() {
        let urls = roots().locations(&set("cpu"), Channel::Nightly);
        assert_eq!(strings(urls), vec!["https://download.pytorch.org/whl/nightly/cpu/"]);

        let urls = roots().locations(&set("rocm5.4.2"), Channel::Test);
        assert_eq!(strings(urls), vec!["https://download.pytorch.org/whl/test/rocm5.4.2/"]);
    }

    #[test]
    fn test_lts_locations() {
        let roots = roots().with_lts_releases(vec!["1.8".into(), "1.9".into()]);
        let urls = locations(&set("cu111,cpu"), Channel::Lts, &roots);
        assert_eq!(
            strings(urls),
            vec![
                "https://download.pytorch.org/whl/lts/1.8/cpu/",
                "https://download.pytorch.org/whl/lts/1.8/cu111/",
                "https://download.pytorch.org/whl/lts/1.9/cpu/",
                "https://download.pytorch.org/whl/lts/1.9/cu111/",
            ]
        );
    }

    #[test]
    fn test_locations_deterministic() {
        let a: BackendSet = [ComputationBackend::cuda(11, 8), ComputationBackend::Cpu]
            .into_iter()
            .collect();
        let b: BackendSet = [ComputationBackend::Cpu, ComputationBackend::cuda(11, 8)]
            .into_iter()
            .collect();
        assert_eq!(
            roots().locations(&a, Channel::Stable),
            roots().locations(&b, Channel::Stable)
        );
    }

    #[test]
    fn test_project_page() {
        let generic = roots().generic().clone();
        let page = project_page(&generic, "torchdata").unwrap();
        assert_eq!(page.as_str(), "https://pypi.org/simple/torchdata/");
    }

    #[test]
    fn test_file_root() {
        let roots = IndexLocations::new("file:///srv/wheels", "file:///srv/simple").unwrap();
        let urls = roots.locations(&set("cpu"), Channel::Stable);
        assert_eq!(strings(urls), vec!["file:///srv/wheels/cpu/"]);
    }

    #[test]
    fn test_invalid_root() {
        assert!(IndexLocations::new("not a url", "https://pypi.org/simple").is_err());
    }
}
