//! Test utilities and mocks for ltt unit tests.
//!
//! In-memory stand-ins for the three external facilities the engine
//! consumes: index pages, package metadata and the driver query.
//!
//! # Example
//!
//! ```rust,ignore
//! use ltt::test_support::{MockFetcher, MockMetadata};
//!
//! let fetcher = MockFetcher::new()
//!     .page("https://download.pytorch.org/whl/cpu/torch/", &["torch-2.0.1%2Bcpu-cp310-cp310-linux_x86_64.whl"]);
//! let metadata = MockMetadata::new().package("kornia", "0.6.0", &["torch>=1.8.1"]);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use url::Url;

use crate::core::{canonicalize_name, DistributionRequirement, PackageVersion};
use crate::hardware::DriverQuery;
use crate::sources::{link_filename, Link, LinkFetcher, Materialized, MetadataSource};

/// Mock index serving fixed pages.
///
/// Unknown pages are empty, like a 404 from a real index. Every request is
/// logged.
#[derive(Debug, Default)]
pub struct MockFetcher {
    pages: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
    requests: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        MockFetcher::default()
    }

    /// Serve `hrefs` on `url`. Hrefs are resolved against the page URL.
    pub fn page(mut self, url: &str, hrefs: &[&str]) -> Self {
        self.pages
            .insert(url.to_string(), hrefs.iter().map(|h| h.to_string()).collect());
        self
    }

    /// Make `url` fail with a transport error.
    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// Pages requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

impl LinkFetcher for MockFetcher {
    fn fetch(&self, page: &Url) -> Result<Vec<Link>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(page.to_string());
        }

        if self.failing.contains(page.as_str()) {
            bail!("connection refused: {}", page);
        }

        let Some(hrefs) = self.pages.get(page.as_str()) else {
            return Ok(Vec::new());
        };

        hrefs
            .iter()
            .map(|href| -> Result<Link> {
                let url = page.join(href)?;
                let filename = link_filename(&url).unwrap_or_default();
                Ok(Link::new(filename, url))
            })
            .collect()
    }
}

/// Mock metadata source with a call log.
#[derive(Debug, Default)]
pub struct MockMetadata {
    packages: HashMap<String, (String, Vec<String>)>,
    calls: Mutex<Vec<String>>,
}

impl MockMetadata {
    pub fn new() -> Self {
        MockMetadata::default()
    }

    /// Register a package that resolves to `version` and depends on `deps`.
    pub fn package(mut self, name: &str, version: &str, deps: &[&str]) -> Self {
        self.packages.insert(
            canonicalize_name(name),
            (version.to_string(), deps.iter().map(|d| d.to_string()).collect()),
        );
        self
    }

    /// Canonical names materialized so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl MetadataSource for MockMetadata {
    fn materialize(&self, requirement: &DistributionRequirement) -> Result<Materialized> {
        let name = requirement.canonical_name();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(name.clone());
        }

        let (version, deps) = self
            .packages
            .get(&name)
            .ok_or_else(|| anyhow!("package `{}` not found", name))?;

        let version: PackageVersion = version.parse()?;
        let dependencies = deps
            .iter()
            .map(|d| d.parse::<DistributionRequirement>())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Materialized {
            name,
            version: Some(version),
            dependencies,
        })
    }
}

/// Mock driver query returning a fixed version, or failing.
#[derive(Debug, Clone)]
pub struct MockDriver {
    version: Option<String>,
}

impl MockDriver {
    pub fn new(version: &str) -> Self {
        MockDriver {
            version: Some(version.to_string()),
        }
    }

    /// A host without a driver.
    pub fn missing() -> Self {
        MockDriver { version: None }
    }
}

impl DriverQuery for MockDriver {
    fn driver_version(&self) -> Result<String> {
        self.version
            .clone()
            .ok_or_else(|| anyhow!("`nvidia-smi` not found in PATH"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_fetcher_resolves_hrefs() {
        let fetcher = MockFetcher::new().page(
            "https://example.com/whl/cpu/torch/",
            &["torch-2.0.1%2Bcpu-cp310-cp310-linux_x86_64.whl", "/abs/torch-1.0.0-py3-none-any.whl"],
        );
        let page = Url::parse("https://example.com/whl/cpu/torch/").unwrap();
        let links = fetcher.fetch(&page).unwrap();

        assert_eq!(links[0].filename, "torch-2.0.1+cpu-cp310-cp310-linux_x86_64.whl");
        assert_eq!(links[1].url.as_str(), "https://example.com/abs/torch-1.0.0-py3-none-any.whl");
        assert_eq!(fetcher.requests().len(), 1);
    }

    #[test]
    fn test_mock_fetcher_failing_and_missing() {
        let fetcher = MockFetcher::new().failing("https://example.com/down/");
        assert!(fetcher.fetch(&Url::parse("https://example.com/down/").unwrap()).is_err());
        assert!(fetcher
            .fetch(&Url::parse("https://example.com/missing/").unwrap())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_mock_metadata() {
        let metadata = MockMetadata::new().package("Kornia", "0.6.0", &["torch>=1.8.1"]);
        let node = metadata.materialize(&"kornia".parse().unwrap()).unwrap();
        assert_eq!(node.dependencies.len(), 1);
        assert_eq!(metadata.calls(), vec!["kornia"]);
        assert!(metadata.materialize(&"numpy".parse().unwrap()).is_err());
    }
}
