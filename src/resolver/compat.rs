//! Companion to core version compatibility.
//!
//! Companion releases are built against exactly one core release. When an
//! install request only names companions, the table supplies the core
//! version to pin.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use semver::{Version, VersionReq};
use thiserror::Error;

use crate::core::{canonicalize_name, PackageVersion};

/// Known torchvision to torch pairs.
pub static PYTORCH_COMPAT: LazyLock<CompatTable> = LazyLock::new(|| {
    CompatTable::new().with_companion(
        "torchvision",
        [
            ((0, 9, 1), [1, 8, 1]),
            ((0, 9, 0), [1, 8, 0]),
            ((0, 8, 0), [1, 7, 0]),
            ((0, 7, 0), [1, 6, 0]),
            ((0, 6, 1), [1, 5, 1]),
            ((0, 6, 0), [1, 5, 0]),
            ((0, 5, 0), [1, 4, 0]),
            ((0, 4, 2), [1, 3, 1]),
            ((0, 4, 1), [1, 3, 0]),
            ((0, 4, 0), [1, 2, 0]),
            ((0, 3, 0), [1, 1, 0]),
            ((0, 2, 2), [1, 0, 1]),
        ],
    )
});

/// Why no single core version could be derived.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompatError {
    #[error("no compatibility data for `{0}`")]
    UnknownCompanion(String),

    #[error("no compatible core version for `{companion}=={version}`")]
    NoMatch { companion: String, version: String },

    #[error("multiple compatible core versions for `{companion}=={version}`: {}", .candidates.join(", "))]
    Ambiguous {
        companion: String,
        version: String,
        candidates: Vec<String>,
    },
}

type Triple = (u64, u64, u64);

/// Companion version to core version rows, per companion.
#[derive(Debug, Clone, Default)]
pub struct CompatTable {
    companions: BTreeMap<String, Vec<(Version, PackageVersion)>>,
}

impl CompatTable {
    pub fn new() -> Self {
        CompatTable::default()
    }

    /// Add the rows of one companion.
    pub fn with_companion<I, C>(mut self, companion: &str, rows: I) -> Self
    where
        I: IntoIterator<Item = (Triple, C)>,
        C: Into<Vec<u64>>,
    {
        let rows = rows
            .into_iter()
            .map(|(c, core)| (Version::new(c.0, c.1, c.2), PackageVersion::from_release(core)))
            .collect();
        self.companions.insert(canonicalize_name(companion), rows);
        self
    }

    /// The core version a pinned companion release requires.
    ///
    /// A pin matches every row that agrees on the components it spells out,
    /// so `0.9` matches both `0.9.0` and `0.9.1` and is ambiguous.
    pub fn find_compatible_core_version(
        &self,
        companion: &str,
        pin: &PackageVersion,
    ) -> Result<PackageVersion, CompatError> {
        let name = canonicalize_name(companion);
        let rows = self
            .companions
            .get(&name)
            .ok_or_else(|| CompatError::UnknownCompanion(name.clone()))?;

        let no_match = || CompatError::NoMatch {
            companion: name.clone(),
            version: pin.to_string(),
        };

        let req = partial_req(pin).ok_or_else(no_match)?;
        let matches: Vec<&PackageVersion> = rows
            .iter()
            .filter(|(companion_version, _)| req.matches(companion_version))
            .map(|(_, core)| core)
            .collect();

        match matches.as_slice() {
            [] => Err(no_match()),
            [core] => Ok((*core).clone()),
            many => Err(CompatError::Ambiguous {
                companion: name.clone(),
                version: pin.to_string(),
                candidates: many.iter().map(|v| v.to_string()).collect(),
            }),
        }
    }
}

/// `=X`, `=X.Y` or `=X.Y.Z` for a plain release of up to three components.
fn partial_req(pin: &PackageVersion) -> Option<VersionReq> {
    if pin.is_prerelease() || pin.release().len() > 3 || pin.public() != pin.base_version() {
        return None;
    }
    let parts: Vec<String> = pin.release().iter().map(|n| n.to_string()).collect();
    VersionReq::parse(&format!("={}", parts.join("."))).ok()
}
