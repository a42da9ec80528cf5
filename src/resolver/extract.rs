//! Family membership extraction.
//!
//! Walks an install request and records every family member it needs,
//! directly or through dependencies, without fetching any family artifact.
//! Family nodes are recorded and pruned: the walk continues as if they were
//! already satisfied.

use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{bail, Result};

use crate::core::{DistributionRequirement, Family, PackageVersion, VersionSpecifiers};
use crate::resolver::compat::{CompatError, CompatTable};
use crate::resolver::errors::ResolveError;
use crate::resolver::walk::{RequirementWalker, WalkAction, WalkGraph, WalkOutcome};
use crate::sources::{Materialized, MetadataSource};

/// How the core requirement of an extraction was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorePin {
    /// No family member was required, or the core was required directly.
    NotSynthesized,
    /// Synthesized and pinned from the companions' pins.
    Pinned(PackageVersion),
    /// Synthesized without a pin: some companion is unpinned or unknown to
    /// the compatibility table.
    Unpinned,
    /// Synthesized without a pin: the companions map to several core
    /// versions. The caller decides which one to use.
    Ambiguous(Vec<String>),
}

/// The family members an install request needs.
#[derive(Debug)]
pub struct FamilyExtraction {
    /// Recorded requirements, core first, markers stripped.
    pub requirements: Vec<DistributionRequirement>,
    pub core_pin: CorePin,
    /// Requirement graph of the walk, for explaining why a member is needed.
    pub graph: WalkGraph,
}

impl FamilyExtraction {
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

/// Refuses to materialize family members.
///
/// If the walk callback ever lets a family node through, the guard trips
/// and the extraction fails as an internal consistency violation.
struct FamilyGuard<'a> {
    inner: &'a dyn MetadataSource,
    family: &'a Family,
    tripped: AtomicBool,
}

impl MetadataSource for FamilyGuard<'_> {
    fn materialize(&self, requirement: &DistributionRequirement) -> Result<Materialized> {
        if self.family.contains(requirement.name()) {
            self.tripped.store(true, Ordering::SeqCst);
            bail!("family member `{}` reached materialization", requirement);
        }
        self.inner.materialize(requirement)
    }
}

/// Parse raw request strings.
pub fn parse_requests<S: AsRef<str>>(requests: &[S]) -> Result<Vec<DistributionRequirement>, ResolveError> {
    requests
        .iter()
        .map(|r| r.as_ref().parse().map_err(ResolveError::from))
        .collect()
}

/// Determine the family members `requests` need.
///
/// An empty result is valid and means no family member is needed. When only
/// companions are needed, a core requirement is synthesized and prepended,
/// pinned when every companion pin maps to the same core version.
pub fn extract_family(
    requests: &[DistributionRequirement],
    source: &dyn MetadataSource,
    family: &Family,
    compat: &CompatTable,
) -> Result<FamilyExtraction, ResolveError> {
    let guard = FamilyGuard {
        inner: source,
        family,
        tripped: AtomicBool::new(false),
    };

    let mut recorded: Vec<DistributionRequirement> = Vec::new();
    let walk = RequirementWalker::new(&guard).walk(requests, |node| {
        if family.contains(node.requirement.name()) {
            recorded.push(node.requirement.without_marker());
            WalkAction::Prune
        } else {
            WalkAction::Continue
        }
    });

    if guard.tripped.load(Ordering::SeqCst) {
        return Err(ResolveError::internal(
            "a family member was materialized instead of being recorded",
        ));
    }
    let walk = walk?;
    if walk.outcome != WalkOutcome::Completed {
        return Err(ResolveError::internal("family walk ended without completing"));
    }

    tracing::debug!("recorded {} family members", recorded.len());

    let mut core_pin = CorePin::NotSynthesized;
    if !recorded.is_empty() && !recorded.iter().any(|r| family.is_core(r.name())) {
        core_pin = synthesize_core_pin(&recorded, compat);

        let mut core = DistributionRequirement::new(family.core());
        if let CorePin::Pinned(version) = &core_pin {
            let specifiers: VersionSpecifiers = format!("=={}", version).parse().map_err(|e| {
                ResolveError::internal(format!("unusable core pin `{}`: {}", version, e))
            })?;
            core = core.with_specifiers(specifiers);
        }
        tracing::debug!("synthesized core requirement `{}` ({:?})", core, core_pin);
        recorded.insert(0, core);
    }

    Ok(FamilyExtraction {
        requirements: recorded,
        core_pin,
        graph: walk.graph,
    })
}

fn synthesize_core_pin(companions: &[DistributionRequirement], compat: &CompatTable) -> CorePin {
    let mut versions: Vec<PackageVersion> = Vec::new();
    let mut ambiguous: Vec<String> = Vec::new();

    for companion in companions {
        let Some(pin) = companion.specifiers().pinned() else {
            tracing::debug!("`{}` is not pinned; leaving the core unpinned", companion);
            return CorePin::Unpinned;
        };

        match compat.find_compatible_core_version(companion.name(), pin) {
            Ok(version) => {
                if !versions.iter().any(|v| v.cmp_public(&version).is_eq()) {
                    versions.push(version);
                }
            }
            Err(CompatError::Ambiguous { candidates, .. }) => ambiguous.extend(candidates),
            Err(e) => {
                tracing::debug!("{}; leaving the core unpinned", e);
                return CorePin::Unpinned;
            }
        }
    }

    match (versions.as_slice(), ambiguous.is_empty()) {
        ([version], true) => CorePin::Pinned(version.clone()),
        _ => {
            let mut candidates: Vec<String> = versions.iter().map(|v| v.to_string()).collect();
            for candidate in ambiguous {
                if !candidates.contains(&candidate) {
                    candidates.push(candidate);
                }
            }
            tracing::warn!(
                "companions require different core versions ({}); leaving the core unpinned",
                candidates.join(", ")
            );
            CorePin::Ambiguous(candidates)
        }
    }
}
