//! Candidate discovery and selection.
//!
//! For every family distribution:
//! 1. fetch the project page below each backend location of the channel
//! 2. tag each wheel with a backend and drop wheels for other backends
//! 3. drop wheels the target environment or the version constraint rejects
//! 4. rank the rest by `(backend, base version)`, best first
//!
//! On the stable channel a distribution with no candidates is looked up
//! once more on the generic index. Distributions are independent, so they
//! are discovered in parallel.

use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;
use url::Url;

use crate::core::{BackendSet, Channel, CrossFamilyComparison, DistributionRequirement, Family, PYTORCH};
use crate::resolver::candidate::{AnyTagPolicy, Candidate};
use crate::resolver::errors::ResolveError;
use crate::sources::{
    link_filename, project_page, IndexLocations, Link, LinkFetcher, TargetEnvironment,
};

/// Settings for [`find_candidates`].
#[derive(Debug, Clone)]
pub struct FindOptions {
    pub roots: IndexLocations,
    pub environment: TargetEnvironment,
    pub any_tag: AnyTagPolicy,
    pub family: Family,
}

impl FindOptions {
    pub fn new(roots: IndexLocations) -> Self {
        FindOptions {
            roots,
            environment: TargetEnvironment::any(),
            any_tag: AnyTagPolicy::default(),
            family: PYTORCH.clone(),
        }
    }

    pub fn with_environment(mut self, environment: TargetEnvironment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_any_tag(mut self, policy: AnyTagPolicy) -> Self {
        self.any_tag = policy;
        self
    }

    pub fn with_family(mut self, family: Family) -> Self {
        self.family = family;
        self
    }
}

/// Find the acceptable candidates of each distribution, best first.
///
/// Every distribution appears in the result; an empty list means nothing
/// matched. Duplicate requirements on the same name keep the first.
pub fn find_candidates(
    requirements: &[DistributionRequirement],
    backends: &BackendSet,
    channel: Channel,
    fetcher: &dyn LinkFetcher,
    options: &FindOptions,
) -> Result<BTreeMap<String, Vec<Candidate>>, ResolveError> {
    let mut seen = HashSet::new();
    let unique: Vec<&DistributionRequirement> = requirements
        .iter()
        .filter(|r| seen.insert(r.canonical_name()))
        .collect();

    tracing::debug!(
        "finding {} distributions for backends {} on the {} channel",
        unique.len(),
        backends,
        channel
    );

    let found = unique
        .par_iter()
        .map(|requirement| {
            let candidates = discover(requirement, backends, channel, fetcher, options)?;
            Ok((requirement.canonical_name(), candidates))
        })
        .collect::<Result<Vec<_>, ResolveError>>()?;

    Ok(found.into_iter().collect())
}

/// The best candidate of each distribution that has one.
pub fn select_best(found: &BTreeMap<String, Vec<Candidate>>) -> BTreeMap<String, &Candidate> {
    found
        .iter()
        .filter_map(|(name, candidates)| candidates.first().map(|best| (name.clone(), best)))
        .collect()
}

fn discover(
    requirement: &DistributionRequirement,
    backends: &BackendSet,
    channel: Channel,
    fetcher: &dyn LinkFetcher,
    options: &FindOptions,
) -> Result<Vec<Candidate>, ResolveError> {
    let name = requirement.canonical_name();

    if let Some(direct) = requirement.url() {
        return discover_direct(requirement, direct, backends, options);
    }

    let generic_page = || {
        project_page(options.roots.generic(), &name).map_err(|e| ResolveError::Fetch {
            url: options.roots.generic().to_string(),
            message: format!("{:#}", e),
        })
    };

    let pages = if options.family.uses_generic_index(&name, channel) {
        vec![generic_page()?]
    } else {
        options
            .roots
            .locations(backends, channel)
            .iter()
            .map(|location| {
                project_page(location, &name).map_err(|e| ResolveError::Fetch {
                    url: location.to_string(),
                    message: format!("{:#}", e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    let (links, mut failure) = fetch_all(fetcher, &pages);
    let mut candidates = accept(requirement, links, backends, channel, options)?;

    if candidates.is_empty() && channel == Channel::Stable && !options.family.uses_generic_index(&name, channel) {
        let page = generic_page()?;
        tracing::debug!("no candidates for `{}`; falling back to {}", name, page);
        let (links, generic_failure) = fetch_all(fetcher, std::slice::from_ref(&page));
        failure = failure.or(generic_failure);
        candidates = accept(requirement, links, backends, channel, options)?;
    }

    if candidates.is_empty() {
        if let Some(error) = failure {
            return Err(error);
        }
    }

    tracing::debug!("{} candidates for `{}`", candidates.len(), name);
    Ok(candidates)
}

fn discover_direct(
    requirement: &DistributionRequirement,
    direct: &str,
    backends: &BackendSet,
    options: &FindOptions,
) -> Result<Vec<Candidate>, ResolveError> {
    let url = Url::parse(direct).map_err(|e| ResolveError::Fetch {
        url: direct.to_string(),
        message: e.to_string(),
    })?;
    let Some(filename) = link_filename(&url) else {
        return Ok(Vec::new());
    };

    let candidate = Candidate::from_link(&Link::new(filename, url), options.any_tag)
        .filter(|c| c.name == requirement.canonical_name())
        .filter(|c| c.satisfies(backends));
    Ok(candidate.into_iter().collect())
}

/// Fetch every page, keeping the first failure. A failing page never stops
/// the others.
fn fetch_all(fetcher: &dyn LinkFetcher, pages: &[Url]) -> (Vec<Link>, Option<ResolveError>) {
    let mut links = Vec::new();
    let mut failure = None;

    for page in pages {
        match fetcher.fetch(page) {
            Ok(found) => links.extend(found),
            Err(e) => {
                tracing::warn!("failed to fetch {}: {:#}", page, e);
                failure.get_or_insert(ResolveError::Fetch {
                    url: page.to_string(),
                    message: format!("{:#}", e),
                });
            }
        }
    }

    (links, failure)
}

/// Filter the links down to acceptable candidates, best first.
fn accept(
    requirement: &DistributionRequirement,
    links: Vec<Link>,
    backends: &BackendSet,
    channel: Channel,
    options: &FindOptions,
) -> Result<Vec<Candidate>, ResolveError> {
    let name = requirement.canonical_name();
    let mut urls = HashSet::new();

    let tagged: Vec<Candidate> = links
        .iter()
        .filter(|link| {
            link.wheel()
                .is_some_and(|wheel| options.environment.is_compatible(&wheel))
        })
        .filter_map(|link| Candidate::from_link(link, options.any_tag))
        .filter(|c| c.name == name)
        .filter(|c| c.satisfies(backends))
        .filter(|c| urls.insert(c.url.to_string()))
        .collect();

    let allow_prereleases = matches!(channel, Channel::Test | Channel::Nightly);
    let mut candidates: Vec<Candidate> = requirement
        .specifiers()
        .filter(&tagged, |c| &c.version, allow_prereleases)
        .into_iter()
        .cloned()
        .collect();

    rank(&mut candidates)?;
    Ok(candidates)
}

/// Sort best first. Fails if two candidates belong to different accelerator
/// families; the sort itself only ever sees one family besides CPU.
fn rank(candidates: &mut [Candidate]) -> Result<(), CrossFamilyComparison> {
    let mut accelerators = candidates
        .iter()
        .map(|c| &c.backend)
        .filter(|b| !b.is_cpu());
    if let Some(first) = accelerators.next() {
        if let Some(other) = accelerators.find(|b| b.family() != first.family()) {
            first.try_cmp(other)?;
        }
    }

    candidates.sort_by(|a, b| b.cmp_rank(a));
    Ok(())
}
