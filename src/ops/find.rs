//! Implementation of `ltt find`.

use std::collections::BTreeMap;

use anyhow::{Context, Result};

use crate::core::{BackendSet, Channel};
use crate::hardware;
use crate::ops::backends::{resolve_channel, select_backends, ResolvedBackends};
use crate::ops::extract::{extract_with, metadata_source, timeout};
use crate::resolver::{find_candidates, Candidate, FamilyExtraction, FindOptions};
use crate::sources::{HttpIndex, IndexLocations, LinkFetcher, MetadataSource, TargetEnvironment};
use crate::util::GlobalContext;

/// Options for `ltt find`.
#[derive(Debug, Clone, Default)]
pub struct FindRequest {
    /// Install request tokens
    pub requests: Vec<String>,

    /// Comma-separated backends overriding detection
    pub computation_backends: Option<String>,

    /// Shorthand for `--computation-backend cpu`
    pub cpuonly: bool,

    /// Release channel
    pub channel: Option<String>,

    /// Use the test channel unless another channel is chosen
    pub pre: bool,

    /// Target platform tag, e.g. `linux_x86_64`
    pub platform: Option<String>,

    /// Target Python version, e.g. `3.10` or `cp310`
    pub python_version: Option<String>,

    /// Base URL of the backend-partitioned indices
    pub index_url: Option<String>,
}

/// Everything `ltt find` decided and found.
#[derive(Debug)]
pub struct FindOutcome {
    pub backends: ResolvedBackends,
    pub channel: Channel,
    pub extraction: FamilyExtraction,
    pub candidates: BTreeMap<String, Vec<Candidate>>,
}

/// Find candidate wheels for the family members a request needs.
pub fn find(ctx: &GlobalContext, request: &FindRequest) -> Result<FindOutcome> {
    let metadata = metadata_source(ctx)?;
    let fetcher = HttpIndex::new(timeout(ctx), ctx.config().net.offline)?;
    find_with(
        ctx,
        request,
        &metadata,
        &fetcher,
        hardware::detect_compatible_backends,
    )
}

/// [`find`] against explicit facilities.
pub fn find_with<F>(
    ctx: &GlobalContext,
    request: &FindRequest,
    metadata: &dyn MetadataSource,
    fetcher: &dyn LinkFetcher,
    detect: F,
) -> Result<FindOutcome>
where
    F: FnOnce() -> BackendSet,
{
    let config = ctx.config();

    let backends = select_backends(
        request.computation_backends.as_deref(),
        request.cpuonly,
        ctx.env_backends().as_deref(),
        config.backend.computation_backends.as_ref(),
        detect,
    )?;
    let channel = resolve_channel(ctx, request.channel.as_deref(), request.pre)?;

    let extraction = extract_with(&request.requests, metadata)?;

    let options = find_options(ctx, request)?;
    let candidates = if extraction.is_empty() {
        BTreeMap::new()
    } else {
        find_candidates(
            &extraction.requirements,
            &backends.backends,
            channel,
            fetcher,
            &options,
        )?
    };

    Ok(FindOutcome {
        backends,
        channel,
        extraction,
        candidates,
    })
}

fn find_options(ctx: &GlobalContext, request: &FindRequest) -> Result<FindOptions> {
    let config = ctx.config();
    let base = request.index_url.as_deref().unwrap_or(config.index_url());

    let mut roots = IndexLocations::new(base, config.generic_index_url())
        .context("invalid index configuration")?;
    if let Some(releases) = &config.index.lts_releases {
        roots = roots.with_lts_releases(releases.clone());
    }

    let mut environment = TargetEnvironment::any();
    if let Some(python) = &request.python_version {
        environment = environment.with_python(python);
    }
    if let Some(platform) = &request.platform {
        environment = environment.with_platform(platform);
    }

    Ok(FindOptions::new(roots)
        .with_environment(environment)
        .with_any_tag(config.any_tag()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockFetcher, MockMetadata};
    use crate::util::Config;
    use std::path::PathBuf;

    fn ctx() -> GlobalContext {
        let mut config = Config::default();
        config.index.url = Some("https://example.com/whl".to_string());
        config.index.generic_url = Some("https://example.com/simple".to_string());
        GlobalContext::with_config(PathBuf::from("."), config)
    }

    fn request(requests: &[&str]) -> FindRequest {
        FindRequest {
            requests: requests.iter().map(|s| s.to_string()).collect(),
            computation_backends: Some("cu111".to_string()),
            channel: Some("stable".to_string()),
            ..FindRequest::default()
        }
    }

    #[test]
    fn test_find_with_synthesized_core() {
        let fetcher = MockFetcher::new()
            .page(
                "https://example.com/whl/cu111/torch/",
                &[
                    "torch-1.8.1%2Bcu111-cp39-cp39-linux_x86_64.whl",
                    "torch-1.9.0%2Bcu111-cp39-cp39-linux_x86_64.whl",
                ],
            )
            .page(
                "https://example.com/whl/cu111/torchvision/",
                &["torchvision-0.9.1%2Bcu111-cp39-cp39-linux_x86_64.whl"],
            );
        let metadata = MockMetadata::new();

        let outcome = find_with(
            &ctx(),
            &request(&["torchvision==0.9.1"]),
            &metadata,
            &fetcher,
            || panic!("detection must not run"),
        )
        .unwrap();

        assert_eq!(outcome.channel, Channel::Stable);
        let torch = &outcome.candidates["torch"];
        assert_eq!(torch.len(), 1);
        assert_eq!(torch[0].version.to_string(), "1.8.1+cu111");
        assert_eq!(outcome.candidates["torchvision"].len(), 1);
    }

    #[test]
    fn test_find_without_family_members() {
        let fetcher = MockFetcher::new();
        let metadata = MockMetadata::new().package("requests", "2.31.0", &[]);

        let outcome = find_with(
            &ctx(),
            &request(&["requests"]),
            &metadata,
            &fetcher,
            BackendSet::cpu_only,
        )
        .unwrap();
        assert!(outcome.extraction.is_empty());
        assert!(outcome.candidates.is_empty());
        assert!(fetcher.requests().is_empty());
    }

    #[test]
    fn test_find_options_environment() {
        let mut req = request(&[]);
        req.python_version = Some("3.10".to_string());
        req.platform = Some("win_amd64".to_string());
        req.index_url = Some("file:///srv/whl".to_string());

        let options = find_options(&ctx(), &req).unwrap();
        assert_eq!(options.environment.python_tag(), Some("cp310"));
        assert_eq!(options.environment.platform(), Some("win_amd64"));
        assert_eq!(options.roots.base().as_str(), "file:///srv/whl/");
    }
}
