//! Backend and channel selection.
//!
//! Backends come from, highest precedence first:
//! 1. the explicit argument (`--computation-backend`, or `--cpuonly`)
//! 2. `LTT_PYTORCH_COMPUTATION_BACKEND`
//! 3. `[backend] computation-backends` in the config file
//! 4. hardware detection
//!
//! The channel follows the same order, with `--pre` selecting the test
//! channel when nothing else chose one.

use std::fmt;

use anyhow::{bail, Context, Result};

use crate::core::{BackendSet, Channel};
use crate::hardware;
use crate::util::context::{BACKEND_ENV, CHANNEL_ENV};
use crate::util::GlobalContext;

/// Where the active backend set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendOrigin {
    Explicit,
    Environment,
    Config,
    Detected,
}

impl fmt::Display for BackendOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BackendOrigin::Explicit => "command line",
            BackendOrigin::Environment => BACKEND_ENV,
            BackendOrigin::Config => "config file",
            BackendOrigin::Detected => "hardware detection",
        };
        f.write_str(s)
    }
}

/// The backend set to resolve against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBackends {
    pub backends: BackendSet,
    pub origin: BackendOrigin,
}

/// Select the backend set for `ctx`, detecting hardware if nothing else
/// chose one.
pub fn resolve_backends(
    ctx: &GlobalContext,
    explicit: Option<&str>,
    cpuonly: bool,
) -> Result<ResolvedBackends> {
    select_backends(
        explicit,
        cpuonly,
        ctx.env_backends().as_deref(),
        ctx.config().backend.computation_backends.as_ref(),
        hardware::detect_compatible_backends,
    )
}

/// Backend selection with every input supplied by the caller.
pub fn select_backends<F>(
    explicit: Option<&str>,
    cpuonly: bool,
    env: Option<&str>,
    config: Option<&BackendSet>,
    detect: F,
) -> Result<ResolvedBackends>
where
    F: FnOnce() -> BackendSet,
{
    let resolved = if cpuonly {
        ResolvedBackends {
            backends: BackendSet::cpu_only(),
            origin: BackendOrigin::Explicit,
        }
    } else if let Some(explicit) = explicit {
        ResolvedBackends {
            backends: BackendSet::parse_list(explicit)
                .context("invalid value for `--computation-backend`")?,
            origin: BackendOrigin::Explicit,
        }
    } else if let Some(env) = env {
        ResolvedBackends {
            backends: BackendSet::parse_list(env)
                .with_context(|| format!("invalid value for {}", BACKEND_ENV))?,
            origin: BackendOrigin::Environment,
        }
    } else if let Some(config) = config.filter(|c| !c.is_empty()) {
        ResolvedBackends {
            backends: config.clone(),
            origin: BackendOrigin::Config,
        }
    } else {
        ResolvedBackends {
            backends: detect(),
            origin: BackendOrigin::Detected,
        }
    };

    check_single_accelerator_family(&resolved)?;
    tracing::debug!(
        "using computation backends {} from {}",
        resolved.backends,
        resolved.origin
    );
    Ok(resolved)
}

/// CUDA and ROCm candidates cannot be ranked against each other, so a set
/// may hold at most one accelerator family besides CPU.
fn check_single_accelerator_family(resolved: &ResolvedBackends) -> Result<()> {
    let mut families: Vec<&str> = resolved
        .backends
        .iter()
        .filter(|b| !b.is_cpu())
        .map(|b| b.family())
        .collect();
    families.dedup();

    if families.len() > 1 {
        bail!(
            "computation backends `{}` from {} mix {}; choose one accelerator family",
            resolved.backends,
            resolved.origin,
            families.join(" and ")
        );
    }
    Ok(())
}

/// Select the release channel for `ctx`.
pub fn resolve_channel(ctx: &GlobalContext, explicit: Option<&str>, pre: bool) -> Result<Channel> {
    select_channel(
        explicit,
        ctx.env_channel().as_deref(),
        ctx.config().index.channel,
        pre,
    )
}

/// Channel selection with every input supplied by the caller.
pub fn select_channel(
    explicit: Option<&str>,
    env: Option<&str>,
    config: Option<Channel>,
    pre: bool,
) -> Result<Channel> {
    if let Some(explicit) = explicit {
        return explicit
            .parse()
            .context("invalid value for `--channel`");
    }
    if let Some(env) = env {
        return env
            .parse()
            .with_context(|| format!("invalid value for {}", CHANNEL_ENV));
    }
    if let Some(config) = config {
        return Ok(config);
    }
    Ok(if pre { Channel::Test } else { Channel::Stable })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ComputationBackend, ParseBackendError};

    fn detected() -> BackendSet {
        BackendSet::parse_list("cpu,cu118").unwrap()
    }

    fn never() -> BackendSet {
        panic!("detection must not run")
    }

    #[test]
    fn test_explicit_wins() {
        let config = BackendSet::parse_list("cu102").unwrap();
        let resolved =
            select_backends(Some("cu111"), false, Some("cpu"), Some(&config), never).unwrap();
        assert_eq!(resolved.origin, BackendOrigin::Explicit);
        assert!(resolved.backends.contains(&ComputationBackend::cuda(11, 1)));
        assert_eq!(resolved.backends.len(), 1);
    }

    #[test]
    fn test_cpuonly_is_explicit_cpu() {
        let resolved = select_backends(Some("cu111"), true, None, None, never).unwrap();
        assert_eq!(resolved.backends, BackendSet::cpu_only());
        assert_eq!(resolved.origin, BackendOrigin::Explicit);
    }

    #[test]
    fn test_env_over_config() {
        let config = BackendSet::parse_list("cu102").unwrap();
        let resolved = select_backends(None, false, Some("cu116,cpu"), Some(&config), never).unwrap();
        assert_eq!(resolved.origin, BackendOrigin::Environment);
        assert_eq!(resolved.backends.to_string(), "cpu,cu116");
    }

    #[test]
    fn test_config_over_detection() {
        let config = BackendSet::parse_list("rocm5.4.2").unwrap();
        let resolved = select_backends(None, false, None, Some(&config), never).unwrap();
        assert_eq!(resolved.origin, BackendOrigin::Config);
    }

    #[test]
    fn test_detection_last() {
        let resolved = select_backends(None, false, None, None, detected).unwrap();
        assert_eq!(resolved.origin, BackendOrigin::Detected);
        assert_eq!(resolved.backends, detected());
    }

    #[test]
    fn test_bad_env_names_variable() {
        let err = select_backends(None, false, Some("gpu"), None, never).unwrap_err();
        assert!(err.to_string().contains(BACKEND_ENV));
        assert!(err.downcast_ref::<ParseBackendError>().is_some());
    }

    #[test]
    fn test_mixed_accelerators_rejected() {
        let err = select_backends(Some("cu118,rocm5.4.2"), false, None, None, never).unwrap_err();
        assert!(err.to_string().contains("cuda and rocm"));
    }

    #[test]
    fn test_channel_precedence() {
        assert_eq!(
            select_channel(Some("nightly"), Some("test"), Some(Channel::Lts), true).unwrap(),
            Channel::Nightly
        );
        assert_eq!(
            select_channel(None, Some("LTS"), Some(Channel::Nightly), false).unwrap(),
            Channel::Lts
        );
        assert_eq!(
            select_channel(None, None, Some(Channel::Nightly), true).unwrap(),
            Channel::Nightly
        );
        assert_eq!(select_channel(None, None, None, true).unwrap(), Channel::Test);
        assert_eq!(select_channel(None, None, None, false).unwrap(), Channel::Stable);
        assert!(select_channel(Some("beta"), None, None, false).is_err());
    }
}
