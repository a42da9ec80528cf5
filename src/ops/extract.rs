//! Implementation of `ltt extract`.

use std::time::Duration;

use anyhow::Result;

use crate::core::PYTORCH;
use crate::resolver::{extract_family, parse_requests, FamilyExtraction, PYTORCH_COMPAT};
use crate::sources::index::DEFAULT_TIMEOUT;
use crate::sources::{MetadataSource, PypiMetadata};
use crate::util::GlobalContext;

/// The metadata source configured for `ctx`.
pub fn metadata_source(ctx: &GlobalContext) -> Result<PypiMetadata> {
    let config = ctx.config();
    PypiMetadata::new(config.metadata_url(), timeout(ctx), config.net.offline)
}

/// The HTTP timeout configured for `ctx`.
pub fn timeout(ctx: &GlobalContext) -> Duration {
    ctx.config()
        .net
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TIMEOUT)
}

/// Extract the PyTorch family members `requests` need.
pub fn extract(ctx: &GlobalContext, requests: &[String]) -> Result<FamilyExtraction> {
    let source = metadata_source(ctx)?;
    extract_with(requests, &source)
}

/// Extract against an explicit metadata source.
pub fn extract_with(requests: &[String], source: &dyn MetadataSource) -> Result<FamilyExtraction> {
    let requests = parse_requests(requests)?;
    let extraction = extract_family(&requests, source, &PYTORCH, &PYTORCH_COMPAT)?;
    Ok(extraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::ResolveError;
    use crate::test_support::MockMetadata;

    #[test]
    fn test_extract_with() {
        let source = MockMetadata::new().package("kornia", "0.6.0", &["torch>=1.8.1"]);
        let extraction =
            extract_with(&["kornia".to_string(), "torchvision".to_string()], &source).unwrap();
        let names: Vec<String> = extraction
            .requirements
            .iter()
            .map(|r| r.to_string())
            .collect();
        assert_eq!(names, vec!["torchvision", "torch>=1.8.1"]);
    }

    #[test]
    fn test_extract_parse_error_keeps_type() {
        let source = MockMetadata::new();
        let err = extract_with(&["[broken".to_string()], &source).unwrap_err();
        assert!(err.downcast_ref::<ResolveError>().is_some());
    }

    #[test]
    fn test_timeout_default() {
        let ctx = GlobalContext::with_config(std::path::PathBuf::from("."), Default::default());
        assert_eq!(timeout(&ctx), DEFAULT_TIMEOUT);
    }
}
