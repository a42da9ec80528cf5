//! Resolution error types and diagnostics.

use thiserror::Error;

use crate::core::{CrossFamilyComparison, ParseRequirementError};
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Error during family extraction or candidate discovery.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Parse(#[from] ParseRequirementError),

    /// Ranking had to order CUDA against ROCm; the backend filter let a
    /// mixed pair through.
    #[error(transparent)]
    CrossFamily(#[from] CrossFamilyComparison),

    #[error("internal consistency violation: {message}")]
    InternalConsistency { message: String },

    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("failed to read metadata for `{package}`: {message}")]
    Metadata { package: String, message: String },
}

impl ResolveError {
    pub fn internal(message: impl Into<String>) -> Self {
        ResolveError::InternalConsistency {
            message: message.into(),
        }
    }

    /// Whether this error points at a defect rather than bad input.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            ResolveError::CrossFamily(_) | ResolveError::InternalConsistency { .. }
        )
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ResolveError::Parse(e) => Diagnostic::error(e.to_string())
                .with_suggestion("help: Requirements look like `torchvision==0.9.1` or `pkg[extra]>=1.0`"),

            ResolveError::CrossFamily(e) => Diagnostic::error(e.to_string())
                .with_context("candidates of different accelerator families survived filtering")
                .with_suggestion(suggestions::BUG_REPORT),

            ResolveError::InternalConsistency { message } => {
                Diagnostic::error(format!("internal consistency violation: {}", message))
                    .with_suggestion(suggestions::BUG_REPORT)
            }

            ResolveError::Fetch { url, message } => {
                Diagnostic::error(format!("failed to fetch {}", url))
                    .with_context(message.clone())
                    .with_suggestion(suggestions::FETCH_FAILED)
            }

            ResolveError::Metadata { package, message } => {
                Diagnostic::error(format!("failed to read metadata for `{}`", package))
                    .with_context(message.clone())
                    .with_suggestion(suggestions::FETCH_FAILED)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_family_diagnostic() {
        let err = ResolveError::from(CrossFamilyComparison {
            lhs: "cu118".into(),
            rhs: "rocm5.4".into(),
        });
        assert!(err.is_internal());

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("cu118"));
        assert!(output.contains(suggestions::BUG_REPORT));
    }

    #[test]
    fn test_metadata_diagnostic() {
        let err = ResolveError::Metadata {
            package: "numpy".into(),
            message: "HTTP 503".into(),
        };
        assert!(!err.is_internal());

        let output = err.to_diagnostic().format(false);
        assert!(output.starts_with("error: failed to read metadata for `numpy`"));
        assert!(output.contains("  = HTTP 503"));
    }
}
