//! Distribution requirements (PEP 508 subset).
//!
//! ```text
//! torchvision==0.9.1
//! torch[opt-einsum] >=1.13, <2.0 ; python_version >= "3.8"
//! torchaudio @ https://download.pytorch.org/whl/cpu/torchaudio-2.0.1%2Bcpu-cp310-cp310-linux_x86_64.whl
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::core::version::{ParseVersionError, VersionSpecifiers};

/// A malformed requirement string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseRequirementError {
    #[error("invalid requirement `{0}`: missing distribution name")]
    MissingName(String),

    #[error("invalid requirement `{requirement}`: {message}")]
    Malformed { requirement: String, message: String },

    #[error("invalid requirement `{requirement}`: {source}")]
    Version {
        requirement: String,
        #[source]
        source: ParseVersionError,
    },
}

/// Matches `extra == "name"` (either quote style, either operand order).
static EXTRA_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"extra\s*==\s*["']([^"']+)["']|["']([^"']+)["']\s*==\s*extra"#)
        .expect("extra marker pattern is valid")
});

/// A distribution name plus optional extras, version constraint, direct URL
/// and environment marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DistributionRequirement {
    name: String,
    extras: Vec<String>,
    specifiers: VersionSpecifiers,
    url: Option<String>,
    marker: Option<String>,
}

impl DistributionRequirement {
    /// A bare requirement on `name`.
    pub fn new(name: impl Into<String>) -> Self {
        DistributionRequirement {
            name: name.into(),
            extras: Vec::new(),
            specifiers: VersionSpecifiers::default(),
            url: None,
            marker: None,
        }
    }

    /// Replace the version constraint.
    pub fn with_specifiers(mut self, specifiers: VersionSpecifiers) -> Self {
        self.specifiers = specifiers;
        self
    }

    /// The name as written.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The PEP 503 normalized name.
    pub fn canonical_name(&self) -> String {
        canonicalize_name(&self.name)
    }

    pub fn extras(&self) -> &[String] {
        &self.extras
    }

    pub fn specifiers(&self) -> &VersionSpecifiers {
        &self.specifiers
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    /// The same requirement without its environment marker.
    pub fn without_marker(&self) -> Self {
        DistributionRequirement {
            marker: None,
            ..self.clone()
        }
    }

    /// Extras referenced by `extra == "..."` clauses of the marker.
    pub fn marker_extras(&self) -> Vec<String> {
        let Some(marker) = &self.marker else {
            return Vec::new();
        };
        EXTRA_MARKER
            .captures_iter(marker)
            .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
            .map(|m| canonicalize_name(m.as_str()))
            .collect()
    }

    /// Whether a dependency declared with this requirement is active when its
    /// dependent was requested with `active_extras`.
    ///
    /// Only `extra` markers are evaluated; every other marker is assumed to
    /// hold on the target environment.
    pub fn applies_to(&self, active_extras: &[String]) -> bool {
        let referenced = self.marker_extras();
        referenced.is_empty()
            || referenced
                .iter()
                .any(|extra| active_extras.iter().any(|a| canonicalize_name(a) == *extra))
    }
}

impl fmt::Display for DistributionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        if let Some(url) = &self.url {
            write!(f, " @ {}", url)?;
            if self.marker.is_some() {
                f.write_str(" ")?;
            }
        } else {
            write!(f, "{}", self.specifiers)?;
        }
        if let Some(marker) = &self.marker {
            write!(f, "; {}", marker)?;
        }
        Ok(())
    }
}

impl FromStr for DistributionRequirement {
    type Err = ParseRequirementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |message: &str| ParseRequirementError::Malformed {
            requirement: s.to_string(),
            message: message.to_string(),
        };

        let (body, marker) = split_marker(s);
        let body = body.trim();

        let name_end = body
            .find(|c: char| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
            .unwrap_or(body.len());
        let name = &body[..name_end];
        if name.is_empty() || !name.starts_with(|c: char| c.is_ascii_alphanumeric()) {
            return Err(ParseRequirementError::MissingName(s.to_string()));
        }
        let mut rest = body[name_end..].trim_start();

        let mut extras = Vec::new();
        if let Some(after) = rest.strip_prefix('[') {
            let close = after.find(']').ok_or_else(|| malformed("unclosed extras"))?;
            extras = after[..close]
                .split(',')
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string)
                .collect();
            rest = after[close + 1..].trim_start();
        }

        let mut url = None;
        let mut specifiers = VersionSpecifiers::default();

        if let Some(after) = rest.strip_prefix('@') {
            let target = after.trim();
            if target.is_empty() || target.contains(char::is_whitespace) {
                return Err(malformed("invalid direct reference"));
            }
            url = Some(target.to_string());
        } else if !rest.is_empty() {
            let spec = match rest.strip_prefix('(') {
                Some(inner) => inner
                    .strip_suffix(')')
                    .ok_or_else(|| malformed("unclosed version constraint"))?,
                None => rest,
            };
            specifiers = spec.parse().map_err(|source| ParseRequirementError::Version {
                requirement: s.to_string(),
                source,
            })?;
        }

        Ok(DistributionRequirement {
            name: name.to_string(),
            extras,
            specifiers,
            url,
            marker,
        })
    }
}

/// Split off the environment marker.
///
/// A direct URL may itself contain `;`, so for `name @ url` forms the marker
/// separator must be preceded by whitespace.
fn split_marker(s: &str) -> (&str, Option<String>) {
    let separator = if s.contains('@') {
        s.find(" ;").map(|i| (i, i + 2))
    } else {
        s.find(';').map(|i| (i, i + 1))
    };

    match separator {
        Some((end, start)) => {
            let marker = s[start..].trim();
            let marker = (!marker.is_empty()).then(|| marker.to_string());
            (&s[..end], marker)
        }
        None => (s, None),
    }
}

/// Normalize a distribution name: lowercase, runs of `-_.` become `-`.
pub fn canonicalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_separator = false;
    for c in name.trim().chars() {
        if matches!(c, '-' | '_' | '.') {
            pending_separator = true;
            continue;
        }
        if pending_separator && !out.is_empty() {
            out.push('-');
        }
        pending_separator = false;
        out.push(c.to_ascii_lowercase());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(s: &str) -> DistributionRequirement {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_bare_and_pinned() {
        let r = req("torch");
        assert_eq!(r.name(), "torch");
        assert!(r.specifiers().is_empty());
        assert_eq!(r.to_string(), "torch");

        let r = req("torchvision==0.9.1");
        assert_eq!(r.name(), "torchvision");
        assert_eq!(r.specifiers().to_string(), "==0.9.1");
        assert_eq!(r.to_string(), "torchvision==0.9.1");
    }

    #[test]
    fn test_parse_extras_spaces_and_marker() {
        let r = req("torch[opt-einsum] >= 1.13, <2.0 ; python_version >= \"3.8\"");
        assert_eq!(r.extras(), &["opt-einsum".to_string()]);
        assert_eq!(r.specifiers().to_string(), ">=1.13,<2.0");
        assert_eq!(r.marker(), Some("python_version >= \"3.8\""));
        assert_eq!(r.without_marker().to_string(), "torch[opt-einsum]>=1.13,<2.0");
    }

    #[test]
    fn test_parse_parenthesized() {
        let r = req("torch (>=1.8)");
        assert_eq!(r.specifiers().to_string(), ">=1.8");
    }

    #[test]
    fn test_parse_direct_url() {
        let r = req("torchaudio @ https://example.com/a;b/torchaudio-2.0.1-py3-none-any.whl");
        assert_eq!(
            r.url(),
            Some("https://example.com/a;b/torchaudio-2.0.1-py3-none-any.whl")
        );
        assert!(r.marker().is_none());

        let r = req("torchaudio @ https://example.com/t.whl ; sys_platform == \"linux\"");
        assert_eq!(r.url(), Some("https://example.com/t.whl"));
        assert_eq!(r.marker(), Some("sys_platform == \"linux\""));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "".parse::<DistributionRequirement>(),
            Err(ParseRequirementError::MissingName(_))
        ));
        assert!(matches!(
            ">=1.0".parse::<DistributionRequirement>(),
            Err(ParseRequirementError::MissingName(_))
        ));
        assert!(matches!(
            "torch[cuda".parse::<DistributionRequirement>(),
            Err(ParseRequirementError::Malformed { .. })
        ));
        assert!(matches!(
            "torch=1.0".parse::<DistributionRequirement>(),
            Err(ParseRequirementError::Version { .. })
        ));
    }

    #[test]
    fn test_canonicalize_name() {
        assert_eq!(canonicalize_name("Torch_Model.Archiver"), "torch-model-archiver");
        assert_eq!(canonicalize_name("torch__tb--profiler"), "torch-tb-profiler");
        assert_eq!(req("TorchVision").canonical_name(), "torchvision");
    }

    #[test]
    fn test_extra_markers() {
        let r = req("torchvision ; extra == 'vision'");
        assert_eq!(r.marker_extras(), vec!["vision".to_string()]);
        assert!(!r.applies_to(&[]));
        assert!(r.applies_to(&["Vision".to_string()]));

        let plain = req("numpy ; python_version >= \"3.8\"");
        assert!(plain.applies_to(&[]));
    }
}
