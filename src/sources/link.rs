//! Index links and wheel filenames.
//!
//! A link is one anchor on an index page. Only wheels are of interest for
//! family members, and from a wheel filename only the distribution name,
//! version and compatibility tags are needed:
//!
//! ```text
//! torch-1.9.0+cu111-cp39-cp39-linux_x86_64.whl
//! {name}-{version}(-{build})?-{python}-{abi}-{platform}.whl
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

use crate::core::{canonicalize_name, PackageVersion};

/// An artifact link discovered on an index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// The decoded filename (last path segment).
    pub filename: String,
    /// Absolute URL, including any `#sha256=` fragment.
    pub url: Url,
}

impl Link {
    pub fn new(filename: impl Into<String>, url: Url) -> Self {
        Link {
            filename: filename.into(),
            url,
        }
    }

    /// Parse the filename as a wheel, if it is one.
    pub fn wheel(&self) -> Option<WheelFilename> {
        self.filename.parse().ok()
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// A filename that is not a well-formed wheel name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("`{0}` is not a wheel filename")]
pub struct ParseWheelError(pub String);

/// The parts of a wheel filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelFilename {
    pub name: String,
    pub version: PackageVersion,
    pub build: Option<String>,
    pub python_tags: Vec<String>,
    pub abi_tags: Vec<String>,
    pub platform_tags: Vec<String>,
}

impl WheelFilename {
    /// PEP 503 normalized distribution name.
    pub fn canonical_name(&self) -> String {
        canonicalize_name(&self.name)
    }
}

impl FromStr for WheelFilename {
    type Err = ParseWheelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseWheelError(s.to_string());

        let stem = s.strip_suffix(".whl").ok_or_else(err)?;
        let parts: Vec<&str> = stem.split('-').collect();

        let (name, version, build, python, abi, platform) = match parts.as_slice() {
            [name, version, python, abi, platform] => {
                (*name, *version, None, *python, *abi, *platform)
            }
            [name, version, build, python, abi, platform] => {
                (*name, *version, Some(*build), *python, *abi, *platform)
            }
            _ => return Err(err()),
        };

        if name.is_empty() {
            return Err(err());
        }
        let version = version.parse().map_err(|_| err())?;
        let tags = |t: &str| t.split('.').map(str::to_string).collect::<Vec<_>>();

        Ok(WheelFilename {
            name: name.to_string(),
            version,
            build: build.map(str::to_string),
            python_tags: tags(python),
            abi_tags: tags(abi),
            platform_tags: tags(platform),
        })
    }
}

/// The Python interpreter and platform wheels must install on.
///
/// Unset fields accept everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetEnvironment {
    python_tag: Option<String>,
    platform: Option<String>,
}

impl TargetEnvironment {
    /// An environment that accepts every wheel.
    pub fn any() -> Self {
        TargetEnvironment::default()
    }

    /// Restrict to a Python version, given as a tag (`cp39`) or as a dotted
    /// version (`3.9`).
    pub fn with_python(mut self, python: &str) -> Self {
        self.python_tag = Some(normalize_python_tag(python));
        self
    }

    /// Restrict to a platform tag such as `linux_x86_64`.
    pub fn with_platform(mut self, platform: &str) -> Self {
        self.platform = Some(platform.trim().replace(['-', '.'], "_").to_lowercase());
        self
    }

    pub fn python_tag(&self) -> Option<&str> {
        self.python_tag.as_deref()
    }

    pub fn platform(&self) -> Option<&str> {
        self.platform.as_deref()
    }

    /// Whether a wheel with these tags installs in this environment.
    pub fn is_compatible(&self, wheel: &WheelFilename) -> bool {
        self.python_matches(&wheel.python_tags) && self.platform_matches(&wheel.platform_tags)
    }

    fn python_matches(&self, tags: &[String]) -> bool {
        let Some(target) = &self.python_tag else {
            return true;
        };
        // `cp39` accepts `cp39`, `py3`, `py39` and `py2.py3`.
        let major = target.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        let major = major.chars().next().map(String::from).unwrap_or_default();
        tags.iter().any(|tag| {
            tag == target
                || tag == &format!("py{}", major)
                || tag == &target.replacen("cp", "py", 1)
        })
    }

    fn platform_matches(&self, tags: &[String]) -> bool {
        let Some(target) = &self.platform else {
            return true;
        };
        tags.iter().any(|tag| tag == "any" || tag == target)
    }
}

fn normalize_python_tag(python: &str) -> String {
    let python = python.trim().to_lowercase();
    if python.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        let digits: String = python.split('.').take(2).collect();
        format!("cp{}", digits)
    } else {
        python
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wheel_filename() {
        let wheel: WheelFilename = "torch-1.9.0+cu111-cp39-cp39-linux_x86_64.whl".parse().unwrap();
        assert_eq!(wheel.name, "torch");
        assert_eq!(wheel.version.public(), "1.9.0");
        assert_eq!(wheel.version.local(), Some("cu111"));
        assert_eq!(wheel.build, None);
        assert_eq!(wheel.python_tags, vec!["cp39"]);
        assert_eq!(wheel.platform_tags, vec!["linux_x86_64"]);
    }

    #[test]
    fn test_parse_wheel_with_build_tag() {
        let wheel: WheelFilename = "torch_tb_profiler-0.4.1-1-py3-none-any.whl".parse().unwrap();
        assert_eq!(wheel.canonical_name(), "torch-tb-profiler");
        assert_eq!(wheel.build.as_deref(), Some("1"));
    }

    #[test]
    fn test_parse_rejects_non_wheels() {
        assert!("torch-1.9.0.tar.gz".parse::<WheelFilename>().is_err());
        assert!("torch-1.9.0-cp39.whl".parse::<WheelFilename>().is_err());
        assert!("torch-notaversion-cp39-cp39-any.whl".parse::<WheelFilename>().is_err());
    }

    #[test]
    fn test_python_tag_normalization() {
        assert_eq!(TargetEnvironment::any().with_python("3.9").python_tag(), Some("cp39"));
        assert_eq!(TargetEnvironment::any().with_python("3.10.4").python_tag(), Some("cp310"));
        assert_eq!(TargetEnvironment::any().with_python("CP38").python_tag(), Some("cp38"));
    }

    #[test]
    fn test_compatibility() {
        let env = TargetEnvironment::any()
            .with_python("3.9")
            .with_platform("linux-x86_64");

        let cp39: WheelFilename = "torch-1.9.0-cp39-cp39-linux_x86_64.whl".parse().unwrap();
        let cp38: WheelFilename = "torch-1.9.0-cp38-cp38-linux_x86_64.whl".parse().unwrap();
        let win: WheelFilename = "torch-1.9.0-cp39-cp39-win_amd64.whl".parse().unwrap();
        let pure: WheelFilename = "torchdata-0.6.0-py3-none-any.whl".parse().unwrap();

        assert!(env.is_compatible(&cp39));
        assert!(!env.is_compatible(&cp38));
        assert!(!env.is_compatible(&win));
        assert!(env.is_compatible(&pure));
        assert!(TargetEnvironment::any().is_compatible(&win));
    }
}
