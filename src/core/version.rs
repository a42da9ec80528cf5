//! Package versions and version specifiers (PEP 440 subset).
//!
//! Only what backend-aware selection needs is modelled: epoch, release
//! segments, pre/post/dev suffixes and the local segment carrying the backend
//! tag (`1.9.0+cu111`).

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use thiserror::Error;

/// A malformed version or specifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseVersionError {
    #[error("invalid version `{0}`")]
    Version(String),

    #[error("invalid version specifier `{0}`")]
    Specifier(String),
}

/// Pre-release kind, ordered alpha < beta < rc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreRelease {
    Alpha(u64),
    Beta(u64),
    Rc(u64),
}

impl fmt::Display for PreRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreRelease::Alpha(n) => write!(f, "a{}", n),
            PreRelease::Beta(n) => write!(f, "b{}", n),
            PreRelease::Rc(n) => write!(f, "rc{}", n),
        }
    }
}

/// A package version such as `1.13.1`, `2.1.0.dev20230601` or `1.9.0+cu111`.
#[derive(Debug, Clone)]
pub struct PackageVersion {
    epoch: u64,
    release: Vec<u64>,
    pre: Option<PreRelease>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Option<String>,
}

impl PackageVersion {
    /// Create a final release from its segments.
    pub fn from_release(release: impl Into<Vec<u64>>) -> Self {
        PackageVersion {
            epoch: 0,
            release: release.into(),
            pre: None,
            post: None,
            dev: None,
            local: None,
        }
    }

    pub fn release(&self) -> &[u64] {
        &self.release
    }

    /// The local segment, normalized (`cu111`, `cpu`, `rocm5.4.2`).
    pub fn local(&self) -> Option<&str> {
        self.local.as_deref()
    }

    /// A copy with the local segment replaced.
    pub fn with_local(mut self, local: Option<&str>) -> Self {
        self.local = local.map(normalize_local);
        self
    }

    /// Epoch and release only, e.g. `1.9.0` for `1.9.0rc1+cu111`.
    pub fn base_version(&self) -> String {
        let release = join_release(&self.release);
        if self.epoch != 0 {
            format!("{}!{}", self.epoch, release)
        } else {
            release
        }
    }

    /// The version without its local segment.
    pub fn public(&self) -> String {
        let mut s = self.base_version();
        if let Some(pre) = self.pre {
            s.push_str(&pre.to_string());
        }
        if let Some(post) = self.post {
            s.push_str(&format!(".post{}", post));
        }
        if let Some(dev) = self.dev {
            s.push_str(&format!(".dev{}", dev));
        }
        s
    }

    /// Whether this is a pre-release or development release.
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    /// Compare the release segments numerically; `1.0 == 1.0.0`.
    pub fn cmp_base(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| cmp_release(&self.release, &other.release))
    }

    /// Compare everything except the local segment.
    pub fn cmp_public(&self, other: &Self) -> Ordering {
        self.cmp_base(other)
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post_key().cmp(&other.post_key()))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
    }

    // A bare `.devN` sorts before every pre-release of the same release.
    fn pre_key(&self) -> (u8, Option<PreRelease>) {
        match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => (0, None),
            (Some(pre), _, _) => (1, Some(pre)),
            _ => (2, None),
        }
    }

    fn post_key(&self) -> (u8, u64) {
        self.post.map_or((0, 0), |p| (1, p))
    }

    fn dev_key(&self) -> (u8, u64) {
        self.dev.map_or((1, 0), |d| (0, d))
    }

    fn trimmed_release(&self) -> &[u64] {
        let end = self
            .release
            .iter()
            .rposition(|&n| n != 0)
            .map_or(0, |i| i + 1);
        &self.release[..end]
    }
}

fn join_release(release: &[u64]) -> String {
    release
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

fn cmp_release(lhs: &[u64], rhs: &[u64]) -> Ordering {
    let len = lhs.len().max(rhs.len());
    for i in 0..len {
        let a = lhs.get(i).copied().unwrap_or(0);
        let b = rhs.get(i).copied().unwrap_or(0);
        match a.cmp(&b) {
            Ordering::Equal => continue,
            ord => return ord,
        }
    }
    Ordering::Equal
}

fn normalize_local(local: &str) -> String {
    local
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == '_' { '.' } else { c })
        .collect()
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageVersion {
    /// Public version first; a version without a local segment sorts before
    /// the same version with one.
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_public(other)
            .then_with(|| self.local.cmp(&other.local))
    }
}

impl Hash for PackageVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.epoch.hash(state);
        self.trimmed_release().hash(state);
        self.pre.hash(state);
        self.post.hash(state);
        self.dev.hash(state);
        self.local.hash(state);
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.public())?;
        if let Some(local) = &self.local {
            write!(f, "+{}", local)?;
        }
        Ok(())
    }
}

impl FromStr for PackageVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError::Version(s.to_string());
        let lowered = s.trim().to_lowercase();
        let input = lowered.strip_prefix('v').unwrap_or(&lowered);

        let (public, local) = match input.split_once('+') {
            Some((public, local)) => {
                if local.is_empty()
                    || !local
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
                {
                    return Err(err());
                }
                (public, Some(normalize_local(local)))
            }
            None => (input, None),
        };

        let (epoch, rest) = match public.split_once('!') {
            Some((epoch, rest)) => (epoch.parse().map_err(|_| err())?, rest),
            None => (0, public),
        };

        let release_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (release_str, mut suffix) = rest.split_at(release_end);
        let release_str = release_str.trim_end_matches('.');
        if release_str.is_empty() {
            return Err(err());
        }
        let release = release_str
            .split('.')
            .map(|part| part.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| err())?;

        let mut pre = None;
        let mut post = None;
        let mut dev = None;

        while !suffix.is_empty() {
            suffix = suffix.trim_start_matches(['.', '-', '_']);
            if suffix.is_empty() {
                break;
            }

            let label_end = suffix
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(suffix.len());
            let (label, after_label) = suffix.split_at(label_end);
            let after_label = after_label.trim_start_matches(['.', '-', '_']);
            let digits_end = after_label
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(after_label.len());
            let (digits, remaining) = after_label.split_at(digits_end);
            let number = if digits.is_empty() {
                0
            } else {
                digits.parse().map_err(|_| err())?
            };

            match label {
                "a" | "alpha" if pre.is_none() && post.is_none() && dev.is_none() => {
                    pre = Some(PreRelease::Alpha(number))
                }
                "b" | "beta" if pre.is_none() && post.is_none() && dev.is_none() => {
                    pre = Some(PreRelease::Beta(number))
                }
                "rc" | "c" | "pre" | "preview" if pre.is_none() && post.is_none() && dev.is_none() => {
                    pre = Some(PreRelease::Rc(number))
                }
                "post" | "rev" | "r" if post.is_none() && dev.is_none() => post = Some(number),
                "dev" if dev.is_none() => dev = Some(number),
                // Implicit post release: `1.0-1`.
                "" if !digits.is_empty() && post.is_none() && dev.is_none() => post = Some(number),
                _ => return Err(err()),
            }

            suffix = remaining;
        }

        Ok(PackageVersion {
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }
}

/// A comparison operator in a version specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    LessEqual,
    GreaterEqual,
    Less,
    Greater,
    Compatible,
    Arbitrary,
}

impl Operator {
    fn as_str(&self) -> &'static str {
        match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::LessEqual => "<=",
            Operator::GreaterEqual => ">=",
            Operator::Less => "<",
            Operator::Greater => ">",
            Operator::Compatible => "~=",
            Operator::Arbitrary => "===",
        }
    }
}

// Longest operators first so `===` is not read as `==`.
const OPERATORS: [(&str, Operator); 8] = [
    ("===", Operator::Arbitrary),
    ("~=", Operator::Compatible),
    ("==", Operator::Equal),
    ("!=", Operator::NotEqual),
    ("<=", Operator::LessEqual),
    (">=", Operator::GreaterEqual),
    ("<", Operator::Less),
    (">", Operator::Greater),
];

/// A single clause such as `>=1.8` or `==0.9.*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionSpecifier {
    op: Operator,
    raw_version: String,
    version: Option<PackageVersion>,
    wildcard: bool,
}

impl VersionSpecifier {
    pub fn operator(&self) -> Operator {
        self.op
    }

    /// The parsed version, `None` only for `===` against a non-PEP 440 string.
    pub fn version(&self) -> Option<&PackageVersion> {
        self.version.as_ref()
    }

    /// `true` for `==X` without wildcard or `===X`.
    pub fn is_pin(&self) -> bool {
        matches!(self.op, Operator::Equal | Operator::Arbitrary) && !self.wildcard
    }

    /// Whether this clause explicitly names a pre-release.
    pub fn names_prerelease(&self) -> bool {
        self.version.as_ref().is_some_and(|v| v.is_prerelease())
    }

    pub fn contains(&self, candidate: &PackageVersion) -> bool {
        if self.op == Operator::Arbitrary {
            return candidate.to_string() == self.raw_version;
        }

        let Some(version) = &self.version else {
            return false;
        };

        match self.op {
            Operator::Equal => self.matches_equal(version, candidate),
            Operator::NotEqual => !self.matches_equal(version, candidate),
            Operator::LessEqual => candidate.cmp_public(version) != Ordering::Greater,
            Operator::GreaterEqual => candidate.cmp_public(version) != Ordering::Less,
            Operator::Less => candidate.cmp_public(version) == Ordering::Less,
            Operator::Greater => candidate.cmp_public(version) == Ordering::Greater,
            Operator::Compatible => {
                let prefix_len = version.release.len().saturating_sub(1).max(1);
                candidate.cmp_public(version) != Ordering::Less
                    && release_has_prefix(candidate, &version.release[..prefix_len])
            }
            Operator::Arbitrary => unreachable!("handled above"),
        }
    }

    fn matches_equal(&self, version: &PackageVersion, candidate: &PackageVersion) -> bool {
        if self.wildcard {
            return candidate.epoch == version.epoch
                && release_has_prefix(candidate, &version.release);
        }
        if version.local.is_some() {
            candidate == version
        } else {
            candidate.cmp_public(version) == Ordering::Equal
        }
    }
}

fn release_has_prefix(candidate: &PackageVersion, prefix: &[u64]) -> bool {
    prefix
        .iter()
        .enumerate()
        .all(|(i, n)| candidate.release.get(i).copied().unwrap_or(0) == *n)
}

impl fmt::Display for VersionSpecifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.op.as_str(), self.raw_version)?;
        if self.wildcard {
            f.write_str(".*")?;
        }
        Ok(())
    }
}

impl FromStr for VersionSpecifier {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError::Specifier(s.to_string());
        let s_trim = s.trim();

        let (op, rest) = OPERATORS
            .iter()
            .find_map(|(text, op)| s_trim.strip_prefix(text).map(|rest| (*op, rest.trim())))
            .ok_or_else(err)?;
        if rest.is_empty() {
            return Err(err());
        }

        if op == Operator::Arbitrary {
            return Ok(VersionSpecifier {
                op,
                raw_version: rest.to_string(),
                version: rest.parse().ok(),
                wildcard: false,
            });
        }

        let (raw_version, wildcard) = match rest.strip_suffix(".*") {
            Some(prefix) if matches!(op, Operator::Equal | Operator::NotEqual) => (prefix, true),
            Some(_) => return Err(err()),
            None => (rest, false),
        };

        let version: PackageVersion = raw_version.parse().map_err(|_| err())?;
        if op == Operator::Compatible && version.release.len() < 2 {
            return Err(err());
        }

        Ok(VersionSpecifier {
            op,
            raw_version: raw_version.to_string(),
            version: Some(version),
            wildcard,
        })
    }
}

/// A comma-separated conjunction of specifiers; empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct VersionSpecifiers(Vec<VersionSpecifier>);

impl VersionSpecifiers {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VersionSpecifier> {
        self.0.iter()
    }

    pub fn contains(&self, candidate: &PackageVersion) -> bool {
        self.0.iter().all(|spec| spec.contains(candidate))
    }

    /// The pinned version if this is exactly one `==X` clause.
    pub fn pinned(&self) -> Option<&PackageVersion> {
        match self.0.as_slice() {
            [spec] if spec.is_pin() => spec.version(),
            _ => None,
        }
    }

    pub fn names_prerelease(&self) -> bool {
        self.0.iter().any(VersionSpecifier::names_prerelease)
    }

    /// Keep the versions this set contains, dropping pre-releases unless
    /// they are allowed, named explicitly, or the only match.
    pub fn filter<'a, T, F>(&self, items: &'a [T], version_of: F, allow_prereleases: bool) -> Vec<&'a T>
    where
        F: Fn(&T) -> &PackageVersion,
    {
        let matching: Vec<&T> = items
            .iter()
            .filter(|item| self.contains(version_of(item)))
            .collect();

        if allow_prereleases || self.names_prerelease() {
            return matching;
        }

        let finals: Vec<&T> = matching
            .iter()
            .copied()
            .filter(|item| !version_of(item).is_prerelease())
            .collect();
        if finals.is_empty() {
            matching
        } else {
            finals
        }
    }
}

impl fmt::Display for VersionSpecifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|s| s.to_string()).collect();
        f.write_str(&parts.join(","))
    }
}

impl FromStr for VersionSpecifiers {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Ok(VersionSpecifiers::default());
        }
        s.split(',')
            .map(str::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(VersionSpecifiers)
    }
}
