//! Computation backends - the runtime a binary wheel was compiled against.
//!
//! A backend is identified by its canonical string, the same string PyTorch
//! embeds as the local version specifier of a wheel (`1.9.0+cu111`):
//!
//! | Backend | Canonical form          |
//! |---------|-------------------------|
//! | CPU     | `cpu`                   |
//! | CUDA    | `cu{major}{minor}`      |
//! | ROCm    | `rocm{major}.{minor}[.{patch}]` |
//!
//! Equality and hashing go through the canonical string. Ordering is only
//! partial: CPU sorts below everything, CUDA and ROCm order within their own
//! family, and a CUDA/ROCm comparison is refused with [`CrossFamilyComparison`].

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A malformed backend string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unable to parse `{0}` into a computation backend")]
pub struct ParseBackendError(pub String);

/// Attempt to order a CUDA backend against a ROCm backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("refusing to order `{lhs}` and `{rhs}`: CUDA and ROCm backends are not comparable")]
pub struct CrossFamilyComparison {
    pub lhs: String,
    pub rhs: String,
}

/// A computation backend.
#[derive(Debug, Clone, Copy)]
pub enum ComputationBackend {
    Cpu,
    Cuda { major: u32, minor: u32 },
    Rocm { major: u32, minor: u32, patch: Option<u32> },
}

impl ComputationBackend {
    /// Create a CUDA backend.
    pub fn cuda(major: u32, minor: u32) -> Self {
        ComputationBackend::Cuda { major, minor }
    }

    /// Create a ROCm backend.
    pub fn rocm(major: u32, minor: u32, patch: Option<u32>) -> Self {
        ComputationBackend::Rocm {
            major,
            minor,
            patch,
        }
    }

    /// The canonical string, also used as the wheel local specifier.
    pub fn local_specifier(&self) -> String {
        self.to_string()
    }

    pub fn is_cpu(&self) -> bool {
        matches!(self, ComputationBackend::Cpu)
    }

    /// Short family name used in messages (`cpu`, `cuda`, `rocm`).
    pub fn family(&self) -> &'static str {
        match self {
            ComputationBackend::Cpu => "cpu",
            ComputationBackend::Cuda { .. } => "cuda",
            ComputationBackend::Rocm { .. } => "rocm",
        }
    }

    /// Compare two backends.
    ///
    /// Fails when one side is CUDA and the other ROCm. Backends with equal
    /// canonical strings always compare equal.
    pub fn try_cmp(&self, other: &Self) -> Result<Ordering, CrossFamilyComparison> {
        use ComputationBackend::*;

        if self == other {
            return Ok(Ordering::Equal);
        }

        match (self, other) {
            (Cpu, _) => Ok(Ordering::Less),
            (_, Cpu) => Ok(Ordering::Greater),
            (
                Cuda { major, minor },
                Cuda {
                    major: other_major,
                    minor: other_minor,
                },
            ) => Ok(canonical_cuda(*major, *minor)
                .cmp(&canonical_cuda(*other_major, *other_minor))),
            (
                Rocm {
                    major,
                    minor,
                    patch,
                },
                Rocm {
                    major: other_major,
                    minor: other_minor,
                    patch: other_patch,
                },
            ) => Ok((major, minor)
                .cmp(&(other_major, other_minor))
                .then_with(|| cmp_rocm_patch(*patch, *other_patch))),
            _ => Err(CrossFamilyComparison {
                lhs: self.to_string(),
                rhs: other.to_string(),
            }),
        }
    }

    /// Total ordering key used only to iterate backend sets deterministically.
    ///
    /// Families are grouped CPU, CUDA, ROCm; within a family the key agrees
    /// with [`try_cmp`](Self::try_cmp).
    pub fn sort_key(&self) -> (u8, u64, u64, u64) {
        match *self {
            ComputationBackend::Cpu => (0, 0, 0, 0),
            ComputationBackend::Cuda { major, minor } => {
                let (major, minor) = canonical_cuda(major, minor);
                (1, major, minor, 0)
            }
            ComputationBackend::Rocm {
                major,
                minor,
                patch,
            } => (
                2,
                u64::from(major),
                u64::from(minor),
                patch.map_or(u64::MAX, u64::from),
            ),
        }
    }
}

/// The `(major, minor)` pair of the canonical `cu{major}{minor}` string,
/// whose last digit is the minor version. `(1, 11)` and `(11, 1)` both map
/// to `(11, 1)`.
fn canonical_cuda(major: u32, minor: u32) -> (u64, u64) {
    let scale = 10u128.pow(minor.checked_ilog10().unwrap_or(0) + 1);
    let digits = u128::from(major) * scale + u128::from(minor);
    // At most 20 decimal digits, so the quotient fits.
    ((digits / 10) as u64, (digits % 10) as u64)
}

/// An absent patch means "latest revision" and sorts after any pinned patch.
fn cmp_rocm_patch(lhs: Option<u32>, rhs: Option<u32>) -> Ordering {
    match (lhs, rhs) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl fmt::Display for ComputationBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputationBackend::Cpu => write!(f, "cpu"),
            ComputationBackend::Cuda { major, minor } => write!(f, "cu{}{}", major, minor),
            ComputationBackend::Rocm {
                major,
                minor,
                patch: Some(patch),
            } => write!(f, "rocm{}.{}.{}", major, minor, patch),
            ComputationBackend::Rocm {
                major,
                minor,
                patch: None,
            } => write!(f, "rocm{}.{}", major, minor),
        }
    }
}

impl PartialEq for ComputationBackend {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for ComputationBackend {}

impl Hash for ComputationBackend {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

impl PartialOrd for ComputationBackend {
    /// `None` for CUDA vs ROCm. Use [`ComputationBackend::try_cmp`] where the
    /// refusal has to be reported.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.try_cmp(other).ok()
    }
}

impl PartialEq<str> for ComputationBackend {
    fn eq(&self, other: &str) -> bool {
        self.to_string() == other
    }
}

impl FromStr for ComputationBackend {
    type Err = ParseBackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_error = || ParseBackendError(s.to_string());
        let string = s.trim().to_lowercase();

        if string == "cpu" {
            return Ok(ComputationBackend::Cpu);
        }

        if let Some(rest) = string.strip_prefix("rocm") {
            let parts = parse_numeric_parts(rest).ok_or_else(parse_error)?;
            return match parts.as_slice() {
                [major, minor] => Ok(ComputationBackend::rocm(*major, *minor, None)),
                [major, minor, patch] => Ok(ComputationBackend::rocm(*major, *minor, Some(*patch))),
                _ => Err(parse_error()),
            };
        }

        if let Some(rest) = string.strip_prefix("cu") {
            let version = rest.strip_prefix("da").unwrap_or(rest);
            if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit() || c == '.') {
                return Err(parse_error());
            }

            let (major, minor) = if version.contains('.') {
                let parts = parse_numeric_parts(version).ok_or_else(parse_error)?;
                match parts.as_slice() {
                    [major, minor] => (*major, *minor),
                    _ => return Err(parse_error()),
                }
            } else {
                // "111" is 11.1: the last digit is the minor version.
                if version.len() < 2 {
                    return Err(parse_error());
                }
                let (major, minor) = version.split_at(version.len() - 1);
                (
                    major.parse().map_err(|_| parse_error())?,
                    minor.parse().map_err(|_| parse_error())?,
                )
            };

            return Ok(ComputationBackend::cuda(major, minor));
        }

        Err(parse_error())
    }
}

/// Split `"5.4.2"` into numbers; `None` on empty or non-numeric components.
fn parse_numeric_parts(s: &str) -> Option<Vec<u32>> {
    s.split('.')
        .map(|part| {
            if part.is_empty() {
                None
            } else {
                part.parse().ok()
            }
        })
        .collect()
}

impl Serialize for ComputationBackend {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ComputationBackend {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A deduplicated set of backends, iterated in a stable sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendSet {
    backends: Vec<ComputationBackend>,
}

impl BackendSet {
    pub fn new() -> Self {
        BackendSet {
            backends: Vec::new(),
        }
    }

    /// The set containing only the CPU backend.
    pub fn cpu_only() -> Self {
        BackendSet::from_iter([ComputationBackend::Cpu])
    }

    /// Parse a comma-separated list such as `"cu118,cpu"`.
    pub fn parse_list(s: &str) -> Result<Self, ParseBackendError> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::parse)
            .collect::<Result<BackendSet, _>>()
            .and_then(|set| {
                if set.is_empty() {
                    Err(ParseBackendError(s.to_string()))
                } else {
                    Ok(set)
                }
            })
    }

    /// Insert a backend. Returns `false` if it was already present.
    pub fn insert(&mut self, backend: ComputationBackend) -> bool {
        if self.contains(&backend) {
            return false;
        }
        let key = backend.sort_key();
        let pos = self
            .backends
            .partition_point(|existing| existing.sort_key() < key);
        self.backends.insert(pos, backend);
        true
    }

    pub fn contains(&self, backend: &ComputationBackend) -> bool {
        self.backends.iter().any(|b| b == backend)
    }

    /// Check membership by canonical string.
    pub fn contains_specifier(&self, local: &str) -> bool {
        self.backends.iter().any(|b| b == local)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ComputationBackend> {
        self.backends.iter()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl FromIterator<ComputationBackend> for BackendSet {
    fn from_iter<I: IntoIterator<Item = ComputationBackend>>(iter: I) -> Self {
        let mut set = BackendSet::new();
        for backend in iter {
            set.insert(backend);
        }
        set
    }
}

impl<'a> IntoIterator for &'a BackendSet {
    type Item = &'a ComputationBackend;
    type IntoIter = std::slice::Iter<'a, ComputationBackend>;

    fn into_iter(self) -> Self::IntoIter {
        self.backends.iter()
    }
}

impl fmt::Display for BackendSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.backends.iter().map(|b| b.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn parse(s: &str) -> ComputationBackend {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_cpu() {
        assert_eq!(parse("cpu"), ComputationBackend::Cpu);
        assert_eq!(parse("CPU"), ComputationBackend::Cpu);
        assert_eq!(parse(" cpu "), ComputationBackend::Cpu);
    }

    #[test]
    fn test_parse_cuda_forms() {
        for s in ["cu123", "cu12.3", "cuda123", "cuda12.3", "CUDA12.3"] {
            match parse(s) {
                ComputationBackend::Cuda { major, minor } => {
                    assert_eq!((major, minor), (12, 3), "{}", s);
                }
                other => panic!("{} parsed as {:?}", s, other),
            }
        }
    }

    #[test]
    fn test_parse_cu111() {
        assert_eq!(parse("cu111"), ComputationBackend::cuda(11, 1));
        assert_eq!(parse("cu111"), parse("cuda11.1"));
    }

    #[test]
    fn test_parse_rocm() {
        assert_eq!(parse("rocm5.4"), ComputationBackend::rocm(5, 4, None));
        assert_eq!(parse("rocm5.4.2"), ComputationBackend::rocm(5, 4, Some(2)));
    }

    #[test]
    fn test_parse_errors() {
        for s in [
            "", "unknown", "cudnn", "cu", "cu1", "cu11.1.1", "cu.1", "rocm5", "rocm5.4.2.1",
            "rocm5..4", "rocm", "cu11a",
        ] {
            let err = s.parse::<ComputationBackend>().unwrap_err();
            assert_eq!(err, ParseBackendError(s.to_string()));
        }
    }

    #[test]
    fn test_round_trip() {
        let backends = [
            ComputationBackend::Cpu,
            ComputationBackend::cuda(9, 2),
            ComputationBackend::cuda(11, 8),
            ComputationBackend::cuda(12, 1),
            ComputationBackend::rocm(4, 2, None),
            ComputationBackend::rocm(5, 4, Some(2)),
        ];
        for backend in backends {
            assert_eq!(parse(&backend.to_string()), backend);
        }
    }

    #[test]
    fn test_equality_is_canonical() {
        // Both render as "cu111".
        assert_eq!(ComputationBackend::cuda(1, 11), ComputationBackend::cuda(11, 1));
        assert_ne!(
            ComputationBackend::rocm(5, 4, None),
            ComputationBackend::rocm(5, 4, Some(0))
        );

        let set: HashSet<_> = [ComputationBackend::cuda(1, 11), ComputationBackend::cuda(11, 1)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 1);
        assert!(ComputationBackend::cuda(10, 2) == *"cu102");
    }

    #[test]
    fn test_equal_backends_order_identically() {
        let a = ComputationBackend::cuda(1, 11);
        let b = ComputationBackend::cuda(11, 1);
        assert_eq!(a, b);
        assert_eq!(a.sort_key(), b.sort_key());

        for other in [
            ComputationBackend::Cpu,
            ComputationBackend::cuda(10, 2),
            ComputationBackend::cuda(11, 8),
            ComputationBackend::cuda(1, 12),
        ] {
            assert_eq!(a.try_cmp(&other), b.try_cmp(&other), "vs {}", other);
            assert_eq!(other.try_cmp(&a), other.try_cmp(&b), "{} vs", other);
        }
        assert_eq!(a.try_cmp(&ComputationBackend::cuda(10, 2)), Ok(Ordering::Greater));
        assert_eq!(a.try_cmp(&b), Ok(Ordering::Equal));
    }

    #[test]
    fn test_sort_key_matches_canonical_string() {
        for (major, minor, major_key, minor_key) in
            [(11, 8, 11, 8), (1, 18, 11, 8), (8, 0, 8, 0), (12, 10, 121, 0), (0, 0, 0, 0)]
        {
            let backend = ComputationBackend::cuda(major, minor);
            assert_eq!(backend.sort_key(), (1, major_key, minor_key, 0), "{}", backend);
        }

        let huge = ComputationBackend::cuda(u32::MAX, u32::MAX);
        assert_eq!(huge.sort_key().0, 1);
    }

    #[test]
    fn test_cpu_is_lowest() {
        let cpu = ComputationBackend::Cpu;
        assert!(cpu < ComputationBackend::cuda(0, 0));
        assert!(cpu < ComputationBackend::rocm(0, 0, None));
        assert!(ComputationBackend::cuda(0, 0) > cpu);
    }

    #[test]
    fn test_cuda_ordering() {
        assert!(ComputationBackend::cuda(1, 2) < ComputationBackend::cuda(2, 1));
        assert!(ComputationBackend::cuda(2, 1) < ComputationBackend::cuda(10, 0));
    }

    #[test]
    fn test_ordering_total_within_family() {
        let cuda: Vec<_> = [(9, 2), (10, 2), (11, 1), (11, 8)]
            .iter()
            .map(|&(a, b)| ComputationBackend::cuda(a, b))
            .collect();
        let rocm: Vec<_> = [(4, 2, None), (5, 4, Some(2)), (5, 4, None), (5, 4, Some(3))]
            .iter()
            .map(|&(a, b, c)| ComputationBackend::rocm(a, b, c))
            .collect();

        for family in [&cuda, &rocm] {
            for a in family {
                for b in family {
                    let holds = [a < b, a == b, b < a];
                    assert_eq!(holds.iter().filter(|h| **h).count(), 1, "{} vs {}", a, b);
                }
            }
        }
    }

    #[test]
    fn test_rocm_patch_ordering() {
        let pinned = ComputationBackend::rocm(5, 4, Some(2));
        let latest = ComputationBackend::rocm(5, 4, None);
        assert!(pinned < latest);
        assert!(ComputationBackend::rocm(5, 4, Some(2)) < ComputationBackend::rocm(5, 4, Some(3)));
        assert!(latest < ComputationBackend::rocm(5, 5, Some(0)));
    }

    #[test]
    fn test_cross_family_comparison_fails() {
        let cuda = ComputationBackend::cuda(11, 8);
        let rocm = ComputationBackend::rocm(5, 4, Some(2));

        let err = cuda.try_cmp(&rocm).unwrap_err();
        assert_eq!(err.lhs, "cu118");
        assert_eq!(err.rhs, "rocm5.4.2");
        assert!(rocm.try_cmp(&cuda).is_err());
        assert_eq!(cuda.partial_cmp(&rocm), None);
    }

    #[test]
    fn test_backend_set_sorted_and_deduped() {
        let set: BackendSet = ["rocm5.4", "cu118", "cpu", "cu102", "cu118", "rocm5.4.2"]
            .iter()
            .map(|s| parse(s))
            .collect();

        assert_eq!(set.to_string(), "cpu,cu102,cu118,rocm5.4.2,rocm5.4");
        assert!(set.contains_specifier("cu102"));
        assert!(!set.contains_specifier("cu111"));
    }

    #[test]
    fn test_backend_set_parse_list() {
        let set = BackendSet::parse_list("cu102, cpu").unwrap();
        assert_eq!(set.len(), 2);
        assert!(BackendSet::parse_list("").is_err());
        assert!(BackendSet::parse_list("cpu,nope").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&ComputationBackend::cuda(11, 8)).unwrap();
        assert_eq!(json, "\"cu118\"");
        let backend: ComputationBackend = serde_json::from_str("\"rocm5.4.2\"").unwrap();
        assert_eq!(backend, ComputationBackend::rocm(5, 4, Some(2)));
    }
}
