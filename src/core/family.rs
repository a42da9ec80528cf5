//! The protected distribution family.
//!
//! Family members ship binaries compiled per computation backend, so they
//! have to be resolved against backend-partitioned indices instead of the
//! default package index.

use std::sync::LazyLock;

use crate::core::channel::Channel;
use crate::core::requirement::canonicalize_name;

/// The PyTorch distribution family.
pub static PYTORCH: LazyLock<Family> = LazyLock::new(|| {
    Family::new(
        "torch",
        [
            "torchvision",
            "torchaudio",
            "torchtext",
            "torchdata",
            "torcharrow",
            "torchcsprng",
            "torchdistx",
            "torchserve",
            "torch_model_archiver",
            "torch_tb_profiler",
        ],
    )
    .with_generic_on_stable(["torchdata"])
});

/// A core distribution plus the companions that depend on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Family {
    core: String,
    companions: Vec<String>,
    /// Members that the stable channel does not partition by backend.
    generic_on_stable: Vec<String>,
}

impl Family {
    pub fn new<I, S>(core: &str, companions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Family {
            core: canonicalize_name(core),
            companions: companions
                .into_iter()
                .map(|c| canonicalize_name(c.as_ref()))
                .collect(),
            generic_on_stable: Vec::new(),
        }
    }

    pub fn with_generic_on_stable<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.generic_on_stable = names
            .into_iter()
            .map(|n| canonicalize_name(n.as_ref()))
            .collect();
        self
    }

    /// Canonical name of the core distribution.
    pub fn core(&self) -> &str {
        &self.core
    }

    pub fn companions(&self) -> &[String] {
        &self.companions
    }

    /// Whether `name` (in any spelling) is the core or a companion.
    pub fn contains(&self, name: &str) -> bool {
        let name = canonicalize_name(name);
        name == self.core || self.companions.contains(&name)
    }

    pub fn is_core(&self, name: &str) -> bool {
        canonicalize_name(name) == self.core
    }

    /// Whether `name` is looked up on the generic index for `channel`.
    pub fn uses_generic_index(&self, name: &str, channel: Channel) -> bool {
        channel == Channel::Stable && self.generic_on_stable.contains(&canonicalize_name(name))
    }
}
