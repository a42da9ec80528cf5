//! ltt - Backend-aware resolution of PyTorch distribution wheels
//!
//! This crate provides the library behind the `ltt` binary: hardware
//! detection of compatible computation backends, extraction of the PyTorch
//! family members an install request needs, and discovery of the wheels
//! built for a backend set and release channel.

pub mod core;
pub mod hardware;
pub mod ops;
pub mod resolver;
pub mod sources;
pub mod util;

/// Test utilities and mocks for ltt unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides mock implementations for index pages,
/// package metadata and the driver query.
#[cfg(test)]
pub mod test_support;

pub use crate::core::{BackendSet, Channel, ComputationBackend, DistributionRequirement};
pub use hardware::detect_compatible_backends;
pub use resolver::{extract_family, find_candidates, Candidate, ResolveError};
pub use util::context::GlobalContext;
