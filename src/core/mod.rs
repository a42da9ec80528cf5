//! Core data structures for ltt.
//!
//! This module contains the value types shared by detection and resolution:
//! - Computation backends and backend sets
//! - Release channels
//! - Package versions and specifiers
//! - Distribution requirements
//! - The protected distribution family

pub mod backend;
pub mod channel;
pub mod family;
pub mod requirement;
pub mod version;

pub use backend::{BackendSet, ComputationBackend, CrossFamilyComparison, ParseBackendError};
pub use channel::{Channel, ParseChannelError};
pub use family::{Family, PYTORCH};
pub use requirement::{canonicalize_name, DistributionRequirement, ParseRequirementError};
pub use version::{PackageVersion, ParseVersionError, VersionSpecifier, VersionSpecifiers};
