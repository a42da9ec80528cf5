//! Backend-aware resolution.
//!
//! Resolution happens in two stages:
//! - [`extract_family`] walks an install request and reports the family
//!   members it needs without fetching any of them
//! - [`find_candidates`] discovers, filters and ranks the wheels of those
//!   members for a backend set and release channel

pub mod candidate;
pub mod compat;
pub mod errors;
pub mod extract;
pub mod find;
pub mod walk;

pub use candidate::{AnyTagPolicy, Candidate, TagSource};
pub use compat::{CompatTable, PYTORCH_COMPAT};
pub use errors::ResolveError;
pub use extract::{extract_family, parse_requests, CorePin, FamilyExtraction};
pub use find::{find_candidates, select_best, FindOptions};
pub use walk::{RequirementWalker, WalkAction, WalkGraph, WalkOutcome};
