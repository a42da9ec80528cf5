//! High-level operations.
//!
//! This module contains the implementation of ltt commands.

pub mod backends;
pub mod extract;
pub mod find;

pub use backends::{resolve_backends, resolve_channel, BackendOrigin, ResolvedBackends};
pub use extract::extract;
pub use find::{find, FindOutcome, FindRequest};
