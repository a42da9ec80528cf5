//! Command implementations

pub mod completions;
pub mod detect;
pub mod extract;
pub mod find;
