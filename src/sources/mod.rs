//! Package index access.
//!
//! The engine consumes two external facilities through traits so that both
//! can be replaced in tests:
//! - [`LinkFetcher`]: the artifact links of one index page
//! - [`MetadataSource`]: a requirement's resolved version and dependencies

pub mod index;
pub mod link;
pub mod locations;
pub mod metadata;

pub use index::{link_filename, HttpIndex, LinkFetcher};
pub use link::{Link, TargetEnvironment, WheelFilename};
pub use locations::{locations, project_page, IndexLocations};
pub use metadata::{Materialized, MetadataSource, PypiMetadata};
