//! Release channels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A malformed channel name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown channel `{0}`; expected one of 'stable', 'test', 'nightly', or 'lts'")]
pub struct ParseChannelError(pub String);

/// A release track with its own artifact locations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Stable,
    Test,
    Nightly,
    Lts,
}

impl Channel {
    /// All channels, in declaration order.
    pub const ALL: [Channel; 4] = [Channel::Stable, Channel::Test, Channel::Nightly, Channel::Lts];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Stable => "stable",
            Channel::Test => "test",
            Channel::Nightly => "nightly",
            Channel::Lts => "lts",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ParseChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stable" => Ok(Channel::Stable),
            "test" => Ok(Channel::Test),
            "nightly" => Ok(Channel::Nightly),
            "lts" => Ok(Channel::Lts),
            _ => Err(ParseChannelError(s.to_string())),
        }
    }
}
