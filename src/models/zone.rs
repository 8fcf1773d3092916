//! Availability zone and hosted DNS zone identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque availability zone identifier supplied by the cloud metadata provider.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Zone(String);

impl Zone {
    pub fn new(name: impl Into<String>) -> Zone {
        Zone(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Zone {
    fn from(name: &str) -> Self {
        Zone::new(name)
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Public hosted DNS zone the edge layer aliases to the load balancer.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HostedZone {
    /// Provider-assigned hosted zone id.
    pub zone_id: String,
    /// Apex name of the zone (e.g. "dev.example.com").
    pub name: String,
}
