//! Subnet plan produced by the topology synthesizer.

use super::{Ipv4, Zone};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Routing tier of a subnet.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Internet-routable through the gateway.
    Public,
    /// No default route.
    Private,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Public => f.write_str("public"),
            Tier::Private => f.write_str("private"),
        }
    }
}

/// One public/private pair bound to a zone.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub index: usize,
    pub zone: Zone,
    pub public_block: Ipv4,
    pub private_block: Ipv4,
}

impl PlanEntry {
    /// Block for the requested tier.
    pub fn block(&self, tier: Tier) -> Ipv4 {
        match tier {
            Tier::Public => self.public_block,
            Tier::Private => self.private_block,
        }
    }
}

/// Ordered subnet plan for one VPC.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubnetPlan {
    /// Block the plan was carved from.
    pub vpc_block: Ipv4,
    /// Prefix length shared by every planned subnet.
    pub subnet_mask: u8,
    /// Zone count the operator asked for, before clamping.
    pub requested_zone_count: u32,
    pub entries: Vec<PlanEntry>,
}

impl SubnetPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when fewer zones were planned than requested.
    pub fn is_clamped(&self) -> bool {
        (self.entries.len() as u64) < u64::from(self.requested_zone_count)
    }

    /// Every planned block in ascending plan order (public, private, public, ...).
    pub fn blocks(&self) -> impl Iterator<Item = Ipv4> + '_ {
        self.entries
            .iter()
            .flat_map(|e| [e.public_block, e.private_block])
    }
}
