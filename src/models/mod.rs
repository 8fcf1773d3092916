//! Domain models for VPC topology synthesis.
//!
//! This module contains the core data structures used throughout the crate:
//! - [`Ipv4`] - IPv4 address block with CIDR notation support
//! - [`Zone`] and [`HostedZone`] - availability zone and DNS zone identifiers
//! - [`SubnetPlan`] - ordered public/private subnet pairs per zone
//! - [`ResourceDescriptor`] - declarative resources with deferred references

mod ipv4;
mod plan;
mod resource;
mod zone;

// Re-export public types
pub use ipv4::{
    broadcast_addr, cut_addr, get_cidr_mask, ip_after_subnet, usable_hosts, Ipv4, MAX_LENGTH,
    MIN_SUBNET_LENGTH, RESERVED_ADDRESSES,
};
pub use plan::{PlanEntry, SubnetPlan, Tier};
pub use resource::{
    Attribute, Output, Placement, Properties, ResourceDescriptor, ResourceId, ResourceKind, Value,
};
pub use zone::{HostedZone, Zone};
