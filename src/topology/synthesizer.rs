//! Subnet plan synthesis.
//!
//! Splits a VPC block into equal power-of-two sub-blocks and hands them out
//! in ascending order as public/private pairs, one pair per zone.

use crate::error::{TopologyError, TopologyResult};
use crate::models::{Ipv4, PlanEntry, SubnetPlan, Zone, MAX_LENGTH};

/// Compute the subnet plan for a VPC CIDR string.
///
/// # Arguments
/// * `vpc_cidr` - VPC block, e.g. "10.0.0.0/16"
/// * `desired_zone_count` - zones the operator asked for
/// * `zones` - zones available in the region, in provider order
///
/// # Returns
/// * `Ok(SubnetPlan)` - `min(desired_zone_count, zones.len())` entries
/// * `Err(InvalidTopologyConfig)` - malformed CIDR, empty zone list or zero zone count
/// * `Err(AddressSpaceExhausted)` - the block cannot hold two subnets per zone
///
/// # Examples
/// ```
/// use vpc_topology::models::Zone;
/// use vpc_topology::topology::compute_subnet_plan;
///
/// let zones = vec![Zone::new("us-east-1a")];
/// let plan = compute_subnet_plan("10.0.0.0/24", 3, &zones).unwrap();
/// assert_eq!(plan.len(), 1);
/// assert_eq!(plan.entries[0].public_block.to_string(), "10.0.0.0/25");
/// assert_eq!(plan.entries[0].private_block.to_string(), "10.0.0.128/25");
/// ```
pub fn compute_subnet_plan(
    vpc_cidr: &str,
    desired_zone_count: u32,
    zones: &[Zone],
) -> TopologyResult<SubnetPlan> {
    let vpc_block = Ipv4::new(vpc_cidr).map_err(|e| {
        TopologyError::InvalidTopologyConfig(format!("VPC CIDR '{vpc_cidr}': {e}"))
    })?;
    compute_subnet_plan_for_block(vpc_block, desired_zone_count, zones)
}

/// Compute the subnet plan for an already parsed VPC block.
pub fn compute_subnet_plan_for_block(
    vpc_block: Ipv4,
    desired_zone_count: u32,
    zones: &[Zone],
) -> TopologyResult<SubnetPlan> {
    if zones.is_empty() {
        return Err(TopologyError::InvalidTopologyConfig(
            "no availability zones supplied".to_string(),
        ));
    }
    if desired_zone_count == 0 {
        return Err(TopologyError::InvalidTopologyConfig(
            "desired zone count must be positive".to_string(),
        ));
    }

    let zone_count = clamp_zone_count(desired_zone_count, zones.len());
    let required_subnets = 2 * zone_count as u64;
    let subnet_mask = split_mask(vpc_block, required_subnets)?;
    log::info!(
        "Splitting {vpc_block} into /{subnet_mask} blocks for {zone_count} zone(s)"
    );

    let blocks: Vec<Ipv4> = vpc_block
        .subnets(subnet_mask)
        .map_err(|e| TopologyError::InvalidTopologyConfig(format!("{vpc_block}: {e}")))?
        .take(required_subnets as usize)
        .collect();
    if (blocks.len() as u64) < required_subnets {
        return Err(TopologyError::AddressSpaceExhausted {
            vpc_block: vpc_block.to_string(),
            required_subnets,
        });
    }

    let entries = pair_blocks(&blocks, zones);
    for entry in &entries {
        log::debug!(
            "entry {} zone={} public={} private={}",
            entry.index,
            entry.zone,
            entry.public_block,
            entry.private_block
        );
    }

    log::info!(
        "Planned {} subnet pair(s) in {vpc_block}, requested {desired_zone_count}",
        entries.len()
    );
    Ok(SubnetPlan {
        vpc_block,
        subnet_mask,
        requested_zone_count: desired_zone_count,
        entries,
    })
}

/// Reduce the requested zone count to what the region offers.
fn clamp_zone_count(desired_zone_count: u32, available: usize) -> usize {
    let desired = desired_zone_count as usize;
    if desired > available {
        log::warn!(
            "Requested {desired} zones but region offers {available}; planning {available} subnet pairs"
        );
        available
    } else {
        desired
    }
}

/// Smallest prefix length at which `vpc_block` yields `required` blocks.
///
/// Counts whole halvings so the block count is always a power of two.
fn split_mask(vpc_block: Ipv4, required: u64) -> TopologyResult<u8> {
    let mut extra_bits: u8 = 0;
    while (1u64 << extra_bits) < required {
        extra_bits += 1;
        if vpc_block.mask + extra_bits > MAX_LENGTH {
            return Err(TopologyError::AddressSpaceExhausted {
                vpc_block: vpc_block.to_string(),
                required_subnets: required,
            });
        }
    }
    Ok(vpc_block.mask + extra_bits)
}

/// Pair consecutive blocks as (public, private) and rotate through `zones`.
fn pair_blocks(blocks: &[Ipv4], zones: &[Zone]) -> Vec<PlanEntry> {
    blocks
        .chunks_exact(2)
        .enumerate()
        .map(|(i, pair)| PlanEntry {
            index: i,
            zone: zones[i % zones.len()].clone(),
            public_block: pair[0],
            private_block: pair[1],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones(names: &[&str]) -> Vec<Zone> {
        names.iter().map(|n| Zone::new(*n)).collect()
    }

    #[test]
    fn test_split_mask() {
        let vpc = Ipv4::new("10.0.0.0/16").unwrap();
        assert_eq!(split_mask(vpc, 1).unwrap(), 16);
        assert_eq!(split_mask(vpc, 2).unwrap(), 17);
        assert_eq!(split_mask(vpc, 4).unwrap(), 18);
        assert_eq!(split_mask(vpc, 6).unwrap(), 19);
        assert_eq!(split_mask(vpc, 8).unwrap(), 19);
        assert_eq!(split_mask(vpc, 9).unwrap(), 20);
        assert_eq!(split_mask(vpc, 65536).unwrap(), 32);
        assert!(split_mask(vpc, 65537).is_err());
    }

    #[test]
    fn test_three_zones_in_slash_16() {
        let vpc = Ipv4::new("10.0.0.0/16").unwrap();
        let azs = zones(&["us-east-1a", "us-east-1b", "us-east-1c"]);
        let plan = compute_subnet_plan("10.0.0.0/16", 3, &azs).unwrap();

        assert_eq!(plan.len(), 3);
        assert_eq!(plan.subnet_mask, 19);
        assert!(!plan.is_clamped());

        let expected: Vec<Ipv4> = vpc.subnets(19).unwrap().take(6).collect();
        let actual: Vec<Ipv4> = plan.blocks().collect();
        assert_eq!(actual, expected);

        assert_eq!(plan.entries[0].public_block.to_string(), "10.0.0.0/19");
        assert_eq!(plan.entries[0].private_block.to_string(), "10.0.32.0/19");
        assert_eq!(plan.entries[2].public_block.to_string(), "10.0.128.0/19");
        assert_eq!(plan.entries[2].private_block.to_string(), "10.0.160.0/19");
        for (i, entry) in plan.entries.iter().enumerate() {
            assert_eq!(entry.index, i);
            assert_eq!(entry.zone, azs[i]);
        }
    }

    #[test]
    fn test_clamped_to_single_zone() {
        let azs = zones(&["eu-west-3a"]);
        let plan = compute_subnet_plan("10.0.0.0/24", 3, &azs).unwrap();

        assert_eq!(plan.len(), 1);
        assert!(plan.is_clamped());
        assert_eq!(plan.requested_zone_count, 3);
        assert_eq!(plan.entries[0].public_block, Ipv4::new("10.0.0.0/25").unwrap());
        assert_eq!(plan.entries[0].private_block, Ipv4::new("10.0.0.128/25").unwrap());
        assert_eq!(plan.entries[0].zone, azs[0]);
    }

    #[test]
    fn test_fewer_zones_requested_than_available() {
        let azs = zones(&["a", "b", "c", "d"]);
        let plan = compute_subnet_plan("172.16.0.0/12", 2, &azs).unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.subnet_mask, 14);
        assert_eq!(plan.entries[1].zone, Zone::new("b"));
    }

    #[test]
    fn test_invalid_config() {
        let azs = zones(&["a"]);
        for bad in [
            "",
            "10.0.0.0",
            "10.0.0.0/40",
            "10.0.0.1/16",
            "300.0.0.0/8",
            "10.0.0.0/+16",
            " 10.0.0.0/16",
        ] {
            assert!(
                matches!(
                    compute_subnet_plan(bad, 1, &azs),
                    Err(TopologyError::InvalidTopologyConfig(_))
                ),
                "{bad} should be rejected"
            );
        }
        assert!(matches!(
            compute_subnet_plan("10.0.0.0/16", 1, &[]),
            Err(TopologyError::InvalidTopologyConfig(_))
        ));
        assert!(matches!(
            compute_subnet_plan("10.0.0.0/16", 0, &azs),
            Err(TopologyError::InvalidTopologyConfig(_))
        ));
    }

    #[test]
    fn test_address_space_exhausted() {
        let azs = zones(&["a", "b", "c"]);
        assert_eq!(
            compute_subnet_plan("10.0.0.0/30", 3, &azs),
            Err(TopologyError::AddressSpaceExhausted {
                vpc_block: "10.0.0.0/30".to_string(),
                required_subnets: 6
            })
        );
        assert!(matches!(
            compute_subnet_plan("10.0.0.7/32", 1, &azs),
            Err(TopologyError::AddressSpaceExhausted { .. })
        ));
        // Two /32s fit exactly.
        let plan = compute_subnet_plan("10.0.0.6/31", 1, &azs).unwrap();
        assert_eq!(plan.entries[0].public_block, Ipv4::new("10.0.0.6/32").unwrap());
        assert_eq!(plan.entries[0].private_block, Ipv4::new("10.0.0.7/32").unwrap());
    }

    #[test]
    fn test_whole_address_space() {
        let azs = zones(&["a", "b"]);
        let plan = compute_subnet_plan("0.0.0.0/0", 2, &azs).unwrap();
        assert_eq!(plan.subnet_mask, 2);
        assert_eq!(plan.entries[1].private_block, Ipv4::new("192.0.0.0/2").unwrap());
    }

    #[test]
    fn test_round_robin_when_more_pairs_than_zones() {
        let vpc = Ipv4::new("10.0.0.0/16").unwrap();
        let blocks: Vec<Ipv4> = vpc.subnets(20).unwrap().take(10).collect();
        let azs = zones(&["a", "b"]);
        let entries = pair_blocks(&blocks, &azs);

        assert_eq!(entries.len(), 5);
        let assigned: Vec<&str> = entries.iter().map(|e| e.zone.as_str()).collect();
        assert_eq!(assigned, vec!["a", "b", "a", "b", "a"]);
    }

    #[test]
    fn test_deterministic() {
        let azs = zones(&["a", "b", "c"]);
        let first = compute_subnet_plan("10.20.0.0/16", 3, &azs).unwrap();
        let second = compute_subnet_plan("10.20.0.0/16", 3, &azs).unwrap();
        assert_eq!(first, second);
    }
}
