//! Plan invariant checks.
//!
//! Re-verifies a [`SubnetPlan`] before it is wired into resources, so a
//! hand-built or corrupted plan fails loudly instead of producing an
//! overlapping network.

use crate::error::{TopologyError, TopologyResult};
use crate::models::{Ipv4, SubnetPlan, Zone};
use itertools::Itertools;

/// Check the structural invariants of a plan.
///
/// # Returns
/// * `Ok(())` - entries are indexed in order, every block sits inside the
///   VPC at the plan's prefix length, blocks are pairwise disjoint and every
///   entry has a zone
/// * `Err(GraphWiringViolation)` - the first broken invariant
pub fn check_plan(plan: &SubnetPlan) -> TopologyResult<()> {
    if plan.is_empty() {
        return Err(violation("subnet plan has no entries".to_string()));
    }

    for (position, entry) in plan.entries.iter().enumerate() {
        if entry.index != position {
            return Err(violation(format!(
                "entry at position {position} carries index {}",
                entry.index
            )));
        }
        if entry.zone.as_str().trim().is_empty() {
            return Err(violation(format!("entry {position} has no zone assignment")));
        }
    }

    let blocks: Vec<Ipv4> = plan.blocks().collect();
    if let Some(block) = blocks
        .iter()
        .find(|b| b.mask != plan.subnet_mask || !plan.vpc_block.contains_block(b))
    {
        return Err(violation(format!(
            "{block} is not a /{} block inside {}",
            plan.subnet_mask, plan.vpc_block
        )));
    }

    if let Some((a, b)) = blocks
        .iter()
        .tuple_combinations()
        .find(|(a, b)| a.overlaps(b))
    {
        return Err(violation(format!("{a} overlaps {b}")));
    }

    Ok(())
}

/// Check that entry `i` is bound to `zones[i % zones.len()]`.
pub fn check_zone_rotation(plan: &SubnetPlan, zones: &[Zone]) -> TopologyResult<()> {
    if zones.is_empty() {
        return Err(violation("zone list is empty".to_string()));
    }
    match plan
        .entries
        .iter()
        .find(|e| e.zone != zones[e.index % zones.len()])
    {
        Some(entry) => Err(violation(format!(
            "entry {} assigned to {} instead of {}",
            entry.index,
            entry.zone,
            zones[entry.index % zones.len()]
        ))),
        None => Ok(()),
    }
}

fn violation(message: String) -> TopologyError {
    TopologyError::GraphWiringViolation(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlanEntry;
    use crate::topology::compute_subnet_plan;

    fn azs() -> Vec<Zone> {
        vec![Zone::new("a"), Zone::new("b"), Zone::new("c")]
    }

    #[test]
    fn test_synthesized_plan_passes() {
        let zones = azs();
        let plan = compute_subnet_plan("10.0.0.0/16", 3, &zones).unwrap();
        assert!(check_plan(&plan).is_ok());
        assert!(check_zone_rotation(&plan, &zones).is_ok());
    }

    #[test]
    fn test_overlap_detected() {
        let mut plan = compute_subnet_plan("10.0.0.0/16", 2, &azs()).unwrap();
        plan.entries[1].private_block = plan.entries[0].public_block;
        let err = check_plan(&plan).unwrap_err();
        assert!(err.to_string().contains("overlaps"), "{err}");
    }

    #[test]
    fn test_block_outside_vpc_detected() {
        let mut plan = compute_subnet_plan("10.0.0.0/16", 1, &azs()).unwrap();
        plan.entries[0].private_block = Ipv4::new("10.1.0.0/17").unwrap();
        assert!(matches!(
            check_plan(&plan),
            Err(TopologyError::GraphWiringViolation(_))
        ));
    }

    #[test]
    fn test_missing_zone_detected() {
        let mut plan = compute_subnet_plan("10.0.0.0/16", 1, &azs()).unwrap();
        plan.entries[0].zone = Zone::new("");
        assert!(check_plan(&plan).is_err());
    }

    #[test]
    fn test_empty_and_misindexed_plans() {
        let mut plan = compute_subnet_plan("10.0.0.0/16", 2, &azs()).unwrap();
        plan.entries.swap(0, 1);
        assert!(check_plan(&plan).is_err());

        plan.entries.clear();
        assert!(check_plan(&plan).is_err());
    }

    #[test]
    fn test_zone_rotation_mismatch() {
        let zones = azs();
        let mut plan = compute_subnet_plan("10.0.0.0/16", 3, &zones).unwrap();
        plan.entries[2] = PlanEntry {
            zone: Zone::new("a"),
            ..plan.entries[2].clone()
        };
        assert!(check_zone_rotation(&plan, &zones).is_err());
    }
}
