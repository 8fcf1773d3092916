//! CSV rendering of a subnet plan.

use super::terminal::format_field;
use crate::models::{broadcast_addr, usable_hosts, SubnetPlan, Tier};
use colored::Colorize;
use std::error::Error;

/// One printed subnet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanPrintRow {
    pub index: usize,
    pub zone: String,
    pub tier: Tier,
    pub subnet_cidr: String,
    pub broadcast: String,
    /// Addresses left after the provider's reserved five; `None` below /28.
    pub usable_hosts: Option<u64>,
}

/// Rows in plan order, public before private within an entry.
pub fn plan_rows(plan: &SubnetPlan) -> Result<Vec<PlanPrintRow>, Box<dyn Error>> {
    let mut rows = Vec::with_capacity(plan.len() * 2);
    for entry in &plan.entries {
        for tier in [Tier::Public, Tier::Private] {
            let block = entry.block(tier);
            rows.push(PlanPrintRow {
                index: entry.index,
                zone: entry.zone.to_string(),
                tier,
                subnet_cidr: block.to_string(),
                broadcast: broadcast_addr(block.addr, block.mask)?.to_string(),
                usable_hosts: usable_hosts(block.mask).ok(),
            });
        }
    }
    Ok(rows)
}

/// Print a subnet plan as CSV to stdout.
pub fn plan_print(plan: &SubnetPlan) -> Result<(), Box<dyn Error>> {
    log::info!(
        "#Start plan_print() vpc={} subnets=/{} entries={}",
        plan.vpc_block,
        plan.subnet_mask,
        plan.len()
    );

    println!(
        r#" "idx",        "zone",    "tier",     "subnet_cidr",        "broadcast",   "hosts""#
    );
    let rows = plan_rows(plan)?;
    for row in &rows {
        print_csv_row(row);
    }

    if rows.iter().any(|r| r.usable_hosts.is_none()) {
        println!(
            "#{}# subnets smaller than /28 cannot be created by the provider",
            "NOTE".on_red()
        );
    }
    if plan.is_clamped() {
        println!(
            "#{}# requested {} zones, planned {}",
            "NOTE".on_red(),
            plan.requested_zone_count,
            plan.len()
        );
    }
    Ok(())
}

fn print_csv_row(row: &PlanPrintRow) {
    println!(
        "{index},{zone},{tier},{subnet_cidr},{broadcast},{hosts}",
        index = format_field(row.index, 6),
        zone = format_field(&row.zone, 14),
        tier = format_field(row.tier, 9),
        subnet_cidr = format_field(&row.subnet_cidr, 19),
        broadcast = format_field(format!("{}_br", row.broadcast), 19),
        hosts = format_field(
            row.usable_hosts
                .map_or_else(|| "-".to_string(), |h| format!("{h}_hosts")),
            14
        ),
    );
}
