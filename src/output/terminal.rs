//! Terminal output helpers.

use crate::graph::ResourceGraph;
use crate::models::{Tier, Value};
use colored::Colorize;

/// Quote `value` and right-align it to at least `width` characters.
pub fn format_field<T: ToString>(value: T, width: usize) -> String {
    let quoted = format!("\"{}\"", value.to_string());
    format!("{quoted:>width$}")
}

/// Per-kind resource counts, followed by the subnet placement.
pub fn graph_summary(graph: &ResourceGraph) -> String {
    let mut lines = vec![format!(
        "{} {} resources",
        "GRAPH".on_blue(),
        graph.len()
    )];
    for (kind, count) in graph.count_by_kind() {
        lines.push(format!("  {:<26} {count:>3}", kind.type_token().green()));
    }
    for tier in [Tier::Public, Tier::Private] {
        for subnet in graph.subnets(tier) {
            let zone = subnet
                .placement
                .as_ref()
                .map(|p| p.zone.to_string())
                .unwrap_or_default();
            let cidr = match subnet.properties.get("cidr_block") {
                Some(Value::Str(cidr)) => cidr.as_str(),
                _ => "",
            };
            lines.push(format!("  {:<8} {:<14} {:<18} {}", tier.to_string(), zone, cidr, subnet.id));
        }
    }
    lines.join("\n")
}

pub fn print_graph_summary(graph: &ResourceGraph) {
    println!("{}", graph_summary(graph));
}
