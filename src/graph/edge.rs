//! Edge layer: application load balancer, listener and DNS alias.

use super::compute::ComputeLayer;
use super::network::NetworkLayer;
use super::security::{SecurityGroups, HTTP_PORT};
use super::{violation, ResourceGraph};
use crate::error::TopologyResult;
use crate::models::{
    Attribute, HostedZone, Properties, ResourceDescriptor, ResourceId, ResourceKind, Value,
};

/// Ids of the declared edge resources.
#[derive(Debug, Clone)]
pub struct EdgeLayer {
    pub load_balancer: ResourceId,
    pub listener: ResourceId,
    pub dns_record: ResourceId,
}

/// Declare the edge layer across the public subnets.
pub fn declare(
    graph: &mut ResourceGraph,
    network: &NetworkLayer,
    groups: &SecurityGroups,
    compute: &ComputeLayer,
    hosted_zone: &HostedZone,
) -> TopologyResult<EdgeLayer> {
    if network.public_subnets.is_empty() {
        return Err(violation("load balancer needs public subnets".to_string()));
    }
    if network.public_subnets.len() < 2 {
        log::warn!(
            "Load balancer spans {} public subnet; application load balancers need two zones",
            network.public_subnets.len()
        );
    }
    let name = network.vpc.as_str();

    let load_balancer = graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-alb")),
        ResourceKind::LoadBalancer,
        Properties::new()
            .with("load_balancer_type", "application")
            .with("internal", false)
            .with("enable_deletion_protection", false)
            .with(
                "security_groups",
                Value::list([groups.load_balancer.output(Attribute::Id)]),
            )
            .with(
                "subnets",
                Value::list(network.public_subnets.iter().map(|s| s.output(Attribute::Id))),
            ),
    ))?;

    let listener = graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-listener")),
        ResourceKind::Listener,
        Properties::new()
            .with("load_balancer_arn", load_balancer.output(Attribute::Arn))
            .with("port", HTTP_PORT)
            .with("protocol", "HTTP")
            .with(
                "default_actions",
                Value::list([Value::map([
                    ("type", Value::from("forward")),
                    (
                        "target_group_arn",
                        Value::from(compute.target_group.output(Attribute::Arn)),
                    ),
                ])]),
            ),
    ))?;

    let dns_record = graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-dns-record")),
        ResourceKind::DnsRecord,
        Properties::new()
            .with("zone_id", hosted_zone.zone_id.as_str())
            .with("name", hosted_zone.name.as_str())
            .with("type", "A")
            .with(
                "aliases",
                Value::list([Value::map([
                    ("name", Value::from(load_balancer.output(Attribute::DnsName))),
                    ("zone_id", Value::from(load_balancer.output(Attribute::ZoneId))),
                    ("evaluate_target_health", Value::from(true)),
                ])]),
            ),
    ))?;

    Ok(EdgeLayer {
        load_balancer,
        listener,
        dns_record,
    })
}
