//! Network layer: VPC, subnets, internet gateway and route tables.

use super::{violation, ResourceGraph};
use crate::config::NetworkConfig;
use crate::error::TopologyResult;
use crate::models::{
    Attribute, PlanEntry, Placement, Properties, ResourceDescriptor, ResourceId, ResourceKind,
    SubnetPlan, Tier,
};

/// Default route destination.
pub const ANYWHERE: &str = "0.0.0.0/0";

/// Ids of the declared network resources.
#[derive(Debug, Clone)]
pub struct NetworkLayer {
    pub vpc: ResourceId,
    pub internet_gateway: ResourceId,
    pub public_route_table: ResourceId,
    pub private_route_table: ResourceId,
    pub public_subnets: Vec<ResourceId>,
    pub private_subnets: Vec<ResourceId>,
}

/// Declare the network layer for every plan entry.
pub fn declare(
    graph: &mut ResourceGraph,
    plan: &SubnetPlan,
    network: &NetworkConfig,
) -> TopologyResult<NetworkLayer> {
    if plan.is_empty() {
        return Err(violation("cannot build a network from an empty plan".to_string()));
    }
    let name = network.vpc_name.as_str();

    let vpc = graph.declare(ResourceDescriptor::new(
        ResourceId::new(name),
        ResourceKind::Vpc,
        Properties::new()
            .with("cidr_block", plan.vpc_block.to_string())
            .with("instance_tenancy", "default")
            .with("enable_dns_hostnames", true)
            .with("enable_dns_support", true),
    ))?;

    let mut public_subnets = Vec::with_capacity(plan.len());
    let mut private_subnets = Vec::with_capacity(plan.len());
    for entry in &plan.entries {
        public_subnets.push(declare_subnet(graph, name, &vpc, entry, Tier::Public)?);
        private_subnets.push(declare_subnet(graph, name, &vpc, entry, Tier::Private)?);
    }

    let internet_gateway = graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-internet-gateway")),
        ResourceKind::InternetGateway,
        Properties::new().with("vpc_id", vpc.output(Attribute::Id)),
    ))?;

    let public_route_table = declare_route_table(graph, name, &vpc, Tier::Public)?;
    graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-public-route")),
        ResourceKind::Route,
        Properties::new()
            .with("route_table_id", public_route_table.output(Attribute::Id))
            .with("destination_cidr_block", ANYWHERE)
            .with("gateway_id", internet_gateway.output(Attribute::Id)),
    ))?;
    associate(graph, &public_route_table, &public_subnets)?;

    // Private tier gets no default route.
    let private_route_table = declare_route_table(graph, name, &vpc, Tier::Private)?;
    associate(graph, &private_route_table, &private_subnets)?;

    Ok(NetworkLayer {
        vpc,
        internet_gateway,
        public_route_table,
        private_route_table,
        public_subnets,
        private_subnets,
    })
}

fn declare_subnet(
    graph: &mut ResourceGraph,
    name: &str,
    vpc: &ResourceId,
    entry: &PlanEntry,
    tier: Tier,
) -> TopologyResult<ResourceId> {
    let descriptor = ResourceDescriptor::new(
        ResourceId::new(format!("{name}-{tier}-subnet-{}", entry.index)),
        ResourceKind::Subnet,
        Properties::new()
            .with("vpc_id", vpc.output(Attribute::Id))
            .with("cidr_block", entry.block(tier).to_string())
            .with("availability_zone", entry.zone.as_str())
            .with("map_public_ip_on_launch", tier == Tier::Public),
    )
    .with_placement(Placement {
        index: entry.index,
        zone: entry.zone.clone(),
        tier,
    });
    graph.declare(descriptor)
}

fn declare_route_table(
    graph: &mut ResourceGraph,
    name: &str,
    vpc: &ResourceId,
    tier: Tier,
) -> TopologyResult<ResourceId> {
    graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-{tier}-route-table")),
        ResourceKind::RouteTable,
        Properties::new().with("vpc_id", vpc.output(Attribute::Id)),
    ))
}

fn associate(
    graph: &mut ResourceGraph,
    route_table: &ResourceId,
    subnets: &[ResourceId],
) -> TopologyResult<()> {
    for subnet in subnets {
        graph.declare(ResourceDescriptor::new(
            ResourceId::new(format!("{subnet}-association")),
            ResourceKind::RouteTableAssociation,
            Properties::new()
                .with("subnet_id", subnet.output(Attribute::Id))
                .with("route_table_id", route_table.output(Attribute::Id)),
        ))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{full_config, plan};
    use crate::models::{Output, Value};

    fn refs_to(descriptor: &ResourceDescriptor, attr: &str) -> ResourceId {
        match descriptor.properties.get(attr) {
            Some(Value::Ref(Output { resource, .. })) => resource.clone(),
            other => panic!("{attr} is not a reference: {other:?}"),
        }
    }

    #[test]
    fn test_subnets_follow_plan() {
        let plan = plan();
        let mut graph = ResourceGraph::new();
        let layer = declare(&mut graph, &plan, &full_config().network).unwrap();

        assert_eq!(layer.public_subnets.len(), 3);
        assert_eq!(layer.public_subnets[1].as_str(), "webapp-public-subnet-1");
        assert_eq!(layer.private_subnets[2].as_str(), "webapp-private-subnet-2");

        for (entry, id) in plan.entries.iter().zip(&layer.private_subnets) {
            let subnet = graph.get(id).unwrap();
            assert_eq!(
                subnet.properties.get("cidr_block"),
                Some(&Value::from(entry.private_block.to_string()))
            );
            let placement = subnet.placement.as_ref().unwrap();
            assert_eq!(placement.zone, entry.zone);
            assert_eq!(placement.tier, Tier::Private);
            assert_eq!(
                subnet.properties.get("map_public_ip_on_launch"),
                Some(&Value::Bool(false))
            );
        }
    }

    #[test]
    fn test_only_public_table_routes_to_gateway() {
        let mut graph = ResourceGraph::new();
        let layer = declare(&mut graph, &plan(), &full_config().network).unwrap();

        let routes: Vec<_> = graph.of_kind(ResourceKind::Route).collect();
        assert_eq!(routes.len(), 1);
        assert_eq!(refs_to(routes[0], "route_table_id"), layer.public_route_table);
        assert_eq!(refs_to(routes[0], "gateway_id"), layer.internet_gateway);

        for association in graph.of_kind(ResourceKind::RouteTableAssociation) {
            let subnet = refs_to(association, "subnet_id");
            let table = refs_to(association, "route_table_id");
            if layer.public_subnets.contains(&subnet) {
                assert_eq!(table, layer.public_route_table);
            } else {
                assert!(layer.private_subnets.contains(&subnet));
                assert_eq!(table, layer.private_route_table);
            }
        }
    }

    #[test]
    fn test_empty_plan_rejected() {
        let mut plan = plan();
        plan.entries.clear();
        let mut graph = ResourceGraph::new();
        assert!(declare(&mut graph, &plan, &full_config().network).is_err());
    }
}
