//! Resource graph construction.
//!
//! Turns a [`SubnetPlan`] plus configuration and external facts into the
//! full set of resource descriptors handed to the provisioning engine:
//! - [`network`] - VPC, subnets, gateway, route tables
//! - [`security`] - load balancer, application and database security groups
//! - [`database`] - parameter group, private subnet group, database instance
//! - [`compute`] - launch template, target group, autoscaling and alarms
//! - [`edge`] - load balancer, listener, DNS alias
//!
//! Wiring is all-or-nothing: any broken reference aborts the whole build.

pub mod bootstrap;
pub mod compute;
pub mod database;
pub mod edge;
pub mod network;
pub mod security;

use crate::config::{DeploymentProfile, StackConfig};
use crate::error::{TopologyError, TopologyResult};
use crate::models::{
    HostedZone, ResourceDescriptor, ResourceId, ResourceKind, SubnetPlan, Tier,
};
use crate::topology::check_plan;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Facts looked up from the cloud before the graph is built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackFacts {
    /// Concrete machine image for the launch template.
    pub image_id: Option<String>,
    /// Hosted zone the DNS record is created in.
    pub hosted_zone: Option<HostedZone>,
}

/// Ordered, immutable-once-declared set of descriptors for one run.
///
/// A descriptor can only be declared after every resource it references,
/// so iteration order is always a valid dependency order.
#[derive(Serialize, Debug, Clone, Default)]
pub struct ResourceGraph {
    resources: Vec<ResourceDescriptor>,
    #[serde(skip)]
    index: HashMap<ResourceId, usize>,
}

impl ResourceGraph {
    pub fn new() -> ResourceGraph {
        ResourceGraph::default()
    }

    /// Link a descriptor into the graph.
    ///
    /// # Returns
    /// * `Ok(ResourceId)` - id of the declared descriptor
    /// * `Err(GraphWiringViolation)` - duplicate id, reference to an
    ///   undeclared resource, or a subnet without a zone placement
    pub fn declare(&mut self, descriptor: ResourceDescriptor) -> TopologyResult<ResourceId> {
        if self.index.contains_key(&descriptor.id) {
            return Err(violation(format!("{} declared twice", descriptor.id)));
        }
        if let Some(missing) = descriptor
            .depends_on()
            .into_iter()
            .find(|dep| !self.index.contains_key(*dep))
        {
            return Err(violation(format!(
                "{} references undeclared resource {missing}",
                descriptor.id
            )));
        }
        if descriptor.kind == ResourceKind::Subnet && descriptor.placement.is_none() {
            return Err(violation(format!(
                "subnet {} has no zone assignment",
                descriptor.id
            )));
        }

        log::debug!(
            "declare {} {} depends_on={:?}",
            descriptor.type_token,
            descriptor.id,
            descriptor
                .depends_on()
                .iter()
                .map(|d| d.as_str())
                .collect::<Vec<_>>()
        );
        let id = descriptor.id.clone();
        self.index.insert(id.clone(), self.resources.len());
        self.resources.push(descriptor);
        Ok(id)
    }

    pub fn get(&self, id: &ResourceId) -> Option<&ResourceDescriptor> {
        self.index.get(id).map(|&i| &self.resources[i])
    }

    /// Descriptors in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceDescriptor> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &ResourceDescriptor> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    /// Subnet descriptors of one tier, in plan order.
    pub fn subnets(&self, tier: Tier) -> impl Iterator<Item = &ResourceDescriptor> {
        self.of_kind(ResourceKind::Subnet)
            .filter(move |r| r.placement.as_ref().map(|p| p.tier) == Some(tier))
    }

    /// Position of a descriptor in declaration order.
    pub fn position(&self, id: &ResourceId) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn count_by_kind(&self) -> BTreeMap<ResourceKind, usize> {
        let mut counts = BTreeMap::new();
        for r in &self.resources {
            *counts.entry(r.kind).or_insert(0) += 1;
        }
        counts
    }
}

/// Build every descriptor for one provisioning run.
///
/// # Arguments
/// * `plan` - subnet plan from the synthesizer
/// * `config` - validated stack configuration
/// * `facts` - image and hosted zone, required by the full-stack profile
pub fn build_graph(
    plan: &SubnetPlan,
    config: &StackConfig,
    facts: &StackFacts,
) -> TopologyResult<ResourceGraph> {
    check_plan(plan)?;
    let mut graph = ResourceGraph::new();

    let network = network::declare(&mut graph, plan, &config.network)?;
    if config.profile == DeploymentProfile::NetworkOnly {
        log::info!("network_only profile: {} resources declared", graph.len());
        return Ok(graph);
    }

    let image_id = facts.image_id.as_deref().ok_or_else(|| {
        TopologyError::InvalidTopologyConfig("full_stack profile requires a machine image".into())
    })?;
    let hosted_zone = facts.hosted_zone.as_ref().ok_or_else(|| {
        TopologyError::InvalidTopologyConfig("full_stack profile requires a hosted zone".into())
    })?;

    let groups = security::declare(&mut graph, &network, config)?;
    let database = database::declare(
        &mut graph,
        &network,
        &groups,
        &config.network.vpc_name,
        config.database()?,
    )?;
    let compute = compute::declare(&mut graph, &network, &groups, &database, image_id, config)?;
    edge::declare(&mut graph, &network, &groups, &compute, hosted_zone)?;

    log::info!("full_stack profile: {} resources declared", graph.len());
    Ok(graph)
}

pub(crate) fn violation(message: String) -> TopologyError {
    TopologyError::GraphWiringViolation(message)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::{Attribute, Properties, Zone};
    use crate::topology::compute_subnet_plan;

    pub(crate) fn full_config() -> StackConfig {
        crate::config::load_config("src/tests/test_data/stack_full.json").unwrap()
    }

    pub(crate) fn facts() -> StackFacts {
        StackFacts {
            image_id: Some("ami-0abc".to_string()),
            hosted_zone: Some(HostedZone {
                zone_id: "Z123".to_string(),
                name: "dev.example.com".to_string(),
            }),
        }
    }

    pub(crate) fn plan() -> SubnetPlan {
        let zones = vec![Zone::new("us-east-1a"), Zone::new("us-east-1b"), Zone::new("us-east-1c")];
        compute_subnet_plan("10.0.0.0/16", 3, &zones).unwrap()
    }

    #[test]
    fn test_declare_rejects_forward_reference() {
        let mut graph = ResourceGraph::new();
        let vpc = ResourceId::new("vpc");
        let igw = ResourceDescriptor::new(
            ResourceId::new("igw"),
            ResourceKind::InternetGateway,
            Properties::new().with("vpc_id", vpc.output(Attribute::Id)),
        );
        assert!(matches!(
            graph.declare(igw.clone()),
            Err(TopologyError::GraphWiringViolation(_))
        ));
        assert!(graph.is_empty());

        graph
            .declare(ResourceDescriptor::new(vpc, ResourceKind::Vpc, Properties::new()))
            .unwrap();
        graph.declare(igw.clone()).unwrap();
        assert!(graph.declare(igw).is_err(), "duplicate id must be rejected");
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_subnet_without_zone_rejected() {
        let mut graph = ResourceGraph::new();
        let subnet = ResourceDescriptor::new(
            ResourceId::new("orphan"),
            ResourceKind::Subnet,
            Properties::new(),
        );
        assert!(graph.declare(subnet).is_err());
    }

    #[test]
    fn test_full_stack_counts() {
        let graph = build_graph(&plan(), &full_config(), &facts()).unwrap();
        let counts = graph.count_by_kind();
        assert_eq!(counts[&ResourceKind::Vpc], 1);
        assert_eq!(counts[&ResourceKind::Subnet], 6);
        assert_eq!(counts[&ResourceKind::RouteTable], 2);
        assert_eq!(counts[&ResourceKind::Route], 1);
        assert_eq!(counts[&ResourceKind::RouteTableAssociation], 6);
        assert_eq!(counts[&ResourceKind::SecurityGroup], 3);
        assert_eq!(counts[&ResourceKind::DbInstance], 1);
        assert_eq!(counts[&ResourceKind::ScalingPolicy], 2);
        assert_eq!(counts[&ResourceKind::MetricAlarm], 2);
        assert_eq!(counts[&ResourceKind::LoadBalancer], 1);
        assert_eq!(counts[&ResourceKind::DnsRecord], 1);
    }

    #[test]
    fn test_declaration_order_is_dependency_order() {
        let graph = build_graph(&plan(), &full_config(), &facts()).unwrap();
        for (position, descriptor) in graph.iter().enumerate() {
            for dep in descriptor.depends_on() {
                assert!(
                    graph.position(dep).unwrap() < position,
                    "{} declared before its dependency {dep}",
                    descriptor.id
                );
            }
        }
    }

    #[test]
    fn test_network_only_profile() {
        let mut config = full_config();
        config.profile = DeploymentProfile::NetworkOnly;
        let graph = build_graph(&plan(), &config, &StackFacts::default()).unwrap();
        assert_eq!(graph.of_kind(ResourceKind::SecurityGroup).count(), 0);
        assert_eq!(graph.of_kind(ResourceKind::DbInstance).count(), 0);
        assert_eq!(graph.of_kind(ResourceKind::Subnet).count(), 6);
    }

    #[test]
    fn test_full_stack_requires_facts() {
        let err = build_graph(&plan(), &full_config(), &StackFacts::default()).unwrap_err();
        assert!(matches!(err, TopologyError::InvalidTopologyConfig(_)));
    }

    #[test]
    fn test_corrupted_plan_builds_nothing() {
        let mut plan = plan();
        plan.entries[2].public_block = plan.entries[0].private_block;
        assert!(matches!(
            build_graph(&plan, &full_config(), &facts()),
            Err(TopologyError::GraphWiringViolation(_))
        ));
    }
}
