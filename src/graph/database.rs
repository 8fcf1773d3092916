//! Data layer: parameter group, private subnet group and a single-zone
//! database instance.

use super::network::NetworkLayer;
use super::security::SecurityGroups;
use super::{violation, ResourceGraph};
use crate::config::DatabaseConfig;
use crate::error::TopologyResult;
use crate::models::{
    Attribute, Properties, ResourceDescriptor, ResourceId, ResourceKind, Tier, Value,
};

/// Ids of the declared data layer resources.
#[derive(Debug, Clone)]
pub struct DatabaseLayer {
    pub parameter_group: ResourceId,
    pub subnet_group: ResourceId,
    pub instance: ResourceId,
}

/// Declare the data layer on the private subnets.
pub fn declare(
    graph: &mut ResourceGraph,
    network: &NetworkLayer,
    groups: &SecurityGroups,
    name: &str,
    db: &DatabaseConfig,
) -> TopologyResult<DatabaseLayer> {
    let parameter_group = graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-db-parameter-group")),
        ResourceKind::DbParameterGroup,
        Properties::new()
            .with("family", db.family.as_str())
            .with("description", format!("Custom parameter group for {}", db.engine)),
    ))?;

    let subnet_group = declare_subnet_group(
        graph,
        ResourceId::new(format!("{name}-db-subnet-group")),
        &network.private_subnets,
    )?;

    let instance = graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-database")),
        ResourceKind::DbInstance,
        Properties::new()
            .with("engine", db.engine.as_str())
            .with("engine_version", db.engine_version.as_str())
            .with("instance_class", db.instance_class.as_str())
            .with("allocated_storage", db.allocated_storage)
            .with("storage_type", db.storage_type.as_str())
            .with("db_name", db.db_name.as_str())
            .with("username", db.username.as_str())
            .with("password", db.password.as_str())
            .with("port", db.port)
            .with("parameter_group_name", parameter_group.output(Attribute::Name))
            .with("db_subnet_group_name", subnet_group.output(Attribute::Name))
            .with(
                "vpc_security_group_ids",
                Value::list([groups.database.output(Attribute::Id)]),
            )
            .with("multi_az", false)
            .with("publicly_accessible", false)
            .with("skip_final_snapshot", true),
    ))?;

    Ok(DatabaseLayer {
        parameter_group,
        subnet_group,
        instance,
    })
}

/// Declare a database subnet group over `subnets`.
///
/// # Returns
/// * `Err(GraphWiringViolation)` - the list is empty, or names anything
///   other than a declared private subnet
pub fn declare_subnet_group(
    graph: &mut ResourceGraph,
    id: ResourceId,
    subnets: &[ResourceId],
) -> TopologyResult<ResourceId> {
    if subnets.is_empty() {
        return Err(violation(format!("{id} has no subnets")));
    }
    for subnet in subnets {
        let tier = graph
            .get(subnet)
            .filter(|d| d.kind == ResourceKind::Subnet)
            .and_then(|d| d.placement.as_ref())
            .map(|p| p.tier);
        if tier != Some(Tier::Private) {
            return Err(violation(format!(
                "{id} may only use private subnets, got {subnet}"
            )));
        }
    }

    graph.declare(ResourceDescriptor::new(
        id,
        ResourceKind::DbSubnetGroup,
        Properties::new().with(
            "subnet_ids",
            Value::list(subnets.iter().map(|s| s.output(Attribute::Id))),
        ),
    ))
}
