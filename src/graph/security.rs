//! Access-control layer.
//!
//! Three groups form a strict chain: the database admits only the
//! application group, which admits only the load balancer group (plus the
//! administrative CIDR), which admits the web ports from anywhere.

use super::network::{NetworkLayer, ANYWHERE};
use super::ResourceGraph;
use crate::config::StackConfig;
use crate::error::TopologyResult;
use crate::models::{Attribute, Properties, ResourceDescriptor, ResourceId, ResourceKind, Value};

pub const HTTP_PORT: u16 = 80;
pub const HTTPS_PORT: u16 = 443;

/// Ids of the declared security groups.
#[derive(Debug, Clone)]
pub struct SecurityGroups {
    pub load_balancer: ResourceId,
    pub application: ResourceId,
    pub database: ResourceId,
}

/// Where an ingress rule admits traffic from.
enum Source<'a> {
    Cidr(&'a str),
    Group(&'a ResourceId),
}

fn ingress(description: &str, port: u16, source: Source) -> Value {
    let mut rule = vec![
        ("description", Value::from(description)),
        ("from_port", Value::from(port)),
        ("to_port", Value::from(port)),
        ("protocol", Value::from("tcp")),
    ];
    match source {
        Source::Cidr(cidr) => rule.push(("cidr_blocks", Value::list([cidr]))),
        Source::Group(group) => rule.push((
            "security_groups",
            Value::list([group.output(Attribute::Id)]),
        )),
    }
    Value::map(rule)
}

fn egress_all() -> Value {
    Value::list([Value::map([
        ("from_port", Value::from(0u16)),
        ("to_port", Value::from(0u16)),
        ("protocol", Value::from("-1")),
        ("cidr_blocks", Value::list([ANYWHERE])),
    ])])
}

/// Declare the three groups in dependency order.
pub fn declare(
    graph: &mut ResourceGraph,
    network: &NetworkLayer,
    config: &StackConfig,
) -> TopologyResult<SecurityGroups> {
    let name = config.network.vpc_name.as_str();
    let vpc_id = network.vpc.output(Attribute::Id);
    let compute = &config.compute;
    let db_config = config.database()?;

    let load_balancer = graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-load-balancer-sg")),
        ResourceKind::SecurityGroup,
        Properties::new()
            .with("description", "Load balancer security group")
            .with("vpc_id", vpc_id.clone())
            .with(
                "ingress",
                Value::list([
                    ingress("HTTP from anywhere", HTTP_PORT, Source::Cidr(ANYWHERE)),
                    ingress("HTTPS from anywhere", HTTPS_PORT, Source::Cidr(ANYWHERE)),
                ]),
            )
            .with("egress", egress_all()),
    ))?;

    let application = graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-application-sg")),
        ResourceKind::SecurityGroup,
        Properties::new()
            .with("description", "Application security group")
            .with("vpc_id", vpc_id.clone())
            .with(
                "ingress",
                Value::list([
                    ingress(
                        "Administrative access",
                        compute.admin_port,
                        Source::Cidr(&config.network.admin_cidr),
                    ),
                    ingress(
                        "Application traffic from the load balancer",
                        compute.app_port,
                        Source::Group(&load_balancer),
                    ),
                ]),
            )
            .with("egress", egress_all()),
    ))?;

    let database = graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-database-sg")),
        ResourceKind::SecurityGroup,
        Properties::new()
            .with("description", "Database security group")
            .with("vpc_id", vpc_id)
            .with(
                "ingress",
                Value::list([ingress(
                    "Database traffic from the application",
                    db_config.port,
                    Source::Group(&application),
                )]),
            ),
    ))?;

    Ok(SecurityGroups {
        load_balancer,
        application,
        database,
    })
}
