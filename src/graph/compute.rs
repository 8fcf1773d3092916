//! Compute and scaling layer.
//!
//! Launch template, instance profile for the metrics agent, target group,
//! autoscaling group on the public subnets and a pair of CPU alarms driving
//! step-up and step-down policies.

use super::bootstrap::render_user_data;
use super::database::DatabaseLayer;
use super::network::NetworkLayer;
use super::security::SecurityGroups;
use super::{violation, ResourceGraph};
use crate::config::{AlarmConfig, StackConfig};
use crate::error::TopologyResult;
use crate::models::{Attribute, Properties, ResourceDescriptor, ResourceId, ResourceKind, Value};

const EC2_ASSUME_ROLE_POLICY: &str = r#"{
    "Version": "2012-10-17",
    "Statement": [
        {
            "Effect": "Allow",
            "Principal": { "Service": "ec2.amazonaws.com" },
            "Action": "sts:AssumeRole"
        }
    ]
}"#;

const AGENT_POLICY_ARN: &str = "arn:aws:iam::aws:policy/CloudWatchAgentServerPolicy";

/// Ids of the declared compute resources.
#[derive(Debug, Clone)]
pub struct ComputeLayer {
    pub instance_profile: ResourceId,
    pub launch_template: ResourceId,
    pub target_group: ResourceId,
    pub autoscaling_group: ResourceId,
    pub scale_up_policy: ResourceId,
    pub scale_down_policy: ResourceId,
    pub scale_up_alarm: ResourceId,
    pub scale_down_alarm: ResourceId,
}

/// Direction of a scaling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Up,
    Down,
}

impl Step {
    fn adjustment(self) -> i64 {
        match self {
            Step::Up => 1,
            Step::Down => -1,
        }
    }

    fn comparison(self) -> &'static str {
        match self {
            Step::Up => "GreaterThanOrEqualToThreshold",
            Step::Down => "LessThanOrEqualToThreshold",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Step::Up => "up",
            Step::Down => "down",
        }
    }
}

/// Declare the compute layer. Must run after the data layer: the user data
/// reads the database address.
pub fn declare(
    graph: &mut ResourceGraph,
    network: &NetworkLayer,
    groups: &SecurityGroups,
    database: &DatabaseLayer,
    image_id: &str,
    config: &StackConfig,
) -> TopologyResult<ComputeLayer> {
    if network.public_subnets.is_empty() {
        return Err(violation("autoscaling group needs public subnets".to_string()));
    }
    let name = config.network.vpc_name.as_str();
    let compute = &config.compute;
    let scaling = &compute.scaling;
    if scaling.min_size > scaling.max_size {
        return Err(violation(format!(
            "autoscaling bounds inverted: min {} > max {}",
            scaling.min_size, scaling.max_size
        )));
    }

    let instance_profile = declare_instance_profile(graph, name)?;

    let user_data = render_user_data(&database.instance, config.database()?, compute);
    let mut template = Properties::new()
        .with("image_id", image_id)
        .with("instance_type", compute.instance_type.as_str())
        .with("user_data", user_data)
        .with(
            "iam_instance_profile",
            Value::map([("name", instance_profile.output(Attribute::Name))]),
        )
        .with(
            "block_device_mappings",
            Value::list([Value::map([
                ("device_name", Value::from("/dev/xvda")),
                (
                    "ebs",
                    Value::map([
                        ("volume_size", Value::from(compute.root_volume_size)),
                        ("volume_type", Value::from(compute.root_volume_type.as_str())),
                        ("delete_on_termination", Value::from(true)),
                    ]),
                ),
            ])]),
        )
        .with(
            "network_interfaces",
            Value::list([Value::map([
                ("associate_public_ip_address", Value::from(true)),
                (
                    "security_groups",
                    Value::list([groups.application.output(Attribute::Id)]),
                ),
            ])]),
        )
        .with("disable_api_termination", false);
    if let Some(key_name) = &compute.key_name {
        template = template.with("key_name", key_name.as_str());
    }
    let launch_template = graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-launch-template")),
        ResourceKind::LaunchTemplate,
        template,
    ))?;

    let target_group = graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-target-group")),
        ResourceKind::TargetGroup,
        Properties::new()
            .with("port", compute.app_port)
            .with("protocol", "HTTP")
            .with("target_type", "instance")
            .with("slow_start", 30u32)
            .with("vpc_id", network.vpc.output(Attribute::Id))
            .with(
                "health_check",
                Value::map([
                    ("path", Value::from(compute.health_check_path.as_str())),
                    ("port", Value::from(compute.app_port)),
                    ("protocol", Value::from("HTTP")),
                    ("matcher", Value::from("200")),
                    ("healthy_threshold", Value::from(3u32)),
                    ("unhealthy_threshold", Value::from(3u32)),
                    ("interval", Value::from(10u32)),
                ]),
            ),
    ))?;

    let autoscaling_group = graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-autoscaling-group")),
        ResourceKind::AutoscalingGroup,
        Properties::new()
            .with("min_size", scaling.min_size)
            .with("max_size", scaling.max_size)
            .with(
                "desired_capacity",
                scaling.desired_capacity.clamp(scaling.min_size, scaling.max_size),
            )
            .with("default_cooldown", scaling.cooldown)
            .with("health_check_type", "ELB")
            .with("health_check_grace_period", scaling.health_check_grace_period)
            .with("default_instance_warmup", scaling.instance_warmup)
            .with(
                "launch_template",
                Value::map([
                    ("id", Value::from(launch_template.output(Attribute::Id))),
                    ("version", Value::from("$Latest")),
                ]),
            )
            .with(
                "target_group_arns",
                Value::list([target_group.output(Attribute::Arn)]),
            )
            .with(
                "vpc_zone_identifiers",
                Value::list(network.public_subnets.iter().map(|s| s.output(Attribute::Id))),
            ),
    ))?;

    let scale_up_policy = declare_policy(graph, name, &autoscaling_group, Step::Up)?;
    let scale_down_policy = declare_policy(graph, name, &autoscaling_group, Step::Down)?;
    let scale_up_alarm = declare_alarm(
        graph,
        name,
        &autoscaling_group,
        &scale_up_policy,
        Step::Up,
        &scaling.scale_up,
    )?;
    let scale_down_alarm = declare_alarm(
        graph,
        name,
        &autoscaling_group,
        &scale_down_policy,
        Step::Down,
        &scaling.scale_down,
    )?;

    Ok(ComputeLayer {
        instance_profile,
        launch_template,
        target_group,
        autoscaling_group,
        scale_up_policy,
        scale_down_policy,
        scale_up_alarm,
        scale_down_alarm,
    })
}

fn declare_instance_profile(graph: &mut ResourceGraph, name: &str) -> TopologyResult<ResourceId> {
    let role = graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-agent-role")),
        ResourceKind::IamRole,
        Properties::new().with("assume_role_policy", EC2_ASSUME_ROLE_POLICY),
    ))?;
    graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-agent-policy")),
        ResourceKind::IamRolePolicyAttachment,
        Properties::new()
            .with("role", role.output(Attribute::Name))
            .with("policy_arn", AGENT_POLICY_ARN),
    ))?;
    graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-instance-profile")),
        ResourceKind::IamInstanceProfile,
        Properties::new().with("role", role.output(Attribute::Name)),
    ))
}

fn declare_policy(
    graph: &mut ResourceGraph,
    name: &str,
    group: &ResourceId,
    step: Step,
) -> TopologyResult<ResourceId> {
    graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-scale-{}-policy", step.label())),
        ResourceKind::ScalingPolicy,
        Properties::new()
            .with("autoscaling_group_name", group.output(Attribute::Name))
            .with("adjustment_type", "ChangeInCapacity")
            .with("policy_type", "SimpleScaling")
            .with("scaling_adjustment", step.adjustment())
            .with("metric_aggregation_type", "Average"),
    ))
}

fn declare_alarm(
    graph: &mut ResourceGraph,
    name: &str,
    group: &ResourceId,
    policy: &ResourceId,
    step: Step,
    alarm: &AlarmConfig,
) -> TopologyResult<ResourceId> {
    graph.declare(ResourceDescriptor::new(
        ResourceId::new(format!("{name}-scale-{}-alarm", step.label())),
        ResourceKind::MetricAlarm,
        Properties::new()
            .with("comparison_operator", step.comparison())
            .with("evaluation_periods", alarm.evaluation_periods)
            .with("metric_name", "CPUUtilization")
            .with("namespace", "AWS/EC2")
            .with("period", alarm.period)
            .with("statistic", "Average")
            .with("threshold", alarm.threshold)
            .with("alarm_actions", Value::list([policy.output(Attribute::Arn)]))
            .with(
                "dimensions",
                Value::map([("AutoScalingGroupName", group.output(Attribute::Name))]),
            ),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{facts, full_config, plan};
    use crate::graph::build_graph;

    fn build() -> (ResourceGraph, String) {
        let graph = build_graph(&plan(), &full_config(), &facts()).unwrap();
        (graph, "webapp".to_string())
    }

    fn int(graph: &ResourceGraph, id: &str, key: &str) -> Option<Value> {
        graph
            .get(&ResourceId::new(id))
            .and_then(|d| d.properties.get(key).cloned())
    }

    #[test]
    fn test_launch_template_waits_on_database() {
        let (graph, name) = build();
        let template = ResourceId::new(format!("{name}-launch-template"));
        let database = ResourceId::new(format!("{name}-database"));
        let descriptor = graph.get(&template).unwrap();

        assert!(descriptor
            .references()
            .iter()
            .any(|o| o.resource == database && o.attribute == Attribute::Address));
        assert!(graph.position(&database) < graph.position(&template));
        assert!(!descriptor.properties.get("user_data").unwrap().is_known());
    }

    #[test]
    fn test_autoscaling_on_public_subnets() {
        let (graph, name) = build();
        let asg = graph
            .get(&ResourceId::new(format!("{name}-autoscaling-group")))
            .unwrap();
        let public: Vec<&ResourceId> = graph.subnets(crate::models::Tier::Public).map(|d| &d.id).collect();
        let subnet_refs: Vec<&ResourceId> = asg
            .references()
            .into_iter()
            .map(|o| &o.resource)
            .filter(|r| r.as_str().contains("subnet"))
            .collect();
        assert_eq!(subnet_refs, public);
        assert_eq!(int(&graph, "webapp-autoscaling-group", "desired_capacity"), Some(Value::Int(1)));
        assert_eq!(
            int(&graph, "webapp-autoscaling-group", "default_instance_warmup"),
            Some(Value::Int(10))
        );
    }

    #[test]
    fn test_scale_up_is_more_conservative() {
        let (graph, _) = build();
        let up = int(&graph, "webapp-scale-up-alarm", "evaluation_periods");
        let down = int(&graph, "webapp-scale-down-alarm", "evaluation_periods");
        assert_eq!(up, Some(Value::Int(2)));
        assert_eq!(down, Some(Value::Int(1)));
        assert_eq!(
            int(&graph, "webapp-scale-up-policy", "scaling_adjustment"),
            Some(Value::Int(1))
        );
        assert_eq!(
            int(&graph, "webapp-scale-down-policy", "scaling_adjustment"),
            Some(Value::Int(-1))
        );
        assert_eq!(
            int(&graph, "webapp-scale-up-alarm", "threshold"),
            Some(Value::Float(5.0))
        );
    }
}
