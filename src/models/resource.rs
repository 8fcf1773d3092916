//! Declarative resource descriptors and deferred cross-resource references.
//!
//! A descriptor never holds a realised cloud identifier. Anything only known
//! once the provisioning engine has created a resource (an id, an ARN, a
//! database address) is carried as an [`Output`] and substituted later
//! through [`Value::resolve`].

use super::{Tier, Zone};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// Logical name of a descriptor, unique within one graph.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(name: impl Into<String>) -> ResourceId {
        ResourceId(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Deferred handle on one of this resource's realised attributes.
    pub fn output(&self, attribute: Attribute) -> Output {
        Output {
            resource: self.clone(),
            attribute,
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kinds of resources the graph builder declares.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Vpc,
    Subnet,
    InternetGateway,
    RouteTable,
    Route,
    RouteTableAssociation,
    SecurityGroup,
    DbParameterGroup,
    DbSubnetGroup,
    DbInstance,
    IamRole,
    IamRolePolicyAttachment,
    IamInstanceProfile,
    LaunchTemplate,
    TargetGroup,
    AutoscalingGroup,
    ScalingPolicy,
    MetricAlarm,
    LoadBalancer,
    Listener,
    DnsRecord,
}

impl ResourceKind {
    /// Provider type token the engine uses to pick a resource implementation.
    pub fn type_token(&self) -> &'static str {
        match self {
            ResourceKind::Vpc => "aws:ec2/vpc:Vpc",
            ResourceKind::Subnet => "aws:ec2/subnet:Subnet",
            ResourceKind::InternetGateway => "aws:ec2/internetGateway:InternetGateway",
            ResourceKind::RouteTable => "aws:ec2/routeTable:RouteTable",
            ResourceKind::Route => "aws:ec2/route:Route",
            ResourceKind::RouteTableAssociation => {
                "aws:ec2/routeTableAssociation:RouteTableAssociation"
            }
            ResourceKind::SecurityGroup => "aws:ec2/securityGroup:SecurityGroup",
            ResourceKind::DbParameterGroup => "aws:rds/parameterGroup:ParameterGroup",
            ResourceKind::DbSubnetGroup => "aws:rds/subnetGroup:SubnetGroup",
            ResourceKind::DbInstance => "aws:rds/instance:Instance",
            ResourceKind::IamRole => "aws:iam/role:Role",
            ResourceKind::IamRolePolicyAttachment => {
                "aws:iam/rolePolicyAttachment:RolePolicyAttachment"
            }
            ResourceKind::IamInstanceProfile => "aws:iam/instanceProfile:InstanceProfile",
            ResourceKind::LaunchTemplate => "aws:ec2/launchTemplate:LaunchTemplate",
            ResourceKind::TargetGroup => "aws:lb/targetGroup:TargetGroup",
            ResourceKind::AutoscalingGroup => "aws:autoscaling/group:Group",
            ResourceKind::ScalingPolicy => "aws:autoscaling/policy:Policy",
            ResourceKind::MetricAlarm => "aws:cloudwatch/metricAlarm:MetricAlarm",
            ResourceKind::LoadBalancer => "aws:lb/loadBalancer:LoadBalancer",
            ResourceKind::Listener => "aws:lb/listener:Listener",
            ResourceKind::DnsRecord => "aws:route53/record:Record",
        }
    }
}

/// Realised attribute of a resource that only exists after apply.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Attribute {
    Id,
    Arn,
    Name,
    Address,
    DnsName,
    ZoneId,
}

/// Resolve-when-available reference to another descriptor's attribute.
#[derive(Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Output {
    pub resource: ResourceId,
    pub attribute: Attribute,
}

/// Property value of a descriptor, possibly containing deferred parts.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Attribute of another resource, known after that resource is realised.
    Ref(Output),
    /// String concatenation of the parts, evaluated once all parts resolve.
    Concat(Vec<Value>),
    /// Base64 encoding of the resolved inner string.
    Base64(Box<Value>),
}

impl Value {
    /// Build a map value from key/value pairs.
    pub fn map<K, V, I>(pairs: I) -> Value
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a list value.
    pub fn list<V: Into<Value>, I: IntoIterator<Item = V>>(items: I) -> Value {
        Value::List(items.into_iter().map(Into::into).collect())
    }

    /// True when no part of the value waits on another resource.
    pub fn is_known(&self) -> bool {
        let mut refs = Vec::new();
        self.collect_refs(&mut refs);
        refs.is_empty()
    }

    /// Push every deferred reference carried by this value.
    pub fn collect_refs<'a>(&'a self, refs: &mut Vec<&'a Output>) {
        match self {
            Value::Ref(output) => refs.push(output),
            Value::List(items) | Value::Concat(items) => {
                items.iter().for_each(|v| v.collect_refs(refs))
            }
            Value::Map(map) => map.values().for_each(|v| v.collect_refs(refs)),
            Value::Base64(inner) => inner.collect_refs(refs),
            Value::Str(_) | Value::Int(_) | Value::Float(_) | Value::Bool(_) => {}
        }
    }

    /// Substitute realised attributes.
    ///
    /// Returns `None` while `lookup` cannot supply any referenced attribute.
    pub fn resolve<F>(&self, lookup: &F) -> Option<serde_json::Value>
    where
        F: Fn(&Output) -> Option<String>,
    {
        let resolved = match self {
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Value::from(*f),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::List(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(|v| v.resolve(lookup))
                    .collect::<Option<Vec<_>>>()?,
            ),
            Value::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| v.resolve(lookup).map(|v| (k.clone(), v)))
                    .collect::<Option<serde_json::Map<_, _>>>()?,
            ),
            Value::Ref(output) => serde_json::Value::String(lookup(output)?),
            Value::Concat(_) | Value::Base64(_) => {
                serde_json::Value::String(self.resolve_string(lookup)?)
            }
        };
        Some(resolved)
    }

    fn resolve_string<F>(&self, lookup: &F) -> Option<String>
    where
        F: Fn(&Output) -> Option<String>,
    {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Ref(output) => lookup(output),
            Value::Concat(parts) => parts
                .iter()
                .map(|p| p.resolve_string(lookup))
                .collect::<Option<String>>(),
            Value::Base64(inner) => Some(STANDARD.encode(inner.resolve_string(lookup)?)),
            Value::List(_) | Value::Map(_) => None,
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Str(s) => serializer.serialize_str(s),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::List(items) => items.serialize(serializer),
            Value::Map(map) => map.serialize(serializer),
            Value::Ref(output) => {
                let mut m = serializer.serialize_map(Some(1))?;
                m.serialize_entry("$ref", output)?;
                m.end()
            }
            Value::Concat(parts) => {
                let mut m = serializer.serialize_map(Some(1))?;
                m.serialize_entry("$concat", parts)?;
                m.end()
            }
            Value::Base64(inner) => {
                let mut m = serializer.serialize_map(Some(1))?;
                m.serialize_entry("$base64", inner)?;
                m.end()
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<u16> for Value {
    fn from(i: u16) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Output> for Value {
    fn from(o: Output) -> Self {
        Value::Ref(o)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

/// Named properties of a descriptor.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, Value>);

impl Properties {
    pub fn new() -> Properties {
        Properties(BTreeMap::new())
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Properties {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// Zone and tier a subnet descriptor is bound to.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub index: usize,
    pub zone: Zone,
    pub tier: Tier,
}

/// Declaration of one desired cloud resource.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    pub id: ResourceId,
    pub kind: ResourceKind,
    #[serde(rename = "type")]
    pub type_token: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement: Option<Placement>,
    pub properties: Properties,
}

impl ResourceDescriptor {
    pub fn new(id: ResourceId, kind: ResourceKind, properties: Properties) -> ResourceDescriptor {
        ResourceDescriptor {
            id,
            kind,
            type_token: kind.type_token(),
            placement: None,
            properties,
        }
    }

    pub fn with_placement(mut self, placement: Placement) -> ResourceDescriptor {
        self.placement = Some(placement);
        self
    }

    /// Deferred references carried by any property.
    pub fn references(&self) -> Vec<&Output> {
        let mut refs = Vec::new();
        for (_, value) in self.properties.iter() {
            value.collect_refs(&mut refs);
        }
        refs
    }

    /// Distinct resources this descriptor depends on, in first-seen order.
    pub fn depends_on(&self) -> Vec<&ResourceId> {
        let mut deps: Vec<&ResourceId> = Vec::new();
        for output in self.references() {
            if !deps.contains(&&output.resource) {
                deps.push(&output.resource);
            }
        }
        deps
    }

    pub fn output(&self, attribute: Attribute) -> Output {
        self.id.output(attribute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db_address() -> Output {
        ResourceId::new("db").output(Attribute::Address)
    }

    #[test]
    fn test_resolve_waits_for_reference() {
        let url = Value::Concat(vec![
            "jdbc:postgresql://".into(),
            db_address().into(),
            ":5432/app".into(),
        ]);
        assert!(!url.is_known());
        assert_eq!(url.resolve(&|_: &Output| None), None);

        let resolved = url.resolve(&|o: &Output| {
            (o.attribute == Attribute::Address).then(|| "db.internal".to_string())
        });
        assert_eq!(
            resolved,
            Some(serde_json::json!("jdbc:postgresql://db.internal:5432/app"))
        );
    }

    #[test]
    fn test_resolve_base64() {
        let script = Value::Base64(Box::new(Value::Concat(vec![
            "host=".into(),
            db_address().into(),
        ])));
        let resolved = script.resolve(&|_: &Output| Some("h".to_string()));
        assert_eq!(resolved, Some(serde_json::json!(STANDARD.encode("host=h"))));
    }

    #[test]
    fn test_serialize_marks_deferred_parts() {
        let value = Value::map([("subnet_id", Value::from(db_address()))]);
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"subnet_id": {"$ref": {"resource": "db", "attribute": "address"}}})
        );
    }

    #[test]
    fn test_depends_on_is_distinct() {
        let vpc = ResourceId::new("vpc");
        let props = Properties::new()
            .with("vpc_id", vpc.output(Attribute::Id))
            .with("tags", Value::list([vpc.output(Attribute::Arn)]))
            .with("name", "x");
        let descriptor = ResourceDescriptor::new(ResourceId::new("sg"), ResourceKind::SecurityGroup, props);
        assert_eq!(descriptor.references().len(), 2);
        assert_eq!(descriptor.depends_on(), vec![&vpc]);
        assert_eq!(descriptor.type_token, "aws:ec2/securityGroup:SecurityGroup");
    }
}
