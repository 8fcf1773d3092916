//! Stack configuration.
//!
//! Read once at the start of a run from a JSON file and passed explicitly to
//! the synthesizer and the graph builder.

use crate::error::{TopologyError, TopologyResult};
use crate::models::{Ipv4, Zone};
use serde::{Deserialize, Serialize};

/// Default configuration file, overridden by `STACK_CONFIG`.
pub const DEFAULT_CONFIG_FILE: &str = "stack.json";

/// Which tiers a run provisions.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentProfile {
    /// VPC, subnets, gateway and route tables only.
    NetworkOnly,
    /// Network plus security, database, autoscaling and edge tiers.
    #[default]
    FullStack,
}

/// Top level configuration for one provisioning run.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StackConfig {
    #[serde(default)]
    pub profile: DeploymentProfile,
    pub region: RegionConfig,
    pub network: NetworkConfig,
    #[serde(default)]
    pub image: ImageSelector,
    #[serde(default)]
    pub compute: ComputeConfig,
    pub database: Option<DatabaseConfig>,
    pub dns: Option<DnsConfig>,
    #[serde(default)]
    pub manifest: ManifestConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RegionConfig {
    /// Region name, e.g. "us-east-1".
    pub name: String,
    /// Fixed zone list; when absent zones are discovered from the provider.
    #[serde(default)]
    pub zones: Option<Vec<Zone>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct NetworkConfig {
    pub vpc_name: String,
    /// VPC block in CIDR notation; validated before synthesis.
    pub vpc_cidr: String,
    pub desired_zone_count: u32,
    /// Source block allowed to reach the administrative port.
    #[serde(default = "default_admin_cidr")]
    pub admin_cidr: String,
}

fn default_admin_cidr() -> String {
    "0.0.0.0/0".to_string()
}

/// Machine image lookup parameters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ImageSelector {
    /// Fixed image id; skips discovery when set.
    pub ami_id: Option<String>,
    /// Provider-side name filter (wildcards allowed).
    pub name_filter: String,
    /// Client-side regex the image name must match.
    pub name_regex: Option<String>,
    pub owners: Vec<String>,
}

impl Default for ImageSelector {
    fn default() -> Self {
        ImageSelector {
            ami_id: None,
            name_filter: "webapp_*".to_string(),
            name_regex: None,
            owners: vec!["self".to_string()],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ComputeConfig {
    pub instance_type: String,
    pub key_name: Option<String>,
    pub root_volume_size: u32,
    pub root_volume_type: String,
    pub app_port: u16,
    pub admin_port: u16,
    pub health_check_path: String,
    pub scaling: ScalingConfig,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        ComputeConfig {
            instance_type: "t2.micro".to_string(),
            key_name: None,
            root_volume_size: 25,
            root_volume_type: "gp2".to_string(),
            app_port: 8080,
            admin_port: 22,
            health_check_path: "/healthz".to_string(),
            scaling: ScalingConfig::default(),
        }
    }
}

/// Autoscaling group bounds and the two CPU alarms driving it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ScalingConfig {
    pub min_size: u32,
    pub max_size: u32,
    pub desired_capacity: u32,
    pub cooldown: u32,
    pub health_check_grace_period: u32,
    /// Seconds before a new instance's metrics count towards the alarms.
    pub instance_warmup: u32,
    pub scale_up: AlarmConfig,
    pub scale_down: AlarmConfig,
}

impl Default for ScalingConfig {
    fn default() -> Self {
        ScalingConfig {
            min_size: 1,
            max_size: 3,
            desired_capacity: 1,
            cooldown: 60,
            health_check_grace_period: 300,
            instance_warmup: 10,
            scale_up: AlarmConfig {
                threshold: 5.0,
                evaluation_periods: 2,
                period: 60,
            },
            scale_down: AlarmConfig {
                threshold: 3.0,
                evaluation_periods: 1,
                period: 60,
            },
        }
    }
}

/// CPU utilization alarm parameters.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AlarmConfig {
    /// Percent CPU.
    pub threshold: f64,
    pub evaluation_periods: u32,
    /// Seconds per evaluation period.
    pub period: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default = "default_engine_version")]
    pub engine_version: String,
    /// Parameter group family, e.g. "postgres15".
    #[serde(default = "default_family")]
    pub family: String,
    #[serde(default = "default_instance_class")]
    pub instance_class: String,
    #[serde(default = "default_storage_type")]
    pub storage_type: String,
    #[serde(default = "default_allocated_storage")]
    pub allocated_storage: u32,
    pub db_name: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
}

fn default_engine() -> String {
    "postgres".to_string()
}

fn default_engine_version() -> String {
    "15".to_string()
}

fn default_family() -> String {
    "postgres15".to_string()
}

fn default_instance_class() -> String {
    "db.t3.micro".to_string()
}

fn default_storage_type() -> String {
    "gp2".to_string()
}

fn default_allocated_storage() -> u32 {
    20
}

fn default_db_port() -> u16 {
    5432
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DnsConfig {
    /// Public hosted zone whose apex is aliased to the load balancer.
    pub zone_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ManifestConfig {
    pub path: String,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        ManifestConfig {
            path: "stack_manifest.json".to_string(),
        }
    }
}

/// Read, parse and validate a configuration file.
///
/// # Returns
/// * `Ok(StackConfig)` - validated configuration
/// * `Err(InvalidTopologyConfig)` - unreadable file, malformed JSON (with the
///   failing field path) or a value rejected by [`StackConfig::validate`]
pub fn load_config(path: &str) -> TopologyResult<StackConfig> {
    log::info!("Reading stack config: {path}");
    let json = std::fs::read_to_string(path).map_err(|e| {
        TopologyError::InvalidTopologyConfig(format!("cannot read config file {path}: {e}"))
    })?;
    StackConfig::from_json(&json)
}

impl StackConfig {
    /// Parse and validate configuration JSON.
    pub fn from_json(json: &str) -> TopologyResult<StackConfig> {
        let mut deserializer = serde_json::Deserializer::from_str(json);
        let config: StackConfig =
            serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
                TopologyError::InvalidTopologyConfig(format!("path={} error={}", e.path(), e))
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot produce a sound topology.
    pub fn validate(&self) -> TopologyResult<()> {
        if self.region.name.trim().is_empty() {
            return Err(invalid("region.name is empty"));
        }
        if let Some(zones) = &self.region.zones {
            if zones.is_empty() || zones.iter().any(|z| z.as_str().trim().is_empty()) {
                return Err(invalid("region.zones must list non-empty zone names"));
            }
        }
        if self.network.vpc_name.trim().is_empty() {
            return Err(invalid("network.vpc_name is empty"));
        }
        Ipv4::new(&self.network.vpc_cidr).map_err(|e| {
            invalid(&format!("network.vpc_cidr '{}': {e}", self.network.vpc_cidr))
        })?;
        Ipv4::new(&self.network.admin_cidr).map_err(|e| {
            invalid(&format!("network.admin_cidr '{}': {e}", self.network.admin_cidr))
        })?;
        if self.network.desired_zone_count == 0 {
            return Err(invalid("network.desired_zone_count must be positive"));
        }

        if self.profile == DeploymentProfile::FullStack {
            self.validate_full_stack()?;
        }
        Ok(())
    }

    fn validate_full_stack(&self) -> TopologyResult<()> {
        let database = self.database()?;
        if database.db_name.trim().is_empty() || database.username.trim().is_empty() {
            return Err(invalid("database.db_name and database.username are required"));
        }
        self.dns()?;

        let compute = &self.compute;
        if compute.app_port == 0 || compute.admin_port == 0 || database.port == 0 {
            return Err(invalid("ports must be non-zero"));
        }

        let scaling = &compute.scaling;
        if scaling.min_size > scaling.max_size {
            return Err(invalid(&format!(
                "compute.scaling.min_size {} exceeds max_size {}",
                scaling.min_size, scaling.max_size
            )));
        }
        if scaling.desired_capacity < scaling.min_size
            || scaling.desired_capacity > scaling.max_size
        {
            return Err(invalid(&format!(
                "compute.scaling.desired_capacity {} outside [{}, {}]",
                scaling.desired_capacity, scaling.min_size, scaling.max_size
            )));
        }
        for (name, alarm) in [("scale_up", &scaling.scale_up), ("scale_down", &scaling.scale_down)] {
            if alarm.evaluation_periods == 0 || alarm.period == 0 {
                return Err(invalid(&format!(
                    "compute.scaling.{name} needs a positive evaluation window"
                )));
            }
        }
        if scaling.scale_up.threshold <= scaling.scale_down.threshold {
            return Err(invalid(&format!(
                "scale_up threshold {} must be above scale_down threshold {}",
                scaling.scale_up.threshold, scaling.scale_down.threshold
            )));
        }
        if scaling.scale_up.evaluation_periods <= scaling.scale_down.evaluation_periods {
            return Err(invalid(&format!(
                "scale_up evaluation_periods {} must exceed scale_down's {}",
                scaling.scale_up.evaluation_periods, scaling.scale_down.evaluation_periods
            )));
        }
        Ok(())
    }

    /// Database section, required by the full-stack profile.
    pub fn database(&self) -> TopologyResult<&DatabaseConfig> {
        self.database
            .as_ref()
            .ok_or_else(|| invalid("full_stack profile requires a database section"))
    }

    /// DNS section, required by the full-stack profile.
    pub fn dns(&self) -> TopologyResult<&DnsConfig> {
        self.dns
            .as_ref()
            .ok_or_else(|| invalid("full_stack profile requires a dns section"))
    }
}

fn invalid(message: &str) -> TopologyError {
    TopologyError::InvalidTopologyConfig(message.to_string())
}
