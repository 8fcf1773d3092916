//! Cloud metadata lookups.
//!
//! Everything the topology needs from the provider before any resource is
//! declared: the usable availability zones, the machine image and the
//! hosted DNS zone.
//! - [`cli`] - AWS CLI command execution
//! - [`metadata`] - parsing of describe/list responses
//! - [`cache`] - dated per-region zone cache

mod cache;
mod cli;
mod metadata;

pub use cache::{cache_timezone, read_zone_cache, zone_cache_file, CACHE_TZ_VAR};
pub use cli::run;
pub use metadata::{find_hosted_zone, parse_availability_zones, select_image};

use crate::config::{DeploymentProfile, ImageSelector, StackConfig};
use crate::graph::StackFacts;
use crate::models::{HostedZone, Zone};
use chrono_tz::Tz;
use std::error::Error;
use std::path::PathBuf;

/// Provider of the facts the synthesizer and graph builder consume.
pub trait CloudMetadata {
    /// Usable availability zones of the configured region, in provider order.
    fn availability_zones(&self) -> Result<Vec<Zone>, Box<dyn Error>>;

    /// Image id for the launch template.
    fn resolve_image(&self, selector: &ImageSelector) -> Result<String, Box<dyn Error>>;

    /// Hosted zone whose apex is `name`.
    fn resolve_hosted_zone(&self, name: &str) -> Result<HostedZone, Box<dyn Error>>;
}

/// Fixed answers, for offline runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    pub zones: Vec<Zone>,
    pub image_id: Option<String>,
    pub hosted_zones: Vec<HostedZone>,
}

impl StaticMetadata {
    pub fn new(zones: Vec<Zone>) -> StaticMetadata {
        StaticMetadata {
            zones,
            ..StaticMetadata::default()
        }
    }

    pub fn with_image(mut self, image_id: &str) -> StaticMetadata {
        self.image_id = Some(image_id.to_string());
        self
    }

    pub fn with_hosted_zone(mut self, zone: HostedZone) -> StaticMetadata {
        self.hosted_zones.push(zone);
        self
    }
}

impl CloudMetadata for StaticMetadata {
    fn availability_zones(&self) -> Result<Vec<Zone>, Box<dyn Error>> {
        Ok(self.zones.clone())
    }

    fn resolve_image(&self, selector: &ImageSelector) -> Result<String, Box<dyn Error>> {
        self.image_id
            .clone()
            .ok_or_else(|| format!("No static image for filter {:?}", selector.name_filter).into())
    }

    fn resolve_hosted_zone(&self, name: &str) -> Result<HostedZone, Box<dyn Error>> {
        self.hosted_zones
            .iter()
            .find(|z| z.name == name.trim_end_matches('.'))
            .cloned()
            .ok_or_else(|| format!("No static hosted zone {name}").into())
    }
}

/// Lookups through the `aws` command line client.
#[derive(Debug, Clone)]
pub struct AwsCliMetadata {
    pub region: String,
    /// Zones from configuration; skips discovery when set.
    pub zones: Option<Vec<Zone>>,
    pub cache_dir: PathBuf,
    pub cache_tz: Tz,
}

impl AwsCliMetadata {
    pub fn from_config(config: &StackConfig) -> AwsCliMetadata {
        AwsCliMetadata {
            region: config.region.name.clone(),
            zones: config.region.zones.clone(),
            cache_dir: PathBuf::from("."),
            cache_tz: cache_timezone(),
        }
    }

    fn describe_zones(&self) -> Result<Vec<Zone>, Box<dyn Error>> {
        let output = run(&format!(
            "aws ec2 describe-availability-zones --region {} --output json",
            self.region
        ))?;
        parse_availability_zones(&output)
    }
}

impl CloudMetadata for AwsCliMetadata {
    fn availability_zones(&self) -> Result<Vec<Zone>, Box<dyn Error>> {
        if let Some(zones) = &self.zones {
            log::info!("Using {} zones from config", zones.len());
            return Ok(zones.clone());
        }
        read_zone_cache(&self.cache_dir, &self.region, self.cache_tz, || {
            self.describe_zones()
        })
    }

    fn resolve_image(&self, selector: &ImageSelector) -> Result<String, Box<dyn Error>> {
        let output = run(&format!(
            "aws ec2 describe-images --region {region} --owners {owners} \
             --filters 'Name=name,Values={filter}' Name=root-device-type,Values=ebs \
             Name=virtualization-type,Values=hvm --output json",
            region = self.region,
            owners = selector.owners.join(" "),
            filter = selector.name_filter,
        ))?;
        select_image(&output, selector)
    }

    fn resolve_hosted_zone(&self, name: &str) -> Result<HostedZone, Box<dyn Error>> {
        let output = run(&format!(
            "aws route53 list-hosted-zones-by-name --dns-name {name} --max-items 1 --output json"
        ))?;
        find_hosted_zone(&output, name)
    }
}

/// Look up the image and hosted zone the configured profile needs.
///
/// A fixed `image.ami_id` is used as-is. The network-only profile needs
/// neither fact and performs no lookups.
pub fn gather_facts(
    metadata: &dyn CloudMetadata,
    config: &StackConfig,
) -> Result<StackFacts, Box<dyn Error>> {
    if config.profile == DeploymentProfile::NetworkOnly {
        return Ok(StackFacts::default());
    }

    let image_id = match &config.image.ami_id {
        Some(ami_id) => {
            log::info!("Using configured image {ami_id}");
            ami_id.clone()
        }
        None => metadata.resolve_image(&config.image)?,
    };
    let hosted_zone = metadata.resolve_hosted_zone(&config.dns()?.zone_name)?;

    Ok(StackFacts {
        image_id: Some(image_id),
        hosted_zone: Some(hosted_zone),
    })
}
