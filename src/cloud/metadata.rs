//! Parsing of AWS CLI describe/list responses.

use crate::config::ImageSelector;
use crate::models::{HostedZone, Zone};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::error::Error;

const ZONE_AVAILABLE: &str = "available";
const HOSTED_ZONE_PREFIX: &str = "/hostedzone/";

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct AvailabilityZones {
    availability_zones: Vec<AvailabilityZone>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct AvailabilityZone {
    zone_name: String,
    state: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct Images {
    images: Vec<Image>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct Image {
    image_id: String,
    #[serde(default)]
    name: String,
    /// RFC 3339, e.g. "2023-11-02T18:04:11.000Z".
    creation_date: String,
}

impl Image {
    fn created(&self) -> Result<DateTime<Utc>, Box<dyn Error>> {
        DateTime::parse_from_rfc3339(&self.creation_date)
            .map(|d| d.with_timezone(&Utc))
            .map_err(|e| {
                format!(
                    "Image {} has bad CreationDate {:?}: {e}",
                    self.image_id, self.creation_date
                )
                .into()
            })
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct HostedZones {
    hosted_zones: Vec<HostedZoneEntry>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
struct HostedZoneEntry {
    id: String,
    name: String,
}

fn parse<T: DeserializeOwned>(what: &str, json: &str) -> Result<T, Box<dyn Error>> {
    let mut deserializer = serde_json::Deserializer::from_str(json);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        log::error!("OUTPUT START:\n\n{json}\n\nOUTPUT END\n");
        format!("Error parsing {what}: path={} error={}", e.path(), e).into()
    })
}

/// Zones in the `available` state, in response order.
pub fn parse_availability_zones(json: &str) -> Result<Vec<Zone>, Box<dyn Error>> {
    let response: AvailabilityZones = parse("describe-availability-zones", json)?;
    let zones: Vec<Zone> = response
        .availability_zones
        .into_iter()
        .filter(|z| {
            let ok = z.state == ZONE_AVAILABLE;
            if !ok {
                log::warn!("Skipping zone {} in state {}", z.zone_name, z.state);
            }
            ok
        })
        .map(|z| Zone::new(z.zone_name))
        .collect();
    log::info!("Found {} available zones", zones.len());
    Ok(zones)
}

/// Most recently created image whose name matches the selector's regex.
///
/// Provider-side filters (owners, name wildcard, root device and
/// virtualization type) are applied by the describe call; only the regex is
/// checked here.
pub fn select_image(json: &str, selector: &ImageSelector) -> Result<String, Box<dyn Error>> {
    let response: Images = parse("describe-images", json)?;
    let name_regex = selector
        .name_regex
        .as_deref()
        .map(Regex::new)
        .transpose()
        .map_err(|e| format!("Invalid image.name_regex: {e}"))?;

    let mut candidates = Vec::new();
    for image in response.images {
        if name_regex.as_ref().map_or(true, |r| r.is_match(&image.name)) {
            candidates.push((image.created()?, image));
        }
    }
    let (created, newest) = candidates
        .into_iter()
        .max_by_key(|(created, _)| *created)
        .ok_or_else(|| {
            format!(
                "No image matches filter {:?} regex {:?}",
                selector.name_filter, selector.name_regex
            )
        })?;

    log::info!(
        "Selected image {} name={} created={}",
        newest.image_id,
        newest.name,
        created
    );
    Ok(newest.image_id)
}

/// Hosted zone whose apex is `name`, with the id prefix and trailing dot removed.
pub fn find_hosted_zone(json: &str, name: &str) -> Result<HostedZone, Box<dyn Error>> {
    let response: HostedZones = parse("list-hosted-zones-by-name", json)?;
    let wanted = name.trim_end_matches('.');
    response
        .hosted_zones
        .into_iter()
        .map(|z| HostedZone {
            zone_id: z.id.trim_start_matches(HOSTED_ZONE_PREFIX).to_string(),
            name: z.name.trim_end_matches('.').to_string(),
        })
        .find(|z| z.name == wanted)
        .ok_or_else(|| format!("Hosted zone not found: {name}").into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("src/tests/test_data/{name}")).unwrap()
    }

    #[test]
    fn test_zones_skip_impaired() {
        let zones = parse_availability_zones(&fixture("describe_availability_zones.json")).unwrap();
        assert_eq!(
            zones,
            vec![Zone::new("us-east-1a"), Zone::new("us-east-1b"), Zone::new("us-east-1d")]
        );
    }

    #[test]
    fn test_newest_image_wins() {
        let selector = ImageSelector::default();
        let image = select_image(&fixture("describe_images.json"), &selector).unwrap();
        assert_eq!(image, "ami-0aaa000000000003");
    }

    #[test]
    fn test_regex_narrows_images() {
        let selector = ImageSelector {
            name_regex: Some(r"^webapp_\d{4}_\d{2}_\d{2}$".to_string()),
            ..ImageSelector::default()
        };
        let image = select_image(&fixture("describe_images.json"), &selector).unwrap();
        assert_eq!(image, "ami-0aaa000000000002");
    }

    #[test]
    fn test_no_matching_image() {
        let selector = ImageSelector {
            name_regex: Some("^nothing$".to_string()),
            ..ImageSelector::default()
        };
        assert!(select_image(&fixture("describe_images.json"), &selector).is_err());

        let bad = ImageSelector {
            name_regex: Some("(".to_string()),
            ..ImageSelector::default()
        };
        assert!(select_image(&fixture("describe_images.json"), &bad).is_err());
    }

    #[test]
    fn test_hosted_zone_id_stripped() {
        let json = fixture("list_hosted_zones_by_name.json");
        let zone = find_hosted_zone(&json, "dev.example.com").unwrap();
        assert_eq!(zone.zone_id, "Z0123456789ABCDEFGHIJ");
        assert_eq!(zone.name, "dev.example.com");
        assert!(find_hosted_zone(&json, "dev.example.com.").is_ok());
        assert!(find_hosted_zone(&json, "prod.example.com").is_err());
    }

    #[test]
    fn test_malformed_response_reports_path() {
        let err = parse_availability_zones(r#"{"AvailabilityZones": [{"ZoneName": 1}]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("AvailabilityZones"), "{err}");
    }
}
