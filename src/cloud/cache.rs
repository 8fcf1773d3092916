//! Per-region, per-day cache of availability zone lookups.

use crate::models::Zone;
use chrono_tz::Tz;
use std::error::Error;
use std::path::{Path, PathBuf};

/// Environment variable naming the timezone used to date cache files.
pub const CACHE_TZ_VAR: &str = "ZONE_CACHE_TZ";

/// Timezone from `ZONE_CACHE_TZ`, UTC when unset or unknown.
pub fn cache_timezone() -> Tz {
    match std::env::var(CACHE_TZ_VAR) {
        Ok(name) => name.parse::<Tz>().unwrap_or_else(|_| {
            log::warn!("Unknown {CACHE_TZ_VAR}={name}, using UTC");
            chrono_tz::UTC
        }),
        Err(_) => chrono_tz::UTC,
    }
}

/// `<dir>/zone_cache_<region>_<YYYY-MM-DD>.json`, dated in `tz`.
pub fn zone_cache_file(dir: &Path, region: &str, tz: Tz) -> PathBuf {
    let today = chrono::Utc::now().with_timezone(&tz);
    dir.join(format!("zone_cache_{region}_{}.json", today.format("%Y-%m-%d")))
}

/// Read today's zone list for `region`, calling `fetch` and writing the
/// cache file on a miss.
///
/// # Returns
/// * `Ok(Vec<Zone>)` - cached or freshly fetched zones
/// * `Err` - unreadable cache JSON, fetch failure or cache write failure
pub fn read_zone_cache<F>(
    dir: &Path,
    region: &str,
    tz: Tz,
    fetch: F,
) -> Result<Vec<Zone>, Box<dyn Error>>
where
    F: FnOnce() -> Result<Vec<Zone>, Box<dyn Error>>,
{
    let cache_file = zone_cache_file(dir, region, tz);

    match std::fs::read_to_string(&cache_file) {
        Ok(json) => {
            log::info!("Reading zones from cache file: {}", cache_file.display());
            let zones = serde_json::from_str(&json).map_err(|e| {
                format!("Error parsing cache JSON {}: {e}", cache_file.display())
            })?;
            Ok(zones)
        }
        Err(_) => {
            log::warn!("Zone cache not found: {}", cache_file.display());
            let zones = fetch()?;
            if zones.is_empty() {
                // Never cache an empty answer; a later run should retry.
                return Ok(zones);
            }
            let json = serde_json::to_string(&zones)
                .map_err(|e| format!("Error serializing zones: {e}"))?;
            log::warn!("Writing zones to cache file: {}", cache_file.display());
            std::fs::write(&cache_file, json).map_err(|e| {
                format!("Error writing cache file {}: {e}", cache_file.display())
            })?;
            Ok(zones)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tempfile::tempdir;

    fn zones() -> Vec<Zone> {
        vec![Zone::new("eu-west-1a"), Zone::new("eu-west-1b")]
    }

    #[test]
    fn test_miss_then_hit() {
        let dir = tempdir().unwrap();
        let calls = Cell::new(0);
        let fetch = || -> Result<Vec<Zone>, Box<dyn Error>> {
            calls.set(calls.get() + 1);
            Ok(zones())
        };

        let first = read_zone_cache(dir.path(), "eu-west-1", chrono_tz::UTC, fetch).unwrap();
        assert_eq!(first, zones());
        assert!(zone_cache_file(dir.path(), "eu-west-1", chrono_tz::UTC).exists());

        let second = read_zone_cache(dir.path(), "eu-west-1", chrono_tz::UTC, || {
            Err("cache should have been used".into())
        })
        .unwrap();
        assert_eq!(second, zones());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_cache_is_per_region() {
        let dir = tempdir().unwrap();
        read_zone_cache(dir.path(), "eu-west-1", chrono_tz::UTC, || Ok(zones())).unwrap();
        let other = read_zone_cache(dir.path(), "us-east-1", chrono_tz::UTC, || {
            Ok(vec![Zone::new("us-east-1a")])
        })
        .unwrap();
        assert_eq!(other, vec![Zone::new("us-east-1a")]);
    }

    #[test]
    fn test_empty_answer_not_cached() {
        let dir = tempdir().unwrap();
        let zones = read_zone_cache(dir.path(), "eu-west-1", chrono_tz::UTC, || Ok(vec![])).unwrap();
        assert!(zones.is_empty());
        assert!(!zone_cache_file(dir.path(), "eu-west-1", chrono_tz::UTC).exists());
    }

    #[test]
    fn test_corrupt_cache_is_error() {
        let dir = tempdir().unwrap();
        let file = zone_cache_file(dir.path(), "eu-west-1", chrono_tz::UTC);
        std::fs::write(&file, "not json").unwrap();
        assert!(read_zone_cache(dir.path(), "eu-west-1", chrono_tz::UTC, || Ok(zones())).is_err());
    }

    #[test]
    fn test_cache_file_name() {
        let file = zone_cache_file(Path::new("/tmp"), "ap-southeast-2", chrono_tz::Pacific::Auckland);
        let name = file.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("zone_cache_ap-southeast-2_"));
        assert!(name.ends_with(".json"));
        assert_eq!(name.len(), "zone_cache_ap-southeast-2_2024-01-01.json".len());
    }
}
