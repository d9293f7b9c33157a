//! Desired route set construction

use crate::config::SyncConfig;
use crate::error::Result;
use crate::ranges::{filter_by_region, filter_by_service, RangeFetcher};
use crate::resolver::resolve_target;
use crate::types::{IpRange, RouteMap, RouteTarget};
use std::collections::BTreeMap;

/// Builds the desired route map for one run.
///
/// Fetches the published ranges, applies the configured region and service
/// filters, points every surviving prefix at the configured feed target,
/// then overlays the static overrides. Any fetch or resolution failure
/// aborts the build.
pub async fn build_desired_routes(
    config: &SyncConfig,
    fetcher: &RangeFetcher,
    gateway: &RouteTarget,
) -> Result<RouteMap> {
    let ranges = fetcher.fetch(&config.ip_url).await?;
    let ranges = filter_by_region(ranges, &config.ip_regions);
    let ranges = filter_by_service(ranges, &config.ip_services);
    merge_desired_routes(&ranges, &config.ip_target, &config.routes, gateway)
}

/// Merges feed-derived entries with static overrides.
///
/// Feed prefixes all point at the resolved `ip_target`; overrides are laid
/// on top afterwards, so an override wins when a destination appears in
/// both sources. The feed target is resolved even when the filtered range
/// list is empty, so a misconfigured target fails the run regardless of
/// feed content.
pub fn merge_desired_routes(
    ranges: &[IpRange],
    ip_target: &str,
    overrides: &BTreeMap<String, String>,
    gateway: &RouteTarget,
) -> Result<RouteMap> {
    let ip_target = resolve_target(ip_target, gateway)?;

    let mut desired = RouteMap::new();
    for range in ranges {
        desired.insert(range.prefix.clone(), ip_target.clone());
    }
    for (destination, target) in overrides {
        desired.insert(destination.clone(), resolve_target(target, gateway)?);
    }
    Ok(desired)
}
