//! Symbolic route target resolution

use crate::error::{Result, RouteSyncError};
use crate::types::{
    RouteTarget, GATEWAY_TARGET_NAME, INSTANCE_ID_PREFIX, INTERNET_GATEWAY_ID_PREFIX,
    NETWORK_INTERFACE_ID_PREFIX,
};

/// Resolves a symbolic target name from configuration to a concrete target.
///
/// Rules apply in order:
/// - `"gateway"` resolves to the caller-supplied gateway target
/// - `i-*` resolves to an instance target
/// - `igw-*` resolves to that specific gateway, distinct from the default
/// - `eni-*` resolves to a network interface target
///
/// Anything else fails with [`RouteSyncError::UnresolvableTarget`]. Matching
/// is case-sensitive and the full identifier is preserved.
pub fn resolve_target(name: &str, gateway: &RouteTarget) -> Result<RouteTarget> {
    if name == GATEWAY_TARGET_NAME {
        Ok(gateway.clone())
    } else if name.starts_with(INSTANCE_ID_PREFIX) {
        Ok(RouteTarget::Instance(name.to_string()))
    } else if name.starts_with(INTERNET_GATEWAY_ID_PREFIX) {
        Ok(RouteTarget::Other(name.to_string()))
    } else if name.starts_with(NETWORK_INTERFACE_ID_PREFIX) {
        Ok(RouteTarget::NetworkInterface(name.to_string()))
    } else {
        Err(RouteSyncError::unresolvable_target(name))
    }
}
