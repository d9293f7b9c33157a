//! Route table backends
//!
//! The reconciliation engine talks to a route table through the
//! [`RouteTableBackend`] trait. `Ec2RouteTable` is the live implementation
//! over the EC2 API; `MemoryRouteTable` applies mutations to its own map
//! and backs the test suites.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ec2::types::Filter;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::{Result, RouteSyncError};
use crate::types::{ExistingRoute, RouteTarget};

/// Operations the reconciliation engine needs from a route table.
///
/// `gateway_for` runs before anything else in a synchronization pass;
/// implementations may resolve gateway identity there and rely on it in
/// the other calls.
#[async_trait]
pub trait RouteTableBackend: Send + Sync {
    /// Resolves the table's internet gateway target.
    async fn gateway_for(&self, table_id: &str) -> Result<RouteTarget>;

    /// Lists the routes currently present in the table.
    async fn list_routes(&self, table_id: &str) -> Result<Vec<ExistingRoute>>;

    /// Creates a route for a destination the table does not have.
    async fn create_route(
        &self,
        table_id: &str,
        destination: &str,
        target: &RouteTarget,
    ) -> Result<()>;

    /// Rewrites the target of an existing route.
    async fn replace_route(
        &self,
        table_id: &str,
        destination: &str,
        target: &RouteTarget,
    ) -> Result<()>;

    /// Deletes a route.
    async fn delete_route(&self, table_id: &str, destination: &str) -> Result<()>;
}

/// Builds the shared SDK configuration for EC2 and SNS clients.
///
/// Explicit credentials and region from the run configuration take
/// precedence; anything unset falls back to the ambient chain (environment
/// variables, shared profile, instance role).
pub async fn load_sdk_config(config: &SyncConfig) -> aws_config::SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());
    if let Some(region) = &config.region {
        loader = loader.region(aws_config::Region::new(region.clone()));
    }
    if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
        let creds = aws_sdk_ec2::config::Credentials::new(
            access_key,
            secret_key,
            None,
            None,
            "routesyncd-config",
        );
        loader = loader.credentials_provider(creds);
    }
    loader.load().await
}

/// Request-side view of a route target.
enum ApiTarget {
    Gateway(String),
    Instance(String),
    NetworkInterface(String),
}

/// Live route table backed by the EC2 API.
#[derive(Debug)]
pub struct Ec2RouteTable {
    client: aws_sdk_ec2::Client,
    gateway_id: Mutex<Option<String>>,
}

impl Ec2RouteTable {
    /// Creates a backend from a loaded SDK configuration.
    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_ec2::Client::new(sdk_config),
            gateway_id: Mutex::new(None),
        }
    }

    fn cached_gateway_id(&self) -> Option<String> {
        self.gateway_id.lock().clone()
    }

    async fn vpc_for_table(&self, table_id: &str) -> Result<String> {
        let output = self
            .client
            .describe_route_tables()
            .route_table_ids(table_id)
            .send()
            .await
            .map_err(|e| RouteSyncError::api("DescribeRouteTables", e.to_string()))?;

        let table = output.route_tables().first().ok_or_else(|| {
            RouteSyncError::api(
                "DescribeRouteTables",
                format!("route table {} not found", table_id),
            )
        })?;
        table.vpc_id().map(|id| id.to_string()).ok_or_else(|| {
            RouteSyncError::api(
                "DescribeRouteTables",
                format!("route table {} has no VPC", table_id),
            )
        })
    }

    /// Maps a target onto the request field the API expects.
    ///
    /// `Gateway` requires gateway discovery to have run; `Other` carries a
    /// concrete gateway-like identifier and goes out as a gateway ID.
    fn api_target(&self, operation: &str, target: &RouteTarget) -> Result<ApiTarget> {
        match target {
            RouteTarget::Gateway => {
                let id = self.cached_gateway_id().ok_or_else(|| {
                    RouteSyncError::api(operation, "gateway target used before gateway discovery")
                })?;
                Ok(ApiTarget::Gateway(id))
            }
            RouteTarget::Instance(id) => Ok(ApiTarget::Instance(id.clone())),
            RouteTarget::NetworkInterface(id) => Ok(ApiTarget::NetworkInterface(id.clone())),
            RouteTarget::Other(id) => Ok(ApiTarget::Gateway(id.clone())),
        }
    }
}

#[async_trait]
impl RouteTableBackend for Ec2RouteTable {
    async fn gateway_for(&self, table_id: &str) -> Result<RouteTarget> {
        let vpc_id = self.vpc_for_table(table_id).await?;
        let output = self
            .client
            .describe_internet_gateways()
            .filters(
                Filter::builder()
                    .name("attachment.vpc-id")
                    .values(&vpc_id)
                    .build(),
            )
            .send()
            .await
            .map_err(|e| RouteSyncError::api("DescribeInternetGateways", e.to_string()))?;

        let gateway_id = output
            .internet_gateways()
            .iter()
            .find_map(|igw| igw.internet_gateway_id())
            .ok_or_else(|| {
                RouteSyncError::api(
                    "DescribeInternetGateways",
                    format!("no internet gateway attached to {}", vpc_id),
                )
            })?
            .to_string();

        debug!(%table_id, %vpc_id, %gateway_id, "Resolved internet gateway");
        *self.gateway_id.lock() = Some(gateway_id);
        Ok(RouteTarget::Gateway)
    }

    async fn list_routes(&self, table_id: &str) -> Result<Vec<ExistingRoute>> {
        let output = self
            .client
            .describe_route_tables()
            .route_table_ids(table_id)
            .send()
            .await
            .map_err(|e| RouteSyncError::api("DescribeRouteTables", e.to_string()))?;

        let table = output.route_tables().first().ok_or_else(|| {
            RouteSyncError::api(
                "DescribeRouteTables",
                format!("route table {} not found", table_id),
            )
        })?;
        let gateway_id = self.cached_gateway_id();

        let mut routes = Vec::new();
        for route in table.routes() {
            // IPv4 destinations only; IPv6 and prefix-list rows are not managed.
            let Some(destination) = route.destination_cidr_block() else {
                continue;
            };
            let target = if let Some(id) = route.gateway_id() {
                match &gateway_id {
                    Some(cached) if cached == id => RouteTarget::Gateway,
                    _ => RouteTarget::Other(id.to_string()),
                }
            } else if let Some(id) = route.instance_id() {
                RouteTarget::Instance(id.to_string())
            } else if let Some(id) = route.network_interface_id() {
                RouteTarget::NetworkInterface(id.to_string())
            } else {
                // NAT, peering and transit targets are not managed here.
                continue;
            };
            routes.push(ExistingRoute::new(destination, target));
        }
        Ok(routes)
    }

    async fn create_route(
        &self,
        table_id: &str,
        destination: &str,
        target: &RouteTarget,
    ) -> Result<()> {
        let mut request = self
            .client
            .create_route()
            .route_table_id(table_id)
            .destination_cidr_block(destination);
        request = match self.api_target("CreateRoute", target)? {
            ApiTarget::Gateway(id) => request.gateway_id(id),
            ApiTarget::Instance(id) => request.instance_id(id),
            ApiTarget::NetworkInterface(id) => request.network_interface_id(id),
        };
        request
            .send()
            .await
            .map_err(|e| RouteSyncError::api("CreateRoute", e.to_string()))?;
        Ok(())
    }

    async fn replace_route(
        &self,
        table_id: &str,
        destination: &str,
        target: &RouteTarget,
    ) -> Result<()> {
        let mut request = self
            .client
            .replace_route()
            .route_table_id(table_id)
            .destination_cidr_block(destination);
        request = match self.api_target("ReplaceRoute", target)? {
            ApiTarget::Gateway(id) => request.gateway_id(id),
            ApiTarget::Instance(id) => request.instance_id(id),
            ApiTarget::NetworkInterface(id) => request.network_interface_id(id),
        };
        request
            .send()
            .await
            .map_err(|e| RouteSyncError::api("ReplaceRoute", e.to_string()))?;
        Ok(())
    }

    async fn delete_route(&self, table_id: &str, destination: &str) -> Result<()> {
        self.client
            .delete_route()
            .route_table_id(table_id)
            .destination_cidr_block(destination)
            .send()
            .await
            .map_err(|e| RouteSyncError::api("DeleteRoute", e.to_string()))?;
        Ok(())
    }
}

/// In-memory route table for tests.
///
/// Stores targets verbatim and enforces the same preconditions as the live
/// API: creating an existing destination or replacing/deleting a missing
/// one fails. Individual destinations can be made to fail on mutation to
/// exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryRouteTable {
    routes: Mutex<BTreeMap<String, RouteTarget>>,
    fail_destinations: Mutex<BTreeSet<String>>,
}

impl MemoryRouteTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table pre-populated with routes.
    pub fn with_routes(routes: impl IntoIterator<Item = ExistingRoute>) -> Self {
        let table = Self::new();
        {
            let mut map = table.routes.lock();
            for route in routes {
                map.insert(route.destination, route.target);
            }
        }
        table
    }

    /// Makes every subsequent mutation of `destination` fail.
    pub fn fail_mutations_of(&self, destination: &str) {
        self.fail_destinations.lock().insert(destination.to_string());
    }

    /// Snapshot of the table contents.
    pub fn routes(&self) -> Vec<ExistingRoute> {
        self.routes
            .lock()
            .iter()
            .map(|(destination, target)| ExistingRoute::new(destination.clone(), target.clone()))
            .collect()
    }

    /// Current target of a destination, if present.
    pub fn target_of(&self, destination: &str) -> Option<RouteTarget> {
        self.routes.lock().get(destination).cloned()
    }

    /// Number of routes in the table.
    pub fn len(&self) -> usize {
        self.routes.lock().len()
    }

    /// True when the table has no routes.
    pub fn is_empty(&self) -> bool {
        self.routes.lock().is_empty()
    }

    fn check_injected(&self, operation: &str, destination: &str) -> Result<()> {
        if self.fail_destinations.lock().contains(destination) {
            return Err(RouteSyncError::api(
                operation,
                format!("injected failure for {}", destination),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl RouteTableBackend for MemoryRouteTable {
    async fn gateway_for(&self, _table_id: &str) -> Result<RouteTarget> {
        Ok(RouteTarget::Gateway)
    }

    async fn list_routes(&self, _table_id: &str) -> Result<Vec<ExistingRoute>> {
        Ok(self.routes())
    }

    async fn create_route(
        &self,
        _table_id: &str,
        destination: &str,
        target: &RouteTarget,
    ) -> Result<()> {
        self.check_injected("CreateRoute", destination)?;
        let mut routes = self.routes.lock();
        if routes.contains_key(destination) {
            return Err(RouteSyncError::api(
                "CreateRoute",
                format!("route {} already exists", destination),
            ));
        }
        routes.insert(destination.to_string(), target.clone());
        Ok(())
    }

    async fn replace_route(
        &self,
        _table_id: &str,
        destination: &str,
        target: &RouteTarget,
    ) -> Result<()> {
        self.check_injected("ReplaceRoute", destination)?;
        let mut routes = self.routes.lock();
        if !routes.contains_key(destination) {
            return Err(RouteSyncError::api(
                "ReplaceRoute",
                format!("route {} does not exist", destination),
            ));
        }
        routes.insert(destination.to_string(), target.clone());
        Ok(())
    }

    async fn delete_route(&self, _table_id: &str, destination: &str) -> Result<()> {
        self.check_injected("DeleteRoute", destination)?;
        if self.routes.lock().remove(destination).is_none() {
            return Err(RouteSyncError::api(
                "DeleteRoute",
                format!("route {} does not exist", destination),
            ));
        }
        Ok(())
    }
}
