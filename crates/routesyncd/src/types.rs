//! Type definitions for routesyncd

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Symbolic target name that resolves to the VPC's internet gateway.
pub const GATEWAY_TARGET_NAME: &str = "gateway";

/// Identifier prefix for EC2 instance targets.
pub const INSTANCE_ID_PREFIX: &str = "i-";

/// Identifier prefix for internet gateway targets.
pub const INTERNET_GATEWAY_ID_PREFIX: &str = "igw-";

/// Identifier prefix for elastic network interface targets.
pub const NETWORK_INTERFACE_ID_PREFIX: &str = "eni-";

/// The default route destination, protected from deletion.
pub const DEFAULT_ROUTE_CIDR: &str = "0.0.0.0/0";

/// Target identifier the provider assigns to intra-VPC routes,
/// protected from deletion.
pub const LOCAL_TARGET_ID: &str = "local";

/// A resolved route target.
///
/// The variant records what kind of object a route forwards to, so the
/// backend knows which API parameter carries the identifier. `Gateway`
/// carries no identifier of its own: a table has one internet gateway
/// and the backend supplies its concrete ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RouteTarget {
    /// The VPC's internet gateway.
    Gateway,
    /// An EC2 instance, by instance ID.
    Instance(String),
    /// An elastic network interface, by interface ID.
    NetworkInterface(String),
    /// Any other gateway-like identifier, including explicit `igw-` IDs
    /// and the provider's `local` sentinel.
    Other(String),
}

impl RouteTarget {
    /// The provider's local-route target.
    pub fn local() -> Self {
        Self::Other(LOCAL_TARGET_ID.to_string())
    }

    /// Identifier used for equality checks against live table entries.
    pub fn id(&self) -> &str {
        match self {
            Self::Gateway => GATEWAY_TARGET_NAME,
            Self::Instance(id) => id,
            Self::NetworkInterface(id) => id,
            Self::Other(id) => id,
        }
    }

    /// True for the provider's intra-VPC `local` target.
    pub fn is_local(&self) -> bool {
        self.id() == LOCAL_TARGET_ID
    }
}

impl fmt::Display for RouteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// One entry from the published IP-range feed.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IpRange {
    /// Destination CIDR, e.g. "54.239.98.0/24".
    #[serde(rename = "ip_prefix")]
    pub prefix: String,
    /// Provider region the prefix belongs to, e.g. "us-east-1".
    pub region: String,
    /// Provider service the prefix belongs to, e.g. "AMAZON".
    pub service: String,
}

/// A route currently present in the live table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingRoute {
    /// Destination CIDR of the route.
    pub destination: String,
    /// Target the route currently forwards to.
    pub target: RouteTarget,
}

impl ExistingRoute {
    /// Create a new ExistingRoute
    pub fn new(destination: impl Into<String>, target: RouteTarget) -> Self {
        Self {
            destination: destination.into(),
            target,
        }
    }
}

/// Desired routes keyed by destination CIDR.
///
/// Ordered map so reconciliation and reporting walk destinations in a
/// stable order from run to run.
pub type RouteMap = BTreeMap<String, RouteTarget>;

/// Old and new targets of a replaced route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacedRoute {
    /// Target before the replacement.
    pub old: RouteTarget,
    /// Target after the replacement.
    pub new: RouteTarget,
}

/// Outcome of one reconciliation run.
///
/// Every destination seen in the desired set or the live table lands in
/// exactly one bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Routes created because they were desired but absent.
    pub added: RouteMap,
    /// Routes whose target was rewritten, with old and new targets.
    pub replaced: BTreeMap<String, ReplacedRoute>,
    /// Routes removed because nothing desired them.
    pub deleted: RouteMap,
    /// Routes left alone: already correct, or protected from deletion.
    pub unchanged: RouteMap,
}

impl ChangeSet {
    /// Total number of destinations across all buckets.
    pub fn total(&self) -> usize {
        self.added.len() + self.replaced.len() + self.deleted.len() + self.unchanged.len()
    }

    /// True if the run mutated the table at all.
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.replaced.is_empty() || !self.deleted.is_empty()
    }
}
