//! Route table reconciliation
//!
//! `RouteSync` diffs a desired route map against the routes present in a
//! table and applies the difference through a [`RouteTableBackend`]. Every
//! destination seen in either input lands in exactly one `ChangeSet`
//! bucket. Two destinations are protected from deletion: the default route
//! `0.0.0.0/0` and any route whose target is the provider's `local`
//! sentinel. Protection blocks removal only; a protected destination named
//! in the desired map is replaced like any other.
//!
//! The engine produces no log records of its own. Each classification is
//! handed to an optional [`SyncObserver`] before the corresponding
//! mutation, so callers decide how runs are narrated.

use std::collections::BTreeSet;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::{Result, RouteSyncError};
use crate::ranges::RangeFetcher;
use crate::route_set::build_desired_routes;
use crate::route_table::RouteTableBackend;
use crate::types::{
    ChangeSet, ExistingRoute, ReplacedRoute, RouteMap, RouteTarget, DEFAULT_ROUTE_CIDR,
};

/// One classification made by the engine for one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// The route already forwards to the desired target.
    Unchanged {
        destination: String,
        target: RouteTarget,
    },
    /// The route exists with the wrong target and will be rewritten.
    Replace {
        destination: String,
        old: RouteTarget,
        new: RouteTarget,
    },
    /// Nothing desires the route but it is protected from deletion.
    Protected {
        destination: String,
        target: RouteTarget,
    },
    /// Nothing desires the route and it will be removed.
    Delete {
        destination: String,
        target: RouteTarget,
    },
    /// The destination is desired but absent and will be created.
    Add {
        destination: String,
        target: RouteTarget,
    },
}

/// Receives each [`RouteDecision`] before the engine acts on it.
pub trait SyncObserver: Send + Sync {
    fn on_decision(&self, decision: &RouteDecision);
}

/// Observer that narrates decisions through `tracing`.
///
/// Mutating decisions log at `warn` so a default `info` filter stays quiet
/// on steady-state runs; no-ops log at `debug`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_decision(&self, decision: &RouteDecision) {
        match decision {
            RouteDecision::Unchanged {
                destination,
                target,
            } => {
                debug!("{} -> {} : No change", destination, target);
            }
            RouteDecision::Protected {
                destination,
                target,
            } => {
                debug!("{} -> {} : Leaving default route unmodified", destination, target);
            }
            RouteDecision::Replace {
                destination,
                old,
                new,
            } => {
                warn!("{} -> {} : Replacing target with {}", destination, old, new);
            }
            RouteDecision::Delete {
                destination,
                target,
            } => {
                warn!("{} -> {} : Deleting unlisted route", destination, target);
            }
            RouteDecision::Add {
                destination,
                target,
            } => {
                warn!("{} -> {} : Adding new route", destination, target);
            }
        }
    }
}

/// Reconciles one route table against a desired route map.
pub struct RouteSync {
    table_id: String,
    observer: Option<Box<dyn SyncObserver>>,
}

impl RouteSync {
    /// Creates an engine for a table with no observer.
    pub fn new(table_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            observer: None,
        }
    }

    /// Creates an engine whose decisions are reported to `observer`.
    pub fn with_observer(table_id: impl Into<String>, observer: Box<dyn SyncObserver>) -> Self {
        Self {
            table_id: table_id.into(),
            observer: Some(observer),
        }
    }

    fn notify(&self, decision: &RouteDecision) {
        if let Some(observer) = &self.observer {
            observer.on_decision(decision);
        }
    }

    /// Applies the difference between `desired` and `existing` to the table.
    ///
    /// Walks the existing routes first: a desired destination is kept or
    /// replaced, an undesired one is deleted unless protected. Desired
    /// destinations the table lacks are then created. The first failing
    /// mutation aborts the pass with [`RouteSyncError::Mutation`]; earlier
    /// mutations stay applied.
    pub async fn reconcile(
        &self,
        desired: &RouteMap,
        existing: &[ExistingRoute],
        backend: &dyn RouteTableBackend,
    ) -> Result<ChangeSet> {
        let mut changes = ChangeSet::default();
        let mut seen: BTreeSet<&str> = BTreeSet::new();

        for route in existing {
            let destination = route.destination.as_str();
            seen.insert(destination);

            if let Some(new_target) = desired.get(destination) {
                if *new_target == route.target {
                    self.notify(&RouteDecision::Unchanged {
                        destination: destination.to_string(),
                        target: route.target.clone(),
                    });
                    changes
                        .unchanged
                        .insert(destination.to_string(), route.target.clone());
                } else {
                    self.notify(&RouteDecision::Replace {
                        destination: destination.to_string(),
                        old: route.target.clone(),
                        new: new_target.clone(),
                    });
                    backend
                        .replace_route(&self.table_id, destination, new_target)
                        .await
                        .map_err(|e| RouteSyncError::mutation(destination, e))?;
                    changes.replaced.insert(
                        destination.to_string(),
                        ReplacedRoute {
                            old: route.target.clone(),
                            new: new_target.clone(),
                        },
                    );
                }
            } else if destination == DEFAULT_ROUTE_CIDR || route.target.is_local() {
                self.notify(&RouteDecision::Protected {
                    destination: destination.to_string(),
                    target: route.target.clone(),
                });
                changes
                    .unchanged
                    .insert(destination.to_string(), route.target.clone());
            } else {
                self.notify(&RouteDecision::Delete {
                    destination: destination.to_string(),
                    target: route.target.clone(),
                });
                backend
                    .delete_route(&self.table_id, destination)
                    .await
                    .map_err(|e| RouteSyncError::mutation(destination, e))?;
                changes
                    .deleted
                    .insert(destination.to_string(), route.target.clone());
            }
        }

        for (destination, target) in desired {
            if seen.contains(destination.as_str()) {
                continue;
            }
            self.notify(&RouteDecision::Add {
                destination: destination.clone(),
                target: target.clone(),
            });
            backend
                .create_route(&self.table_id, destination, target)
                .await
                .map_err(|e| RouteSyncError::mutation(destination, e))?;
            changes.added.insert(destination.clone(), target.clone());
        }

        Ok(changes)
    }
}

/// Runs one full synchronization pass against a route table.
///
/// Gateway discovery, desired set construction, listing and reconciliation
/// run strictly in sequence; the first failure aborts the pass.
pub async fn synchronize(
    config: &SyncConfig,
    backend: &dyn RouteTableBackend,
    observer: Option<Box<dyn SyncObserver>>,
) -> Result<ChangeSet> {
    let gateway = backend.gateway_for(&config.route_table).await?;
    let fetcher = RangeFetcher::new();
    let desired = build_desired_routes(config, &fetcher, &gateway).await?;
    let existing = backend.list_routes(&config.route_table).await?;

    let sync = match observer {
        Some(observer) => RouteSync::with_observer(&config.route_table, observer),
        None => RouteSync::new(&config.route_table),
    };
    sync.reconcile(&desired, &existing, backend).await
}
