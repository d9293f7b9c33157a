//! Error types for route table synchronization.
//!
//! All errors implement `std::error::Error` via `thiserror`. Every error is
//! fatal to the run in which it occurs: the daemon performs no retries and
//! no skip-and-continue, so callers see the first failure unaltered.

use std::io;
use thiserror::Error;

/// Result type alias for synchronization operations.
pub type Result<T> = std::result::Result<T, RouteSyncError>;

/// Errors that can occur while synchronizing a route table.
#[derive(Debug, Error)]
pub enum RouteSyncError {
    /// The published IP-range feed could not be retrieved.
    #[error("Failed to fetch IP ranges from '{url}': {source}")]
    Fetch {
        /// The feed URL that was requested.
        url: String,
        /// The underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// The IP-range feed was retrieved but its payload is not usable.
    #[error("Malformed IP range feed from '{url}': {message}")]
    MalformedFeed {
        /// The feed URL that was requested.
        url: String,
        /// What was wrong with the payload.
        message: String,
    },

    /// A symbolic route target matched no recognized pattern.
    #[error("Unresolvable route target '{name}'")]
    UnresolvableTarget {
        /// The target name that failed to resolve.
        name: String,
    },

    /// A create/replace/delete call against the live table failed.
    #[error("Mutation failed for destination '{destination}': {source}")]
    Mutation {
        /// The destination CIDR whose mutation failed.
        destination: String,
        /// The underlying backend error.
        #[source]
        source: Box<RouteSyncError>,
    },

    /// A route table API call outside the mutation path failed.
    #[error("Route table API operation failed: {operation}: {message}")]
    Api {
        /// The API operation that failed (e.g. "DescribeRouteTables").
        operation: String,
        /// Error message from the backend.
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig {
        /// The field that failed validation.
        field: String,
        /// Error message.
        message: String,
    },

    /// The configuration file could not be read.
    #[error("Failed to read config file '{path}': {source}")]
    ConfigFile {
        /// Path to the configuration file.
        path: String,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid YAML for the expected shape.
    #[error("Invalid YAML in config file '{path}': {source}")]
    ConfigParse {
        /// Path to the configuration file.
        path: String,
        /// The underlying YAML error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A run report could not be delivered to the notification topic.
    #[error("Notification delivery failed: {message}")]
    Notification {
        /// Error message from the publish call.
        message: String,
    },
}

impl RouteSyncError {
    /// Creates a malformed-feed error.
    pub fn malformed_feed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedFeed {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an unresolvable-target error.
    pub fn unresolvable_target(name: impl Into<String>) -> Self {
        Self::UnresolvableTarget { name: name.into() }
    }

    /// Wraps a backend failure for a specific destination.
    pub fn mutation(destination: impl Into<String>, source: RouteSyncError) -> Self {
        Self::Mutation {
            destination: destination.into(),
            source: Box::new(source),
        }
    }

    /// Creates an API error.
    pub fn api(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a notification delivery error.
    pub fn notification(message: impl Into<String>) -> Self {
        Self::Notification {
            message: message.into(),
        }
    }
}
