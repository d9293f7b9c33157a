//! Route table synchronization daemon
//!
//! Reconciles a cloud VPC route table against the provider's published
//! IP-range feed plus static overrides: fetch and filter the feed, resolve
//! symbolic targets, diff against the live table, and apply the difference
//! while protecting the default route and local routes from deletion.

mod cli;
mod config;
mod error;
mod notify;
mod ranges;
mod resolver;
mod route_set;
mod route_sync;
mod route_table;
mod types;

pub use cli::Cli;
pub use config::*;
pub use error::*;
pub use notify::*;
pub use ranges::*;
pub use resolver::resolve_target;
pub use route_set::*;
pub use route_sync::*;
pub use route_table::*;
pub use types::*;
