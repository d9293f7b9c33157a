//! Command-line interface for routesyncd

use clap::Parser;
use std::path::PathBuf;

/// Route table synchronization daemon
#[derive(Parser, Debug)]
#[command(name = "routesyncd")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cloud access key ID
    #[arg(long, value_name = "KEY")]
    pub access_key: Option<String>,

    /// Cloud secret access key
    #[arg(long, value_name = "KEY")]
    pub secret_key: Option<String>,

    /// Cloud API region for route table and notification calls
    #[arg(long, value_name = "REGION")]
    pub region: Option<String>,

    /// Route table to synchronize (canonical ID)
    #[arg(short = 't', long, value_name = "ID")]
    pub route_table: Option<String>,

    /// Static route override as 'CIDR=target' (repeatable)
    #[arg(short = 'r', long = "route", value_name = "CIDR=TARGET")]
    pub routes: Vec<String>,

    /// Target for routes derived from the IP-range feed
    #[arg(short = 'g', long, value_name = "TARGET")]
    pub ip_target: Option<String>,

    /// URL of the published IP-range feed
    #[arg(short = 'u', long, value_name = "URL")]
    pub ip_url: Option<String>,

    /// Feed region filter, added to the config file's set (repeatable)
    #[arg(short = 'e', long = "ip-region", value_name = "REGION")]
    pub ip_regions: Vec<String>,

    /// Feed service filter, added to the config file's set (repeatable)
    #[arg(short = 'a', long = "ip-service", value_name = "SERVICE")]
    pub ip_services: Vec<String>,

    /// Notification topic for run reports (canonical ID)
    #[arg(short = 'n', long, value_name = "TOPIC")]
    pub notification: Option<String>,

    /// Also send a notification when nothing changed
    #[arg(short = 'v', long)]
    pub verbose: bool,
}
