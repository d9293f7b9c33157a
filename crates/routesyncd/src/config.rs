//! Configuration loading and merging
//!
//! Settings come from three layers: command-line flags, an optional YAML
//! configuration file, and built-in defaults. For scalar settings an
//! explicitly given flag wins over the file, and the file wins over the
//! default. Repeatable flags (feed filters, route overrides) are added to
//! the file's values rather than replacing them.

use crate::cli::Cli;
use crate::error::{Result, RouteSyncError};
use crate::types::GATEWAY_TARGET_NAME;
use ipnetwork::Ipv4Network;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Feed URL used when neither the command line nor the file names one.
pub const DEFAULT_IP_RANGES_URL: &str = "https://ip-ranges.amazonaws.com/ip-ranges.json";

/// Config file looked up in the home directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILENAME: &str = ".routesyncd.yml";

fn default_ip_regions() -> BTreeSet<String> {
    ["GLOBAL", "us-east-1"].iter().map(|s| s.to_string()).collect()
}

fn default_ip_services() -> BTreeSet<String> {
    ["AMAZON"].iter().map(|s| s.to_string()).collect()
}

/// On-disk YAML configuration document.
///
/// Every section is optional; a missing file behaves like an empty one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    route_table: Option<String>,
    aws: Option<AwsSection>,
    ip_ranges: Option<IpRangesSection>,
    notification: Option<NotificationSection>,
    #[serde(default)]
    routes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct AwsSection {
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    region: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct IpRangesSection {
    target: Option<String>,
    url: Option<String>,
    regions: Option<Vec<String>>,
    services: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct NotificationSection {
    topic: Option<String>,
    verbose: Option<bool>,
}

impl ConfigFile {
    /// Reads and parses a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| RouteSyncError::ConfigFile {
            path: path.display().to_string(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|source| RouteSyncError::ConfigParse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Fully resolved and validated run configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Route table to synchronize.
    pub route_table: String,
    /// Static cloud access key, if not relying on ambient credentials.
    pub access_key: Option<String>,
    /// Static cloud secret key.
    pub secret_key: Option<String>,
    /// Cloud API region; ambient SDK configuration applies when unset.
    pub region: Option<String>,
    /// URL of the published IP-range feed.
    pub ip_url: String,
    /// Symbolic target for feed-derived routes.
    pub ip_target: String,
    /// Feed region filter; empty keeps every region.
    pub ip_regions: BTreeSet<String>,
    /// Feed service filter; empty keeps every service.
    pub ip_services: BTreeSet<String>,
    /// Static route overrides, destination CIDR to symbolic target.
    pub routes: BTreeMap<String, String>,
    /// Notification topic for run reports.
    pub notification: Option<String>,
    /// Notify even when the run changed nothing.
    pub verbose: bool,
}

impl SyncConfig {
    /// Resolves the effective configuration for this invocation.
    ///
    /// An explicitly given `--config` path must exist; the default
    /// `~/.routesyncd.yml` is used only when present.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let file = match &cli.config {
            Some(path) => ConfigFile::load(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => ConfigFile::load(&path)?,
                _ => ConfigFile::default(),
            },
        };
        Self::merge(cli, file)
    }

    fn merge(cli: &Cli, file: ConfigFile) -> Result<Self> {
        let aws = file.aws.unwrap_or_default();
        let ip = file.ip_ranges.unwrap_or_default();
        let notify = file.notification.unwrap_or_default();

        let route_table = cli
            .route_table
            .clone()
            .or(file.route_table)
            .ok_or_else(|| {
                RouteSyncError::invalid_config("route_table", "no route table declared")
            })?;

        let mut ip_regions: BTreeSet<String> = match ip.regions {
            Some(regions) => regions.into_iter().collect(),
            None => default_ip_regions(),
        };
        ip_regions.extend(cli.ip_regions.iter().cloned());

        let mut ip_services: BTreeSet<String> = match ip.services {
            Some(services) => services.into_iter().collect(),
            None => default_ip_services(),
        };
        ip_services.extend(cli.ip_services.iter().cloned());

        let mut routes = file.routes;
        for entry in &cli.routes {
            let (destination, target) = parse_route_override(entry)?;
            routes.insert(destination, target);
        }
        for (destination, target) in &routes {
            validate_destination(destination)?;
            if target.trim().is_empty() {
                return Err(RouteSyncError::invalid_config(
                    "routes",
                    format!("route '{}' has an empty target", destination),
                ));
            }
        }

        Ok(Self {
            route_table,
            access_key: cli.access_key.clone().or(aws.access_key_id),
            secret_key: cli.secret_key.clone().or(aws.secret_access_key),
            region: cli.region.clone().or(aws.region),
            ip_url: cli
                .ip_url
                .clone()
                .or(ip.url)
                .unwrap_or_else(|| DEFAULT_IP_RANGES_URL.to_string()),
            ip_target: cli
                .ip_target
                .clone()
                .or(ip.target)
                .unwrap_or_else(|| GATEWAY_TARGET_NAME.to_string()),
            ip_regions,
            ip_services,
            routes,
            notification: cli.notification.clone().or(notify.topic),
            verbose: cli.verbose || notify.verbose.unwrap_or(false),
        })
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEFAULT_CONFIG_FILENAME))
}

/// Splits a `CIDR=target` override into its parts.
fn parse_route_override(entry: &str) -> Result<(String, String)> {
    let malformed = || {
        RouteSyncError::invalid_config(
            "route",
            format!("override '{}' is not of the form CIDR=target", entry),
        )
    };
    let (destination, target) = entry.split_once('=').ok_or_else(malformed)?;
    let destination = destination.trim();
    let target = target.trim();
    if destination.is_empty() || target.is_empty() {
        return Err(malformed());
    }
    Ok((destination.to_string(), target.to_string()))
}

fn validate_destination(destination: &str) -> Result<()> {
    destination.parse::<Ipv4Network>().map_err(|e| {
        RouteSyncError::invalid_config(
            "routes",
            format!("destination '{}' is not an IPv4 CIDR: {}", destination, e),
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["routesyncd"];
        argv.extend_from_slice(args);
        Cli::parse_from(argv)
    }

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", yaml).unwrap();
        file
    }

    #[test]
    fn test_defaults_fill_unset_settings() {
        let config = SyncConfig::merge(&cli(&["-t", "rtb-1"]), ConfigFile::default()).unwrap();
        assert_eq!(config.route_table, "rtb-1");
        assert_eq!(config.ip_url, DEFAULT_IP_RANGES_URL);
        assert_eq!(config.ip_target, "gateway");
        assert_eq!(config.ip_regions, default_ip_regions());
        assert_eq!(config.ip_services, default_ip_services());
        assert!(config.routes.is_empty());
        assert!(config.notification.is_none());
        assert!(!config.verbose);
    }

    #[test]
    fn test_missing_route_table_is_rejected() {
        let err = SyncConfig::merge(&cli(&[]), ConfigFile::default()).unwrap_err();
        match err {
            RouteSyncError::InvalidConfig { field, .. } => assert_eq!(field, "route_table"),
            other => panic!("Expected InvalidConfig, got {:?}", other),
        }
    }

    #[test]
    fn test_file_values_apply_when_flags_are_silent() {
        let file = write_config(
            r#"
route_table: rtb-from-file
aws:
  access_key_id: AKIAFILE
  secret_access_key: filesecret
  region: eu-west-1
ip_ranges:
  target: i-12345678
  url: http://file.test/ranges.json
  regions:
    - eu-west-1
  services:
    - EC2
notification:
  topic: arn:aws:sns:eu-west-1:123456789012:routes
  verbose: true
routes:
  10.9.0.0/16: eni-0aa1
"#,
        );
        let args = ["--config", file.path().to_str().unwrap()];
        let config = SyncConfig::resolve(&cli(&args)).unwrap();

        assert_eq!(config.route_table, "rtb-from-file");
        assert_eq!(config.access_key.as_deref(), Some("AKIAFILE"));
        assert_eq!(config.secret_key.as_deref(), Some("filesecret"));
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.ip_target, "i-12345678");
        assert_eq!(config.ip_url, "http://file.test/ranges.json");
        let expected_regions: BTreeSet<String> = ["eu-west-1".to_string()].into_iter().collect();
        assert_eq!(config.ip_regions, expected_regions);
        let expected_services: BTreeSet<String> = ["EC2".to_string()].into_iter().collect();
        assert_eq!(config.ip_services, expected_services);
        assert_eq!(
            config.notification.as_deref(),
            Some("arn:aws:sns:eu-west-1:123456789012:routes")
        );
        assert!(config.verbose);
        assert_eq!(config.routes.get("10.9.0.0/16").map(String::as_str), Some("eni-0aa1"));
    }

    #[test]
    fn test_explicit_flag_beats_file_value() {
        let file = write_config("route_table: rtb-from-file\nip_ranges:\n  url: http://file.test/r.json\n");
        let args = [
            "--config",
            file.path().to_str().unwrap(),
            "-t",
            "rtb-from-cli",
            "-u",
            "http://cli.test/r.json",
        ];
        let config = SyncConfig::resolve(&cli(&args)).unwrap();
        assert_eq!(config.route_table, "rtb-from-cli");
        assert_eq!(config.ip_url, "http://cli.test/r.json");
    }

    #[test]
    fn test_file_target_survives_when_flag_absent() {
        // A file-provided target must not be clobbered by the built-in
        // "gateway" default when the flag is not given.
        let file = write_config("route_table: rtb-1\nip_ranges:\n  target: i-0abc\n");
        let args = ["--config", file.path().to_str().unwrap()];
        let config = SyncConfig::resolve(&cli(&args)).unwrap();
        assert_eq!(config.ip_target, "i-0abc");
    }

    #[test]
    fn test_repeatable_filters_extend_file_sets() {
        let file = write_config("route_table: rtb-1\nip_ranges:\n  regions:\n    - us-west-2\n");
        let args = [
            "--config",
            file.path().to_str().unwrap(),
            "-e",
            "eu-central-1",
            "-a",
            "EC2",
        ];
        let config = SyncConfig::resolve(&cli(&args)).unwrap();

        let expected_regions: BTreeSet<String> =
            ["us-west-2", "eu-central-1"].iter().map(|s| s.to_string()).collect();
        assert_eq!(config.ip_regions, expected_regions);

        // No services in the file, so the default set plus the flag.
        let mut expected_services = default_ip_services();
        expected_services.insert("EC2".to_string());
        assert_eq!(config.ip_services, expected_services);
    }

    #[test]
    fn test_route_override_flags_win_over_file_routes() {
        let file = write_config("route_table: rtb-1\nroutes:\n  10.9.0.0/16: i-file\n");
        let args = [
            "--config",
            file.path().to_str().unwrap(),
            "-r",
            "10.9.0.0/16=i-cli",
            "-r",
            "192.168.0.0/16=eni-1",
        ];
        let config = SyncConfig::resolve(&cli(&args)).unwrap();
        assert_eq!(config.routes.get("10.9.0.0/16").map(String::as_str), Some("i-cli"));
        assert_eq!(config.routes.get("192.168.0.0/16").map(String::as_str), Some("eni-1"));
    }

    #[test]
    fn test_malformed_route_override_is_rejected() {
        for bad in ["10.0.0.0/8", "=i-1", "10.0.0.0/8=", "="] {
            let err = SyncConfig::merge(
                &cli(&["-t", "rtb-1", "-r", bad]),
                ConfigFile::default(),
            )
            .unwrap_err();
            assert!(
                matches!(err, RouteSyncError::InvalidConfig { .. }),
                "'{}' should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_override_destination_must_be_ipv4_cidr() {
        let err = SyncConfig::merge(
            &cli(&["-t", "rtb-1", "-r", "not-a-cidr=i-1"]),
            ConfigFile::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RouteSyncError::InvalidConfig { .. }));
    }

    #[test]
    fn test_file_route_with_bad_destination_is_rejected() {
        let file = write_config("route_table: rtb-1\nroutes:\n  bogus: i-1\n");
        let args = ["--config", file.path().to_str().unwrap()];
        let err = SyncConfig::resolve(&cli(&args)).unwrap_err();
        assert!(matches!(err, RouteSyncError::InvalidConfig { .. }));
    }

    #[test]
    fn test_explicit_config_path_must_exist() {
        let args = ["--config", "/nonexistent/routesyncd.yml", "-t", "rtb-1"];
        let err = SyncConfig::resolve(&cli(&args)).unwrap_err();
        assert!(matches!(err, RouteSyncError::ConfigFile { .. }));
    }

    #[test]
    fn test_unparsable_yaml_reports_the_path() {
        let file = write_config("route_table: [unclosed\n");
        let path = file.path().to_str().unwrap().to_string();
        let err = SyncConfig::resolve(&cli(&["--config", &path])).unwrap_err();
        match err {
            RouteSyncError::ConfigParse { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("Expected ConfigParse, got {:?}", other),
        }
    }

    #[test]
    fn test_verbose_flag_or_file_enables_notification_of_no_change_runs() {
        let on_by_flag =
            SyncConfig::merge(&cli(&["-t", "rtb-1", "-v"]), ConfigFile::default()).unwrap();
        assert!(on_by_flag.verbose);

        let file = write_config("route_table: rtb-1\nnotification:\n  verbose: true\n");
        let args = ["--config", file.path().to_str().unwrap()];
        let on_by_file = SyncConfig::resolve(&cli(&args)).unwrap();
        assert!(on_by_file.verbose);
    }

    #[test]
    fn test_empty_file_same_as_no_file() {
        let file = write_config("route_table: rtb-1\n");
        let args = ["--config", file.path().to_str().unwrap()];
        let from_file = SyncConfig::resolve(&cli(&args)).unwrap();
        let from_defaults =
            SyncConfig::merge(&cli(&["-t", "rtb-1"]), ConfigFile::default()).unwrap();
        assert_eq!(from_file.ip_url, from_defaults.ip_url);
        assert_eq!(from_file.ip_regions, from_defaults.ip_regions);
        assert_eq!(from_file.ip_services, from_defaults.ip_services);
    }
}
