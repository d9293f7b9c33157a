//! routesyncd - route table synchronization daemon
//!
//! One-shot run: resolve configuration, synchronize the route table, then
//! optionally publish a run report to the configured topic.

use chrono::Utc;
use clap::Parser;
use routesyncd::{
    format_report, load_sdk_config, report_subject, synchronize, Cli, Ec2RouteTable, SnsNotifier,
    SyncConfig, TracingObserver,
};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    let config = match SyncConfig::resolve(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("--- Starting routesyncd ---");
    info!("Synchronizing route table {}", config.route_table);

    let sdk_config = load_sdk_config(&config).await;
    let backend = Ec2RouteTable::from_sdk_config(&sdk_config);

    let changes = match synchronize(&config, &backend, Some(Box::new(TracingObserver))).await {
        Ok(changes) => changes,
        Err(e) => {
            error!("Synchronization failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!(
        "Synchronized {}: {} added, {} replaced, {} deleted, {} unchanged",
        config.route_table,
        changes.added.len(),
        changes.replaced.len(),
        changes.deleted.len(),
        changes.unchanged.len()
    );

    if let Some(topic) = &config.notification {
        if changes.has_changes() || config.verbose {
            let notifier = SnsNotifier::from_sdk_config(&sdk_config);
            let subject = report_subject(&config.route_table, &changes);
            let report = format_report(&config.route_table, &changes, Utc::now());
            match notifier.publish(topic, &subject, &report).await {
                Ok(()) => info!("Run report published to {}", topic),
                // The run already reconciled; report delivery is best-effort.
                Err(e) => error!("{}", e),
            }
        }
    }

    ExitCode::SUCCESS
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
