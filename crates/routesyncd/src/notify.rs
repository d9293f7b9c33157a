//! Run reports and notification delivery
//!
//! Report formatting is pure; delivery is best-effort and never unwinds a
//! run that already reconciled.

use chrono::{DateTime, Utc};

use crate::error::{Result, RouteSyncError};
use crate::types::ChangeSet;

/// Subject line for a run report.
pub fn report_subject(table_id: &str, changes: &ChangeSet) -> String {
    if changes.has_changes() {
        let applied = changes.added.len() + changes.replaced.len() + changes.deleted.len();
        let noun = if applied == 1 { "change" } else { "changes" };
        format!("routesyncd: {} route {} applied to {}", applied, noun, table_id)
    } else {
        format!("routesyncd: no route changes for {}", table_id)
    }
}

/// Renders a run report.
///
/// Counts come first, then one section per mutation bucket with a line per
/// destination. Unchanged routes are counted but not listed; a feed-sized
/// table would drown the report. Destinations appear in ascending order.
pub fn format_report(table_id: &str, changes: &ChangeSet, completed_at: DateTime<Utc>) -> String {
    let mut report = String::new();
    report.push_str(&format!(
        "Route table {} synchronized at {}\n",
        table_id,
        completed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!(
        "{} added, {} replaced, {} deleted, {} unchanged ({} total)\n",
        changes.added.len(),
        changes.replaced.len(),
        changes.deleted.len(),
        changes.unchanged.len(),
        changes.total()
    ));

    if !changes.added.is_empty() {
        report.push_str("\nAdded:\n");
        for (destination, target) in &changes.added {
            report.push_str(&format!("  {} -> {}\n", destination, target));
        }
    }
    if !changes.replaced.is_empty() {
        report.push_str("\nReplaced:\n");
        for (destination, replaced) in &changes.replaced {
            report.push_str(&format!(
                "  {} -> {} (was {})\n",
                destination, replaced.new, replaced.old
            ));
        }
    }
    if !changes.deleted.is_empty() {
        report.push_str("\nDeleted:\n");
        for (destination, target) in &changes.deleted {
            report.push_str(&format!("  {} -> {}\n", destination, target));
        }
    }
    report
}

/// Publishes run reports to a notification topic.
#[derive(Debug)]
pub struct SnsNotifier {
    client: aws_sdk_sns::Client,
}

impl SnsNotifier {
    /// Creates a notifier from a loaded SDK configuration.
    pub fn from_sdk_config(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_sns::Client::new(sdk_config),
        }
    }

    /// Publishes `message` under `subject` to `topic`.
    pub async fn publish(&self, topic: &str, subject: &str, message: &str) -> Result<()> {
        self.client
            .publish()
            .topic_arn(topic)
            .subject(subject)
            .message(message)
            .send()
            .await
            .map_err(|e| RouteSyncError::notification(e.to_string()))?;
        Ok(())
    }
}
