//! Alerting Module - threshold checks and notifications
//!
//! A breach produces one combined message which is logged, appended to the
//! alert log and pushed to every enabled channel. Channel failures are
//! recorded in the outcome and never propagate.

pub mod config;
pub mod channels;


use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::logic::monitoring::MetricsRecord;

// Re-export common types
pub use config::{AlertConfig, EmailChannel, Notifications, Thresholds, WebhookChannel};
pub use channels::{EmailNotifier, NotificationError, WebhookNotifier};

pub const ALERT_LOG_FILE: &str = "alerts.log";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const TIMESTAMP_LEN: usize = 19;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert storage error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed alert config: {0}")]
    Format(#[from] serde_json::Error),

    #[error("invalid alert config: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

/// Result of delivering to one channel
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Delivery {
    pub channel: String,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct AlertOutcome {
    pub fired: bool,
    pub message: Option<String>,
    pub deliveries: Vec<Delivery>,
}

/// Append-only alert log; one writer or reader at a time
struct AlertLog {
    path: PathBuf,
    lock: Mutex<()>,
}

pub struct Alerter {
    config: AlertConfig,
    log: Arc<AlertLog>,
}

impl Alerter {
    pub fn new(config: AlertConfig, log_dir: &Path) -> Self {
        Self {
            config,
            log: Arc::new(AlertLog {
                path: log_dir.join(ALERT_LOG_FILE),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &AlertConfig {
        &self.config
    }

    /// Human-readable breach descriptions, empty when all metrics are fine
    pub fn breaches(&self, metrics: &MetricsRecord) -> Vec<String> {
        let t = &self.config.thresholds;
        let mut alerts = Vec::new();

        if metrics.accuracy < t.accuracy {
            alerts.push(format!(
                "Model accuracy ({:.4}) is below threshold ({:.4})",
                metrics.accuracy, t.accuracy
            ));
        }
        if metrics.f1_score < t.f1_score {
            alerts.push(format!(
                "Model F1 score ({:.4}) is below threshold ({:.4})",
                metrics.f1_score, t.f1_score
            ));
        }
        if let Some(drift) = metrics.data_drift_score.filter(|d| *d > t.data_drift) {
            alerts.push(format!(
                "Data drift score ({:.4}) exceeds threshold ({:.4})",
                drift, t.data_drift
            ));
        }

        alerts
    }

    /// Compare against thresholds and notify on breach
    pub async fn check(&self, metrics: &MetricsRecord) -> AlertOutcome {
        if !self.config.enabled {
            return AlertOutcome::default();
        }

        let alerts = self.breaches(metrics);
        if alerts.is_empty() {
            return AlertOutcome::default();
        }

        let timestamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let message = format!("ML Model Alert ({}):\n{}", timestamp, alerts.join("\n"));

        tracing::warn!("{}", message);

        let log = Arc::clone(&self.log);
        let entry = format!("{} - {}", timestamp, message);
        match tokio::task::spawn_blocking(move || log.append(&entry)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Failed to write alert log: {}", e),
            Err(e) => tracing::error!("Alert log task failed: {}", e),
        }

        let deliveries = self.dispatch(&message).await;

        AlertOutcome {
            fired: true,
            message: Some(message),
            deliveries,
        }
    }

    /// Alert log entries, oldest first. Continuation lines of a multi-line
    /// message are joined back onto their entry.
    pub fn read_alerts(&self) -> io::Result<Vec<String>> {
        self.log.read()
    }

    async fn dispatch(&self, message: &str) -> Vec<Delivery> {
        let notifications = &self.config.notifications;
        let mut deliveries = Vec::new();

        if notifications.email.enabled {
            let result = EmailNotifier::new(notifications.email.recipients.clone()).send(message);
            deliveries.push(delivery("email", result));
        }

        if notifications.slack.enabled {
            if notifications.slack.webhook_url.is_empty() {
                tracing::warn!("Slack alerts enabled but no webhook URL configured");
            } else {
                let timeout = Duration::from_secs(self.config.webhook_timeout_secs);
                let result = match WebhookNotifier::new(notifications.slack.webhook_url.clone(), timeout) {
                    Ok(notifier) => notifier.send(message).await,
                    Err(e) => Err(e),
                };
                deliveries.push(delivery("slack", result));
            }
        }

        deliveries
    }
}

impl AlertLog {
    /// Entries are "<ts> - <msg>"; multi-line messages are stored as-is
    fn append(&self, entry: &str) -> io::Result<()> {
        let _guard = self.lock.lock();

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", entry)
    }

    fn read(&self) -> io::Result<Vec<String>> {
        let _guard = self.lock.lock();
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        let mut entries: Vec<String> = Vec::new();
        for line in content.lines() {
            match entries.last_mut() {
                Some(entry) if !starts_entry(line) => {
                    entry.push('\n');
                    entry.push_str(line);
                }
                _ => entries.push(line.to_string()),
            }
        }
        Ok(entries)
    }
}

fn starts_entry(line: &str) -> bool {
    line.get(..TIMESTAMP_LEN)
        .map_or(false, |ts| NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).is_ok())
        && line[TIMESTAMP_LEN..].starts_with(" - ")
}

fn delivery(channel: &str, result: Result<(), NotificationError>) -> Delivery {
    match result {
        Ok(()) => Delivery {
            channel: channel.to_string(),
            success: true,
            error: None,
        },
        Err(e) => {
            tracing::error!("Failed to send {} alert: {}", channel, e);
            Delivery {
                channel: channel.to_string(),
                success: false,
                error: Some(e.to_string()),
            }
        }
    }
}
