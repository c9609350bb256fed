//! Alert configuration - thresholds and notification channels
//!
//! Lives in a JSON file; a default file is written when none exists.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::AlertError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct AlertConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[validate(nested)]
    #[serde(default)]
    pub thresholds: Thresholds,

    #[validate(nested)]
    #[serde(default)]
    pub notifications: Notifications,

    /// Per-request timeout for outbound webhooks
    #[validate(range(min = 1, max = 120))]
    #[serde(default = "default_webhook_timeout")]
    pub webhook_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
pub struct Thresholds {
    /// Alert when accuracy falls below
    #[validate(range(min = 0.0, max = 1.0))]
    pub accuracy: f64,

    /// Alert when F1 falls below
    #[validate(range(min = 0.0, max = 1.0))]
    pub f1_score: f64,

    /// Alert when drift rises above
    #[validate(range(min = 0.0, max = 1.0))]
    pub data_drift: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
pub struct Notifications {
    #[validate(nested)]
    #[serde(default)]
    pub email: EmailChannel,

    #[validate(nested)]
    #[serde(default)]
    pub slack: WebhookChannel,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
pub struct EmailChannel {
    pub enabled: bool,
    #[serde(default)]
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Validate)]
pub struct WebhookChannel {
    pub enabled: bool,
    #[validate(length(max = 2048))]
    #[serde(default)]
    pub webhook_url: String,
}

fn default_enabled() -> bool {
    true
}

fn default_webhook_timeout() -> u64 {
    5
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            accuracy: 0.85,
            f1_score: 0.80,
            data_drift: 0.3,
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            thresholds: Thresholds::default(),
            notifications: Notifications::default(),
            webhook_timeout_secs: default_webhook_timeout(),
        }
    }
}

impl AlertConfig {
    /// Read and validate `path`, writing the defaults there first if absent
    pub fn load_or_create(path: &Path) -> Result<Self, AlertError> {
        if !path.exists() {
            let config = Self::default();
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, serde_json::to_string_pretty(&config)?)?;
            tracing::info!("Created default alert config at {}", path.display());
            return Ok(config);
        }

        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;

        Ok(config)
    }
}
