//! Configuration module

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::logic::dataset::DatasetOptions;
use crate::logic::features::MissingFeaturePolicy;

/// Longest accepted evaluation interval (one year)
pub const MAX_EVAL_INTERVAL_HOURS: u64 = 24 * 365;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Training CSV, also the serving reference dataset
    pub train_path: PathBuf,

    /// Held-out CSV used by scheduled evaluation
    pub test_path: PathBuf,

    /// Model artifact
    pub model_path: PathBuf,

    /// Label column
    pub target_column: String,

    /// Columns coerced yes/no -> 1/0
    pub boolean_columns: Vec<String>,

    /// Metrics history, prediction logs, alert log, charts
    pub monitoring_dir: PathBuf,

    /// Alert thresholds and channels
    pub alert_config_path: PathBuf,

    /// Hours between scheduled evaluations (0 disables)
    pub eval_interval_hours: u64,

    /// Fraction of schema columns a request may omit
    pub max_missing_ratio: f64,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,

    /// Bearer token for admin routes (unset = open)
    pub admin_token: Option<String>,

    /// "json" for structured logs
    pub log_format: String,

    /// Environment (development, production)
    pub environment: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            train_path: PathBuf::from("churn-bigml-80.csv"),
            test_path: PathBuf::from("churn-bigml-20.csv"),
            model_path: PathBuf::from("model.json"),
            target_column: "Churn".to_string(),
            boolean_columns: DatasetOptions::default().boolean_columns,
            monitoring_dir: PathBuf::from("monitoring_logs"),
            alert_config_path: PathBuf::from("alert_config.json"),
            eval_interval_hours: 24,
            max_missing_ratio: MissingFeaturePolicy::default().max_missing_ratio,
            request_timeout_secs: 30,
            admin_token: None,
            log_format: "pretty".to_string(),
            environment: "development".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            port: parsed("PORT").unwrap_or(defaults.port),

            train_path: env::var("TRAIN_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.train_path),

            test_path: env::var("TEST_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.test_path),

            model_path: env::var("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),

            target_column: env::var("TARGET_COLUMN")
                .unwrap_or(defaults.target_column),

            boolean_columns: env::var("BOOLEAN_COLUMNS")
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or(defaults.boolean_columns),

            monitoring_dir: env::var("MONITORING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.monitoring_dir),

            alert_config_path: env::var("ALERT_CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.alert_config_path),

            eval_interval_hours: parsed::<u64>("EVAL_INTERVAL_HOURS")
                .filter(|h| *h <= MAX_EVAL_INTERVAL_HOURS)
                .unwrap_or(defaults.eval_interval_hours),

            max_missing_ratio: parsed::<f64>("MAX_MISSING_FEATURE_RATIO")
                .filter(|r| (0.0..=1.0).contains(r))
                .unwrap_or(defaults.max_missing_ratio),

            request_timeout_secs: parsed("REQUEST_TIMEOUT_SECS").unwrap_or(defaults.request_timeout_secs),

            admin_token: env::var("ADMIN_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),

            log_format: env::var("LOG_FORMAT")
                .unwrap_or(defaults.log_format),

            environment: env::var("ENVIRONMENT")
                .unwrap_or(defaults.environment),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Scheduled evaluation period; `None` when disabled or out of range
    pub fn eval_interval(&self) -> Option<Duration> {
        if self.eval_interval_hours == 0 || self.eval_interval_hours > MAX_EVAL_INTERVAL_HOURS {
            return None;
        }
        self.eval_interval_hours.checked_mul(3600).map(Duration::from_secs)
    }

    pub fn dataset_options(&self) -> DatasetOptions {
        DatasetOptions {
            target: self.target_column.clone(),
            boolean_columns: self.boolean_columns.clone(),
        }
    }

    pub fn missing_policy(&self) -> MissingFeaturePolicy {
        MissingFeaturePolicy { max_missing_ratio: self.max_missing_ratio }
    }
}

fn parsed<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
