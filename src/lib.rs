//! Churn Prediction Service
//!
//! Serves a random-forest churn classifier over HTTP, with monitoring,
//! alerting, scheduled re-evaluation and test-result reporting.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CHURN SERVICE                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────┐  ┌────────────────┐  ┌────────────────────┐ │
//! │  │  API      │  │  Serving       │  │  Scheduled         │ │
//! │  │  (Axum)   │─▶│  Context       │◀─│  Evaluator         │ │
//! │  └─────┬─────┘  │  (dataset +    │  └─────────┬──────────┘ │
//! │        │        │   model)       │            │            │
//! │        ▼        └────────────────┘            ▼            │
//! │  ┌───────────┐                        ┌────────────────┐   │
//! │  │  Monitor  │───── batch metrics ───▶│  Alerter       │   │
//! │  └───────────┘                        └────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod logic;
pub mod middleware;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{get, post},
    middleware as axum_middleware,
};
use thiserror::Error;
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
    timeout::TimeoutLayer,
};

pub use error::{AppError, AppResult};

use config::Config;
use logic::alerting::{AlertConfig, AlertError, Alerter};
use logic::dataset::DatasetError;
use logic::monitoring::{Monitor, MonitorError};
use logic::reporting::TestResultStore;
use logic::scheduler::Evaluator;
use logic::serving::{ServingSources, ServingState};

pub const TEST_RESULTS_FILE: &str = "test_results.json";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load reference dataset: {0}")]
    Dataset(#[from] DatasetError),

    #[error("failed to initialize monitoring: {0}")]
    Monitor(#[from] MonitorError),

    #[error("failed to load alert config: {0}")]
    Alerts(#[from] AlertError),
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub serving: Arc<ServingState>,
    pub monitor: Arc<Monitor>,
    pub alerter: Arc<Alerter>,
    pub evaluator: Evaluator,
    pub test_results: Arc<TestResultStore>,
}

/// Load everything the server needs from disk
pub fn build_state(config: Config) -> Result<AppState, StartupError> {
    let sources = ServingSources {
        reference_path: config.train_path.clone(),
        model_path: config.model_path.clone(),
        dataset: config.dataset_options(),
        policy: config.missing_policy(),
    };

    let serving = Arc::new(ServingState::load(sources)?);
    let monitor = Arc::new(Monitor::new(&config.monitoring_dir)?);
    let alert_config = AlertConfig::load_or_create(&config.alert_config_path)?;
    let alerter = Arc::new(Alerter::new(alert_config, &config.monitoring_dir));
    let test_results = Arc::new(TestResultStore::open(config.monitoring_dir.join(TEST_RESULTS_FILE)));

    let evaluator = Evaluator::new(
        serving.clone(),
        monitor.clone(),
        alerter.clone(),
        config.test_path.clone(),
    );

    Ok(AppState {
        config,
        serving,
        monitor,
        alerter,
        evaluator,
        test_results,
    })
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    // Public routes
    let public_routes = Router::new()
        .route("/api/health", get(handlers::health::check))
        .route("/api/predict", post(handlers::predict::predict))
        .route("/api/features", get(handlers::features::importances))
        .route("/api/model", get(handlers::model::metadata))

        // Monitoring
        .route("/api/monitoring/metrics", get(handlers::monitoring::metrics))
        .route("/api/monitoring/history", get(handlers::monitoring::metrics))
        .route("/api/monitoring/alerts", get(handlers::monitoring::alerts))
        .route("/api/monitoring/evaluate", post(handlers::monitoring::evaluate))

        // Test results
        .route(
            "/api/test-results",
            get(handlers::test_results::latest).post(handlers::test_results::submit),
        );

    // Admin routes (bearer token when ADMIN_TOKEN is set)
    let admin_routes = Router::new()
        .route("/api/admin/reload", post(handlers::admin::reload))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin_token
        ));

    let timeout = Duration::from_secs(state.config.request_timeout_secs);

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
