//! Churn Prediction Server
//!
//! Loads the reference dataset and model, starts the scheduled evaluator
//! and serves the HTTP API until Ctrl+C.

use std::net::SocketAddr;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use churn_service::config::Config;
use churn_service::{build_state, create_router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Initialize logging
    let json = config.log_format.eq_ignore_ascii_case("json");
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "churn_service=debug,tower_http=debug".into()))
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();

    tracing::info!("Churn Prediction Server starting ({})...", config.environment);
    tracing::info!("Reference dataset: {}", config.train_path.display());
    tracing::info!("Model artifact: {}", config.model_path.display());
    if config.is_production() && config.admin_token.is_none() {
        tracing::warn!("ADMIN_TOKEN is not set, admin routes are open");
    }

    // Build application state
    let state = build_state(config.clone()).context("failed to initialize service")?;

    // Scheduled evaluation
    let evaluator = match config.eval_interval() {
        Some(period) => Some(state.evaluator.clone().spawn(period)),
        None => {
            tracing::info!("Scheduled evaluation disabled");
            None
        }
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    if let Some(handle) = evaluator {
        handle.abort();
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
