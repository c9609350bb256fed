//! Test reporter
//!
//! `churn-report <pytest_output_file> [--url URL]` parses a captured pytest
//! run and uploads it to the service. Exits non-zero on any failure.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use churn_service::logic::reporting::{
    parse_pytest_output, send_results, RetryPolicy, DEFAULT_REPORT_URL,
};

#[derive(Parser, Debug)]
#[command(name = "churn-report", version, about = "Upload pytest results to the churn service")]
struct Cli {
    /// File holding pytest output
    output_file: PathBuf,

    /// Test results endpoint
    #[arg(long, default_value = DEFAULT_REPORT_URL)]
    url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "churn_service=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let output = tokio::fs::read_to_string(&cli.output_file)
        .await
        .with_context(|| format!("failed to read {}", cli.output_file.display()))?;

    let report = parse_pytest_output(&output);
    tracing::info!(
        "Parsed {} tests: {} passed, {} failed",
        report.total,
        report.passed,
        report.failed
    );

    send_results(&cli.url, &report, RetryPolicy::default())
        .await
        .context("failed to send test results")?;

    Ok(())
}
