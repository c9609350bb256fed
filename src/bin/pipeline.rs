//! Training pipeline controller
//!
//! `churn-pipeline [action] [--n-estimators N] [--max-depth D]`, where the
//! action defaults to running every step.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use churn_service::config::Config;
use churn_service::logic::model::ForestParams;
use churn_service::logic::pipeline::{
    evaluate_model, load_model, prepare_data, save_model, train_model, PreparedData,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
enum Action {
    PrepareData,
    TrainModel,
    EvaluateModel,
    SaveModel,
    LoadModel,
    All,
}

#[derive(Parser, Debug)]
#[command(name = "churn-pipeline", version, about = "Random forest churn model pipeline")]
struct Cli {
    /// Step to run
    #[arg(value_enum, default_value_t = Action::All)]
    action: Action,

    /// Number of trees in the forest
    #[arg(long, default_value_t = 100)]
    n_estimators: usize,

    /// Maximum depth of each tree
    #[arg(long, default_value_t = 10)]
    max_depth: usize,

    /// Training CSV (defaults to TRAIN_DATA_PATH)
    #[arg(long)]
    train: Option<PathBuf>,

    /// Held-out CSV (defaults to TEST_DATA_PATH)
    #[arg(long)]
    test: Option<PathBuf>,

    /// Model artifact (defaults to MODEL_PATH)
    #[arg(long)]
    model: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "churn_service=info,churn_pipeline=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let train = cli.train.clone().unwrap_or(config.train_path.clone());
    let test = cli.test.clone().unwrap_or(config.test_path.clone());
    let model_path = cli.model.clone().unwrap_or(config.model_path.clone());
    let options = config.dataset_options();

    let params = ForestParams {
        n_estimators: cli.n_estimators,
        max_depth: cli.max_depth,
        ..ForestParams::default()
    };

    let prepare = || -> Result<PreparedData> {
        tracing::info!("🔹 Preparing data...");
        prepare_data(&train, &test, &options).context("failed to prepare data")
    };

    match cli.action {
        Action::PrepareData => {
            prepare()?;
        }
        Action::TrainModel => {
            let data = prepare()?;
            train_model(&data, params)?;
        }
        Action::EvaluateModel => {
            let data = prepare()?;
            let model = train_model(&data, params)?;
            evaluate_model(&model, &data.x_test, &data.y_test)?;
        }
        Action::SaveModel => {
            let data = prepare()?;
            let model = train_model(&data, params)?;
            save_model(&model, &model_path)?;
        }
        Action::LoadModel => {
            tracing::info!("🔹 Loading model and re-evaluating...");
            let data = prepare()?;
            let model = load_model(&model_path)
                .with_context(|| format!("failed to load {}", model_path.display()))?;
            evaluate_model(&model, &data.x_test, &data.y_test)?;
        }
        Action::All => {
            tracing::info!("Running full random forest pipeline...");
            let data = prepare()?;

            let model = train_model(&data, params)?;
            let accuracy = evaluate_model(&model, &data.x_test, &data.y_test)?;

            save_model(&model, &model_path)?;

            tracing::info!("🔹 Loading and re-evaluating model...");
            let loaded = load_model(&model_path)?;
            let reloaded_accuracy = evaluate_model(&loaded, &data.x_test, &data.y_test)?;

            if reloaded_accuracy != accuracy {
                anyhow::bail!(
                    "reloaded model scored {:.4}, expected {:.4}",
                    reloaded_accuracy,
                    accuracy
                );
            }
        }
    }

    Ok(())
}
