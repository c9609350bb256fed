//! Router tests driven through `tower::ServiceExt::oneshot`

use std::path::Path;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

use crate::config::Config;
use crate::logic::dataset::fixtures::{known_good_record, write_churn_csv};
use crate::logic::dataset::ReferenceDataset;
use crate::logic::model::{ChurnModel, ForestParams, RandomForest};
use crate::{build_state, create_router, AppState};

struct TestApp {
    _dir: TempDir,
    state: AppState,
    router: Router,
}

fn test_config(dir: &Path, admin_token: Option<&str>) -> Config {
    Config {
        train_path: write_churn_csv(dir, "train.csv", 250, 31),
        test_path: write_churn_csv(dir, "test.csv", 60, 32),
        model_path: dir.join("model.json"),
        monitoring_dir: dir.join("monitoring_logs"),
        alert_config_path: dir.join("alert_config.json"),
        admin_token: admin_token.map(String::from),
        ..Config::default()
    }
}

fn train(config: &Config) {
    let reference = ReferenceDataset::load(&config.train_path, &config.dataset_options()).unwrap();
    let params = ForestParams { n_estimators: 20, max_depth: 8, ..ForestParams::default() };
    let forest = RandomForest::fit(reference.features(), reference.labels(), params).unwrap();
    ChurnModel::new(reference.schema(), reference.target(), forest)
        .save(&config.model_path)
        .unwrap();
}

fn app(with_model: bool, admin_token: Option<&str>) -> TestApp {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path(), admin_token);
    if with_model {
        train(&config);
    }

    let state = build_state(config).unwrap();
    let router = create_router(state.clone());

    TestApp { _dir: dir, state, router }
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_with_headers(router, method, uri, body, &[]).await
}

async fn send_with_headers(
    router: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }

    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };

    (status, value)
}

fn predict_body(features: Value) -> Option<Value> {
    Some(json!({ "features": features }))
}

#[tokio::test]
async fn test_health() {
    let app = app(true, None);
    let (status, body) = send(&app.router, Method::GET, "/api/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], true);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_predict_known_good_record() {
    let app = app(true, None);
    let features = serde_json::to_value(known_good_record()).unwrap();

    let (status, body) = send(&app.router, Method::POST, "/api/predict", predict_body(features)).await;

    assert_eq!(status, StatusCode::OK);
    let prediction = body["prediction"].as_u64().unwrap();
    assert!(prediction == 0 || prediction == 1);

    let churn = body["churn_probability"].as_f64().unwrap();
    let retention = body["retention_probability"].as_f64().unwrap();
    assert!((churn + retention - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_prediction_is_logged() {
    let app = app(true, None);
    let features = serde_json::to_value(known_good_record()).unwrap();

    let (status, _) = send(&app.router, Method::POST, "/api/predict", predict_body(features)).await;
    assert_eq!(status, StatusCode::OK);

    let log = app.state.monitor.prediction_log();
    for _ in 0..100 {
        if !log.read_all().unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(log.read_all().unwrap().len(), 1);
}

#[tokio::test]
async fn test_predict_with_partial_record_fills_gaps() {
    let app = app(true, None);
    let mut features = serde_json::to_value(known_good_record()).unwrap();
    let map = features.as_object_mut().unwrap();
    map.remove("Total eve calls");
    map.remove("Voice mail plan");
    map.insert("Area code".into(), Value::Null);

    let (status, _) = send(&app.router, Method::POST, "/api/predict", predict_body(features)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_predict_rejects_client_errors() {
    let app = app(true, None);

    // unseen category
    let mut unseen = serde_json::to_value(known_good_record()).unwrap();
    unseen["State"] = json!("Atlantis");
    let (status, body) = send(&app.router, Method::POST, "/api/predict", predict_body(unseen)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert!(body["error"].as_str().unwrap().contains("Atlantis"));

    // non-numeric value for a numeric column
    let mut garbage = serde_json::to_value(known_good_record()).unwrap();
    garbage["Total day minutes"] = json!("lots");
    let (status, body) = send(&app.router, Method::POST, "/api/predict", predict_body(garbage)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("Total day minutes"));

    // almost everything missing
    let (status, _) = send(&app.router, Method::POST, "/api/predict", predict_body(json!({ "State": "NY" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // no features key at all
    let (status, body) = send(&app.router, Method::POST, "/api/predict", Some(json!({ "State": "NY" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_predict_non_scalar_values() {
    let app = app(true, None);

    // arrays under unknown keys are ignored like any other unknown key
    let mut tagged = serde_json::to_value(known_good_record()).unwrap();
    tagged["tags"] = json!(["a", "b"]);
    let (status, _) = send(&app.router, Method::POST, "/api/predict", predict_body(tagged)).await;
    assert_eq!(status, StatusCode::OK);

    // objects under schema columns are rejected in the error envelope
    let mut nested = serde_json::to_value(known_good_record()).unwrap();
    nested["Total day minutes"] = json!({ "v": 1 });
    let (status, body) = send(&app.router, Method::POST, "/api/predict", predict_body(nested)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert!(body["error"].as_str().unwrap().contains("Total day minutes"));

    let mut listed = serde_json::to_value(known_good_record()).unwrap();
    listed["State"] = json!(["NY"]);
    let (status, _) = send(&app.router, Method::POST, "/api/predict", predict_body(listed)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // empty body object
    let (status, body) = send(&app.router, Method::POST, "/api/predict", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    // features of the wrong shape
    let (status, body) = send(&app.router, Method::POST, "/api/predict", Some(json!({ "features": [1, 2] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_predict_malformed_json() {
    let app = app(true, None);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"features\": {"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_model_unavailable() {
    let app = app(false, None);
    let features = serde_json::to_value(known_good_record()).unwrap();

    let (status, body) = send(&app.router, Method::POST, "/api/predict", predict_body(features)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Model not loaded");

    let (status, _) = send(&app.router, Method::GET, "/api/features", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (_, health) = send(&app.router, Method::GET, "/api/health", None).await;
    assert_eq!(health["model_loaded"], false);
}

#[tokio::test]
async fn test_features_and_model_metadata() {
    let app = app(true, None);

    let (status, body) = send(&app.router, Method::GET, "/api/features", None).await;
    assert_eq!(status, StatusCode::OK);

    let importances: Vec<f64> = body.as_array()
        .unwrap()
        .iter()
        .map(|f| f["importance"].as_f64().unwrap())
        .collect();
    assert_eq!(importances.len(), 19);
    assert!(importances.windows(2).all(|w| w[0] >= w[1]));

    let (status, meta) = send(&app.router, Method::GET, "/api/model", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta["n_estimators"], 20);
    assert_eq!(meta["n_features"], 19);
    assert_eq!(meta["checksum"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_monitoring_endpoints() {
    let app = app(true, None);

    let (status, history) = send(&app.router, Method::GET, "/api/monitoring/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["accuracy"], json!([]));

    let (status, report) = send(&app.router, Method::POST, "/api/monitoring/evaluate", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["metrics"]["prediction_count"], 60);

    let (_, history) = send(&app.router, Method::GET, "/api/monitoring/history", None).await;
    assert_eq!(history["timestamps"].as_array().unwrap().len(), 1);

    let (status, alerts) = send(&app.router, Method::GET, "/api/monitoring/alerts", None).await;
    assert_eq!(status, StatusCode::OK);
    let expected = if report["alert"]["fired"] == true { 1 } else { 0 };
    assert_eq!(alerts["alerts"].as_array().unwrap().len(), expected);
}

#[tokio::test]
async fn test_admin_reload_requires_token() {
    let app = app(false, Some("s3cret"));

    let (status, _) = send(&app.router, Method::POST, "/api/admin/reload", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send_with_headers(
        &app.router,
        Method::POST,
        "/api/admin/reload",
        None,
        &[("authorization", "Bearer wrong")],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // a model trained after startup becomes visible on reload
    train(&app.state.config);

    let (status, body) = send_with_headers(
        &app.router,
        Method::POST,
        "/api/admin/reload",
        None,
        &[("authorization", "Bearer s3cret")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["reference_rows"], 250);

    let (_, health) = send(&app.router, Method::GET, "/api/health", None).await;
    assert_eq!(health["model_loaded"], true);
}

#[tokio::test]
async fn test_test_results_round_trip() {
    let app = app(false, None);

    let (status, _) = send(&app.router, Method::GET, "/api/test-results", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let report = json!({
        "total": 2,
        "passed": 1,
        "failed": 1,
        "results": [
            { "name": "test_a", "status": "passed", "duration": 0.1, "error_message": null },
            { "name": "test_b", "status": "failed", "duration": 0.2, "error_message": "boom" }
        ],
        "timestamp": "2026-01-01T00:00:00Z"
    });

    let (status, _) = send(&app.router, Method::POST, "/api/test-results", Some(report)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app.router, Method::POST, "/api/test-results", Some(json!({ "total": "two" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);

    let (status, body) = send(&app.router, Method::GET, "/api/test-results", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["failed"], 1);
    assert_eq!(body["results"][1]["error_message"], "boom");
}
