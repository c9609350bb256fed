//! Test Reporting - pytest output parsing, upload and storage
//!
//! The CLI turns a captured pytest run into a `TestReport` and POSTs it to
//! the service, which keeps the latest report on disk for the dashboard.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_REPORT_URL: &str = "http://localhost:8000/api/test-results";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("server answered HTTP {0}")]
    Status(u16),

    #[error("report storage error: {0}")]
    Io(#[from] io::Error),
}

// ============================================================================
// DATA STRUCTURES
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestCaseResult {
    pub name: String,
    pub status: TestStatus,
    pub duration: f64,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TestReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<TestCaseResult>,
    pub timestamp: DateTime<Utc>,
}

impl TestReport {
    pub fn from_results(results: Vec<TestCaseResult>) -> Self {
        let passed = results.iter().filter(|r| r.status == TestStatus::Passed).count();
        Self {
            total: results.len(),
            passed,
            failed: results.len() - passed,
            results,
            timestamp: Utc::now(),
        }
    }
}

// ============================================================================
// PARSING
// ============================================================================

/// Lines carrying `PASSED`/`FAILED` and a `::` node id become results.
/// A failure's message is the text that follows it up to the next `===`
/// section line.
pub fn parse_pytest_output(output: &str) -> TestReport {
    let mut results = Vec::new();
    let mut offset = 0;

    for line in output.split('\n') {
        let line_end = offset + line.len();
        offset = line_end + 1;

        let passed = line.contains("PASSED");
        if !passed && !line.contains("FAILED") {
            continue;
        }

        let Some(name) = line.split("::").nth(1).and_then(|rest| rest.split_whitespace().next()) else {
            continue;
        };

        let status = if passed { TestStatus::Passed } else { TestStatus::Failed };
        let error_message = match status {
            TestStatus::Failed => failure_message(output, line_end),
            TestStatus::Passed => None,
        };

        results.push(TestCaseResult {
            name: name.to_string(),
            status,
            duration: parse_duration(line),
            error_message,
        });
    }

    TestReport::from_results(results)
}

/// `[0.42s]` at the end of a line; anything else is 0
fn parse_duration(line: &str) -> f64 {
    line.rsplit('[')
        .next()
        .and_then(|tail| tail.split(']').next())
        .filter(|inner| inner.contains('s'))
        .and_then(|inner| inner.replace('s', "").trim().parse().ok())
        .unwrap_or(0.0)
}

fn failure_message(output: &str, from: usize) -> Option<String> {
    let rest = output.get(from..)?;
    let end = rest.find("\n===")?;
    let message = rest[..end].trim();
    (!message.is_empty()).then(|| message.to_string())
}

// ============================================================================
// UPLOAD
// ============================================================================

/// Attempts and the delay before the first retry; later delays double
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            initial_backoff: Duration::from_millis(500),
            timeout: Duration::from_secs(10),
        }
    }
}

pub async fn send_results(url: &str, report: &TestReport, policy: RetryPolicy) -> Result<(), ReportError> {
    let client = reqwest::Client::builder().timeout(policy.timeout).build()?;
    let mut backoff = policy.initial_backoff;
    let mut attempt = 1;

    loop {
        let result = match client.post(url).json(report).send().await {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => Err(ReportError::Status(response.status().as_u16())),
            Err(e) => Err(ReportError::Network(e)),
        };

        match result {
            Ok(()) => {
                tracing::info!("Sent test results ({} tests) to {}", report.total, url);
                return Ok(());
            }
            Err(e) if attempt < policy.attempts => {
                tracing::warn!("Sending test results failed (attempt {}/{}): {}", attempt, policy.attempts, e);
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!("Giving up sending test results after {} attempts: {}", attempt, e);
                return Err(e);
            }
        }
    }
}

// ============================================================================
// STORAGE
// ============================================================================

/// Latest report, mirrored to a JSON file
pub struct TestResultStore {
    path: PathBuf,
    latest: RwLock<Option<TestReport>>,
}

impl TestResultStore {
    /// Loads a previously stored report; an unreadable file starts empty
    pub fn open(path: PathBuf) -> Self {
        let latest = fs::read_to_string(&path)
            .ok()
            .and_then(|content| match serde_json::from_str(&content) {
                Ok(report) => Some(report),
                Err(e) => {
                    tracing::warn!("Ignoring unreadable test report {}: {}", path.display(), e);
                    None
                }
            });

        Self {
            path,
            latest: RwLock::new(latest),
        }
    }

    pub fn latest(&self) -> Option<TestReport> {
        self.latest.read().clone()
    }

    pub fn store(&self, report: TestReport) -> Result<(), ReportError> {
        let mut latest = self.latest.write();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&report).map_err(io::Error::from)?)?;
        fs::rename(&tmp, &self.path)?;

        tracing::info!("Stored test report: {} passed, {} failed", report.passed, report.failed);
        *latest = Some(report);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, routing::post, Router};
    use tempfile::tempdir;

    use super::*;

    const OUTPUT: &str = "\
============================= test session starts ==============================
tests/unit/test_model.py::test_prepare_data PASSED [0.12s]
tests/unit/test_model.py::test_train_model PASSED [ 40%]
tests/api/test_app.py::test_predict FAILED [1.5s]
    assert response.status_code == 200
E   assert 500 == 200
=========================== short test summary info ============================
";

    #[test]
    fn test_parse_pytest_output() {
        let report = parse_pytest_output(OUTPUT);

        assert_eq!(report.total, 3);
        assert_eq!(report.passed, 2);
        assert_eq!(report.failed, 1);

        let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["test_prepare_data", "test_train_model", "test_predict"]);

        assert_eq!(report.results[0].duration, 0.12);
        assert_eq!(report.results[1].duration, 0.0);
        assert_eq!(report.results[2].duration, 1.5);
        assert!(report.results[0].error_message.is_none());
    }

    #[test]
    fn test_failure_message_runs_to_next_section() {
        let report = parse_pytest_output(OUTPUT);
        let message = report.results[2].error_message.as_deref().unwrap();

        assert_eq!(message, "assert response.status_code == 200\nE   assert 500 == 200");
    }

    #[test]
    fn test_failure_without_details_has_no_message() {
        let output = "a.py::test_x FAILED\n=== FAILURES ===\nboom\n=== end ===\n";
        let report = parse_pytest_output(output);

        assert_eq!(report.failed, 1);
        assert!(report.results[0].error_message.is_none());
    }

    #[test]
    fn test_lines_without_node_id_are_ignored() {
        let report = parse_pytest_output("PASSED without separator\nsummary: 1 FAILED\n");
        assert_eq!(report.total, 0);
    }

    #[test]
    fn test_store_persists_latest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test_results.json");

        let store = TestResultStore::open(path.clone());
        assert!(store.latest().is_none());

        let report = parse_pytest_output(OUTPUT);
        store.store(report.clone()).unwrap();

        assert_eq!(TestResultStore::open(path).latest(), Some(report));
    }

    async fn flaky_server(failures: usize) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));

        let app = Router::new()
            .route(
                "/api/test-results",
                post(move |State(hits): State<Arc<AtomicUsize>>| async move {
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    if n < failures { StatusCode::SERVICE_UNAVAILABLE } else { StatusCode::OK }
                }),
            )
            .with_state(hits.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{}/api/test-results", addr), hits)
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            initial_backoff: Duration::from_millis(10),
            ..RetryPolicy::default()
        }
    }

    #[tokio::test]
    async fn test_send_retries_until_success() {
        let (url, hits) = flaky_server(2).await;

        send_results(&url, &parse_pytest_output(OUTPUT), fast_policy()).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_send_gives_up_after_three_attempts() {
        let (url, hits) = flaky_server(10).await;

        let err = send_results(&url, &parse_pytest_output(OUTPUT), fast_policy()).await.unwrap_err();
        assert!(matches!(err, ReportError::Status(503)));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }
}
