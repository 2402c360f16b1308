#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use provider_core::store::{JobStore, MemoryJobStore};
use tempfile::TempDir;
use tower::ServiceExt;

use provider_api::config::{ExecutionConfig, ServerConfig};
use provider_api::engine::JobEngine;
use provider_api::router::build_app_router;
use provider_api::state::AppState;

/// Build a test `ExecutionConfig` that runs `command_line` for service `svc-a`.
///
/// Polls every 20ms so waits stay short.
pub fn test_execution_config(root: &Path, command_line: &[&str]) -> ExecutionConfig {
    ExecutionConfig {
        service_id: "svc-a".to_string(),
        command_line: command_line.iter().map(|s| s.to_string()).collect(),
        file_root_directory: root.to_path_buf(),
        suppress_stdout: false,
        poll_interval: Duration::from_millis(20),
        start_wait_timeout: Duration::from_secs(2),
        completion_wait_timeout: None,
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(execution: ExecutionConfig) -> ServerConfig {
    ServerConfig {
        database_url: "postgres://unused".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        shutdown_timeout_secs: 5,
        max_param_name_len: 16,
        max_body_bytes: 4096,
        execution,
    }
}

/// A router plus the pieces tests want to inspect behind it.
pub struct TestApp {
    pub router: Router,
    pub engine: Arc<JobEngine>,
    pub store: Arc<MemoryJobStore>,
    /// Keeps the job root alive for the duration of the test.
    pub root: TempDir,
}

/// Build the full application over an in-memory store that runs
/// `command_line` for every job.
pub fn build_test_app(command_line: &[&str]) -> TestApp {
    build_test_app_with(command_line, |_| {})
}

/// Like [`build_test_app`], with a hook to adjust the configuration.
pub fn build_test_app_with(
    command_line: &[&str],
    customize: impl FnOnce(&mut ServerConfig),
) -> TestApp {
    let root = tempfile::tempdir().unwrap();
    let mut config = test_config(test_execution_config(root.path(), command_line));
    customize(&mut config);

    let store = Arc::new(MemoryJobStore::new());
    let shared: Arc<dyn JobStore> = store.clone();
    let engine = Arc::new(JobEngine::new(shared, config.execution.clone()));

    let state = AppState {
        engine: Arc::clone(&engine),
        config: Arc::new(config.clone()),
    };

    TestApp {
        router: build_app_router(state, &config),
        engine,
        store,
        root,
    }
}

pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: &serde_json::Value) -> Response {
    post_raw(app, uri, "application/json", body.to_string()).await
}

pub async fn post_raw(
    app: Router,
    uri: &str,
    content_type: &str,
    body: impl Into<Body>,
) -> Response {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", content_type)
        .body(body.into())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
