use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use provider_core::error::CoreError;
use provider_core::store::StoreError;
use serde_json::json;

use crate::engine::{AdmissionError, WaitError};

/// Message shown to callers instead of internal details.
const REPORT_MESSAGE: &str =
    "Please report to the application manager with date and time of the problem.";

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `provider_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A job store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A job could not be admitted.
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    /// Waiting on a job failed.
    #[error(transparent)]
    Wait(#[from] WaitError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

type Classified = (StatusCode, &'static str, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Store(err) => classify_store_error(err),
            AppError::Admission(err) => match err {
                AdmissionError::InvalidRequest(core) => classify_core_error(core),
                AdmissionError::Store(store) => classify_store_error(store),
                AdmissionError::WorkingDirectory { .. } => internal(&self),
            },
            AppError::Wait(err) => classify_wait_error(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal(err: &dyn std::fmt::Display) -> Classified {
    tracing::error!(error = %err, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core_error(err: &CoreError) -> Classified {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
    }
}

/// Classify a store error into an HTTP status, error code, and message.
///
/// - `DuplicateJob` maps to 409.
/// - `JobNotFound` maps to 404.
/// - Everything else maps to 500 with a sanitized message.
fn classify_store_error(err: &StoreError) -> Classified {
    match err {
        StoreError::DuplicateJob(id) => (
            StatusCode::CONFLICT,
            "CONFLICT",
            format!("Job with id {id} already exists"),
        ),
        StoreError::JobNotFound(id) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Job with id {id} not found"),
        ),
        StoreError::InvalidTransition { .. } | StoreError::Backend(_) => internal(err),
    }
}

fn classify_wait_error(err: &WaitError) -> Classified {
    match err {
        WaitError::NotStarted { .. } | WaitError::FailedToStart { .. } => {
            tracing::error!(error = %err, "Job not started");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "JOB_NOT_STARTED",
                format!("Job not started. {REPORT_MESSAGE}"),
            )
        }
        WaitError::StillRunning { job_id, .. } => (
            StatusCode::ACCEPTED,
            "STILL_RUNNING",
            format!("Job {job_id} is still running, try again later"),
        ),
        WaitError::NotFound(id) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Job with id {id} not found"),
        ),
        WaitError::Store(store) => classify_store_error(store),
    }
}
