//! Handler for `POST /execute`.
//!
//! Accepts a JSON body of the form
//!
//! ```json
//! {
//!   "code_input_params": { "--flag": true, "--n": 3, "--files": ["a", "b"] },
//!   "application_params": { "job_id": "job-1", "synch_execution": true }
//! }
//! ```
//!
//! admits the job, waits for it to start and, in synchronous mode, waits
//! for it to finish.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use provider_core::job::ParamValue;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::engine::WaitError;
use crate::error::{AppError, AppResult};
use crate::handlers::job_info::load_job_info;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub code_input_params: Value,
    pub application_params: ApplicationParams,
}

#[derive(Debug, Deserialize)]
pub struct ApplicationParams {
    pub job_id: String,
    #[serde(default = "default_synch_execution")]
    pub synch_execution: bool,
}

fn default_synch_execution() -> bool {
    true
}

/// POST /execute
///
/// Returns `{}` once the job started (asynchronous mode), or the full job
/// info once it finished (synchronous mode). A bounded synchronous wait that
/// runs out answers 202.
pub async fn execute(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with("application/json") {
        return Err(AppError::BadRequest(format!(
            "Unaccepted content type: '{content_type}'."
        )));
    }

    let request: ExecuteRequest = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Malformed execute request body");
        AppError::BadRequest("Malformed JSON string for 'inputs'.".into())
    })?;

    let Value::Object(inputs) = &request.code_input_params else {
        return Err(AppError::BadRequest(
            "JSON string does not represent an object (pairs of name/value).".into(),
        ));
    };
    let parameters = to_parameters(inputs, state.config.max_param_name_len)?;

    let job_id = request.application_params.job_id;
    state.engine.submit(&job_id, &parameters).await?;

    state.engine.wait_for_start(&job_id).await?;

    if !request.application_params.synch_execution {
        return Ok(Json(json!({})).into_response());
    }

    match state.engine.wait_for_completion(&job_id).await {
        Ok(_) => Ok(Json(load_job_info(&state, &job_id).await?).into_response()),
        Err(WaitError::StillRunning { job_id, waited_ms }) => {
            tracing::info!(job_id = %job_id, waited_ms, "Synchronous wait ended before the job");
            Ok((
                StatusCode::ACCEPTED,
                Json(json!({ "job_id": job_id, "status": "running" })),
            )
                .into_response())
        }
        Err(e) => Err(e.into()),
    }
}

/// Convert the submitted name/value object into ordered parameters.
fn to_parameters(
    inputs: &Map<String, Value>,
    max_name_len: usize,
) -> AppResult<Vec<(String, ParamValue)>> {
    inputs
        .iter()
        .map(|(name, value)| {
            check_parameter_name(name, max_name_len)?;
            Ok((name.clone(), to_param_value(name, value)?))
        })
        .collect()
}

fn check_parameter_name(name: &str, max_len: usize) -> AppResult<()> {
    if name.chars().count() > max_len {
        let prefix: String = name.chars().take(max_len.saturating_sub(1)).collect();
        return Err(AppError::BadRequest(format!(
            "Parameter name exceed maximum allowed len: '{prefix}...'."
        )));
    }
    Ok(())
}

/// Strings pass through, numbers become their text, booleans become flags
/// and lists become one argument per element.
fn to_param_value(name: &str, value: &Value) -> AppResult<ParamValue> {
    match value {
        Value::String(s) => Ok(ParamValue::Single(s.clone())),
        Value::Bool(_) => Ok(ParamValue::Single(String::new())),
        Value::Number(n) => Ok(ParamValue::Single(n.to_string())),
        Value::Array(items) => Ok(ParamValue::List(
            items
                .iter()
                .map(|item| match item {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        )),
        Value::Null | Value::Object(_) => Err(AppError::BadRequest(format!(
            "Unexpected value for parameter '{name}'."
        ))),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
