//! Handler for `GET /job_info/{job_id}`.

use axum::extract::{Path, State};
use axum::Json;
use provider_core::error::CoreError;
use provider_core::types::Timestamp;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::engine::JobInfo;
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Status and output of a job.
#[derive(Debug, Serialize)]
pub struct JobStatusBody {
    pub received: Timestamp,
    pub start_processing: Option<Timestamp>,
    pub end_processing: Option<Timestamp>,
    pub exit_code: Option<i32>,
    pub std_out: Option<String>,
    pub std_err: Option<String>,
}

/// Response body shared by `GET /job_info/{id}` and synchronous `POST /execute`.
#[derive(Debug, Serialize)]
pub struct JobInfoResponse {
    pub job_id: String,
    pub job_info: JobStatusBody,
    /// Parameter name to stored (flattened) value.
    pub params: Map<String, Value>,
}

impl From<JobInfo> for JobInfoResponse {
    fn from(info: JobInfo) -> Self {
        let params = info
            .parameters
            .into_iter()
            .map(|p| (p.name, Value::String(p.value)))
            .collect();
        let job = info.job;

        Self {
            job_id: job.id,
            job_info: JobStatusBody {
                received: job.received_at,
                start_processing: job.start_processing,
                end_processing: job.end_processing,
                exit_code: job.exit_code,
                std_out: job.std_out,
                std_err: job.std_err,
            },
            params,
        }
    }
}

/// Load a job of this service or fail with `NotFound`.
pub async fn load_job_info(state: &AppState, job_id: &str) -> AppResult<JobInfoResponse> {
    state
        .engine
        .job_info(job_id)
        .await?
        .map(JobInfoResponse::from)
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Job",
                id: job_id.to_string(),
            })
        })
}

/// GET /job_info/{job_id}
///
/// Return the parameters, the status and, once finished, the output of a
/// job. Jobs of other services are reported as not found.
pub async fn get_job_info(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<JobInfoResponse>> {
    Ok(Json(load_job_info(&state, &job_id).await?))
}
