pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the job route tree.
///
/// ```text
/// /execute                 submit a job (POST)
/// /job_info/{job_id}       job status, output and parameters (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/execute", post(handlers::execute::execute))
        .route("/job_info/{job_id}", get(handlers::job_info::get_job_info))
}
