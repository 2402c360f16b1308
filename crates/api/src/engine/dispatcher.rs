//! Per-job execution task.
//!
//! Ordering within one job is fixed: start mark, process, terminal write.
//! The process is only launched after the start mark succeeded, so a job
//! receives exactly one terminal write.

use std::sync::Arc;

use provider_core::execution::{run_command, CommandSpec};
use provider_core::job::FAILED_BEFORE_START_EXIT_CODE;
use provider_core::store::JobStore;

/// Run one admitted job to its terminal state.
///
/// Never returns an error: every failure is logged and, where possible,
/// recorded on the job itself.
pub async fn execute_job(
    store: Arc<dyn JobStore>,
    job_id: String,
    command: CommandSpec,
    suppress_stdout: bool,
) {
    if let Err(e) = store.mark_started(&job_id).await {
        tracing::error!(job_id = %job_id, error = %e, "Failed to record job start");
        if let Err(e2) = store
            .mark_failed_before_start(&job_id, &e.to_string())
            .await
        {
            tracing::error!(
                job_id = %job_id,
                error = %e2,
                "Failed to record job as failed before start",
            );
        }
        return;
    }

    tracing::info!(job_id = %job_id, argv = ?command.argv, "Job started");

    let (exit_code, stdout, stderr) = match run_command(&command).await {
        Ok(output) => {
            tracing::info!(
                job_id = %job_id,
                exit_code = output.exit_code,
                duration_ms = output.duration_ms,
                "Process finished",
            );
            (output.exit_code, output.stdout, output.stderr)
        }
        Err(e) => {
            tracing::warn!(job_id = %job_id, error = %e, "Process could not be run");
            (FAILED_BEFORE_START_EXIT_CODE, String::new(), e.to_string())
        }
    };

    if let Err(e) = store
        .mark_completed(&job_id, exit_code, &stdout, &stderr, suppress_stdout)
        .await
    {
        tracing::error!(
            job_id = %job_id,
            exit_code,
            error = %e,
            "Job completed but its outcome was not recorded",
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
