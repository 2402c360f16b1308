//! Store-polling wait protocol.
//!
//! Both waits read the job row every `interval` until the wanted checkpoint
//! is visible. They never signal or cancel the job's worker.

use std::time::Duration;

use provider_core::job::{JobRecord, JobState};
use provider_core::store::{JobStore, StoreError};
use provider_core::types::duration_ms;
use tokio::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("Job '{job_id}' did not start within {waited_ms}ms")]
    NotStarted { job_id: String, waited_ms: u64 },

    #[error("Job '{job_id}' failed before start: {message}")]
    FailedToStart { job_id: String, message: String },

    #[error("Job '{job_id}' still running after {waited_ms}ms")]
    StillRunning { job_id: String, waited_ms: u64 },

    #[error("Job '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

async fn load(store: &dyn JobStore, job_id: &str) -> Result<JobRecord, WaitError> {
    store
        .get_job(job_id)
        .await?
        .ok_or_else(|| WaitError::NotFound(job_id.to_string()))
}

/// Poll until `start_processing` is set, for at most `timeout`.
///
/// A job that ended without starting is reported as
/// [`WaitError::FailedToStart`] without waiting for the timeout.
pub async fn wait_for_start(
    store: &dyn JobStore,
    job_id: &str,
    interval: Duration,
    timeout: Duration,
) -> Result<JobRecord, WaitError> {
    let started = Instant::now();
    loop {
        let job = load(store, job_id).await?;
        match job.state() {
            JobState::Started | JobState::Completed => return Ok(job),
            JobState::FailedToStart => {
                return Err(WaitError::FailedToStart {
                    job_id: job_id.to_string(),
                    message: job.std_err.unwrap_or_default(),
                })
            }
            JobState::Created => {}
        }

        if started.elapsed() >= timeout {
            return Err(WaitError::NotStarted {
                job_id: job_id.to_string(),
                waited_ms: duration_ms(started.elapsed()),
            });
        }
        tokio::time::sleep(interval).await;
    }
}

/// Poll until `end_processing` is set.
///
/// With `limit = None` this waits forever.
pub async fn wait_for_completion(
    store: &dyn JobStore,
    job_id: &str,
    interval: Duration,
    limit: Option<Duration>,
) -> Result<JobRecord, WaitError> {
    let started = Instant::now();
    loop {
        let job = load(store, job_id).await?;
        if job.end_processing.is_some() {
            return Ok(job);
        }

        if let Some(limit) = limit {
            if started.elapsed() >= limit {
                return Err(WaitError::StillRunning {
                    job_id: job_id.to_string(),
                    waited_ms: duration_ms(started.elapsed()),
                });
            }
        }
        tokio::time::sleep(interval).await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
