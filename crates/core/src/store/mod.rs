//! Persistence seam for jobs and their parameters.
//!
//! Every method is its own transaction. The engine never holds a lock
//! across calls; all cross-task coordination goes through these methods.

pub mod memory;

use async_trait::async_trait;

use crate::job::{JobParameter, JobRecord};

pub use memory::MemoryJobStore;

/// Errors raised by a [`JobStore`] implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `create_job` was called with an id that already exists.
    #[error("Job '{0}' already exists")]
    DuplicateJob(String),

    /// The job targeted by an update does not exist.
    #[error("Job '{0}' not found")]
    JobNotFound(String),

    /// The job exists but is not in a state that allows the update.
    #[error("Job '{job_id}' cannot be {action}: {reason}")]
    InvalidTransition {
        job_id: String,
        action: &'static str,
        reason: &'static str,
    },

    /// The backend itself failed (connection, query, constraint).
    #[error("Store backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Durable record of jobs and their parameters.
///
/// Implementations must guarantee that a reader never sees `end_processing`
/// without the matching `exit_code`, and that at most one terminal write
/// succeeds per job.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job owned by `service`. Fails with
    /// [`StoreError::DuplicateJob`] if `job_id` exists.
    async fn create_job(&self, service: &str, job_id: &str) -> Result<(), StoreError>;

    /// Insert a new job together with all its parameters, as one unit.
    ///
    /// Readers see either no job or the job with every parameter. Fails
    /// with [`StoreError::DuplicateJob`] if `job_id` exists, leaving the
    /// existing job untouched.
    async fn admit_job(
        &self,
        service: &str,
        job_id: &str,
        parameters: &[(String, String)],
    ) -> Result<(), StoreError>;

    /// Append one parameter to an existing job.
    async fn add_parameter(&self, job_id: &str, name: &str, value: &str)
        -> Result<(), StoreError>;

    /// Remove a job together with all of its parameters, as one unit.
    async fn delete_job_and_parameters(&self, job_id: &str) -> Result<(), StoreError>;

    /// Record `start_processing = now` on a job that has not started yet.
    async fn mark_started(&self, job_id: &str) -> Result<(), StoreError>;

    /// Terminal write for a job whose process was never launched.
    async fn mark_failed_before_start(&self, job_id: &str, message: &str)
        -> Result<(), StoreError>;

    /// Terminal write for a job whose process ran. `stdout` is stored as an
    /// empty string when `suppress_stdout` is set.
    async fn mark_completed(
        &self,
        job_id: &str,
        exit_code: i32,
        stdout: &str,
        stderr: &str,
        suppress_stdout: bool,
    ) -> Result<(), StoreError>;

    async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Parameters of a job in insertion order. Unknown jobs yield an empty list.
    async fn get_parameters(&self, job_id: &str) -> Result<Vec<JobParameter>, StoreError>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> Result<(), StoreError>;
}
