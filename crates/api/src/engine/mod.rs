//! Job lifecycle engine.
//!
//! [`JobEngine`] admits jobs, hands each admitted job to its own dispatcher
//! task, and answers status queries. Waiting on a job goes exclusively
//! through the store (see [`wait`]), so a waiter does not need to live in
//! the process that runs the job.

pub mod admission;
pub mod dispatcher;
pub mod wait;

use std::sync::Arc;
use std::time::Duration;

use provider_core::execution::CommandSpec;
use provider_core::job::{JobParameter, JobRecord, ParamValue};
use provider_core::store::{JobStore, StoreError};
use serde::Serialize;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use crate::config::ExecutionConfig;

pub use admission::AdmissionError;
pub use wait::WaitError;

/// A job together with its parameters, as returned by status queries.
#[derive(Debug, Clone, Serialize)]
pub struct JobInfo {
    pub job: JobRecord,
    pub parameters: Vec<JobParameter>,
}

/// Owns the job state machine for one configured service.
pub struct JobEngine {
    store: Arc<dyn JobStore>,
    config: Arc<ExecutionConfig>,
    executions: TaskTracker,
}

impl JobEngine {
    pub fn new(store: Arc<dyn JobStore>, config: ExecutionConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
            executions: TaskTracker::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Admit a job and start its execution in the background.
    ///
    /// Returns once the job and all its parameters are stored; the process
    /// itself runs on a separate task. On error nothing of the job remains
    /// in the store, unless the rollback itself failed.
    pub async fn submit(
        &self,
        job_id: &str,
        parameters: &[(String, ParamValue)],
    ) -> Result<(), AdmissionError> {
        let command = admission::admit(self.store.as_ref(), &self.config, job_id, parameters).await?;
        self.dispatch(job_id, command);
        Ok(())
    }

    fn dispatch(&self, job_id: &str, command: CommandSpec) {
        let span = tracing::info_span!("job", job_id = %job_id);
        self.executions.spawn(
            dispatcher::execute_job(
                Arc::clone(&self.store),
                job_id.to_string(),
                command,
                self.config.suppress_stdout,
            )
            .instrument(span),
        );
    }

    /// Current state of a job of this service, with its parameters.
    ///
    /// Jobs stored under another service are reported as absent.
    pub async fn job_info(&self, job_id: &str) -> Result<Option<JobInfo>, StoreError> {
        let Some(job) = self.store.get_job(job_id).await? else {
            return Ok(None);
        };

        if job.service != self.config.service_id {
            tracing::warn!(
                job_id = %job_id,
                job_service = %job.service,
                service = %self.config.service_id,
                "Status requested for a job of another service",
            );
            return Ok(None);
        }

        let parameters = self.store.get_parameters(job_id).await?;
        Ok(Some(JobInfo { job, parameters }))
    }

    /// Block until the job records its start, bounded by the start timeout.
    pub async fn wait_for_start(&self, job_id: &str) -> Result<JobRecord, WaitError> {
        wait::wait_for_start(
            self.store.as_ref(),
            job_id,
            self.config.poll_interval,
            self.config.start_wait_timeout,
        )
        .await
    }

    /// Block until the job reaches a terminal state.
    pub async fn wait_for_completion(&self, job_id: &str) -> Result<JobRecord, WaitError> {
        wait::wait_for_completion(
            self.store.as_ref(),
            job_id,
            self.config.poll_interval,
            self.config.completion_wait_timeout,
        )
        .await
    }

    /// Number of dispatcher tasks that have not finished yet.
    pub fn active_executions(&self) -> usize {
        self.executions.len()
    }

    /// Close the execution tracker and wait for running executions.
    ///
    /// Returns `true` if every execution finished within `timeout`. Tasks
    /// still running afterwards are left alone; their processes keep going
    /// until the runtime exits.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.executions.close();
        let running = self.executions.len();
        if running > 0 {
            tracing::info!(running, "Waiting for running executions to finish");
        }
        tokio::time::timeout(timeout, self.executions.wait())
            .await
            .is_ok()
    }
}
