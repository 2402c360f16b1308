//! In-process [`JobStore`] backed by hash maps.
//!
//! Used by tests and local runs. Each method takes the single write lock for
//! its whole body, which gives the same per-call atomicity as a database
//! transaction.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{JobStore, StoreError};
use crate::job::{JobParameter, JobRecord, JobState, FAILED_BEFORE_START_EXIT_CODE};

#[derive(Default)]
struct Tables {
    jobs: HashMap<String, JobRecord>,
    parameters: HashMap<String, Vec<JobParameter>>,
}

/// Thread-safe in-memory job store.
#[derive(Default)]
pub struct MemoryJobStore {
    tables: RwLock<Tables>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs currently stored.
    pub async fn job_count(&self) -> usize {
        self.tables.read().await.jobs.len()
    }
}

fn job_mut<'a>(tables: &'a mut Tables, job_id: &str) -> Result<&'a mut JobRecord, StoreError> {
    tables
        .jobs
        .get_mut(job_id)
        .ok_or_else(|| StoreError::JobNotFound(job_id.to_string()))
}

fn invalid(job_id: &str, action: &'static str, reason: &'static str) -> StoreError {
    StoreError::InvalidTransition {
        job_id: job_id.to_string(),
        action,
        reason,
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(&self, service: &str, job_id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.jobs.contains_key(job_id) {
            return Err(StoreError::DuplicateJob(job_id.to_string()));
        }
        tables.jobs.insert(
            job_id.to_string(),
            JobRecord::admitted(service, job_id, Utc::now()),
        );
        Ok(())
    }

    async fn admit_job(
        &self,
        service: &str,
        job_id: &str,
        parameters: &[(String, String)],
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.jobs.contains_key(job_id) {
            return Err(StoreError::DuplicateJob(job_id.to_string()));
        }
        tables.jobs.insert(
            job_id.to_string(),
            JobRecord::admitted(service, job_id, Utc::now()),
        );
        let rows = parameters
            .iter()
            .map(|(name, value)| JobParameter {
                name: name.clone(),
                value: value.clone(),
            })
            .collect();
        tables.parameters.insert(job_id.to_string(), rows);
        Ok(())
    }

    async fn add_parameter(
        &self,
        job_id: &str,
        name: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.jobs.contains_key(job_id) {
            return Err(StoreError::JobNotFound(job_id.to_string()));
        }
        tables
            .parameters
            .entry(job_id.to_string())
            .or_default()
            .push(JobParameter {
                name: name.to_string(),
                value: value.to_string(),
            });
        Ok(())
    }

    async fn delete_job_and_parameters(&self, job_id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables.parameters.remove(job_id);
        tables.jobs.remove(job_id);
        Ok(())
    }

    async fn mark_started(&self, job_id: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let job = job_mut(&mut tables, job_id)?;
        if job.state() != JobState::Created {
            return Err(invalid(job_id, "started", "job already left the created state"));
        }
        job.start_processing = Some(Utc::now());
        Ok(())
    }

    async fn mark_failed_before_start(
        &self,
        job_id: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let job = job_mut(&mut tables, job_id)?;
        if job.state() != JobState::Created {
            return Err(invalid(
                job_id,
                "marked failed before start",
                "job already left the created state",
            ));
        }
        job.end_processing = Some(Utc::now());
        job.exit_code = Some(FAILED_BEFORE_START_EXIT_CODE);
        job.std_out = Some(String::new());
        job.std_err = Some(message.to_string());
        Ok(())
    }

    async fn mark_completed(
        &self,
        job_id: &str,
        exit_code: i32,
        stdout: &str,
        stderr: &str,
        suppress_stdout: bool,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let job = job_mut(&mut tables, job_id)?;
        if job.state() != JobState::Started {
            return Err(invalid(job_id, "completed", "job is not running"));
        }
        job.end_processing = Some(Utc::now());
        job.exit_code = Some(exit_code);
        job.std_out = Some(if suppress_stdout {
            String::new()
        } else {
            stdout.to_string()
        });
        job.std_err = Some(stderr.to_string());
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.tables.read().await.jobs.get(job_id).cloned())
    }

    async fn get_parameters(&self, job_id: &str) -> Result<Vec<JobParameter>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .parameters
            .get(job_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
