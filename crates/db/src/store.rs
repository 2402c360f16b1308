//! [`JobStore`] implementation over PostgreSQL.

use std::borrow::Cow;

use async_trait::async_trait;
use provider_core::job::{JobParameter, JobRecord};
use provider_core::store::{JobStore, StoreError};

use crate::repositories::JobRepo;
use crate::DbPool;

/// PostgreSQL foreign key violation.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// PostgreSQL-backed job store.
#[derive(Clone)]
pub struct PgJobStore {
    pool: DbPool,
}

impl PgJobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Turn a `false` from a guarded update into the right error.
    async fn transition_failed(
        &self,
        job_id: &str,
        action: &'static str,
        reason: &'static str,
    ) -> StoreError {
        match JobRepo::exists(&self.pool, job_id).await {
            Ok(false) => StoreError::JobNotFound(job_id.to_string()),
            Ok(true) => StoreError::InvalidTransition {
                job_id: job_id.to_string(),
                action,
                reason,
            },
            Err(e) => backend(e),
        }
    }
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend(Box::new(err))
}

/// PostgreSQL `TEXT` cannot hold NUL, so process output has it replaced
/// with U+FFFD before it is written.
fn storable_text(text: &str) -> Cow<'_, str> {
    if text.contains('\0') {
        Cow::Owned(text.replace('\0', "\u{FFFD}"))
    } else {
        Cow::Borrowed(text)
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create_job(&self, service: &str, job_id: &str) -> Result<(), StoreError> {
        if JobRepo::create(&self.pool, service, job_id)
            .await
            .map_err(backend)?
        {
            Ok(())
        } else {
            Err(StoreError::DuplicateJob(job_id.to_string()))
        }
    }

    async fn admit_job(
        &self,
        service: &str,
        job_id: &str,
        parameters: &[(String, String)],
    ) -> Result<(), StoreError> {
        if JobRepo::create_with_parameters(&self.pool, service, job_id, parameters)
            .await
            .map_err(backend)?
        {
            Ok(())
        } else {
            Err(StoreError::DuplicateJob(job_id.to_string()))
        }
    }

    async fn add_parameter(
        &self,
        job_id: &str,
        name: &str,
        value: &str,
    ) -> Result<(), StoreError> {
        JobRepo::add_parameter(&self.pool, job_id, name, value)
            .await
            .map_err(|e| {
                let missing_job = matches!(
                    &e,
                    sqlx::Error::Database(db_err)
                        if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION)
                );
                if missing_job {
                    StoreError::JobNotFound(job_id.to_string())
                } else {
                    backend(e)
                }
            })
    }

    async fn delete_job_and_parameters(&self, job_id: &str) -> Result<(), StoreError> {
        JobRepo::delete_with_parameters(&self.pool, job_id)
            .await
            .map_err(backend)
    }

    async fn mark_started(&self, job_id: &str) -> Result<(), StoreError> {
        if JobRepo::mark_started(&self.pool, job_id)
            .await
            .map_err(backend)?
        {
            return Ok(());
        }
        Err(self
            .transition_failed(job_id, "started", "job already left the created state")
            .await)
    }

    async fn mark_failed_before_start(
        &self,
        job_id: &str,
        message: &str,
    ) -> Result<(), StoreError> {
        if JobRepo::mark_failed_before_start(&self.pool, job_id, &storable_text(message))
            .await
            .map_err(backend)?
        {
            return Ok(());
        }
        Err(self
            .transition_failed(
                job_id,
                "marked failed before start",
                "job already left the created state",
            )
            .await)
    }

    async fn mark_completed(
        &self,
        job_id: &str,
        exit_code: i32,
        stdout: &str,
        stderr: &str,
        suppress_stdout: bool,
    ) -> Result<(), StoreError> {
        let stdout = if suppress_stdout { "" } else { stdout };
        let stdout = storable_text(stdout);
        let stderr = storable_text(stderr);
        if JobRepo::mark_completed(&self.pool, job_id, exit_code, &stdout, &stderr)
            .await
            .map_err(backend)?
        {
            return Ok(());
        }
        Err(self
            .transition_failed(job_id, "completed", "job is not running")
            .await)
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>, StoreError> {
        Ok(JobRepo::find_by_id(&self.pool, job_id)
            .await
            .map_err(backend)?
            .map(JobRecord::from))
    }

    async fn get_parameters(&self, job_id: &str) -> Result<Vec<JobParameter>, StoreError> {
        Ok(JobRepo::list_parameters(&self.pool, job_id)
            .await
            .map_err(backend)?
            .into_iter()
            .map(JobParameter::from)
            .collect())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await.map_err(backend)
    }
}
