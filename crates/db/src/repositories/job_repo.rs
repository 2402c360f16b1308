//! Repository for the `jobs` and `job_parameters` tables.
//!
//! Every state transition is a single guarded `UPDATE`, so a concurrent
//! reader sees either the old row or the complete new one. Transition
//! methods return `false` when the guard did not match.

use provider_core::job::FAILED_BEFORE_START_EXIT_CODE;
use sqlx::PgPool;

use crate::models::job::{JobParameterRow, JobRow};

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, service, received_at, start_processing, end_processing, \
    exit_code, std_out, std_err";

/// Provides persistence operations for jobs and their parameters.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new job row. Returns `false` if the id is already taken.
    pub async fn create(pool: &PgPool, service: &str, job_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO jobs (id, service) VALUES ($1, $2) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(job_id)
        .bind(service)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Insert a job row and its parameter rows in one transaction.
    ///
    /// Returns `false` if the id is already taken; nothing is written then.
    pub async fn create_with_parameters(
        pool: &PgPool,
        service: &str,
        job_id: &str,
        parameters: &[(String, String)],
    ) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO jobs (id, service) VALUES ($1, $2) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(job_id)
        .bind(service)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            == 1;
        if !inserted {
            tx.rollback().await?;
            return Ok(false);
        }

        for (name, value) in parameters {
            sqlx::query("INSERT INTO job_parameters (job_id, name, value) VALUES ($1, $2, $3)")
                .bind(job_id)
                .bind(name)
                .bind(value)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(true)
    }

    /// Insert one parameter row for an existing job.
    pub async fn add_parameter(
        pool: &PgPool,
        job_id: &str,
        name: &str,
        value: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO job_parameters (job_id, name, value) VALUES ($1, $2, $3)")
            .bind(job_id)
            .bind(name)
            .bind(value)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Delete a job and all its parameters in one transaction.
    pub async fn delete_with_parameters(pool: &PgPool, job_id: &str) -> Result<(), sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM job_parameters WHERE job_id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM jobs WHERE id = $1")
            .bind(job_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Set `start_processing` on a job that has neither started nor ended.
    pub async fn mark_started(pool: &PgPool, job_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs SET start_processing = NOW() \
             WHERE id = $1 AND start_processing IS NULL AND end_processing IS NULL",
        )
        .bind(job_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Terminal write for a job that never launched its process.
    pub async fn mark_failed_before_start(
        pool: &PgPool,
        job_id: &str,
        message: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET (end_processing, exit_code, std_out, std_err) = (NOW(), $2, '', $3) \
             WHERE id = $1 AND start_processing IS NULL AND end_processing IS NULL",
        )
        .bind(job_id)
        .bind(FAILED_BEFORE_START_EXIT_CODE)
        .bind(message)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Terminal write for a job whose process ran.
    ///
    /// `GREATEST` keeps `end_processing >= start_processing` even if the
    /// database clock stepped backwards while the process ran.
    pub async fn mark_completed(
        pool: &PgPool,
        job_id: &str,
        exit_code: i32,
        std_out: &str,
        std_err: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE jobs \
             SET (end_processing, exit_code, std_out, std_err) = \
                 (GREATEST(NOW(), start_processing), $2, $3, $4) \
             WHERE id = $1 AND start_processing IS NOT NULL AND end_processing IS NULL",
        )
        .bind(job_id)
        .bind(exit_code)
        .bind(std_out)
        .bind(std_err)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Find a job by its id.
    pub async fn find_by_id(pool: &PgPool, job_id: &str) -> Result<Option<JobRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        sqlx::query_as::<_, JobRow>(&query)
            .bind(job_id)
            .fetch_optional(pool)
            .await
    }

    /// Whether a row with this id exists.
    pub async fn exists(pool: &PgPool, job_id: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM jobs WHERE id = $1)")
            .bind(job_id)
            .fetch_one(pool)
            .await
    }

    /// List the parameters of a job in insertion order.
    pub async fn list_parameters(
        pool: &PgPool,
        job_id: &str,
    ) -> Result<Vec<JobParameterRow>, sqlx::Error> {
        sqlx::query_as::<_, JobParameterRow>(
            "SELECT name, value FROM job_parameters WHERE job_id = $1 ORDER BY id",
        )
        .bind(job_id)
        .fetch_all(pool)
        .await
    }
}
