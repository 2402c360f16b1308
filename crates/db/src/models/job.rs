//! Rows of the `jobs` and `job_parameters` tables.

use provider_core::job::{JobParameter, JobRecord};
use provider_core::types::Timestamp;
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobRow {
    pub id: String,
    pub service: String,
    pub received_at: Timestamp,
    pub start_processing: Option<Timestamp>,
    pub end_processing: Option<Timestamp>,
    pub exit_code: Option<i32>,
    pub std_out: Option<String>,
    pub std_err: Option<String>,
}

impl From<JobRow> for JobRecord {
    fn from(row: JobRow) -> Self {
        Self {
            id: row.id,
            service: row.service,
            received_at: row.received_at,
            start_processing: row.start_processing,
            end_processing: row.end_processing,
            exit_code: row.exit_code,
            std_out: row.std_out,
            std_err: row.std_err,
        }
    }
}

/// A row from the `job_parameters` table, without its surrogate key.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct JobParameterRow {
    pub name: String,
    pub value: String,
}

impl From<JobParameterRow> for JobParameter {
    fn from(row: JobParameterRow) -> Self {
        Self {
            name: row.name,
            value: row.value,
        }
    }
}
