//! Job records, parameters and the lifecycle derived from them.
//!
//! A job row never stores its state explicitly: the state is a function of
//! which timestamps are set. See [`JobRecord::state`].

use std::path::{Component, Path};

use serde::Serialize;

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

/// Exit code recorded for a job that failed before its process was launched.
pub const FAILED_BEFORE_START_EXIT_CODE: i32 = -1;

/// Longest job id in bytes; the id names a directory, so `NAME_MAX` applies.
pub const MAX_JOB_ID_LEN: usize = 255;

/// A job as persisted by a [`JobStore`](crate::store::JobStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRecord {
    pub id: JobId,
    pub service: String,
    pub received_at: Timestamp,
    pub start_processing: Option<Timestamp>,
    pub end_processing: Option<Timestamp>,
    pub exit_code: Option<i32>,
    pub std_out: Option<String>,
    pub std_err: Option<String>,
}

/// Lifecycle state of a job, derived from its timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Admitted, not yet picked up by its worker.
    Created,
    /// The worker recorded the start and launched the process.
    Started,
    /// The process finished and its outcome was recorded.
    Completed,
    /// The job ended before a process was launched.
    FailedToStart,
}

impl JobRecord {
    /// Build the row written at admission time.
    pub fn admitted(service: &str, id: &str, received_at: Timestamp) -> Self {
        Self {
            id: id.to_string(),
            service: service.to_string(),
            received_at,
            start_processing: None,
            end_processing: None,
            exit_code: None,
            std_out: None,
            std_err: None,
        }
    }

    pub fn state(&self) -> JobState {
        match (self.start_processing, self.end_processing) {
            (None, None) => JobState::Created,
            (Some(_), None) => JobState::Started,
            (Some(_), Some(_)) => JobState::Completed,
            (None, Some(_)) => JobState::FailedToStart,
        }
    }
}

/// One stored `(name, value)` pair of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobParameter {
    pub name: String,
    pub value: String,
}

/// Value of a submitted parameter: a single string or a list of strings.
///
/// An empty single value marks a flag: only the parameter name reaches the
/// command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    List(Vec<String>),
}

impl ParamValue {
    /// Flattened form written to the store. Lists are joined with one space.
    pub fn stored_value(&self) -> String {
        match self {
            Self::Single(value) => value.clone(),
            Self::List(values) => values.join(" "),
        }
    }

    /// Append `name` and then this value's arguments to `args`.
    pub fn push_args(&self, name: &str, args: &mut Vec<String>) {
        args.push(name.to_string());
        match self {
            Self::Single(value) if value.is_empty() => {}
            Self::Single(value) => args.push(value.clone()),
            Self::List(values) => args.extend(values.iter().cloned()),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        Self::List(values)
    }
}

/// Reject job ids that cannot name their own working directory.
///
/// The id must be exactly one normal path component, so that
/// `<root>/<id>` stays inside the configured root.
pub fn validate_job_id(id: &str) -> Result<(), CoreError> {
    if id.is_empty() {
        return Err(CoreError::Validation("job_id must not be empty".into()));
    }
    if id.len() > MAX_JOB_ID_LEN {
        return Err(CoreError::Validation(format!(
            "job_id must be at most {MAX_JOB_ID_LEN} bytes long"
        )));
    }
    if id.contains(['/', '\\', '\0']) {
        return Err(CoreError::Validation(format!(
            "job_id '{id}' contains a path separator"
        )));
    }
    let mut components = Path::new(id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(CoreError::Validation(format!(
            "job_id '{id}' is not a valid directory name"
        ))),
    }
}

/// Reject parameters that cannot be stored as text: NUL is not allowed in
/// names or values.
pub fn validate_parameter(name: &str, value: &ParamValue) -> Result<(), CoreError> {
    let has_nul = match value {
        ParamValue::Single(v) => v.contains('\0'),
        ParamValue::List(values) => values.iter().any(|v| v.contains('\0')),
    };
    if name.contains('\0') || has_nul {
        return Err(CoreError::Validation(format!(
            "parameter '{}' contains a NUL character",
            name.escape_default()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
