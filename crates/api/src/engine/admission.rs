//! Admission: durably record a job and its parameters before dispatch.

use std::path::{Path, PathBuf};

use provider_core::error::CoreError;
use provider_core::execution::CommandSpec;
use provider_core::job::{validate_job_id, validate_parameter, ParamValue};
use provider_core::store::{JobStore, StoreError};

use crate::config::ExecutionConfig;

/// Why a job could not be admitted.
#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error(transparent)]
    InvalidRequest(#[from] CoreError),

    #[error("Failed to prepare working directory '{}': {source}", path.display())]
    WorkingDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Includes [`StoreError::DuplicateJob`] for an id that is already taken.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Directory owned by `job_id` under the configured root.
pub fn job_directory(root: &Path, job_id: &str) -> PathBuf {
    root.join(job_id)
}

/// Store the job with its parameters, then create its working directory.
///
/// Returns the command to run for the job. The job and its parameters are
/// written in one store call, so no reader sees a partial parameter list.
/// If the working directory cannot be created, the job is deleted again
/// before the error is returned.
pub async fn admit(
    store: &dyn JobStore,
    config: &ExecutionConfig,
    job_id: &str,
    parameters: &[(String, ParamValue)],
) -> Result<CommandSpec, AdmissionError> {
    validate_job_id(job_id)?;
    for (name, value) in parameters {
        validate_parameter(name, value)?;
    }

    let stored: Vec<(String, String)> = parameters
        .iter()
        .map(|(name, value)| (name.clone(), value.stored_value()))
        .collect();
    store
        .admit_job(&config.service_id, job_id, &stored)
        .await?;

    match prepare(config, job_id, parameters).await {
        Ok(command) => {
            tracing::info!(
                job_id = %job_id,
                parameters = parameters.len(),
                "Job admitted",
            );
            Ok(command)
        }
        Err(e) => {
            tracing::error!(job_id = %job_id, error = %e, "Job not completely submitted, aborting");
            if let Err(rollback) = store.delete_job_and_parameters(job_id).await {
                tracing::error!(
                    job_id = %job_id,
                    error = %rollback,
                    "Rollback of partially admitted job failed",
                );
            }
            Err(e)
        }
    }
}

async fn prepare(
    config: &ExecutionConfig,
    job_id: &str,
    parameters: &[(String, ParamValue)],
) -> Result<CommandSpec, AdmissionError> {
    let directory = job_directory(&config.file_root_directory, job_id);
    tokio::fs::create_dir_all(&directory)
        .await
        .map_err(|source| AdmissionError::WorkingDirectory {
            path: directory.clone(),
            source,
        })?;

    let mut command = CommandSpec::from_prefix(&config.command_line);
    command.working_directory = Some(directory);
    for (name, value) in parameters {
        value.push_args(name, &mut command.argv);
    }

    Ok(command)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
