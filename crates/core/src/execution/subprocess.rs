//! Spawn a command, capture its output, wait for it to exit.
//!
//! There is no timeout: once launched, a process runs to completion.

use std::process::Stdio;
use std::time::Instant;

use tokio::process::Command;

use super::command::{CommandOutput, CommandSpec, ExecError};
use crate::types::duration_ms;

/// Run `spec` to completion and capture stdout, stderr and the exit code.
///
/// Stdin is closed. Output is decoded lossily as UTF-8.
pub async fn run_command(spec: &CommandSpec) -> Result<CommandOutput, ExecError> {
    let program = spec.program().ok_or(ExecError::EmptyCommand)?;

    let mut cmd = Command::new(program);
    cmd.args(spec.args())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(dir) = &spec.working_directory {
        cmd.current_dir(dir);
    }

    tracing::debug!(program, args = ?spec.args(), dir = ?spec.working_directory, "Spawning process");
    let start = Instant::now();

    let child = cmd.spawn().map_err(|source| ExecError::Spawn {
        program: program.to_string(),
        source,
    })?;

    // Reads both pipes concurrently with the wait, so a chatty process
    // cannot block on a full pipe.
    let output = child
        .wait_with_output()
        .await
        .map_err(|source| ExecError::Wait {
            program: program.to_string(),
            source,
        })?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code().unwrap_or(-1),
        duration_ms: duration_ms(start.elapsed()),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
