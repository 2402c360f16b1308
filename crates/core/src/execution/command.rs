//! Command description and captured outcome.

use std::path::PathBuf;

use serde::Serialize;

/// A fully built command line for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    /// Working directory for the child process (current dir if `None`).
    pub working_directory: Option<PathBuf>,
}

impl CommandSpec {
    /// Start a command from the configured prefix (program plus fixed args).
    pub fn from_prefix(prefix: &[String]) -> Self {
        Self {
            argv: prefix.to_vec(),
            working_directory: None,
        }
    }

    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    pub fn args(&self) -> &[String] {
        self.argv.get(1..).unwrap_or_default()
    }
}

/// Captured output of a finished process.
///
/// A non-zero exit code is data, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Process exit code (`-1` if killed by a signal).
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Failures that prevent a process from running at all.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Command line is empty")]
    EmptyCommand,

    #[error("Failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while waiting for '{program}': {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
