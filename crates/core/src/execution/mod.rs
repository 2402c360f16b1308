//! Launching the configured external program.
//!
//! Pure subprocess handling with no store access, so it can be tested
//! without a database.

pub mod command;
pub mod subprocess;

pub use command::{CommandOutput, CommandSpec, ExecError};
pub use subprocess::run_command;
