//! Domain layer for the execution provider.
//!
//! Holds the job model, the [`store::JobStore`] seam every persistence
//! backend implements, and the subprocess execution primitives. Nothing in
//! this crate talks to PostgreSQL or HTTP.

pub mod error;
pub mod execution;
pub mod job;
pub mod store;
pub mod types;
