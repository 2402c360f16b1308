use std::sync::Arc;

use crate::config::ServerConfig;
use crate::engine::JobEngine;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Job lifecycle engine for the configured service.
    pub engine: Arc<JobEngine>,
    /// Server configuration (parameter limits, CORS, shutdown).
    pub config: Arc<ServerConfig>,
}
