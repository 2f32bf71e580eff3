use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;
use crate::run_gate::RunGate;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: shiftgrid_db::DbPool,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// In-process registry of active generations per tenant and range.
    pub run_gate: Arc<RunGate>,
    /// Cancelled on shutdown so in-flight generations abort before
    /// persistence instead of writing after the server stops.
    pub shutdown: CancellationToken,
}
