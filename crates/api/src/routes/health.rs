use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;
use tradesignal_core::scripting::registry::Operation;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `ok` when the interpreter answers and every operation is provisioned.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the configured interpreter answers `--version`.
    pub interpreter_available: bool,
    pub interpreter: String,
    /// Operations whose script was provisioned.
    pub operations: Vec<Operation>,
    /// Operations disabled because their script could not be provisioned.
    pub disabled_operations: Vec<Operation>,
}

/// GET /health and /api/health -- returns service and interpreter health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let interpreter_available = state.engine.is_interpreter_available().await;

    let (operations, disabled_operations): (Vec<_>, Vec<_>) = Operation::ALL
        .into_iter()
        .partition(|op| state.engine.is_operation_available(*op));

    let status = if interpreter_available && disabled_operations.is_empty() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        interpreter_available,
        interpreter: state.engine.interpreter().to_string(),
        operations,
        disabled_operations,
    })
}

/// Mount health check routes. Merged at the root and under `/api`.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
