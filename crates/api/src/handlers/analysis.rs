//! Handlers that run analysis scripts.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::{Map, Value};
use tradesignal_core::scripting::registry::{normalize_symbol, Operation};

use crate::error::AppResult;
use crate::state::AppState;

/// GET /api/{operation}/{symbol}
///
/// Runs the script registered for `operation` and returns its JSON object
/// unchanged.
pub async fn run_analysis(
    State(state): State<AppState>,
    Path((operation, symbol)): Path<(String, String)>,
) -> AppResult<Json<Map<String, Value>>> {
    let operation: Operation = operation.parse()?;
    let symbol = normalize_symbol(&symbol)?;

    let payload = state.engine.run_operation(operation, &symbol).await?;
    Ok(Json(payload))
}
