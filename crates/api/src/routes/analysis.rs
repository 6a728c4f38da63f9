use axum::routing::get;
use axum::Router;

use crate::handlers::{analysis, reference};
use crate::state::AppState;

/// Routes mounted at `/api`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/symbols", get(reference::list_symbols))
        .route("/trading-expert/{symbol}", get(reference::expert_analysis))
        .route("/education/{topic}", get(reference::education))
        .route("/{operation}/{symbol}", get(analysis::run_analysis))
}
