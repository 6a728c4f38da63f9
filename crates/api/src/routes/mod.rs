pub mod analysis;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// ```text
/// /health                          same payload as the root `/health`
/// /symbols                         supported symbols
/// /trading-expert/{symbol}         fixed expert analysis
/// /education/{topic}               educational content
/// /{operation}/{symbol}            run an analysis script
/// ```
///
/// `operation` is one of `technical`, `fundamental`, `sentiment`, `signals`,
/// `overview`. Static segments take priority over `{operation}`.
pub fn api_routes() -> Router<AppState> {
    analysis::router().merge(health::router())
}
