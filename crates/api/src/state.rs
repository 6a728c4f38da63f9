use std::sync::Arc;

use tradesignal_core::scripting::engine::ScriptEngine;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything lives behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Executes provisioned analysis scripts.
    pub engine: Arc<ScriptEngine>,
}
