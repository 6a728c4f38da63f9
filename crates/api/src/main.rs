use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradesignal_api::config::ServerConfig;
use tradesignal_api::router::build_app_router;
use tradesignal_api::state::AppState;
use tradesignal_core::scripting::bundle::BundleSource;
use tradesignal_core::scripting::engine::ScriptEngine;
use tradesignal_core::scripting::provision::{Provisioner, ScratchDir};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tradesignal_api=debug,tradesignal_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid configuration");
    tracing::info!(
        host = %config.host,
        port = %config.port,
        interpreter = %config.scripts.interpreter,
        script_timeout_secs = config.scripts.timeout.as_secs(),
        "Loaded server configuration",
    );

    // --- Script provisioning (must finish before serving) ---
    let bundle = BundleSource::from_settings(config.scripts.scripts_path.as_deref());
    tracing::info!(source = %bundle.describe(), "Using script bundle");

    let scratch = ScratchDir::from_settings(config.scripts.scratch_dir.as_deref())
        .expect("Failed to prepare scratch directory");
    let provisioned = Provisioner::new(bundle)
        .provision(scratch)
        .await
        .expect("Failed to provision analysis scripts");

    for (script, reason) in &provisioned.disabled {
        tracing::warn!(script = %script, reason = %reason, "Operation disabled");
    }

    // --- Execution engine ---
    let engine = ScriptEngine::new(
        config.scripts.interpreter.clone(),
        Arc::new(provisioned.paths.clone()),
        config.scripts.timeout,
    );

    if engine.is_interpreter_available().await {
        tracing::info!(interpreter = %engine.interpreter(), "Interpreter available");
    } else {
        tracing::warn!(
            interpreter = %engine.interpreter(),
            "Interpreter not available; analysis requests will fail until it is installed",
        );
    }

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        engine: Arc::new(engine),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!(scratch = %provisioned.scratch.path().display(), "Removing provisioned scripts");
    drop(provisioned);

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
