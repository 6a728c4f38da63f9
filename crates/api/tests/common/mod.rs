#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use tradesignal_api::config::ServerConfig;
use tradesignal_api::router::build_app_router;
use tradesignal_api::state::AppState;
use tradesignal_core::scripting::bundle::{DirectoryBundle, ResourceBundle};
use tradesignal_core::scripting::engine::ScriptEngine;
use tradesignal_core::scripting::provision::{Provisioned, Provisioner, ScratchDir};
use tradesignal_core::scripting::settings::ScriptSettings;

/// Interpreter for test scripts. Scripts are POSIX shell, so the suite does
/// not need Python.
pub const TEST_INTERPRETER: &str = "sh";

/// Script that answers with its own JSON argument.
pub const ECHO_ARGS: &str = "printf '%s' \"$1\"\n";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(interpreter: &str, timeout: Duration) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        scripts: ScriptSettings {
            interpreter: interpreter.to_string(),
            timeout,
            scripts_path: None,
            scratch_dir: None,
        },
    }
}

/// A router over freshly provisioned scripts. Holds the temporary
/// directories alive for the duration of the test.
pub struct TestApp {
    pub router: Router,
    pub provisioned: Provisioned,
    _bundle: TempDir,
}

/// Every registered script echoing its arguments.
pub fn echo_scripts() -> Vec<(&'static str, &'static str)> {
    vec![
        ("technical_analyzer", ECHO_ARGS),
        ("fundamental_analyzer", ECHO_ARGS),
        ("sentiment_analyzer", ECHO_ARGS),
        ("signal_generator", ECHO_ARGS),
        ("stock_overview", ECHO_ARGS),
    ]
}

/// Provision `scripts` through a directory bundle and build the full
/// application router over them.
pub async fn build_test_app(scripts: &[(&str, &str)]) -> TestApp {
    build_test_app_with(scripts, TEST_INTERPRETER, Duration::from_secs(5)).await
}

pub async fn build_test_app_with(
    scripts: &[(&str, &str)],
    interpreter: &str,
    timeout: Duration,
) -> TestApp {
    let bundle_dir = tempfile::tempdir().expect("bundle dir");
    let scripts_dir = bundle_dir.path().join("python-scripts");
    std::fs::create_dir_all(&scripts_dir).unwrap();
    for (id, body) in scripts {
        std::fs::write(scripts_dir.join(format!("{id}.py")), body).unwrap();
    }

    let provisioned = provision(DirectoryBundle::new(bundle_dir.path())).await;
    let router = router_over(&provisioned, interpreter, timeout);

    TestApp {
        router,
        provisioned,
        _bundle: bundle_dir,
    }
}

/// Provision `bundle` into a fresh temporary scratch directory.
pub async fn provision<B: ResourceBundle>(bundle: B) -> Provisioned {
    Provisioner::new(bundle)
        .provision(ScratchDir::temporary().expect("scratch dir"))
        .await
        .expect("provision")
}

/// Build the application router over already provisioned scripts.
pub fn router_over(provisioned: &Provisioned, interpreter: &str, timeout: Duration) -> Router {
    let config = test_config(interpreter, timeout);
    let engine = ScriptEngine::new(interpreter, Arc::new(provisioned.paths.clone()), timeout);
    let state = AppState {
        config: Arc::new(config.clone()),
        engine: Arc::new(engine),
    };
    build_app_router(state, &config)
}

/// Send a GET request through the router.
pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
