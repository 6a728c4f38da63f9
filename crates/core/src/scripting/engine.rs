//! Process execution engine.
//!
//! [`ScriptEngine`] runs one provisioned script per call as a child process
//! and classifies the outcome into an [`ExecutionResult`]. It holds no
//! mutable state; share it as `Arc<ScriptEngine>` across request handlers.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::executor::{
    ExecutionError, ExecutionErrorKind, ExecutionRequest, ExecutionResult, ScriptOutput,
};
use super::provision::ScriptPaths;
use super::python;
use super::registry::Operation;
use super::spawn::{ProcessSpawner, TokioSpawner};
use super::status::{InvocationState, InvocationTracker};
use super::subprocess;

/// Maximum characters of raw stdout kept in a malformed-output error.
const MALFORMED_DETAIL_CHARS: usize = 512;

/// Runs provisioned analysis scripts.
pub struct ScriptEngine {
    interpreter: String,
    default_timeout: Duration,
    paths: Arc<ScriptPaths>,
    spawner: Arc<dyn ProcessSpawner>,
    env: Vec<(String, String)>,
}

impl ScriptEngine {
    /// Create an engine over provisioned `paths`, spawning real processes.
    pub fn new(interpreter: impl Into<String>, paths: Arc<ScriptPaths>, default_timeout: Duration) -> Self {
        let env = python::script_environment(&paths.scripts_dir(), &paths.data_dir());
        Self {
            interpreter: interpreter.into(),
            default_timeout,
            paths,
            spawner: Arc::new(TokioSpawner),
            env,
        }
    }

    /// Replace the process spawner.
    pub fn with_spawner(mut self, spawner: Arc<dyn ProcessSpawner>) -> Self {
        self.spawner = spawner;
        self
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    pub fn paths(&self) -> &ScriptPaths {
        &self.paths
    }

    /// Whether the script behind `operation` was provisioned.
    pub fn is_operation_available(&self, operation: Operation) -> bool {
        self.paths.contains(operation.script_id())
    }

    /// Run the script for `operation` against `symbol` with the default timeout.
    pub async fn run_operation(&self, operation: Operation, symbol: &str) -> ExecutionResult {
        tracing::info!(%operation, symbol, "Running analysis");
        let request = operation.build_request(symbol);
        self.execute(operation.script_id(), &request, self.default_timeout)
            .await
    }

    /// Execute `script_name` with `request` as its argument, waiting at most
    /// `timeout`. Always returns a structured result.
    pub async fn execute(
        &self,
        script_name: &str,
        request: &ExecutionRequest,
        timeout: Duration,
    ) -> ExecutionResult {
        let mut tracker = InvocationTracker::new(script_name);
        tracker.advance(InvocationState::Resolving);

        let result = self.run(script_name, request, timeout, &mut tracker).await;

        match &result {
            Ok(_) => tracker.advance(InvocationState::Succeeded),
            Err(e) => {
                tracker.advance(InvocationState::Failed);
                tracing::warn!(
                    script = script_name,
                    kind = %e.kind,
                    error = %e.message,
                    detail = e.detail.as_deref().unwrap_or_default(),
                    "Script execution failed",
                );
            }
        }
        result
    }

    async fn run(
        &self,
        script_name: &str,
        request: &ExecutionRequest,
        timeout: Duration,
        tracker: &mut InvocationTracker<'_>,
    ) -> ExecutionResult {
        // 1. Resolve the provisioned path; never spawn for a missing script.
        let script = self.paths.resolve(script_name).ok_or_else(|| {
            ExecutionError::new(
                ExecutionErrorKind::NotFound,
                format!("Script not found: {script_name}"),
            )
        })?;
        if !tokio::fs::try_exists(&script.path).await.unwrap_or(false) {
            return Err(ExecutionError::new(
                ExecutionErrorKind::NotFound,
                format!("Script not found: {script_name}"),
            )
            .with_detail(script.path.display().to_string()));
        }

        // 2. Serialize arguments before anything is spawned.
        let json_args = request.to_json()?;

        // 3-5. Spawn, drain, and wait.
        let spec = python::script_launch_spec(
            &self.interpreter,
            &script.path,
            json_args,
            self.env.clone(),
            self.paths.root(),
        );
        let output = match subprocess::run_command(self.spawner.as_ref(), &spec, timeout).await {
            Ok(output) => {
                tracker.advance(InvocationState::Spawned);
                tracker.advance(InvocationState::Running);
                output
            }
            Err(e) => {
                if e.kind == ExecutionErrorKind::Timeout {
                    tracker.advance(InvocationState::Spawned);
                    tracker.advance(InvocationState::TimedOut);
                }
                return Err(e);
            }
        };

        tracing::debug!(
            script = script_name,
            exit_code = output.exit_code,
            duration_ms = output.duration_ms,
            stdout_len = output.stdout.len(),
            stderr_len = output.stderr.len(),
            "Script finished",
        );

        // 6-9. Classify.
        classify(script_name, output)
    }

    /// Whether the configured interpreter answers `--version` within a
    /// short fixed timeout. Never errors.
    pub async fn is_interpreter_available(&self) -> bool {
        python::is_interpreter_available_with(self.spawner.as_ref(), &self.interpreter).await
    }
}

/// Turn a finished process into a payload or a classified error.
fn classify(script_name: &str, output: ScriptOutput) -> ExecutionResult {
    let stderr = output.stderr.trim();

    if output.exit_code != 0 {
        return Err(ExecutionError::new(
            ExecutionErrorKind::NonZeroExit,
            format!(
                "Script {script_name} failed with exit code {}",
                output.exit_code
            ),
        )
        .with_detail(stderr));
    }

    if !stderr.is_empty() {
        tracing::debug!(script = script_name, stderr = %stderr, "Script diagnostics");
    }

    let stdout = output.stdout.trim();
    if stdout.is_empty() {
        return Err(ExecutionError::new(
            ExecutionErrorKind::EmptyOutput,
            format!("Empty response from script {script_name}"),
        ));
    }

    match serde_json::from_str::<Value>(stdout) {
        Ok(Value::Object(payload)) => Ok(payload),
        Ok(other) => Err(ExecutionError::new(
            ExecutionErrorKind::MalformedOutput,
            format!(
                "Script {script_name} printed JSON {} instead of an object",
                json_type_name(&other)
            ),
        )
        .with_detail(truncate_chars(stdout, MALFORMED_DETAIL_CHARS))),
        Err(e) => Err(ExecutionError::new(
            ExecutionErrorKind::MalformedOutput,
            format!("Script {script_name} printed invalid JSON: {e}"),
        )
        .with_detail(truncate_chars(stdout, MALFORMED_DETAIL_CHARS))),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
