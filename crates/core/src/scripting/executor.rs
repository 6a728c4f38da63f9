//! Shared execution types.
//!
//! Defines the argument payload ([`ExecutionRequest`]), the raw process
//! capture ([`ScriptOutput`]), and the structured failure type
//! ([`ExecutionError`]) returned by every invocation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Decoded JSON object printed by a script.
pub type ScriptPayload = Map<String, Value>;

/// Terminal outcome of one invocation.
pub type ExecutionResult = Result<ScriptPayload, ExecutionError>;

/// Argument payload passed to a script as a single JSON text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionRequest(Map<String, Value>);

impl ExecutionRequest {
    /// Start a request with the identifying `symbol` parameter.
    pub fn for_symbol(symbol: impl Into<String>) -> Self {
        Self::default().with("symbol", symbol.into())
    }

    /// Add (or replace) an argument.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn symbol(&self) -> Option<&str> {
        self.0.get("symbol").and_then(Value::as_str)
    }

    /// Serialize to the JSON text passed on the command line.
    pub fn to_json(&self) -> Result<String, ExecutionError> {
        serde_json::to_string(&self.0).map_err(|e| {
            ExecutionError::new(
                ExecutionErrorKind::SerializationFailure,
                format!("Failed to serialize script arguments: {e}"),
            )
        })
    }
}

/// Captured output from a finished script process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptOutput {
    /// Complete stdout captured from the process.
    pub stdout: String,
    /// Complete stderr captured from the process.
    pub stderr: String,
    /// Process exit code (`-1` if killed by signal).
    pub exit_code: i32,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Failure classification for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionErrorKind {
    /// Script unknown or missing from the scratch directory.
    NotFound,
    /// Deadline elapsed; the process was killed.
    Timeout,
    /// Script exited with a non-zero status.
    NonZeroExit,
    /// Script exited 0 without writing to stdout.
    EmptyOutput,
    /// stdout was not a single JSON object.
    MalformedOutput,
    /// The interpreter process could not be started.
    SpawnFailure,
    /// The argument payload could not be serialized.
    SerializationFailure,
}

impl ExecutionErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Timeout => "timeout",
            Self::NonZeroExit => "non_zero_exit",
            Self::EmptyOutput => "empty_output",
            Self::MalformedOutput => "malformed_output",
            Self::SpawnFailure => "spawn_failure",
            Self::SerializationFailure => "serialization_failure",
        }
    }
}

impl fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured failure of one invocation. Terminal; never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize)]
#[error("{message}")]
pub struct ExecutionError {
    pub kind: ExecutionErrorKind,
    pub message: String,
    /// Diagnostic text: stderr for non-zero exits, raw stdout for malformed output.
    pub detail: Option<String>,
    /// Milliseconds since the UNIX epoch when the error was produced.
    pub timestamp: i64,
}

impl ExecutionError {
    pub fn new(kind: ExecutionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// The error object handed to callers: `{error, kind, message, detail, timestamp}`.
    pub fn to_response_body(&self) -> Value {
        serde_json::json!({
            "error": true,
            "kind": self.kind,
            "message": self.message,
            "detail": self.detail,
            "timestamp": self.timestamp,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
