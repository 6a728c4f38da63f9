use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tradesignal_core::error::CoreError;
use tradesignal_core::scripting::executor::{ExecutionError, ExecutionErrorKind};

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and [`ExecutionError`] for script
/// failures. Implements [`IntoResponse`] to produce consistent JSON error
/// responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `tradesignal_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A failed script invocation.
    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

/// HTTP status for each execution failure kind.
pub fn execution_status(kind: ExecutionErrorKind) -> StatusCode {
    match kind {
        ExecutionErrorKind::NotFound => StatusCode::SERVICE_UNAVAILABLE,
        ExecutionErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ExecutionErrorKind::NonZeroExit
        | ExecutionErrorKind::EmptyOutput
        | ExecutionErrorKind::MalformedOutput => StatusCode::BAD_GATEWAY,
        ExecutionErrorKind::SpawnFailure | ExecutionErrorKind::SerializationFailure => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- Script failures keep their structured shape ---
            AppError::Execution(err) => {
                let status = execution_status(err.kind);
                if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
                    tracing::error!(kind = %err.kind, error = %err.message, "Script execution error");
                }
                return (status, axum::Json(err.to_response_body())).into_response();
            }

            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::UnknownOperation(name) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("Unknown operation: {name}"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
            },
        };

        let body = json!({
            "error": true,
            "code": code,
            "message": message,
            "timestamp": chrono::Utc::now().timestamp_millis(),
        });

        (status, axum::Json(body)).into_response()
    }
}
