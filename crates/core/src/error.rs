#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}
