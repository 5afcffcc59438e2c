//! Error types for LLM operations.

use thiserror::Error;

/// Result type for LLM operations.
pub type LlmResult<T> = Result<T, LlmError>;

/// Errors that can occur talking to the completion service.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Completion request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Completion service returned status {status}: {body}")]
    ApiStatus { status: u16, body: String },

    #[error("Completion response carried no choices")]
    EmptyCompletion,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LlmError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
