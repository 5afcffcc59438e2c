//! Error types for render operations.

use thiserror::Error;

/// Result type for render operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that can occur while rendering a scene.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Renderer binary not found in PATH: {0}")]
    RendererNotFound(String),

    #[error("Failed to spawn renderer: {0}")]
    Spawn(String),

    #[error("No code produced: the model never returned a usable code object")]
    NoCodeProduced,

    #[error("Completion error: {0}")]
    Llm(#[from] manimate_llm::LlmError),

    #[error("Scene plan error: {0}")]
    Plan(#[from] manimate_models::ScenePlanError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RenderError {
    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::Spawn(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
