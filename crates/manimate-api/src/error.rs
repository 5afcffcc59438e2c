//! API error types.
//!
//! Stage failures carry human-readable diagnostic text, not structured codes;
//! the boundary maps each to a category string plus detail so callers can
//! tell "model never produced valid structure" from "renderer kept failing"
//! from "external service unreachable".

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

use manimate_models::ErrorResponse;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Scene planning failed: {0}")]
    PlanningFailed(String),

    #[error("Renderer failed after {attempts} attempts: {detail}")]
    RenderFailed { attempts: u32, detail: String },

    #[error("Speech synthesis failed: {0}")]
    TtsFailed(String),

    #[error("Media processing failed: {0}")]
    Media(#[from] manimate_media::MediaError),

    #[error("Render error: {0}")]
    Render(#[from] manimate_render::RenderError),

    #[error("Completion error: {0}")]
    Llm(#[from] manimate_llm::LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Error category exposed on the wire.
    pub fn category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "invalid_request",
            Self::PlanningFailed(_) => "plan_generation_failed",
            Self::Render(manimate_render::RenderError::NoCodeProduced) => {
                "code_generation_failed"
            }
            Self::RenderFailed { .. } | Self::Render(_) => "render_failed",
            Self::TtsFailed(_) => "tts_failed",
            Self::Media(_) => "media_failed",
            Self::Llm(_) => "completion_failed",
            Self::Io(_) | Self::Internal(_) => "internal_error",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PlanningFailed(_) | Self::RenderFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::TtsFailed(_) | Self::Llm(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(self.category(), self.to_string());
        (status, Json(body)).into_response()
    }
}
