//! Request handlers.

use axum::extract::State;
use axum::Json;
use serde_json::json;
use tracing::info;

use manimate_models::{GenerateVideoRequest, GenerateVideoResponse};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `POST /api/generate-video`
pub async fn generate_video(
    State(state): State<AppState>,
    Json(request): Json<GenerateVideoRequest>,
) -> ApiResult<Json<GenerateVideoResponse>> {
    // Reject before any pipeline stage runs.
    if request.description_is_blank() {
        return Err(ApiError::bad_request("description is required"));
    }

    info!(
        description_len = request.description.len(),
        language = request.language.as_deref().unwrap_or("english"),
        "Generation request accepted"
    );

    let response = state.pipeline.generate(&request).await?;
    Ok(Json(response))
}

/// `GET /health`
///
/// Reports whether the external binaries the pipeline shells out to are
/// actually on PATH, so a misconfigured deployment fails loudly.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let ffmpeg = which::which("ffmpeg").is_ok();
    let ffprobe = which::which("ffprobe").is_ok();
    let manim = which::which(&state.config.manim_binary).is_ok();

    Json(json!({
        "status": if ffmpeg && ffprobe && manim { "ok" } else { "degraded" },
        "ffmpeg": ffmpeg,
        "ffprobe": ffprobe,
        "manim": manim,
    }))
}
