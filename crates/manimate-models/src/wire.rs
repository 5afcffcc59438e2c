//! Request/response wire shapes at the HTTP boundary.

use serde::{Deserialize, Serialize};

use crate::plan::ScenePlan;

/// Body of `POST /api/generate-video`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoRequest {
    /// Natural-language topic description.
    pub description: String,
    /// Narration language tag, e.g. "english".
    #[serde(default)]
    pub language: Option<String>,
}

impl GenerateVideoRequest {
    /// True when the description carries no usable content.
    pub fn description_is_blank(&self) -> bool {
        self.description.trim().is_empty()
    }
}

/// Successful pipeline response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateVideoResponse {
    /// The scene plan the video was built from.
    pub plan: ScenePlan,
    /// Final generated renderer source.
    pub code: String,
    /// Rendered video before narration was muxed in.
    pub silent_video: String,
    /// Final muxed deliverable.
    pub final_video: String,
    /// Synthesized narration track.
    pub narration_audio: String,
    /// Render attempts spent by the repair loop.
    pub attempts: u32,
}

/// Failure response carrying an error category plus diagnostic detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: Some(detail.into()),
        }
    }
}
