//! Scene plan produced by the planning stage.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when validating a scene plan.
#[derive(Debug, Error)]
pub enum ScenePlanError {
    #[error("Scene name is empty")]
    EmptySceneName,

    #[error("Scene name is not a valid scene class identifier: {0}")]
    InvalidSceneName(String),
}

/// A timed caption overlaid by the frontend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Caption {
    /// Caption text.
    pub text: String,
    /// Start offset in seconds (>= 0).
    pub start_time: f64,
    /// Display duration in seconds (> 0).
    pub duration: f64,
}

/// Plan for a single animated scene.
///
/// Created once per request by the planning call. The repair loop mutates it
/// in place across attempts by attaching `previous_code` / `manim_error`;
/// it is never persisted past the request.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ScenePlan {
    /// Renderer scene class name (also used as the script file stem).
    pub scene_name: String,
    /// Descriptions of the objects appearing in the scene.
    #[serde(default)]
    pub objects: Vec<String>,
    /// Descriptions of the animations/actions in the scene.
    #[serde(default)]
    pub actions: Vec<String>,
    /// Narration text; empty means "fall back to the topic description".
    #[serde(default)]
    pub narration: String,
    /// Timed captions.
    #[serde(default)]
    pub captions: Vec<Caption>,
    /// Source of the most recent failed render attempt. Present only while repairing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_code: Option<String>,
    /// Truncated stderr from the most recent failed render attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manim_error: Option<String>,
    /// Set when the renderer exited cleanly but no video artifact was found.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub video_not_found: bool,
}

impl ScenePlan {
    /// Validate that `scene_name` can serve as the renderer's scene class name.
    ///
    /// The renderer derives both the script file name and the Python class
    /// name from it, so it must be a plain ASCII identifier.
    pub fn validate_scene_name(&self) -> Result<(), ScenePlanError> {
        let name = self.scene_name.trim();
        if name.is_empty() {
            return Err(ScenePlanError::EmptySceneName);
        }

        let mut chars = name.chars();
        let first_ok = chars
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);
        if !first_ok || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ScenePlanError::InvalidSceneName(name.to_string()));
        }

        Ok(())
    }

    /// Narration text, falling back to `fallback` when the plan carries none.
    pub fn narration_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        let narration = self.narration.trim();
        if narration.is_empty() {
            fallback
        } else {
            narration
        }
    }

    /// Attach the corrective context fed back to the code generator after a
    /// failed render attempt.
    pub fn attach_failure(
        &mut self,
        previous_code: String,
        error_excerpt: String,
        video_not_found: bool,
    ) {
        self.previous_code = Some(previous_code);
        self.manim_error = Some(error_excerpt);
        self.video_not_found = video_not_found;
    }
}
