//! End-to-end generation pipeline.
//!
//! Strictly sequential per request: plan → code/render repair loop → narration
//! synthesis → duration reconciliation → mux. Each stage failure maps to its
//! own error category; nothing downstream runs after a stage fails.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use manimate_llm::{
    generate_structured, BackoffPolicy, ChatMessage, CompletionClient, GeneratorConfig,
    OpenAiClient, OpenAiConfig, StructuredOutput,
};
use manimate_media::{merge, MergeOptions};
use manimate_models::{GeneratedCode, GenerateVideoRequest, GenerateVideoResponse, ScenePlan};
use manimate_render::{
    repair_render, CodeGenerator, RenderConfig, RenderInvoker, RenderResult, RepairConfig,
};

use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::services::prompts;
use crate::services::tts::{TtsClient, TtsConfig};
use crate::workspace::RequestWorkspace;

/// The request-handling pipeline.
pub struct Pipeline {
    config: ApiConfig,
    llm: Arc<dyn CompletionClient>,
    tts: TtsClient,
}

impl Pipeline {
    /// Build the production pipeline from config.
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        let llm = OpenAiClient::new(OpenAiConfig {
            base_url: config.llm_base_url.clone(),
            api_key: config.llm_api_key.clone(),
            model: config.llm_model.clone(),
            ..Default::default()
        })?;
        let tts = TtsClient::new(TtsConfig {
            base_url: config.tts_base_url.clone(),
            api_key: config.tts_api_key.clone(),
            voice_id: config.tts_voice_id.clone(),
            ..Default::default()
        })?;
        Ok(Self {
            config,
            llm: Arc::new(llm),
            tts,
        })
    }

    /// Pipeline with injected collaborators, for tests.
    pub fn with_clients(
        config: ApiConfig,
        llm: Arc<dyn CompletionClient>,
        tts: TtsClient,
    ) -> Self {
        Self { config, llm, tts }
    }

    /// Run the whole pipeline for one request.
    #[instrument(skip_all, fields(description_len = request.description.len()))]
    pub async fn generate(&self, request: &GenerateVideoRequest) -> ApiResult<GenerateVideoResponse> {
        let workspace = RequestWorkspace::create(&self.config.scratch_root).await?;
        let result = self.run_stages(request, &workspace).await;
        // Scratch is removed whether the run succeeded or not; deliverables
        // were persisted to the outputs root first.
        workspace.cleanup().await;
        result
    }

    async fn run_stages(
        &self,
        request: &GenerateVideoRequest,
        workspace: &RequestWorkspace,
    ) -> ApiResult<GenerateVideoResponse> {
        let mut plan = self.plan_scene(request).await?;
        plan.validate_scene_name()
            .map_err(|e| ApiError::PlanningFailed(e.to_string()))?;
        info!(request_id = %workspace.id, scene = %plan.scene_name, "Scene planned");

        let generator_config = GeneratorConfig::new("scene-code")
            .with_max_attempts(self.config.parse_max_attempts)
            .with_backoff(BackoffPolicy::parse_default());
        let generator = LlmCodeGenerator {
            llm: &self.llm,
            config: generator_config,
        };

        let invoker = RenderInvoker::new(
            RenderConfig {
                binary: self.config.manim_binary.clone(),
                quality_flag: self.config.manim_quality_flag.clone(),
                media_root: workspace.media_dir.clone(),
                workspace_root: workspace.root.clone(),
                timeout: self.config.render_timeout,
            },
        );
        let repair_config = RepairConfig {
            max_attempts: self.config.repair_max_attempts,
            strict_stderr: self.config.strict_stderr,
            ..Default::default()
        };

        let report = repair_render(
            &generator,
            &invoker,
            &workspace.scripts_dir,
            &mut plan,
            &repair_config,
        )
        .await?;

        let video_path = report.video_path.clone().ok_or_else(|| ApiError::RenderFailed {
            attempts: report.attempts_used,
            detail: excerpt(&report.render_errors, 2000),
        })?;
        verify_artifact(&video_path, report.attempts_used).await?;
        info!(
            request_id = %workspace.id,
            video = %video_path.display(),
            attempts = report.attempts_used,
            "Silent video rendered"
        );

        let narration_text = plan.narration_or(&request.description).to_string();
        let narration_path = self
            .tts
            .synthesize(&narration_text, None, &workspace.audio_dir)
            .await?;

        // merge reconciles the narration's duration itself; its scratch
        // files land next to the staged output.
        let staged = workspace.outputs_dir.join("merged.mp4");
        merge(&video_path, &narration_path, &staged, &MergeOptions::default()).await?;

        let outputs_root = &self.config.outputs_root;
        let silent_video = workspace.persist(&video_path, outputs_root, "silent").await?;
        let narration_audio = workspace.persist(&narration_path, outputs_root, "narration").await?;
        let final_video = workspace.persist(&staged, outputs_root, "final").await?;

        info!(request_id = %workspace.id, final_video = %final_video.display(), "Pipeline complete");

        Ok(GenerateVideoResponse {
            plan,
            code: report.code,
            silent_video: silent_video.to_string_lossy().to_string(),
            final_video: final_video.to_string_lossy().to_string(),
            narration_audio: narration_audio.to_string_lossy().to_string(),
            attempts: report.attempts_used,
        })
    }

    /// Planning stage: one structured-output retry loop against the model.
    pub async fn plan_scene(&self, request: &GenerateVideoRequest) -> ApiResult<ScenePlan> {
        let config = GeneratorConfig::new("scene-planning")
            .with_max_attempts(self.config.parse_max_attempts)
            .with_backoff(BackoffPolicy::parse_default());
        let initial = prompts::planning_prompt(&request.description, request.language.as_deref());

        let llm = &self.llm;
        let output = generate_structured::<ScenePlan, _, _>(&config, initial, |prompt| {
            let messages = vec![
                ChatMessage::system(prompts::PLANNER_SYSTEM),
                ChatMessage::user(prompt),
            ];
            async move { llm.complete(&messages).await }
        })
        .await?;

        match output {
            StructuredOutput::Parsed(plan) => Ok(plan),
            // Degraded raw content is a hard stop, never partial success.
            StructuredOutput::Raw(raw) => Err(ApiError::PlanningFailed(excerpt(&raw, 500))),
        }
    }
}

/// Code generator backed by the completion client.
struct LlmCodeGenerator<'a> {
    llm: &'a Arc<dyn CompletionClient>,
    config: GeneratorConfig,
}

#[async_trait]
impl CodeGenerator for LlmCodeGenerator<'_> {
    async fn generate(&self, plan: &ScenePlan) -> RenderResult<Option<GeneratedCode>> {
        let initial = prompts::codegen_prompt(plan);
        let llm = self.llm;
        let output = generate_structured::<GeneratedCode, _, _>(&self.config, initial, |prompt| {
            let messages = vec![
                ChatMessage::system(prompts::CODER_SYSTEM),
                ChatMessage::user(prompt),
            ];
            async move { llm.complete(&messages).await }
        })
        .await?;
        Ok(output.into_parsed())
    }
}

/// The render invariant: a reported video path must exist and be non-empty
/// before narration synthesis may start.
async fn verify_artifact(path: &Path, attempts: u32) -> ApiResult<()> {
    let size = tokio::fs::metadata(path).await.map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        return Err(ApiError::RenderFailed {
            attempts,
            detail: format!("located video is missing or empty: {}", path.display()),
        });
    }
    Ok(())
}

fn excerpt(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
