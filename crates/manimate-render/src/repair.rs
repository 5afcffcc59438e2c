//! The generate → render → repair loop.
//!
//! Each attempt asks the code generator for renderer source from the current
//! scene plan, persists it, and renders it. On failure the plan is mutated to
//! carry the failing source and the observed error text, so the next
//! generation call can localize the fix from the raw diagnostics alone.

use std::path::Path;

use async_trait::async_trait;
use tokio::fs;
use tracing::{info, warn};

use manimate_llm::BackoffPolicy;
use manimate_models::{GeneratedCode, ScenePlan};

use crate::error::{RenderError, RenderResult};
use crate::invoker::SceneRenderer;

/// Configuration for the repair loop.
#[derive(Debug, Clone)]
pub struct RepairConfig {
    /// Render attempts before giving up.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub backoff: BackoffPolicy,
    /// When set, any non-blank stderr fails the attempt even if the render
    /// exited cleanly and produced a video. Conservative but intentional:
    /// some renderer errors surface as warnings with a stale artifact left
    /// from an earlier run.
    pub strict_stderr: bool,
    /// Error text fed back to the generator is truncated to this many chars.
    pub error_excerpt_len: usize,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffPolicy::render_default(),
            strict_stderr: true,
            error_excerpt_len: 2000,
        }
    }
}

/// Produces renderer source from a scene plan.
///
/// `Ok(None)` means the model responded but never produced a usable code
/// object — structural failure, which the loop does not retry.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
    async fn generate(&self, plan: &ScenePlan) -> RenderResult<Option<GeneratedCode>>;
}

/// Final report of a repair loop run.
///
/// `video_path: None` after the attempt cap means terminal render failure;
/// the diagnostics fields carry the last attempt's evidence.
#[derive(Debug, Clone)]
pub struct RepairReport {
    /// Last generated source.
    pub code: String,
    /// Last render's stdout.
    pub render_stdout: String,
    /// Last render's stderr.
    pub render_errors: String,
    /// Located artifact, when any attempt succeeded.
    pub video_path: Option<std::path::PathBuf>,
    /// Attempts actually spent.
    pub attempts_used: u32,
}

/// Run the repair loop: generate code, render it, and on failure feed the
/// failing source plus error text back into the plan and retry.
///
/// Mutates `plan` in place across attempts (`previous_code` / `manim_error`).
/// Generated source is written to `{scripts_dir}/{scene_name}.py`, overwriting
/// prior attempts for the same scene.
pub async fn repair_render(
    generator: &dyn CodeGenerator,
    renderer: &dyn SceneRenderer,
    scripts_dir: &Path,
    plan: &mut ScenePlan,
    config: &RepairConfig,
) -> RenderResult<RepairReport> {
    plan.validate_scene_name()?;
    fs::create_dir_all(scripts_dir).await?;

    let max_attempts = config.max_attempts.max(1);
    let mut last = RepairReport {
        code: String::new(),
        render_stdout: String::new(),
        render_errors: String::new(),
        video_path: None,
        attempts_used: 0,
    };

    for attempt in 1..=max_attempts {
        info!(scene = %plan.scene_name, attempt, max_attempts, "Generating scene code");

        // Structural generation failure is not a renderer problem; retrying
        // the render loop will not fix it.
        let code = generator
            .generate(plan)
            .await?
            .ok_or(RenderError::NoCodeProduced)?;

        let script_path = scripts_dir.join(code.script_file_name());
        fs::write(&script_path, &code.source_code).await?;

        let outcome = renderer.render(&script_path, &code.scene_name).await?;

        let clean = outcome.succeeded()
            && (!config.strict_stderr || outcome.stderr_is_blank());

        last = RepairReport {
            code: code.source_code.clone(),
            render_stdout: outcome.stdout,
            render_errors: outcome.stderr,
            video_path: outcome.video_path,
            attempts_used: attempt,
        };

        if clean {
            info!(scene = %plan.scene_name, attempt, "Render succeeded");
            return Ok(last);
        }

        warn!(
            scene = %plan.scene_name,
            attempt,
            exit_code = ?outcome.exit_code,
            video_found = last.video_path.is_some(),
            timed_out = outcome.timed_out,
            "Render attempt failed"
        );

        if attempt < max_attempts {
            plan.attach_failure(
                code.source_code,
                truncate_chars(&last.render_errors, config.error_excerpt_len),
                last.video_path.is_none(),
            );
            // Failed attempts do not count as success even when a stale video
            // path was located; drop it so the caller can't mistake it.
            last.video_path = None;
            tokio::time::sleep(config.backoff.delay_for_attempt(attempt)).await;
        } else {
            last.video_path = None;
        }
    }

    warn!(
        scene = %plan.scene_name,
        attempts = last.attempts_used,
        "Repair loop exhausted without a clean render"
    );
    Ok(last)
}

/// Char-boundary-safe prefix truncation.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::RenderOutcome;
    use std::path::PathBuf;
    use std::time::Duration;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct StubGenerator {
        /// Plans observed per call, for asserting corrective context.
        seen: Mutex<Vec<ScenePlan>>,
        produce_code: bool,
    }

    impl StubGenerator {
        fn new(produce_code: bool) -> Self {
            Self {
                seen: Mutex::new(Vec::new()),
                produce_code,
            }
        }
    }

    #[async_trait]
    impl CodeGenerator for StubGenerator {
        async fn generate(&self, plan: &ScenePlan) -> RenderResult<Option<GeneratedCode>> {
            let call = {
                let mut seen = self.seen.lock().unwrap();
                seen.push(plan.clone());
                seen.len()
            };
            if !self.produce_code {
                return Ok(None);
            }
            Ok(Some(GeneratedCode {
                scene_name: plan.scene_name.clone(),
                source_code: format!("# attempt {call}\nclass {}: pass", plan.scene_name),
            }))
        }
    }

    /// Renderer stub scripted per attempt.
    struct StubRenderer {
        calls: AtomicU32,
        outcomes: Vec<RenderOutcome>,
    }

    impl StubRenderer {
        fn new(outcomes: Vec<RenderOutcome>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                outcomes,
            }
        }
    }

    #[async_trait]
    impl SceneRenderer for StubRenderer {
        async fn render(&self, _source: &Path, _scene: &str) -> RenderResult<RenderOutcome> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            Ok(self.outcomes[n.min(self.outcomes.len() - 1)].clone())
        }
    }

    fn failing_outcome(stderr: &str) -> RenderOutcome {
        RenderOutcome {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code: Some(1),
            video_path: None,
            timed_out: false,
        }
    }

    fn success_outcome(video: PathBuf) -> RenderOutcome {
        RenderOutcome {
            stdout: "File ready".to_string(),
            stderr: String::new(),
            exit_code: Some(0),
            video_path: Some(video),
            timed_out: false,
        }
    }

    fn fast_config() -> RepairConfig {
        RepairConfig {
            backoff: BackoffPolicy::Constant(Duration::from_millis(1)),
            ..Default::default()
        }
    }

    fn test_plan() -> ScenePlan {
        ScenePlan {
            scene_name: "GravityScene".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_fail_then_succeed_uses_two_attempts_with_corrective_context() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("GravityScene.mp4");

        let generator = StubGenerator::new(true);
        let renderer = StubRenderer::new(vec![
            failing_outcome("NameError: name 'Circle' is not defined"),
            success_outcome(video.clone()),
        ]);

        let mut plan = test_plan();
        let report = repair_render(&generator, &renderer, dir.path(), &mut plan, &fast_config())
            .await
            .unwrap();

        assert_eq!(report.attempts_used, 2);
        assert_eq!(report.video_path, Some(video));

        // The second generation call must have seen the first attempt's
        // failing code and stderr.
        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].previous_code.is_none());
        assert_eq!(
            seen[1].manim_error.as_deref(),
            Some("NameError: name 'Circle' is not defined")
        );
        assert!(seen[1].previous_code.as_deref().unwrap().contains("# attempt 1"));
        assert!(seen[1].video_not_found);
    }

    #[tokio::test]
    async fn test_never_succeeding_exhausts_at_cap_with_null_video() {
        let dir = TempDir::new().unwrap();
        let generator = StubGenerator::new(true);
        let renderer = StubRenderer::new(vec![failing_outcome("SyntaxError")]);

        let mut plan = test_plan();
        let report = repair_render(&generator, &renderer, dir.path(), &mut plan, &fast_config())
            .await
            .unwrap();

        assert_eq!(report.attempts_used, 3);
        assert!(report.video_path.is_none());
        assert_eq!(report.render_errors, "SyntaxError");
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_no_code_is_terminal_without_render() {
        let dir = TempDir::new().unwrap();
        let generator = StubGenerator::new(false);
        let renderer = StubRenderer::new(vec![failing_outcome("unused")]);

        let mut plan = test_plan();
        let err = repair_render(&generator, &renderer, dir.path(), &mut plan, &fast_config())
            .await
            .unwrap_err();

        assert!(matches!(err, RenderError::NoCodeProduced));
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0, "renderer must not run");
        // Only one generation call: structural failure is not retried here.
        assert_eq!(generator.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_success_short_circuits_remaining_attempts() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("v.mp4");
        let generator = StubGenerator::new(true);
        let renderer = StubRenderer::new(vec![success_outcome(video)]);

        let mut plan = test_plan();
        let report = repair_render(&generator, &renderer, dir.path(), &mut plan, &fast_config())
            .await
            .unwrap();

        assert_eq!(report.attempts_used, 1);
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 1);
        assert!(plan.previous_code.is_none(), "plan untouched on clean success");
    }

    #[tokio::test]
    async fn test_strict_stderr_retries_despite_artifact() {
        let dir = TempDir::new().unwrap();
        let video = dir.path().join("v.mp4");
        let warned = RenderOutcome {
            stderr: "DeprecationWarning: old API".to_string(),
            ..success_outcome(video.clone())
        };

        let generator = StubGenerator::new(true);
        let renderer = StubRenderer::new(vec![warned.clone(), success_outcome(video.clone())]);
        let mut plan = test_plan();
        let report = repair_render(&generator, &renderer, dir.path(), &mut plan, &fast_config())
            .await
            .unwrap();
        assert_eq!(report.attempts_used, 2);

        // Relaxed policy accepts the same outcome first try.
        let renderer = StubRenderer::new(vec![warned]);
        let generator = StubGenerator::new(true);
        let mut plan = test_plan();
        let relaxed = RepairConfig {
            strict_stderr: false,
            ..fast_config()
        };
        let report = repair_render(&generator, &renderer, dir.path(), &mut plan, &relaxed)
            .await
            .unwrap();
        assert_eq!(report.attempts_used, 1);
        assert_eq!(report.video_path, Some(video));
    }

    #[tokio::test]
    async fn test_error_excerpt_is_truncated() {
        let dir = TempDir::new().unwrap();
        let long_error = "x".repeat(5000);
        let generator = StubGenerator::new(true);
        let renderer = StubRenderer::new(vec![failing_outcome(&long_error)]);

        let mut plan = test_plan();
        let _ = repair_render(&generator, &renderer, dir.path(), &mut plan, &fast_config())
            .await
            .unwrap();

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen[1].manim_error.as_ref().unwrap().len(), 2000);
    }

    #[tokio::test]
    async fn test_attempts_overwrite_the_same_script_file() {
        let dir = TempDir::new().unwrap();
        let generator = StubGenerator::new(true);
        let renderer = StubRenderer::new(vec![failing_outcome("boom")]);

        let mut plan = test_plan();
        let _ = repair_render(&generator, &renderer, dir.path(), &mut plan, &fast_config())
            .await
            .unwrap();

        let script = dir.path().join("GravityScene.py");
        let content = tokio::fs::read_to_string(&script).await.unwrap();
        assert!(content.contains("# attempt 3"), "last attempt wins the file");
    }

    #[tokio::test]
    async fn test_invalid_scene_name_rejected_up_front() {
        let dir = TempDir::new().unwrap();
        let generator = StubGenerator::new(true);
        let renderer = StubRenderer::new(vec![failing_outcome("unused")]);

        let mut plan = ScenePlan {
            scene_name: "not a class".to_string(),
            ..Default::default()
        };
        let err = repair_render(&generator, &renderer, dir.path(), &mut plan, &fast_config())
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::Plan(_)));
    }
}
