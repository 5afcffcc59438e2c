//! Renderer subprocess invocation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{RenderError, RenderResult};
use crate::locate::{default_locators, LocateContext, VideoLocator};

/// Configuration for renderer invocations.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Renderer binary name or path.
    pub binary: String,
    /// Quality preset flag (`-ql`, `-qm`, ...).
    pub quality_flag: String,
    /// `--media_dir` target.
    pub media_root: PathBuf,
    /// Scratch workspace root, for the last-resort artifact scan.
    pub workspace_root: PathBuf,
    /// Hard subprocess deadline.
    pub timeout: Duration,
}

impl RenderConfig {
    pub fn new(media_root: impl Into<PathBuf>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            binary: "manim".to_string(),
            quality_flag: "-ql".to_string(),
            media_root: media_root.into(),
            workspace_root: workspace_root.into(),
            timeout: Duration::from_millis(120_000),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Structured result of one renderer invocation.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; `None` when the process was killed (timeout) or signalled.
    pub exit_code: Option<i32>,
    /// Located artifact, if any.
    pub video_path: Option<PathBuf>,
    /// Whether the deadline elapsed and the process was killed.
    pub timed_out: bool,
}

impl RenderOutcome {
    /// A render succeeded only when the process exited cleanly AND an artifact
    /// was located. Stderr content does not factor in here; the repair loop
    /// applies its own strictness policy.
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0) && self.video_path.is_some()
    }

    /// True when stderr carries no content beyond whitespace.
    pub fn stderr_is_blank(&self) -> bool {
        self.stderr.trim().is_empty()
    }
}

/// Anything that can render a scene source file to a video.
#[async_trait]
pub trait SceneRenderer: Send + Sync {
    async fn render(&self, source_file: &Path, scene: &str) -> RenderResult<RenderOutcome>;
}

/// Runs the real renderer subprocess.
pub struct RenderInvoker {
    config: RenderConfig,
    locators: Vec<Box<dyn VideoLocator>>,
}

impl RenderInvoker {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            locators: default_locators(),
        }
    }

    /// Replace the artifact-locator strategy list.
    pub fn with_locators(mut self, locators: Vec<Box<dyn VideoLocator>>) -> Self {
        self.locators = locators;
        self
    }

    fn locate_video(&self, stdout: &str, source_file: &Path, scene: &str) -> Option<PathBuf> {
        let script_stem = source_file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| scene.to_string());

        let ctx = LocateContext {
            stdout: stdout.to_string(),
            scene: scene.to_string(),
            script_stem,
            media_root: self.config.media_root.clone(),
            workspace_root: self.config.workspace_root.clone(),
        };

        for locator in &self.locators {
            if let Some(path) = locator.locate(&ctx) {
                debug!(strategy = locator.name(), path = %path.display(), "Video artifact located");
                return Some(path);
            }
        }
        None
    }
}

#[async_trait]
impl SceneRenderer for RenderInvoker {
    async fn render(&self, source_file: &Path, scene: &str) -> RenderResult<RenderOutcome> {
        which::which(&self.config.binary)
            .map_err(|_| RenderError::RendererNotFound(self.config.binary.clone()))?;

        info!(
            source = %source_file.display(),
            scene,
            timeout_ms = self.config.timeout.as_millis() as u64,
            "Invoking renderer"
        );

        let mut child = Command::new(&self.config.binary)
            .arg(&self.config.quality_flag)
            .arg("--media_dir")
            .arg(&self.config.media_root)
            .arg(source_file)
            .arg(scene)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RenderError::spawn(format!("{}: {e}", self.config.binary)))?;

        // Drain both streams concurrently so a chatty renderer can't fill a
        // pipe buffer and deadlock against our wait.
        let mut stdout_pipe = child.stdout.take().expect("stdout not captured");
        let mut stderr_pipe = child.stderr.take().expect("stderr not captured");
        let stdout_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stdout_pipe.read_to_string(&mut buf).await;
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr_pipe.read_to_string(&mut buf).await;
            buf
        });

        let (exit_code, timed_out) =
            match tokio::time::timeout(self.config.timeout, child.wait()).await {
                Ok(status) => (status?.code(), false),
                Err(_) => {
                    warn!(
                        scene,
                        timeout_ms = self.config.timeout.as_millis() as u64,
                        "Renderer timed out, killing process"
                    );
                    let _ = child.kill().await;
                    (None, true)
                }
            };

        let stdout = stdout_task.await.unwrap_or_default();
        let mut stderr = stderr_task.await.unwrap_or_default();
        if timed_out && stderr.trim().is_empty() {
            // A killed renderer may report nothing; leave a diagnostic trail.
            stderr = format!(
                "Render timed out after {} ms",
                self.config.timeout.as_millis()
            );
        }

        let video_path = if timed_out {
            None
        } else {
            self.locate_video(&stdout, source_file, scene)
        };

        let outcome = RenderOutcome {
            stdout,
            stderr,
            exit_code,
            video_path,
            timed_out,
        };

        info!(
            scene,
            exit_code = ?outcome.exit_code,
            video_found = outcome.video_path.is_some(),
            timed_out = outcome.timed_out,
            "Renderer finished"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_succeeded_requires_exit_zero_and_artifact() {
        let base = RenderOutcome {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: Some(0),
            video_path: Some(PathBuf::from("/tmp/scene.mp4")),
            timed_out: false,
        };
        assert!(base.succeeded());

        let no_video = RenderOutcome {
            video_path: None,
            ..base.clone()
        };
        assert!(!no_video.succeeded());

        let bad_exit = RenderOutcome {
            exit_code: Some(1),
            ..base.clone()
        };
        assert!(!bad_exit.succeeded());

        let killed = RenderOutcome {
            exit_code: None,
            video_path: None,
            timed_out: true,
            ..base
        };
        assert!(!killed.succeeded());
    }

    #[test]
    fn test_warnings_do_not_blank_stderr() {
        let outcome = RenderOutcome {
            stdout: String::new(),
            stderr: "  \n\t".to_string(),
            exit_code: Some(0),
            video_path: None,
            timed_out: false,
        };
        assert!(outcome.stderr_is_blank());

        let outcome = RenderOutcome {
            stderr: "DeprecationWarning: ...".to_string(),
            ..outcome
        };
        assert!(!outcome.stderr_is_blank());
    }

    #[tokio::test]
    async fn test_missing_binary_is_fatal() {
        let config = RenderConfig::new("/tmp/media", "/tmp");
        let invoker = RenderInvoker::new(RenderConfig {
            binary: "definitely-not-a-renderer-binary".to_string(),
            ..config
        });
        let err = invoker
            .render(Path::new("/tmp/Scene.py"), "Scene")
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::RendererNotFound(_)));
    }
}
