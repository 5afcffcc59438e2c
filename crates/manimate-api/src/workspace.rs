//! Per-request scratch workspaces.
//!
//! Every request gets a uuid-namespaced directory tree under the scratch
//! root, so concurrent requests targeting the same scene name can no longer
//! overwrite each other's files. The workspace is removed best-effort once
//! the final artifact has been persisted to the outputs root.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

/// Directory layout for one request.
#[derive(Debug, Clone)]
pub struct RequestWorkspace {
    /// Request identifier.
    pub id: String,
    /// Workspace root (`{scratch_root}/{id}`).
    pub root: PathBuf,
    /// Generated renderer source files.
    pub scripts_dir: PathBuf,
    /// Renderer media output.
    pub media_dir: PathBuf,
    /// Synthesized narration audio.
    pub audio_dir: PathBuf,
    /// Muxed output staging.
    pub outputs_dir: PathBuf,
}

impl RequestWorkspace {
    /// Create a fresh workspace under `scratch_root`.
    pub async fn create(scratch_root: &Path) -> std::io::Result<Self> {
        let id = Uuid::new_v4().to_string();
        let root = scratch_root.join(&id);
        let workspace = Self {
            scripts_dir: root.join("scripts"),
            media_dir: root.join("media"),
            audio_dir: root.join("audio"),
            outputs_dir: root.join("outputs"),
            id,
            root,
        };

        for dir in [
            &workspace.scripts_dir,
            &workspace.media_dir,
            &workspace.audio_dir,
            &workspace.outputs_dir,
        ] {
            fs::create_dir_all(dir).await?;
        }

        debug!(request_id = %workspace.id, root = %workspace.root.display(), "Created request workspace");
        Ok(workspace)
    }

    /// Copy an artifact out of the workspace into `outputs_root` under a
    /// labeled, timestamp-qualified name, so it survives workspace cleanup.
    pub async fn persist(
        &self,
        artifact: &Path,
        outputs_root: &Path,
        label: &str,
    ) -> std::io::Result<PathBuf> {
        fs::create_dir_all(outputs_root).await?;

        let extension = artifact
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_else(|| "mp4".to_string());
        let name = format!(
            "{label}_{}_{}.{extension}",
            chrono::Utc::now().format("%Y%m%d_%H%M%S"),
            &self.id[..8]
        );
        let target = outputs_root.join(name);

        // Copy rather than rename: sources may be referenced again within the
        // request, and scratch/outputs can sit on different filesystems.
        fs::copy(artifact, &target).await?;
        Ok(target)
    }

    /// Remove the whole workspace, best-effort.
    pub async fn cleanup(&self) {
        if let Err(e) = fs::remove_dir_all(&self.root).await {
            warn!(request_id = %self.id, error = %e, "Failed to remove request workspace");
        }
    }
}
