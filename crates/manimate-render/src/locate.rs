//! Locator strategies for the rendered video artifact.
//!
//! The renderer's output location is not fully deterministic across versions,
//! so location is a prioritized list of strategies tried in order; the first
//! hit wins. New renderer versions with more predictable layouts can add a
//! higher-priority strategy without touching the existing tiers.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::debug;

/// Quality-tier directories the renderer writes under, by render preset.
const QUALITY_TIERS: &[&str] = &["480p15", "720p30", "1080p60", "2160p60"];

/// Directories never worth scanning for artifacts.
const EXCLUDED_DIRS: &[&str] = &["node_modules", ".git", "venv", ".venv", "__pycache__", "target"];

/// Everything a locator may consult.
#[derive(Debug, Clone)]
pub struct LocateContext {
    /// Captured renderer stdout.
    pub stdout: String,
    /// Scene class name.
    pub scene: String,
    /// Source file stem (the renderer keys its media tree on it).
    pub script_stem: String,
    /// Renderer media root (`--media_dir`).
    pub media_root: PathBuf,
    /// Whole scratch workspace, for the last-resort scan.
    pub workspace_root: PathBuf,
}

/// A single artifact-location strategy.
pub trait VideoLocator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Return the artifact path, or `None` when this strategy finds nothing.
    fn locate(&self, ctx: &LocateContext) -> Option<PathBuf>;
}

/// The production strategy list, in priority order.
pub fn default_locators() -> Vec<Box<dyn VideoLocator>> {
    vec![
        Box::new(StdoutLocator),
        Box::new(MediaTreeLocator),
        Box::new(WorkspaceScanLocator),
    ]
}

/// Tier 1: the renderer names the finished file on stdout.
///
/// Matches lines carrying a "ready" marker and a quoted path ending `.mp4`;
/// the hit counts only if that file exists on disk.
pub struct StdoutLocator;

impl VideoLocator for StdoutLocator {
    fn name(&self) -> &'static str {
        "stdout"
    }

    fn locate(&self, ctx: &LocateContext) -> Option<PathBuf> {
        for line in ctx.stdout.lines() {
            if !line.to_lowercase().contains("ready") {
                continue;
            }
            if let Some(path) = quoted_mp4_path(line) {
                if path.exists() {
                    debug!(path = %path.display(), "Located video from renderer stdout");
                    return Some(path);
                }
            }
        }
        None
    }
}

/// Tier 2: the renderer's structured media tree.
///
/// First the known quality-tier folders under the script's media directory,
/// then any `.mp4` beneath that directory. Latest modification time wins.
pub struct MediaTreeLocator;

impl VideoLocator for MediaTreeLocator {
    fn name(&self) -> &'static str {
        "media-tree"
    }

    fn locate(&self, ctx: &LocateContext) -> Option<PathBuf> {
        let scene_dirs = [
            ctx.media_root.join("videos").join(&ctx.script_stem),
            ctx.media_root.join(&ctx.script_stem),
        ];

        let mut candidates = Vec::new();
        for scene_dir in &scene_dirs {
            for tier in QUALITY_TIERS {
                collect_mp4s_shallow(&scene_dir.join(tier), &mut candidates);
            }
        }
        if candidates.is_empty() {
            for scene_dir in &scene_dirs {
                collect_mp4s_recursive(scene_dir, &mut candidates);
            }
        }

        let hit = latest_by_mtime(candidates);
        if let Some(ref path) = hit {
            debug!(path = %path.display(), "Located video in renderer media tree");
        }
        hit
    }
}

/// Tier 3: last resort — any `.mp4` anywhere under the scratch workspace,
/// excluding dependency/environment folders, latest modification time wins.
pub struct WorkspaceScanLocator;

impl VideoLocator for WorkspaceScanLocator {
    fn name(&self) -> &'static str {
        "workspace-scan"
    }

    fn locate(&self, ctx: &LocateContext) -> Option<PathBuf> {
        let mut candidates = Vec::new();
        collect_mp4s_recursive(&ctx.workspace_root, &mut candidates);
        let hit = latest_by_mtime(candidates);
        if let Some(ref path) = hit {
            debug!(path = %path.display(), "Located video via workspace scan");
        }
        hit
    }
}

/// Extract a single-quoted or double-quoted path ending in `.mp4`.
fn quoted_mp4_path(line: &str) -> Option<PathBuf> {
    for quote in ['\'', '"'] {
        let mut parts = line.split(quote);
        // Quoted segments are the even-indexed splits after the first.
        parts.next();
        while let Some(segment) = parts.next() {
            if segment.ends_with(".mp4") {
                return Some(PathBuf::from(segment));
            }
            parts.next();
        }
    }
    None
}

fn collect_mp4s_shallow(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "mp4") {
            out.push(path);
        }
    }
}

fn collect_mp4s_recursive(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if EXCLUDED_DIRS.iter().any(|d| *d == name) {
                continue;
            }
            collect_mp4s_recursive(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "mp4") {
            out.push(path);
        }
    }
}

fn latest_by_mtime(candidates: Vec<PathBuf>) -> Option<PathBuf> {
    candidates
        .into_iter()
        .map(|path| {
            // Unreadable metadata sorts oldest rather than dropping the file.
            let mtime = std::fs::metadata(&path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (mtime, path)
        })
        .max_by_key(|(mtime, _)| *mtime)
        .map(|(_, path)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"mp4").unwrap();
    }

    fn set_mtime(path: &Path, age: Duration) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    fn ctx(workspace: &Path) -> LocateContext {
        LocateContext {
            stdout: String::new(),
            scene: "GravityScene".to_string(),
            script_stem: "GravityScene".to_string(),
            media_root: workspace.join("media"),
            workspace_root: workspace.to_path_buf(),
        }
    }

    #[test]
    fn test_quoted_path_extraction() {
        assert_eq!(
            quoted_mp4_path("File ready at '/tmp/media/GravityScene.mp4'"),
            Some(PathBuf::from("/tmp/media/GravityScene.mp4"))
        );
        assert_eq!(
            quoted_mp4_path(r#"File ready at "/tmp/out.mp4""#),
            Some(PathBuf::from("/tmp/out.mp4"))
        );
        assert_eq!(quoted_mp4_path("Rendering 'scene' done"), None);
        assert_eq!(quoted_mp4_path("no quotes at all.mp4"), None);
    }

    #[test]
    fn test_stdout_locator_requires_existing_file() {
        let dir = TempDir::new().unwrap();
        let real = dir.path().join("real.mp4");
        touch(&real);

        let mut context = ctx(dir.path());
        context.stdout = format!("INFO File ready at '{}'", real.display());
        assert_eq!(StdoutLocator.locate(&context), Some(real));

        context.stdout = "INFO File ready at '/nonexistent/ghost.mp4'".to_string();
        assert_eq!(StdoutLocator.locate(&context), None);
    }

    #[test]
    fn test_stdout_match_beats_newer_files_elsewhere() {
        // Tier precedence: an existing stdout hit wins even when the scan
        // tiers would find a newer file.
        let dir = TempDir::new().unwrap();
        let announced = dir.path().join("media/videos/GravityScene/480p15/GravityScene.mp4");
        touch(&announced);
        set_mtime(&announced, Duration::from_secs(3600));

        let newer = dir.path().join("stray/newer.mp4");
        touch(&newer);

        let mut context = ctx(dir.path());
        context.stdout = format!("File ready at '{}'", announced.display());

        let found = default_locators()
            .iter()
            .find_map(|locator| locator.locate(&context));
        assert_eq!(found, Some(announced));
    }

    #[test]
    fn test_media_tree_prefers_quality_dirs_and_latest_mtime() {
        let dir = TempDir::new().unwrap();
        let older = dir.path().join("media/videos/GravityScene/480p15/GravityScene.mp4");
        let newer = dir.path().join("media/videos/GravityScene/1080p60/GravityScene.mp4");
        touch(&older);
        touch(&newer);
        set_mtime(&older, Duration::from_secs(3600));

        assert_eq!(MediaTreeLocator.locate(&ctx(dir.path())), Some(newer));
    }

    #[test]
    fn test_media_tree_falls_back_to_recursive_scan() {
        let dir = TempDir::new().unwrap();
        let odd_layout = dir.path().join("media/videos/GravityScene/partial/Scene.mp4");
        touch(&odd_layout);

        assert_eq!(MediaTreeLocator.locate(&ctx(dir.path())), Some(odd_layout));
    }

    #[test]
    fn test_workspace_scan_skips_dependency_dirs() {
        let dir = TempDir::new().unwrap();
        let vendored = dir.path().join("node_modules/pkg/demo.mp4");
        touch(&vendored);
        let real = dir.path().join("outputs/final.mp4");
        touch(&real);
        set_mtime(&real, Duration::from_secs(3600));

        // Despite being older, the non-excluded file is the only candidate.
        assert_eq!(WorkspaceScanLocator.locate(&ctx(dir.path())), Some(real));
    }

    #[test]
    fn test_tiers_only_fall_through_on_zero_hits() {
        let dir = TempDir::new().unwrap();
        let in_tree = dir.path().join("media/videos/GravityScene/480p15/GravityScene.mp4");
        touch(&in_tree);
        set_mtime(&in_tree, Duration::from_secs(3600));
        let stray = dir.path().join("stray.mp4");
        touch(&stray);

        let found = default_locators()
            .iter()
            .find_map(|locator| locator.locate(&ctx(dir.path())));
        assert_eq!(found, Some(in_tree));
    }
}
