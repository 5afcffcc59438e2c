//! Audio-duration reconciliation against a reference video.
//!
//! Before muxing, the narration track is trimmed or silence-padded so its
//! duration matches the rendered video's. The decision is computed as a pure
//! [`ReconcilePlan`] from the probed durations, then executed with FFmpeg.
//! Originals are never modified; every transform writes a new
//! timestamp-qualified file into the scratch directory.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::command::{FfmpegCommand, FfmpegRunner, TranscodeRunner};
use crate::error::MediaResult;
use crate::probe::{DurationProbe, FfprobeDuration};

/// Durations within this many seconds of each other are considered equal.
pub const DURATION_TOLERANCE: f64 = 0.05;

/// Shortest silence segment worth synthesizing.
const MIN_SILENCE_SECS: f64 = 0.5;

const SILENCE_SOURCE: &str = "anullsrc=r=44100:cl=stereo";

/// What to do with the audio track to match the video's duration.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcilePlan {
    /// Audio already matches; hand back the original path, write nothing.
    UseOriginal,
    /// Audio is too long; hard-cut it to the video's duration.
    Trim { to_secs: f64 },
    /// Audio is too short; append this much silence after the original.
    Pad { deficit_secs: f64 },
    /// No usable audio; synthesize silence for the whole video.
    Silence { secs: f64 },
}

/// Decide how to reconcile `audio_duration` against `video_duration`.
pub fn plan_reconcile(video_duration: f64, audio_duration: Option<f64>) -> ReconcilePlan {
    let Some(audio_duration) = audio_duration else {
        return ReconcilePlan::Silence {
            secs: video_duration.max(MIN_SILENCE_SECS),
        };
    };

    let delta = audio_duration - video_duration;
    if delta > DURATION_TOLERANCE {
        ReconcilePlan::Trim {
            to_secs: video_duration,
        }
    } else if delta < -DURATION_TOLERANCE {
        ReconcilePlan::Pad {
            deficit_secs: (-delta).max(MIN_SILENCE_SECS),
        }
    } else {
        ReconcilePlan::UseOriginal
    }
}

/// Reconcile an audio track's duration against a video's.
///
/// Returns the path of the audio to mux: the original when already within
/// tolerance, otherwise a new file in `scratch_dir`. A missing or absent
/// audio path yields a synthesized-silence track.
pub async fn reconcile_audio(
    video_path: &Path,
    audio_path: Option<&Path>,
    scratch_dir: &Path,
) -> MediaResult<PathBuf> {
    reconcile_audio_with(
        &FfmpegRunner::new(),
        &FfprobeDuration::new(),
        video_path,
        audio_path,
        scratch_dir,
    )
    .await
}

/// [`reconcile_audio`] with an injectable transcoder and probe, for tests.
pub async fn reconcile_audio_with(
    runner: &dyn TranscodeRunner,
    probe: &dyn DurationProbe,
    video_path: &Path,
    audio_path: Option<&Path>,
    scratch_dir: &Path,
) -> MediaResult<PathBuf> {
    let video_duration = probe.duration(video_path).await?;

    // An audio path pointing at nothing is treated the same as no audio.
    let audio_path = audio_path.filter(|p| p.exists());
    let audio_duration = match audio_path {
        Some(path) => Some(probe.duration(path).await?),
        None => None,
    };

    let plan = plan_reconcile(video_duration, audio_duration);
    debug!(
        video = %video_path.display(),
        video_duration,
        ?audio_duration,
        ?plan,
        "Reconciling audio duration"
    );

    match plan {
        ReconcilePlan::UseOriginal => {
            let original = audio_path.expect("UseOriginal implies audio present");
            Ok(original.to_path_buf())
        }
        ReconcilePlan::Trim { to_secs } => {
            let original = audio_path.expect("Trim implies audio present");
            let out = scratch_file(scratch_dir, original, "trimmed");
            let cmd = FfmpegCommand::new(&out)
                .input(original)
                .duration(to_secs)
                .audio_codec("libmp3lame");
            runner.run(&cmd).await?;
            info!(from = %original.display(), to = %out.display(), to_secs, "Trimmed audio");
            Ok(out)
        }
        ReconcilePlan::Pad { deficit_secs } => {
            let original = audio_path.expect("Pad implies audio present");
            let out = scratch_file(scratch_dir, original, "padded");
            // Original first, silence appended after; concat keeps that order.
            let cmd = FfmpegCommand::new(&out)
                .input(original)
                .lavfi_input_for(SILENCE_SOURCE, deficit_secs)
                .filter_complex("[0:a][1:a]concat=n=2:v=0:a=1[out]")
                .map("[out]")
                .audio_codec("libmp3lame");
            runner.run(&cmd).await?;
            info!(from = %original.display(), to = %out.display(), deficit_secs, "Padded audio with trailing silence");
            Ok(out)
        }
        ReconcilePlan::Silence { secs } => {
            let out = scratch_dir.join(format!("silence_{}.mp3", timestamp()));
            let cmd = FfmpegCommand::new(&out)
                .lavfi_input_for(SILENCE_SOURCE, secs)
                .audio_codec("libmp3lame");
            runner.run(&cmd).await?;
            info!(to = %out.display(), secs, "Synthesized silence track");
            Ok(out)
        }
    }
}

/// Remove reconciliation scratch files from `dir`, best-effort.
///
/// Only files matching the temp naming patterns produced here are touched;
/// individual deletion failures are logged and swallowed.
pub async fn cleanup_scratch(dir: &Path) {
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().to_string();
        let is_scratch = name.starts_with("silence_")
            || name.contains("_trimmed_")
            || name.contains("_padded_");
        if !is_scratch {
            continue;
        }
        if let Err(e) = tokio::fs::remove_file(entry.path()).await {
            warn!(file = %entry.path().display(), error = %e, "Failed to remove scratch file");
        }
    }
}

fn timestamp() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S%3f").to_string()
}

fn scratch_file(scratch_dir: &Path, original: &Path, tag: &str) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string());
    scratch_dir.join(format!("{stem}_{tag}_{}.mp3", timestamp()))
}
