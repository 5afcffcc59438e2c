//! Final audio+video muxing.
//!
//! All variants share one skeleton: verify both inputs exist (before any
//! subprocess is spawned), reconcile the audio's duration against the video,
//! then map the video's first video stream and the reconciled audio's first
//! audio stream into one container.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner, TranscodeRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{media_duration, DurationProbe, FfprobeDuration};
use crate::reconcile::reconcile_audio_with;

/// Options for a merge operation.
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Video codec; default passthrough.
    pub video_codec: String,
    /// Audio codec; default lossy aac.
    pub audio_codec: String,
    pub audio_bitrate: String,
    /// Truncate to the shortest stream.
    pub shortest: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            video_codec: "copy".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
            shortest: false,
        }
    }
}

/// Mux `video_path` and `audio_path` into `output_path`.
///
/// The audio is duration-reconciled first; reconciliation scratch files land
/// next to the output.
pub async fn merge(
    video_path: &Path,
    audio_path: &Path,
    output_path: &Path,
    options: &MergeOptions,
) -> MediaResult<PathBuf> {
    merge_with(
        &FfmpegRunner::new(),
        &FfprobeDuration::new(),
        video_path,
        audio_path,
        output_path,
        options,
        None,
    )
    .await
}

/// [`merge`] with a fixed volume multiplier applied to the audio.
pub async fn merge_with_volume(
    video_path: &Path,
    audio_path: &Path,
    output_path: &Path,
    options: &MergeOptions,
    volume: f64,
) -> MediaResult<PathBuf> {
    merge_with(
        &FfmpegRunner::new(),
        &FfprobeDuration::new(),
        video_path,
        audio_path,
        output_path,
        options,
        Some(format!("volume={volume:.2}")),
    )
    .await
}

/// [`merge`] with linear fade-in/fade-out envelopes computed from the audio's
/// probed duration.
pub async fn merge_with_fade(
    video_path: &Path,
    audio_path: &Path,
    output_path: &Path,
    options: &MergeOptions,
    fade_secs: f64,
) -> MediaResult<PathBuf> {
    check_inputs(video_path, audio_path)?;

    let duration = media_duration(audio_path).await?;
    let fade = fade_secs.min(duration / 2.0);
    let fade_out_start = (duration - fade).max(0.0);
    let filter = format!(
        "afade=t=in:st=0:d={fade:.3},afade=t=out:st={fade_out_start:.3}:d={fade:.3}"
    );

    merge_with(
        &FfmpegRunner::new(),
        &FfprobeDuration::new(),
        video_path,
        audio_path,
        output_path,
        options,
        Some(filter),
    )
    .await
}

/// [`merge`] with an arbitrary audio filter graph.
pub async fn merge_with_audio_filter(
    video_path: &Path,
    audio_path: &Path,
    output_path: &Path,
    options: &MergeOptions,
    audio_filter: impl Into<String>,
) -> MediaResult<PathBuf> {
    merge_with(
        &FfmpegRunner::new(),
        &FfprobeDuration::new(),
        video_path,
        audio_path,
        output_path,
        options,
        Some(audio_filter.into()),
    )
    .await
}

/// Shared merge skeleton with an injectable transcoder and probe, for tests.
pub async fn merge_with(
    runner: &dyn TranscodeRunner,
    probe: &dyn DurationProbe,
    video_path: &Path,
    audio_path: &Path,
    output_path: &Path,
    options: &MergeOptions,
    audio_filter: Option<String>,
) -> MediaResult<PathBuf> {
    check_inputs(video_path, audio_path)?;

    let scratch_dir = output_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let prepared_audio =
        reconcile_audio_with(runner, probe, video_path, Some(audio_path), &scratch_dir).await?;

    let mut cmd = FfmpegCommand::new(output_path)
        .input(video_path)
        .input(&prepared_audio)
        .map("0:v:0")
        .map("1:a:0")
        .video_codec(&options.video_codec)
        .audio_codec(&options.audio_codec)
        .audio_bitrate(&options.audio_bitrate);

    if let Some(filter) = audio_filter {
        cmd = cmd.audio_filter(filter);
    }
    if options.shortest {
        cmd = cmd.shortest();
    }

    runner.run(&cmd).await?;

    // Exit 0 is not enough; the deliverable must actually be on disk.
    let size = tokio::fs::metadata(output_path).await.map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        return Err(MediaError::EmptyOutput(output_path.to_path_buf()));
    }

    info!(
        video = %video_path.display(),
        audio = %prepared_audio.display(),
        output = %output_path.display(),
        size,
        "Merged audio and video"
    );
    Ok(output_path.to_path_buf())
}

fn check_inputs(video_path: &Path, audio_path: &Path) -> MediaResult<()> {
    if !video_path.exists() {
        return Err(MediaError::FileNotFound(video_path.to_path_buf()));
    }
    if !audio_path.exists() {
        return Err(MediaError::FileNotFound(audio_path.to_path_buf()));
    }
    Ok(())
}
