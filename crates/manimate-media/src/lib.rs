//! FFmpeg CLI wrapper for the narration/muxing stages.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multi-input stream mapping
//! - ffprobe-based duration/stream probing
//! - Audio-duration reconciliation (trim / silence-pad) against a video
//! - Final audio+video muxing with codec, volume, fade, and filter variants
//! - Best-effort scratch-file cleanup

pub mod command;
pub mod error;
pub mod mux;
pub mod probe;
pub mod reconcile;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner, TranscodeRunner};
pub use error::{MediaError, MediaResult};
pub use mux::{merge, merge_with_audio_filter, merge_with_fade, merge_with_volume, MergeOptions};
pub use probe::{media_duration, probe_media, DurationProbe, FfprobeDuration, MediaInfo};
pub use reconcile::{cleanup_scratch, reconcile_audio, ReconcilePlan, DURATION_TOLERANCE};
