//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// One input to an FFmpeg invocation, with its per-input arguments.
#[derive(Debug, Clone)]
struct Input {
    /// Arguments placed before this input's `-i`.
    args: Vec<String>,
    /// The `-i` value: a file path or a lavfi graph spec.
    source: String,
}

/// Builder for FFmpeg commands.
///
/// Unlike a plain arg vector this keeps inputs ordered so `-map 0:v:0` style
/// stream selection stays readable at call sites.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<Input>,
    output: PathBuf,
    /// Output arguments (after all inputs).
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command targeting `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Output path this command writes to.
    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Add a file input.
    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.inputs.push(Input {
            args: Vec::new(),
            source: path.as_ref().to_string_lossy().to_string(),
        });
        self
    }

    /// Add a lavfi source input (e.g. `anullsrc=r=44100:cl=stereo`).
    pub fn lavfi_input(mut self, spec: impl Into<String>) -> Self {
        self.inputs.push(Input {
            args: vec!["-f".to_string(), "lavfi".to_string()],
            source: spec.into(),
        });
        self
    }

    /// Add a lavfi source input bounded to `seconds`.
    pub fn lavfi_input_for(mut self, spec: impl Into<String>, seconds: f64) -> Self {
        self.inputs.push(Input {
            args: vec![
                "-f".to_string(),
                "lavfi".to_string(),
                "-t".to_string(),
                format!("{:.3}", seconds),
            ],
            source: spec.into(),
        });
        self
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Select a stream from an input (e.g. `0:v:0`).
    pub fn map(self, stream: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(stream)
    }

    /// Limit output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set audio filter.
    pub fn audio_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-af").output_arg(filter)
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set audio bitrate.
    pub fn audio_bitrate(self, bitrate: impl Into<String>) -> Self {
        self.output_arg("-b:a").output_arg(bitrate)
    }

    /// Truncate to the shortest input stream.
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        for input in &self.inputs {
            args.extend(input.args.clone());
            args.push("-i".to_string());
            args.push(input.source.clone());
        }

        args.extend(self.output_args.clone());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Anything that can execute an [`FfmpegCommand`].
///
/// The production implementation is [`FfmpegRunner`]; tests substitute spies
/// to assert which commands were (or were not) spawned.
#[async_trait]
pub trait TranscodeRunner: Send + Sync {
    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()>;
}

/// Runner that spawns the real `ffmpeg` binary.
#[derive(Debug, Default)]
pub struct FfmpegRunner;

impl FfmpegRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TranscodeRunner for FfmpegRunner {
    async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let output = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
                output.status.code(),
            ));
        }

        // Exit 0 alone is not proof of a usable artifact.
        let out_path = cmd.output_path();
        let size = tokio::fs::metadata(out_path).await.map(|m| m.len()).unwrap_or(0);
        if size == 0 {
            return Err(MediaError::EmptyOutput(out_path.to_path_buf()));
        }

        Ok(())
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mux_command_shape() {
        let cmd = FfmpegCommand::new("out.mp4")
            .input("video.mp4")
            .input("audio.mp3")
            .map("0:v:0")
            .map("1:a:0")
            .video_codec("copy")
            .audio_codec("aac")
            .audio_bitrate("192k")
            .shortest();

        let args = cmd.build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-i video.mp4 -i audio.mp3"));
        assert!(joined.contains("-map 0:v:0 -map 1:a:0"));
        assert!(joined.contains("-c:v copy"));
        assert!(joined.contains("-b:a 192k"));
        assert!(joined.ends_with("-shortest out.mp4"));
    }

    #[test]
    fn test_lavfi_input_args_precede_source() {
        let cmd = FfmpegCommand::new("silence.mp3")
            .lavfi_input("anullsrc=r=44100:cl=stereo")
            .duration(1.5);

        let joined = cmd.build_args().join(" ");
        assert!(joined.contains("-f lavfi -i anullsrc=r=44100:cl=stereo"));
        assert!(joined.contains("-t 1.500"));
    }

    #[test]
    fn test_overwrite_and_log_level_defaults() {
        let args = FfmpegCommand::new("o.mp4").input("i.mp4").build_args();
        assert_eq!(args[0], "-y");
        assert_eq!(&args[1..3], &["-v".to_string(), "error".to_string()]);
    }
}
