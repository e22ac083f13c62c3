//! Video encoding through an external FFmpeg process.
//!
//! Raw RGB24 frames are piped to FFmpeg's stdin and encoded to H.264 without
//! an audio track. Audio is recorded separately to a WAV file and muxed in
//! afterwards by a [`Muxer`].

pub mod ffmpeg;
pub mod wav;

use crate::capture::Frame;
use crate::error::EncoderError;
use ffmpeg_sidecar::command::FfmpegCommand;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

pub use ffmpeg::{FfmpegEncoder, FfmpegMuxer};
pub use wav::{create_wav_header, WavWriter, WAV_HEADER_LEN};

/// Environment variable overriding the FFmpeg executable.
pub const FFMPEG_ENV: &str = "REELCAP_FFMPEG";

/// Fixed encoding target for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderSettings {
    /// Input frame width; must match every frame written
    pub width: u32,
    /// Input frame height; must match every frame written
    pub height: u32,
    pub fps: u32,
    /// FFmpeg bitrate string, e.g. `"8M"`
    pub bitrate: String,
    /// Scale the output to this size when set
    pub output_size: Option<(u32, u32)>,
}

impl EncoderSettings {
    /// Byte length every frame written must have.
    pub fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    pub fn validate(&self) -> Result<(), EncoderError> {
        if self.width == 0 || self.height == 0 {
            return Err(EncoderError::InvalidSettings(format!(
                "invalid dimensions {}x{}",
                self.width, self.height
            )));
        }
        if self.width % 2 != 0 || self.height % 2 != 0 {
            return Err(EncoderError::InvalidSettings(format!(
                "yuv420p needs even dimensions, got {}x{}",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(EncoderError::InvalidSettings("fps must be positive".to_string()));
        }
        if self.bitrate.trim().is_empty() {
            return Err(EncoderError::InvalidSettings("empty bitrate".to_string()));
        }
        Ok(())
    }
}

/// A write-only raw frame sink producing one video file.
pub trait VideoEncoder: Send {
    /// Launch the encoder writing to `output`.
    fn start(&mut self, settings: &EncoderSettings, output: &Path) -> Result<(), EncoderError>;

    /// Write one frame. Returns `false` on a length mismatch or a closed pipe.
    fn write_frame(&mut self, frame: &Frame) -> bool;

    /// Signal end of stream and wait for the output to be finalized.
    /// Returns `false` if the encoder did not exit cleanly.
    fn stop(&mut self) -> bool;
}

/// Combines a video-only file with a waveform audio file.
pub trait Muxer: Send + Sync {
    fn merge(&self, video: &Path, audio: &Path, output: &Path) -> bool;
}

/// FFmpeg arguments for encoding raw RGB24 frames from stdin.
pub fn video_encode_args(settings: &EncoderSettings, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-f",
        "rawvideo",
        "-vcodec",
        "rawvideo",
        "-pix_fmt",
        "rgb24",
        "-s",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push(format!("{}x{}", settings.width, settings.height));
    args.push("-r".to_string());
    args.push(settings.fps.to_string());
    args.push("-i".to_string());
    args.push("pipe:0".to_string());

    if let Some((w, h)) = settings.output_size {
        if (w, h) != (settings.width, settings.height) {
            args.push("-vf".to_string());
            args.push(format!("scale={}:{}", w, h));
        }
    }

    for arg in [
        "-c:v",
        "libx264",
        "-preset",
        "ultrafast",
        "-tune",
        "zerolatency",
        "-b:v",
    ] {
        args.push(arg.to_string());
    }
    args.push(settings.bitrate.clone());
    for arg in ["-pix_fmt", "yuv420p", "-an"] {
        args.push(arg.to_string());
    }
    args.push(output.to_string_lossy().to_string());
    args
}

/// FFmpeg arguments for muxing a video file with a WAV file.
///
/// The video stream is copied, audio is transcoded to AAC and the result is
/// cut to the shorter stream.
pub fn merge_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        video.to_string_lossy().to_string(),
        "-i".to_string(),
        audio.to_string_lossy().to_string(),
        "-c:v".to_string(),
        "copy".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "1:a".to_string(),
        "-shortest".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output.to_string_lossy().to_string(),
    ]
}

/// Resolve the path to the FFmpeg binary.
///
/// Order: the `REELCAP_FFMPEG` override, `ffmpeg` on `PATH`, then the binary
/// that `ffmpeg-sidecar` expects next to the current executable.
pub fn resolve_ffmpeg_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(FFMPEG_ENV) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Some(path);
        }
        debug!("{} points to a missing file: {:?}", FFMPEG_ENV, path);
    }

    if let Ok(path) = which::which("ffmpeg") {
        return Some(path);
    }

    let sidecar = ffmpeg_sidecar::paths::ffmpeg_path();
    sidecar.is_file().then_some(sidecar)
}

/// Create a new FfmpegCommand using the resolved FFmpeg path.
pub(crate) fn new_ffmpeg_command() -> Result<FfmpegCommand, EncoderError> {
    let path = resolve_ffmpeg_path().ok_or(EncoderError::NotFound)?;
    Ok(FfmpegCommand::new_with_path(path))
}

/// Check that FFmpeg can be located and runs.
///
/// Returns the path of the working binary.
pub fn ensure_ffmpeg() -> Result<PathBuf, EncoderError> {
    let path = resolve_ffmpeg_path().ok_or(EncoderError::NotFound)?;

    let output = Command::new(&path)
        .arg("-version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(EncoderError::SpawnFailed)?;

    if !output.status.success() {
        return Err(EncoderError::Failed {
            code: output.status.code(),
            message: "ffmpeg -version failed".to_string(),
        });
    }

    let version = String::from_utf8_lossy(&output.stdout);
    info!(
        "Using {} ({})",
        path.display(),
        version.lines().next().unwrap_or("unknown version")
    );
    Ok(path)
}
