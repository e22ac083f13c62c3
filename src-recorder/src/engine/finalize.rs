//! Session finalization: merge or rename the temporary files into the output.

use crate::encoder::{Muxer, WAV_HEADER_LEN};
use crate::error::RecorderError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Bytes of sample data a waveform file must exceed to be worth merging.
pub const AUDIO_NOISE_FLOOR: u64 = 4_800;

/// Hidden sibling files a session records into before finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TempPaths {
    pub video: PathBuf,
    pub audio: PathBuf,
}

impl TempPaths {
    /// Fresh temporary paths next to `output`, unique per process and call.
    pub fn for_output(output: &Path) -> Self {
        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "recording".to_string());
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let tag = format!(".{}.{}-{}", stem, std::process::id(), nanos);

        Self {
            video: dir.join(format!("{}.video.mp4", tag)),
            audio: dir.join(format!("{}.audio.wav", tag)),
        }
    }

    /// Remove both files, ignoring ones that do not exist.
    pub fn cleanup(&self) {
        for path in [&self.video, &self.audio] {
            match fs::remove_file(path) {
                Ok(()) => debug!("Removed temporary file {:?}", path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove temporary file {:?}: {}", path, e),
            }
        }
    }
}

/// How a session's output was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Video and audio muxed into the output
    Merged,
    /// No usable audio; the video was moved into place
    VideoOnly,
    /// Muxing failed; the video was moved into place without audio
    MergeFailed,
}

impl FinalizeOutcome {
    pub fn has_audio(&self) -> bool {
        matches!(self, FinalizeOutcome::Merged)
    }
}

/// Whether the waveform file holds more than the noise floor of samples.
pub fn audio_is_usable(audio: &Path) -> bool {
    fs::metadata(audio)
        .map(|m| m.len() > WAV_HEADER_LEN + AUDIO_NOISE_FLOOR)
        .unwrap_or(false)
}

/// Produce `output` from the temporary files, then delete them.
///
/// Fails only if the temporary video is missing or cannot be moved.
pub fn finalize(
    paths: &TempPaths,
    output: &Path,
    muxer: &dyn Muxer,
) -> Result<FinalizeOutcome, RecorderError> {
    let result = finalize_inner(paths, output, muxer);
    paths.cleanup();
    result
}

fn finalize_inner(
    paths: &TempPaths,
    output: &Path,
    muxer: &dyn Muxer,
) -> Result<FinalizeOutcome, RecorderError> {
    if !paths.video.is_file() {
        return Err(RecorderError::File {
            what: "output video",
            path: paths.video.clone(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "temporary video file is missing",
            ),
        });
    }

    let outcome = if audio_is_usable(&paths.audio) {
        if muxer.merge(&paths.video, &paths.audio, output) && output.is_file() {
            info!("Recording saved with audio: {:?}", output);
            return Ok(FinalizeOutcome::Merged);
        }
        warn!("Audio merge failed, saving video without audio");
        FinalizeOutcome::MergeFailed
    } else {
        debug!("No usable audio recorded");
        FinalizeOutcome::VideoOnly
    };

    move_file(&paths.video, output).map_err(|source| RecorderError::File {
        what: "output video",
        path: output.to_path_buf(),
        source,
    })?;

    info!("Recording saved: {:?}", output);
    Ok(outcome)
}

/// Rename, falling back to copy and delete across filesystems.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    if to.exists() {
        fs::remove_file(to)?;
    }
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!("Rename failed ({}), copying instead", e);
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}
