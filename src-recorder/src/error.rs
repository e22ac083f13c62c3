//! Error types for capture, audio, encoding and configuration.

use std::path::PathBuf;

/// Error type for screen capture operations.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The requested monitor or window was not found
    #[error("Capture target not found: {0}")]
    TargetNotFound(String),
    /// Invalid region specification
    #[error("Invalid region: {0}")]
    InvalidRegion(String),
    /// Platform-specific capture error
    #[error("Platform error: {0}")]
    PlatformError(String),
}

/// Error type for enumeration operations.
#[derive(Debug, thiserror::Error)]
#[error("Enumeration error: {0}")]
pub struct EnumerationError(pub String);

/// Error type for audio capture.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),
    #[error("Failed to open audio stream: {0}")]
    StreamFailed(String),
    #[error("Audio capture thread failed: {0}")]
    ThreadFailed(String),
}

/// Error type for the external encoder.
#[derive(Debug, thiserror::Error)]
pub enum EncoderError {
    #[error("FFmpeg executable not found")]
    NotFound,
    #[error("Failed to start FFmpeg: {0}")]
    SpawnFailed(#[source] std::io::Error),
    #[error("FFmpeg stdin unavailable")]
    NoStdin,
    #[error("Encoder already running")]
    AlreadyRunning,
    #[error("Invalid encoder settings: {0}")]
    InvalidSettings(String),
    #[error("FFmpeg exited with status {code:?}: {message}")]
    Failed { code: Option<i32>, message: String },
}

/// Error type for configuration persistence.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,
    #[error("Config I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Config serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Umbrella error for the recording engine.
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("Invalid state transition: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: reelcap_common::RecordingState,
    },
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Encoder(#[from] EncoderError),
    #[error("Failed to create {what} at {path}: {source}")]
    File {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to spawn timing loop: {0}")]
    Thread(#[source] std::io::Error),
    #[error("Timing loop did not exit within {0:?}; the session finalizes once it does")]
    LoopTimeout(std::time::Duration),
    #[error("The previous recording is still being finalized")]
    StillFinalizing,
}
